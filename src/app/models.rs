//! Data models for DWD import processing
//!
//! This module contains the core data structures for sensors, their validity
//! intervals and sent ranges, the measurand catalog, and the wire types
//! exchanged with the sensor API.

use crate::constants::{self, fields, ISO_TIMESTAMP_FORMAT};
use crate::{Error, Result};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical observation timestamp
pub type Timestamp = NaiveDateTime;

/// Render a timestamp in canonical ISO-8601 form
pub fn iso(ts: &Timestamp) -> String {
    ts.format(ISO_TIMESTAMP_FORMAT).to_string()
}

/// Composite key of station id and measurand name
pub fn local_id(station_id: &str, measurand: Measurand) -> String {
    format!("{}-{}", station_id, measurand.name())
}

// =============================================================================
// Measurand Catalog
// =============================================================================

/// Physical quantity carried by a product column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measurand {
    Temperature,
    Humidity,
    Cloudiness,
    AirPressure,
    AirPressureNn,
    WindSpeed,
    WindDirection,
    Precipitation,
    SunshineDuration,
}

/// How raw column text becomes a number value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueConversion {
    /// Decimal value, `-999` marks a missing reading
    Float,
    /// Cloud cover in eighths, mapped onto `0.0..1.0`
    Eighths,
}

impl Measurand {
    pub const ALL: &'static [Measurand] = &[
        Measurand::Temperature,
        Measurand::Humidity,
        Measurand::Cloudiness,
        Measurand::AirPressure,
        Measurand::AirPressureNn,
        Measurand::WindSpeed,
        Measurand::WindDirection,
        Measurand::Precipitation,
        Measurand::SunshineDuration,
    ];

    /// Local name, used in local ids and on the command line
    pub fn name(self) -> &'static str {
        match self {
            Measurand::Temperature => "temperature",
            Measurand::Humidity => "humidity",
            Measurand::Cloudiness => "cloudiness",
            Measurand::AirPressure => "air_pressure",
            Measurand::AirPressureNn => "air_pressure_nn",
            Measurand::WindSpeed => "wind_speed",
            Measurand::WindDirection => "wind_direction",
            Measurand::Precipitation => "precipitation",
            Measurand::SunshineDuration => "sunshine_duration",
        }
    }

    /// Measurand name as known to the sensor API
    pub fn remote_name(self) -> &'static str {
        match self {
            // Sea-level reduced pressure is still an air pressure reading remotely
            Measurand::AirPressureNn => Measurand::AirPressure.name(),
            other => other.name(),
        }
    }

    /// Unit name as known to the sensor API
    pub fn unit(self) -> &'static str {
        match self {
            Measurand::Temperature => "celsius",
            Measurand::Humidity => "percent",
            Measurand::Cloudiness => "level",
            Measurand::AirPressure | Measurand::AirPressureNn => "hPa",
            Measurand::WindSpeed => "m/s",
            Measurand::WindDirection => "degrees",
            Measurand::Precipitation => "mm",
            Measurand::SunshineDuration => "minutes",
        }
    }

    /// Header aliases in priority order
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Measurand::Temperature => fields::AIR_TEMPERATURE,
            Measurand::Humidity => fields::HUMIDITY,
            Measurand::Cloudiness => fields::CLOUDINESS,
            Measurand::AirPressure => fields::AIR_PRESSURE,
            Measurand::AirPressureNn => fields::AIR_PRESSURE_NN,
            Measurand::WindSpeed => fields::WIND_SPEED,
            Measurand::WindDirection => fields::WIND_DIRECTION,
            Measurand::Precipitation => fields::PRECIPITATION_AMOUNT,
            Measurand::SunshineDuration => fields::SUNSHINE_DURATION,
        }
    }

    pub fn conversion(self) -> ValueConversion {
        match self {
            Measurand::Cloudiness => ValueConversion::Eighths,
            _ => ValueConversion::Float,
        }
    }

    /// Measurands shipped in the same product file as this one
    pub fn companions(self) -> &'static [Measurand] {
        match self {
            Measurand::Temperature => &[Measurand::Humidity],
            Measurand::WindSpeed => &[Measurand::WindDirection],
            Measurand::AirPressure => &[Measurand::AirPressureNn],
            _ => &[],
        }
    }

    /// This measurand followed by its companions, transitively, without repeats
    pub fn with_companions(self) -> Vec<Measurand> {
        let mut ordered = Vec::new();
        let mut work = vec![self];
        while let Some(measurand) = work.pop() {
            if ordered.contains(&measurand) {
                continue;
            }
            ordered.push(measurand);
            // Reverse so companions are visited in table order
            work.extend(measurand.companions().iter().rev().copied());
        }
        ordered
    }
}

impl fmt::Display for Measurand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Measurand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Measurand::ALL
            .iter()
            .copied()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| Error::configuration(format!("Unknown measurand: '{}'", s)))
    }
}

// =============================================================================
// Time Classes
// =============================================================================

/// Sampling class of a product, selecting the sent-range adjacency tolerance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum TimeClass {
    Hourly,
    Daily,
    Unrecognized(String),
}

impl TimeClass {
    /// Largest gap between two ranges that still counts as adjacent
    ///
    /// `None` means the class is unknown and only overlapping or touching
    /// ranges may be merged.
    pub fn adjacency_tolerance(&self) -> Option<Duration> {
        match self {
            TimeClass::Hourly => Some(Duration::hours(1)),
            TimeClass::Daily => Some(Duration::days(1)),
            TimeClass::Unrecognized(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TimeClass::Hourly => "hourly",
            TimeClass::Daily => "daily",
            TimeClass::Unrecognized(other) => other,
        }
    }
}

impl From<&str> for TimeClass {
    fn from(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "hourly" => TimeClass::Hourly,
            "daily" => TimeClass::Daily,
            _ => TimeClass::Unrecognized(value.to_string()),
        }
    }
}

impl From<String> for TimeClass {
    fn from(value: String) -> Self {
        TimeClass::from(value.as_str())
    }
}

impl From<TimeClass> for String {
    fn from(value: TimeClass) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for TimeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Sensors
// =============================================================================

/// Inclusive timestamp range already transmitted for a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SentRange {
    pub from: Timestamp,
    pub to: Timestamp,
}

impl SentRange {
    pub fn new(from: Timestamp, to: Timestamp) -> Self {
        Self { from, to }
    }
}

/// One physical measurement stream for a station and measurand over a time window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    /// Station and measurand composite key
    pub local_id: String,

    /// Identifier assigned by the sensor API
    pub remote_id: u64,

    pub measurand: Measurand,

    pub unit: String,

    /// Position among the sensors sharing `local_id`
    pub index: u32,

    /// First day of the validity window
    pub earliest_day: Timestamp,

    /// Last day of the validity window, `None` while the station still reports
    pub latest_day: Option<Timestamp>,

    /// Disjoint ranges already transmitted
    #[serde(default)]
    pub sent_ranges: Vec<SentRange>,
}

impl Sensor {
    pub fn is_open_ended(&self) -> bool {
        self.latest_day.is_none()
    }

    /// Whether the validity window already covers a window starting at `from`
    pub fn covers_start(&self, from: &Timestamp) -> bool {
        self.earliest_day <= *from && self.latest_day.is_none_or(|latest| latest > *from)
    }
}

/// All sensors recorded for one local id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorMapping {
    pub local_id: String,
    pub sensors: Vec<Sensor>,
}

impl SensorMapping {
    pub fn new(local_id: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            sensors: Vec::new(),
        }
    }

    /// Next index not used by any sibling sensor
    pub fn next_index(&self) -> u32 {
        let mut next = self.sensors.len() as u32;
        while self.sensors.iter().any(|s| s.index == next) {
            next += 1;
        }
        next
    }

    pub fn sensor(&self, index: u32) -> Option<&Sensor> {
        self.sensors.iter().find(|s| s.index == index)
    }

    pub fn sensor_mut(&mut self, index: u32) -> Option<&mut Sensor> {
        self.sensors.iter_mut().find(|s| s.index == index)
    }

    /// Sensors ordered oldest-first
    pub fn sorted_by_earliest(&self) -> Vec<Sensor> {
        let mut sensors = self.sensors.clone();
        sensors.sort_by(|a, b| a.earliest_day.cmp(&b.earliest_day));
        sensors
    }
}

// =============================================================================
// Station Metadata
// =============================================================================

/// One line of a station geography metadata file
#[derive(Debug, Clone, PartialEq)]
pub struct StationMetadata {
    pub station_id: String,
    pub height_meters: Option<f64>,
    pub latitude: f64,
    pub longitude: f64,
    pub from: Timestamp,
    pub to: Option<Timestamp>,
    pub name: Option<String>,
}

// =============================================================================
// Sensor API Wire Types
// =============================================================================

/// Single value as sent to the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueMessage {
    pub sensor_id: u64,
    pub timestamp: String,
    pub number_value: f64,
}

/// Payload of `addMultipleValues`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueBatch {
    pub collapsed_messages: Vec<ValueMessage>,
}

impl ValueBatch {
    pub fn len(&self) -> usize {
        self.collapsed_messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collapsed_messages.is_empty()
    }
}

/// Geographic position of a remote sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

/// Payload of `addSensor`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSensorSpec {
    pub measurand_id: u64,
    pub unit_id: u64,
    pub license_id: u64,
    pub altitude_above_ground: f64,
    pub location: Location,
    pub direction_vertical: f64,
    pub direction_horizontal: f64,
    pub accuracy: u32,
    pub sensor_model: String,
    pub attribution_text: String,
    #[serde(rename = "attributionURL")]
    pub attribution_url: String,
}

impl RemoteSensorSpec {
    /// Spec for a DWD station sensor at the given position
    pub fn dwd_station(
        measurand_id: u64,
        unit_id: u64,
        license_id: u64,
        latitude: f64,
        longitude: f64,
    ) -> Self {
        use constants::sensor_defaults as d;
        Self {
            measurand_id,
            unit_id,
            license_id,
            altitude_above_ground: d::ALTITUDE_ABOVE_GROUND,
            location: Location {
                lat: latitude,
                lng: longitude,
            },
            direction_vertical: d::DIRECTION_VERTICAL,
            direction_horizontal: d::DIRECTION_HORIZONTAL,
            accuracy: d::ACCURACY,
            sensor_model: d::SENSOR_MODEL.to_string(),
            attribution_text: d::ATTRIBUTION_TEXT.to_string(),
            attribution_url: d::ATTRIBUTION_URL.to_string(),
        }
    }
}

/// Catalog entry returned by measurand, unit and license lookups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
}

// =============================================================================
// Counters
// =============================================================================

/// Aggregate counters kept next to the sensor mappings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Values accepted by the API
    Values,
    /// Values attempted
    AimedValues,
    /// Content passes that touched at least one sensor
    Actions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counters {
    pub value_count: u64,
    pub aimed_value_count: u64,
    pub action_count: u64,
}

impl Counters {
    pub fn increment(&mut self, counter: Counter, by: u64) {
        match counter {
            Counter::Values => self.value_count += by,
            Counter::AimedValues => self.aimed_value_count += by,
            Counter::Actions => self.action_count += by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_measurand_round_trips_through_name() {
        for measurand in Measurand::ALL {
            assert_eq!(measurand.name().parse::<Measurand>().unwrap(), *measurand);
        }
        assert!("snowfall".parse::<Measurand>().is_err());
    }

    #[test]
    fn test_with_companions_expands_table() {
        assert_eq!(
            Measurand::Temperature.with_companions(),
            vec![Measurand::Temperature, Measurand::Humidity]
        );
        assert_eq!(
            Measurand::WindSpeed.with_companions(),
            vec![Measurand::WindSpeed, Measurand::WindDirection]
        );
        assert_eq!(
            Measurand::Cloudiness.with_companions(),
            vec![Measurand::Cloudiness]
        );
    }

    #[test]
    fn test_time_class_parsing() {
        assert_eq!(TimeClass::from("hourly"), TimeClass::Hourly);
        assert_eq!(TimeClass::from("Daily"), TimeClass::Daily);
        assert_eq!(
            TimeClass::from("10_minutes"),
            TimeClass::Unrecognized("10_minutes".to_string())
        );
        assert_eq!(TimeClass::Hourly.adjacency_tolerance(), Some(Duration::hours(1)));
        assert_eq!(TimeClass::from("weekly").adjacency_tolerance(), None);
    }

    #[test]
    fn test_next_index_skips_used_indices() {
        let mut mapping = SensorMapping::new("00001-temperature");
        for index in [0, 2] {
            mapping.sensors.push(Sensor {
                local_id: mapping.local_id.clone(),
                remote_id: 10 + index as u64,
                measurand: Measurand::Temperature,
                unit: "celsius".to_string(),
                index,
                earliest_day: day(2020, 1, 1),
                latest_day: None,
                sent_ranges: Vec::new(),
            });
        }
        // len() == 2 is taken, so the next free slot is 3
        assert_eq!(mapping.next_index(), 3);
    }

    #[test]
    fn test_covers_start() {
        let sensor = Sensor {
            local_id: "00001-temperature".to_string(),
            remote_id: 1,
            measurand: Measurand::Temperature,
            unit: "celsius".to_string(),
            index: 0,
            earliest_day: day(2020, 1, 1),
            latest_day: Some(day(2020, 6, 1)),
            sent_ranges: Vec::new(),
        };
        assert!(sensor.covers_start(&day(2020, 1, 1)));
        assert!(sensor.covers_start(&day(2020, 5, 31)));
        assert!(!sensor.covers_start(&day(2020, 6, 1)));
        assert!(!sensor.covers_start(&day(2019, 12, 31)));
    }

    #[test]
    fn test_value_batch_wire_format() {
        let batch = ValueBatch {
            collapsed_messages: vec![ValueMessage {
                sensor_id: 7,
                timestamp: "2020-01-01T01:00:00".to_string(),
                number_value: 5.0,
            }],
        };
        let json = serde_json::to_value(&batch).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "collapsedMessages": [
                    {"sensorId": 7, "timestamp": "2020-01-01T01:00:00", "numberValue": 5.0}
                ]
            })
        );
    }
}
