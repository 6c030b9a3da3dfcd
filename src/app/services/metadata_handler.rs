//! Station metadata handling
//!
//! A product archive ships a geography file with one line per station
//! location period:
//!
//! ```text
//! Stations_id;Stationshoehe;Geogr.Breite;Geogr.Laenge;von_datum;bis_datum;Stationsname
//! 3;202;50.7827;6.0941;19500401;20110331;Aachen
//! ```
//!
//! Each period needs one sensor per measurand of the product group. Periods
//! already covered by a stored sensor are left alone, except that an open
//! sensor is closed when the file now carries an end date.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::app::adapters::api_resilience::LookupCache;
use crate::app::adapters::sensor_api::SensorApi;
use crate::app::adapters::sensor_store::SensorStore;
use crate::app::models::{
    CatalogEntry, Measurand, RemoteSensorSpec, Sensor, SensorMapping, StationMetadata, local_id,
};
use crate::app::services::record_normalizer::split_line;
use crate::app::services::record_normalizer::timestamps::{parse_optional_day, parse_raw_timestamp};
use crate::constants::MIN_METADATA_FIELDS;
use crate::{Error, Result};

/// Parse one metadata line
///
/// Returns `Ok(None)` for lines that are not station rows (the header, footers,
/// lines with too few fields).
pub fn parse_metadata_line(line: &str) -> Result<Option<StationMetadata>> {
    let fields = split_line(line);
    if fields.len() < MIN_METADATA_FIELDS
        || fields[0].is_empty()
        || !fields[0].chars().all(|c| c.is_ascii_digit())
    {
        return Ok(None);
    }

    let coordinate = |column: &str, raw: &str| -> Result<f64> {
        raw.parse().map_err(|_| Error::value_parse(column, raw))
    };

    Ok(Some(StationMetadata {
        station_id: fields[0].clone(),
        height_meters: fields[1].parse().ok(),
        latitude: coordinate("Geogr.Breite", &fields[2])?,
        longitude: coordinate("Geogr.Laenge", &fields[3])?,
        from: parse_raw_timestamp(&fields[4])?,
        to: parse_optional_day(&fields[5])?,
        name: Some(fields[6].clone()).filter(|name| !name.is_empty()),
    }))
}

/// What happened to one (station period, measurand) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorAction {
    Created { remote_id: u64, index: u32 },
    Closed { index: u32 },
    Unchanged,
}

/// Summary of one metadata file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetadataReport {
    pub station_lines: usize,
    pub skipped_lines: usize,
    pub invalid_lines: usize,
    pub created: usize,
    pub closed: usize,
    pub unchanged: usize,
}

impl MetadataReport {
    fn record(&mut self, action: SensorAction) {
        match action {
            SensorAction::Created { .. } => self.created += 1,
            SensorAction::Closed { .. } => self.closed += 1,
            SensorAction::Unchanged => self.unchanged += 1,
        }
    }
}

/// Creates local and remote sensors from station metadata
pub struct MetadataHandler<'a> {
    api: &'a dyn SensorApi,
    store: &'a dyn SensorStore,
    cache: &'a LookupCache,
    license: String,
}

impl<'a> MetadataHandler<'a> {
    pub fn new(
        api: &'a dyn SensorApi,
        store: &'a dyn SensorStore,
        cache: &'a LookupCache,
        license: impl Into<String>,
    ) -> Self {
        Self {
            api,
            store,
            cache,
            license: license.into(),
        }
    }

    /// Ensure sensors exist for every station period in `lines`
    pub async fn handle_lines(&self, lines: &[String], measurand: Measurand) -> Result<MetadataReport> {
        let mut report = MetadataReport::default();
        let measurands = measurand.with_companions();

        for line in lines {
            let station = match parse_metadata_line(line) {
                Ok(Some(station)) => station,
                Ok(None) => {
                    report.skipped_lines += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Skipping metadata line '{}': {}", line, e);
                    report.invalid_lines += 1;
                    continue;
                }
            };
            report.station_lines += 1;

            for &m in &measurands {
                let action = self.ensure_sensor(&station, m).await?;
                report.record(action);
            }
        }

        info!(
            "Metadata for {}: {} station lines, {} sensors created, {} closed",
            measurand, report.station_lines, report.created, report.closed
        );
        Ok(report)
    }

    /// Make sure a sensor covers the period starting at `station.from`
    pub async fn ensure_sensor(
        &self,
        station: &StationMetadata,
        measurand: Measurand,
    ) -> Result<SensorAction> {
        let local_id = local_id(&station.station_id, measurand);
        let mapping = self.store.find_mapping(&local_id).await?;

        if let Some(covering) = mapping
            .as_ref()
            .and_then(|m| m.sensors.iter().find(|s| s.covers_start(&station.from)))
        {
            return match station.to {
                Some(to) if covering.is_open_ended() => {
                    self.store
                        .set_latest_day(&local_id, covering.index, to)
                        .await?;
                    info!("Closed {} sensor {} at {}", local_id, covering.index, to);
                    Ok(SensorAction::Closed {
                        index: covering.index,
                    })
                }
                _ => {
                    debug!("{} already has a sensor from {}", local_id, station.from);
                    Ok(SensorAction::Unchanged)
                }
            };
        }

        let index = mapping.as_ref().map(SensorMapping::next_index).unwrap_or(0);
        let spec = self.remote_spec(station, measurand).await?;
        let remote_id = self
            .api
            .add_sensor(&spec)
            .await
            .map_err(|e| Error::transient_api("addSensor", e))?;

        if mapping.is_none() {
            self.store.insert_mapping(&local_id).await?;
        }
        self.store
            .add_sensor(Sensor {
                local_id: local_id.clone(),
                remote_id,
                measurand,
                unit: measurand.unit().to_string(),
                index,
                earliest_day: station.from,
                latest_day: station.to,
                sent_ranges: Vec::new(),
            })
            .await?;

        info!("Added sensor {} index {} -> remote id {}", local_id, index, remote_id);
        Ok(SensorAction::Created { remote_id, index })
    }

    async fn remote_spec(
        &self,
        station: &StationMetadata,
        measurand: Measurand,
    ) -> Result<RemoteSensorSpec> {
        let name = measurand.remote_name();
        let measurand_id = self
            .cache
            .get_or_fetch(&format!("measurand:{}", name), || async {
                first_id(
                    self.api
                        .get_measurands(name)
                        .await
                        .map_err(|e| Error::transient_api("getMeasurands", e))?,
                    "measurand",
                    name,
                )
            })
            .await?;

        let unit = measurand.unit();
        let unit_id = self
            .cache
            .get_or_fetch(&format!("unit:{}:{}", unit, measurand_id), || async {
                first_id(
                    self.api
                        .get_units(unit, measurand_id)
                        .await
                        .map_err(|e| Error::transient_api("getUnits", e))?,
                    "unit",
                    unit,
                )
            })
            .await?;

        let license = self.license.as_str();
        let license_id = self
            .cache
            .get_or_fetch(&format!("license:{}", license), || async {
                first_id(
                    self.api
                        .get_licenses(license)
                        .await
                        .map_err(|e| Error::transient_api("getLicenses", e))?,
                    "license",
                    license,
                )
            })
            .await?;

        Ok(RemoteSensorSpec::dwd_station(
            measurand_id,
            unit_id,
            license_id,
            station.latitude,
            station.longitude,
        ))
    }
}

fn first_id(entries: Vec<CatalogEntry>, kind: &str, name: &str) -> Result<u64> {
    entries
        .first()
        .map(|entry| entry.id)
        .ok_or_else(|| Error::configuration(format!("The sensor API knows no {} '{}'", kind, name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::adapters::fake_api::FakeApi;
    use crate::app::adapters::sensor_store::MemoryStore;
    use crate::constants::sensor_defaults::LICENSE_SHORT_NAME;
    use chrono::NaiveDate;

    const HEADER: &str =
        "Stations_id;Stationshoehe;Geogr.Breite;Geogr.Laenge;von_datum;bis_datum;Stationsname";

    fn day(y: i32, m: u32, d: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn lines(rows: &[&str]) -> Vec<String> {
        std::iter::once(HEADER)
            .chain(rows.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_parse_metadata_line() {
        let station = parse_metadata_line("    3; 202;  50.7827;   6.0941;19500401;20110331;Aachen")
            .unwrap()
            .unwrap();
        assert_eq!(station.station_id, "3");
        assert_eq!(station.height_meters, Some(202.0));
        assert_eq!(station.latitude, 50.7827);
        assert_eq!(station.from, day(1950, 4, 1));
        assert_eq!(station.to, Some(day(2011, 3, 31)));
        assert_eq!(station.name.as_deref(), Some("Aachen"));

        let open = parse_metadata_line("44;44;52.9336;8.2370;20070401;;Großenkneten")
            .unwrap()
            .unwrap();
        assert_eq!(open.to, None);
    }

    #[test]
    fn test_parse_skips_non_station_lines() {
        assert!(parse_metadata_line(HEADER).unwrap().is_none());
        assert!(parse_metadata_line("3;202;50.78").unwrap().is_none());
        assert!(parse_metadata_line("generiert: 10.01.2020").unwrap().is_none());
        assert!(parse_metadata_line("3;202;north;6.09;19500401;;Aachen").is_err());
    }

    #[tokio::test]
    async fn test_creates_sensors_with_companions() {
        let api = FakeApi::new();
        let store = MemoryStore::new();
        let cache = LookupCache::default();
        let handler = MetadataHandler::new(&api, &store, &cache, LICENSE_SHORT_NAME);

        let report = handler
            .handle_lines(
                &lines(&[
                    "3;202;50.7827;6.0941;19500401;20110331;Aachen",
                    "3;205;50.7800;6.1000;20110401;;Aachen",
                ]),
                Measurand::Temperature,
            )
            .await
            .unwrap();

        assert_eq!(report.station_lines, 2);
        assert_eq!(report.skipped_lines, 1);
        assert_eq!(report.created, 4);

        let temperature = store.find_mapping("3-temperature").await.unwrap().unwrap();
        let sensors = temperature.sorted_by_earliest();
        assert_eq!(sensors.len(), 2);
        assert_eq!(sensors[0].index, 0);
        assert_eq!(sensors[0].latest_day, Some(day(2011, 3, 31)));
        assert_eq!(sensors[1].index, 1);
        assert!(sensors[1].is_open_ended());

        let humidity = store.find_mapping("3-humidity").await.unwrap().unwrap();
        assert_eq!(humidity.sensors.len(), 2);
        assert_eq!(humidity.sensors[0].unit, "percent");

        let created = api.created_sensors().await;
        assert_eq!(created.len(), 4);
        assert_eq!(created[0].sensor_model, "DWD station");
        assert_eq!(created[0].location.lat, 50.7827);
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent_and_closes_open_sensor() {
        let api = FakeApi::new();
        let store = MemoryStore::new();
        let cache = LookupCache::default();
        let handler = MetadataHandler::new(&api, &store, &cache, LICENSE_SHORT_NAME);

        handler
            .handle_lines(&lines(&["3;202;50.78;6.09;20110401;;Aachen"]), Measurand::Cloudiness)
            .await
            .unwrap();
        let rerun = handler
            .handle_lines(&lines(&["3;202;50.78;6.09;20110401;;Aachen"]), Measurand::Cloudiness)
            .await
            .unwrap();
        assert_eq!(rerun.created, 0);
        assert_eq!(rerun.unchanged, 1);

        let closing = handler
            .handle_lines(
                &lines(&["3;202;50.78;6.09;20110401;20200101;Aachen"]),
                Measurand::Cloudiness,
            )
            .await
            .unwrap();
        assert_eq!(closing.closed, 1);

        let mapping = store.find_mapping("3-cloudiness").await.unwrap().unwrap();
        assert_eq!(mapping.sensors.len(), 1);
        assert_eq!(mapping.sensors[0].latest_day, Some(day(2020, 1, 1)));
        assert_eq!(api.created_sensors().await.len(), 1);
    }

    #[tokio::test]
    async fn test_catalog_lookups_are_cached() {
        let api = FakeApi::new();
        let store = MemoryStore::new();
        let cache = LookupCache::default();
        let handler = MetadataHandler::new(&api, &store, &cache, LICENSE_SHORT_NAME);

        handler
            .handle_lines(
                &lines(&[
                    "3;202;50.78;6.09;19500401;20110331;Aachen",
                    "3;202;50.78;6.09;20110401;;Aachen",
                    "44;44;52.93;8.23;20070401;;Großenkneten",
                ]),
                Measurand::Cloudiness,
            )
            .await
            .unwrap();

        // measurand, unit and license once each
        assert_eq!(api.lookup_count(), 3);
        assert_eq!(api.created_sensors().await.len(), 3);
    }
}
