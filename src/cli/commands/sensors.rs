//! Sensors command implementation
//!
//! Scans the whole sensor store and reports mappings, sensors, sent ranges
//! and the global counters.

use crate::app::adapters::sensor_store::StoreState;
use crate::app::models::{Counters, Sensor, SensorMapping, iso};
use crate::cli::args::{OutputFormat, SensorsArgs};
use crate::cli::commands::shared::{
    load_configuration, print_json, read_store_state, setup_logging,
};
use anyhow::Result;
use colored::*;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

/// One local id with its sensors
#[derive(Debug, Clone, Serialize)]
pub struct MappingSummary {
    pub local_id: String,
    pub sensors: usize,
    pub open_sensors: usize,
    pub sent_ranges: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<Sensor>>,
}

/// Whole-store report
#[derive(Debug, Clone, Serialize)]
pub struct SensorsReport {
    pub store: PathBuf,
    pub mappings: usize,
    pub sensors: usize,
    pub open_sensors: usize,
    pub sent_ranges: usize,
    pub counters: Counters,
    pub entries: Vec<MappingSummary>,
}

impl SensorsReport {
    /// Summarize `state`, keeping mappings whose local id contains `filter`
    pub fn from_state(
        store: PathBuf,
        state: &StoreState,
        filter: Option<&str>,
        detailed: bool,
    ) -> Self {
        let entries: Vec<MappingSummary> = state
            .mappings
            .values()
            .filter(|m| filter.is_none_or(|f| m.local_id.contains(f)))
            .map(|m| summarize(m, detailed))
            .collect();

        Self {
            store,
            mappings: entries.len(),
            sensors: entries.iter().map(|e| e.sensors).sum(),
            open_sensors: entries.iter().map(|e| e.open_sensors).sum(),
            sent_ranges: entries.iter().map(|e| e.sent_ranges).sum(),
            counters: state.counters.clone(),
            entries,
        }
    }
}

fn summarize(mapping: &SensorMapping, detailed: bool) -> MappingSummary {
    MappingSummary {
        local_id: mapping.local_id.clone(),
        sensors: mapping.sensors.len(),
        open_sensors: mapping.sensors.iter().filter(|s| s.is_open_ended()).count(),
        sent_ranges: mapping.sensors.iter().map(|s| s.sent_ranges.len()).sum(),
        details: detailed.then(|| mapping.sorted_by_earliest()),
    }
}

/// Run the sensors command
pub async fn run_sensors(args: SensorsArgs) -> Result<()> {
    setup_logging(&args.log)?;

    let config = load_configuration(args.config_file.as_deref(), args.store.as_ref())?;
    let state = read_store_state(&config.store.path).await?;
    info!(
        "Loaded {} mappings from {}",
        state.mappings.len(),
        config.store.path.display()
    );

    let report = SensorsReport::from_state(
        config.store.path.clone(),
        &state,
        args.filter.as_deref(),
        args.detailed,
    );

    match args.format {
        OutputFormat::Human => print_report(&report),
        OutputFormat::Json => print_json(&report)?,
    }
    Ok(())
}

fn print_report(report: &SensorsReport) {
    println!("\n{}", "Sensor Store".bright_green().bold());
    println!("  Store: {}", report.store.display());
    println!(
        "  Mappings: {}  Sensors: {} ({} open)  Sent ranges: {}",
        report.mappings.to_string().bright_white().bold(),
        report.sensors.to_string().bright_white().bold(),
        report.open_sensors,
        report.sent_ranges
    );
    println!(
        "  Counters: {} values sent, {} attempted, {} actions",
        report.counters.value_count, report.counters.aimed_value_count, report.counters.action_count
    );

    if report.entries.is_empty() {
        return;
    }
    println!();
    for entry in &report.entries {
        println!(
            "  {:<32} {:>3} sensors {:>3} open {:>5} ranges",
            entry.local_id.cyan(),
            entry.sensors,
            entry.open_sensors,
            entry.sent_ranges
        );
        for sensor in entry.details.iter().flatten() {
            let latest = sensor
                .latest_day
                .map(|day| iso(&day))
                .unwrap_or_else(|| "open".to_string());
            println!(
                "    #{} remote {} {} .. {}",
                sensor.index,
                sensor.remote_id,
                iso(&sensor.earliest_day),
                latest
            );
            for range in &sensor.sent_ranges {
                println!("      sent {} .. {}", iso(&range.from), iso(&range.to));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::{Measurand, SentRange, Timestamp, local_id};
    use chrono::NaiveDate;

    fn day(d: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2020, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn sensor(local: &str, index: u32, latest: Option<Timestamp>, ranges: usize) -> Sensor {
        Sensor {
            local_id: local.to_string(),
            remote_id: 100 + index as u64,
            measurand: Measurand::Temperature,
            unit: "celsius".to_string(),
            index,
            earliest_day: day(1),
            latest_day: latest,
            sent_ranges: (0..ranges)
                .map(|i| SentRange::new(day(2 + i as u32), day(2 + i as u32)))
                .collect(),
        }
    }

    fn state() -> StoreState {
        let mut state = StoreState::default();
        let temperature = local_id("00001", Measurand::Temperature);
        let humidity = local_id("00001", Measurand::Humidity);

        let mut mapping = SensorMapping::new(&temperature);
        mapping.sensors.push(sensor(&temperature, 0, Some(day(3)), 2));
        mapping.sensors.push(sensor(&temperature, 1, None, 1));
        state.mappings.insert(temperature, mapping);

        let mut mapping = SensorMapping::new(&humidity);
        mapping.sensors.push(sensor(&humidity, 0, None, 0));
        state.mappings.insert(humidity, mapping);

        state.counters.value_count = 12;
        state
    }

    #[test]
    fn test_report_totals() {
        let report = SensorsReport::from_state(PathBuf::from("s.json"), &state(), None, false);
        assert_eq!(report.mappings, 2);
        assert_eq!(report.sensors, 3);
        assert_eq!(report.open_sensors, 2);
        assert_eq!(report.sent_ranges, 3);
        assert_eq!(report.counters.value_count, 12);
        assert!(report.entries.iter().all(|e| e.details.is_none()));
    }

    #[test]
    fn test_report_filter_and_details() {
        let report =
            SensorsReport::from_state(PathBuf::from("s.json"), &state(), Some("humidity"), true);
        assert_eq!(report.mappings, 1);
        assert_eq!(report.entries[0].details.as_ref().unwrap().len(), 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["entries"][0]["sensors"], 1);
    }
}
