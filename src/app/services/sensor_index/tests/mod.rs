//! Tests for sensor partitioning and sent-range handling

pub mod partition_tests;
pub mod sent_range_tests;

use crate::app::models::{Measurand, Sensor, Timestamp};
use chrono::{Duration, NaiveDate};

/// 2020-01-01 plus `hours`
pub fn hour(hours: i64) -> Timestamp {
    NaiveDate::from_ymd_opt(2020, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::hours(hours)
}

/// Midnight of day `d` of January 2020
pub fn day(d: u32) -> Timestamp {
    NaiveDate::from_ymd_opt(2020, 1, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn hourly(count: i64) -> Vec<Timestamp> {
    (0..count).map(hour).collect()
}

pub fn sensor(index: u32, earliest: Timestamp, latest: Option<Timestamp>) -> Sensor {
    Sensor {
        local_id: "00001-temperature".to_string(),
        remote_id: 500 + index as u64,
        measurand: Measurand::Temperature,
        unit: "celsius".to_string(),
        index,
        earliest_day: earliest,
        latest_day: latest,
        sent_ranges: Vec::new(),
    }
}
