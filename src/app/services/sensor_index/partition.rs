//! Binary-search partitioning of sorted observation sequences
//!
//! Every split in the importer goes through [`find_transition`]: given a
//! range of a sorted sequence and a predicate that holds on a prefix of it,
//! return the first index where the predicate fails.

use std::ops::Range;

use crate::app::models::{Sensor, Timestamp};

/// Rows of a product assigned to one sensor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorChunk {
    /// Position of the sensor in the oldest-first sensor list
    pub sensor: usize,

    /// Half-open row range
    pub rows: Range<usize>,
}

impl SensorChunk {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// First index in `start..end` where `holds` is false, or `end`
///
/// `holds` must be true on a (possibly empty) prefix of the range and false on
/// the rest. An empty range returns `start`.
pub fn find_transition<T, F>(items: &[T], start: usize, end: usize, holds: F) -> usize
where
    F: FnMut(&T) -> bool,
{
    let end = end.min(items.len());
    if start >= end {
        return start;
    }
    start + items[start..end].partition_point(holds)
}

/// Whether `ts` lies inside a sensor's validity window
///
/// Both bounds are inclusive; a missing `latest` is unbounded.
pub fn belongs_to_sensor(earliest: &Timestamp, ts: &Timestamp, latest: Option<&Timestamp>) -> bool {
    earliest <= ts && latest.is_none_or(|latest| ts <= latest)
}

/// Assign each timestamp to at most one sensor
///
/// `sensors` must be ordered oldest-first. Observations before the first
/// sensor or in gaps between sensors are skipped; a run that reaches the end
/// of the sequence stops the scan.
pub fn separate_by_sensor(timestamps: &[Timestamp], sensors: &[Sensor]) -> Vec<SensorChunk> {
    let n = timestamps.len();
    let mut chunks = Vec::new();
    let mut cursor = 0;

    for (position, sensor) in sensors.iter().enumerate() {
        if cursor >= n {
            break;
        }

        let first = find_transition(timestamps, cursor, n, |ts| *ts < sensor.earliest_day);
        if first >= n {
            // Everything left predates this sensor and all later ones
            break;
        }

        let end = find_transition(timestamps, first, n, |ts| {
            belongs_to_sensor(&sensor.earliest_day, ts, sensor.latest_day.as_ref())
        });

        if end > first {
            chunks.push(SensorChunk {
                sensor: position,
                rows: first..end,
            });
        }
        cursor = end;
    }

    chunks
}
