//! Tests for the transition finder and per-sensor chunking

use super::{day, hour, hourly, sensor};
use crate::app::services::sensor_index::{
    SensorChunk, belongs_to_sensor, find_transition, separate_by_sensor,
};

#[test]
fn test_find_transition_exact_boundary() {
    let items: Vec<u32> = (0..100).collect();
    for boundary in 0..=100 {
        assert_eq!(find_transition(&items, 0, 100, |v| *v < boundary), boundary as usize);
    }
}

#[test]
fn test_find_transition_within_window() {
    let items = [1, 2, 3, 4, 5, 6, 7, 8];
    // true everywhere returns end, false everywhere returns start
    assert_eq!(find_transition(&items, 2, 6, |_| true), 6);
    assert_eq!(find_transition(&items, 2, 6, |_| false), 2);
    assert_eq!(find_transition(&items, 2, 6, |v| *v < 5), 4);
}

#[test]
fn test_find_transition_degenerate_windows() {
    let items = [10];
    assert_eq!(find_transition(&items, 0, 1, |v| *v < 10), 0);
    assert_eq!(find_transition(&items, 0, 1, |v| *v <= 10), 1);
    assert_eq!(find_transition(&items, 3, 3, |_| true), 3);
    let empty: [u32; 0] = [];
    assert_eq!(find_transition(&empty, 0, 0, |_| true), 0);
}

#[test]
fn test_find_transition_suffix_by_negation() {
    let items = [1, 2, 3, 10, 11];
    // the suffix `v >= 10` starts where its negation stops holding
    assert_eq!(find_transition(&items, 0, items.len(), |v| !(*v >= 10)), 3);
}

#[test]
fn test_belongs_to_sensor() {
    assert!(belongs_to_sensor(&day(1), &day(1), None));
    assert!(belongs_to_sensor(&day(1), &day(20), None));
    assert!(belongs_to_sensor(&day(1), &day(5), Some(&day(5))));
    assert!(!belongs_to_sensor(&day(1), &day(6), Some(&day(5))));
    assert!(!belongs_to_sensor(&day(2), &day(1), None));
}

#[test]
fn test_open_sensor_takes_whole_range() {
    let timestamps: Vec<_> = (1..=5).map(day).collect();
    let sensors = vec![sensor(0, day(1), None)];

    let chunks = separate_by_sensor(&timestamps, &sensors);
    assert_eq!(chunks, vec![SensorChunk { sensor: 0, rows: 0..timestamps.len() }]);
}

#[test]
fn test_consecutive_sensors_split_sequence() {
    let timestamps: Vec<_> = (1..=10).map(day).collect();
    let sensors = vec![
        sensor(0, day(1), Some(day(4))),
        sensor(1, day(5), None),
    ];

    let chunks = separate_by_sensor(&timestamps, &sensors);
    assert_eq!(
        chunks,
        vec![
            SensorChunk { sensor: 0, rows: 0..4 },
            SensorChunk { sensor: 1, rows: 4..10 },
        ]
    );
}

#[test]
fn test_observations_before_and_between_sensors_are_skipped() {
    let timestamps: Vec<_> = (1..=10).map(day).collect();
    let sensors = vec![
        sensor(0, day(3), Some(day(4))),
        sensor(1, day(7), Some(day(8))),
    ];

    let chunks = separate_by_sensor(&timestamps, &sensors);
    assert_eq!(
        chunks,
        vec![
            SensorChunk { sensor: 0, rows: 2..4 },
            SensorChunk { sensor: 1, rows: 6..8 },
        ]
    );
}

#[test]
fn test_data_predating_all_sensors_stops_scan() {
    let timestamps = hourly(5);
    let sensors = vec![sensor(0, day(10), None)];
    assert!(separate_by_sensor(&timestamps, &sensors).is_empty());
    assert!(separate_by_sensor(&timestamps, &[]).is_empty());
    assert!(separate_by_sensor(&[], &sensors).is_empty());
}

#[test]
fn test_partition_never_duplicates_or_loses_covered_rows() {
    let timestamps = hourly(24 * 12);
    let sensors = vec![
        sensor(0, day(2), Some(day(3))),
        sensor(1, day(4), Some(day(6))),
        sensor(2, day(8), None),
    ];

    let chunks = separate_by_sensor(&timestamps, &sensors);

    let mut owner = vec![None; timestamps.len()];
    for chunk in &chunks {
        for row in chunk.rows.clone() {
            assert!(owner[row].is_none(), "row {} assigned twice", row);
            owner[row] = Some(chunk.sensor);
        }
    }

    for (row, ts) in timestamps.iter().enumerate() {
        let expected = sensors.iter().position(|s| {
            belongs_to_sensor(&s.earliest_day, ts, s.latest_day.as_ref())
        });
        assert_eq!(owner[row], expected, "row {} at {}", row, ts);
    }
    assert_eq!(timestamps[chunks[0].rows.start], hour(24));
}
