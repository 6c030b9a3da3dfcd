//! Tests for sent-range merging and unsent-remainder splitting

use super::{day, hour, hourly};
use crate::app::models::{SentRange, TimeClass};
use crate::app::services::sensor_index::{
    merge_intervals, merge_sent_ranges, split_by_already_sent,
};

fn strict(intervals: Vec<(i32, i32)>) -> Vec<(i32, i32)> {
    merge_intervals(intervals, |running_end, next_start| next_start <= running_end)
}

#[test]
fn test_strict_merge_fills_gap() {
    let merged = strict(vec![(1, 3), (5, 7)]);
    assert_eq!(merged, vec![(1, 3), (5, 7)]);

    let mut extended = merged;
    extended.push((3, 5));
    assert_eq!(strict(extended), vec![(1, 7)]);
}

#[test]
fn test_merge_is_idempotent_and_order_independent() {
    let input = vec![(8, 9), (1, 2), (2, 4), (6, 7), (3, 5), (12, 20), (13, 14)];
    let once = strict(input.clone());
    assert_eq!(once, vec![(1, 5), (6, 7), (8, 9), (12, 20)]);
    assert_eq!(strict(once.clone()), once);

    let mut reversed = input;
    reversed.reverse();
    assert_eq!(strict(reversed), once);
}

#[test]
fn test_hourly_ranges_one_hour_apart_merge() {
    let ranges = vec![
        SentRange::new(hour(6), hour(10)),
        SentRange::new(hour(0), hour(5)),
        SentRange::new(hour(12), hour(14)),
    ];
    let merged = merge_sent_ranges(&ranges, &TimeClass::Hourly);
    assert_eq!(
        merged,
        vec![
            SentRange::new(hour(0), hour(10)),
            SentRange::new(hour(12), hour(14)),
        ]
    );
    assert_eq!(merge_sent_ranges(&merged, &TimeClass::Hourly), merged);
}

#[test]
fn test_hourly_merge_crosses_midnight() {
    let ranges = vec![
        SentRange::new(hour(0), hour(23)),
        SentRange::new(hour(24), hour(30)),
    ];
    assert_eq!(
        merge_sent_ranges(&ranges, &TimeClass::Hourly),
        vec![SentRange::new(hour(0), hour(30))]
    );
}

#[test]
fn test_daily_ranges_merge_by_day() {
    let ranges = vec![
        SentRange::new(day(1), day(3)),
        SentRange::new(day(4), day(6)),
        SentRange::new(day(8), day(9)),
    ];
    assert_eq!(
        merge_sent_ranges(&ranges, &TimeClass::Daily),
        vec![SentRange::new(day(1), day(6)), SentRange::new(day(8), day(9))]
    );
}

#[test]
fn test_unrecognized_time_class_merges_only_overlaps() {
    let class = TimeClass::from("10_minutes");
    let ranges = vec![
        SentRange::new(hour(0), hour(5)),
        SentRange::new(hour(5), hour(7)),
        SentRange::new(hour(8), hour(9)),
    ];
    assert_eq!(
        merge_sent_ranges(&ranges, &class),
        vec![SentRange::new(hour(0), hour(7)), SentRange::new(hour(8), hour(9))]
    );
}

#[test]
fn test_split_leaves_only_unsent_tail() {
    let timestamps = hourly(11);
    let sent = vec![SentRange::new(hour(0), hour(5))];

    let unsent = split_by_already_sent(&timestamps, 0..timestamps.len(), &sent);
    assert_eq!(unsent, vec![6..11]);
    assert_eq!(timestamps[unsent[0].start], hour(6));
    assert_eq!(timestamps[unsent[0].end - 1], hour(10));
}

#[test]
fn test_split_around_several_ranges() {
    let timestamps = hourly(20);
    let sent = vec![
        SentRange::new(hour(3), hour(5)),
        SentRange::new(hour(10), hour(12)),
    ];

    let unsent = split_by_already_sent(&timestamps, 2..18, &sent);
    assert_eq!(unsent, vec![2..3, 6..10, 13..18]);
}

#[test]
fn test_split_with_nothing_sent_or_everything_sent() {
    let timestamps = hourly(5);
    assert_eq!(split_by_already_sent(&timestamps, 0..5, &[]), vec![0..5]);

    let all = vec![SentRange::new(hour(-10), hour(100))];
    assert!(split_by_already_sent(&timestamps, 0..5, &all).is_empty());
    assert!(split_by_already_sent(&timestamps, 3..3, &[]).is_empty());
}

#[test]
fn test_split_ignores_ranges_outside_chunk() {
    let timestamps = hourly(10);
    let sent = vec![
        SentRange::new(hour(-5), hour(-1)),
        SentRange::new(hour(50), hour(60)),
    ];
    assert_eq!(split_by_already_sent(&timestamps, 0..10, &sent), vec![0..10]);
}
