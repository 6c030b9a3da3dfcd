//! Sent-range bookkeeping
//!
//! A sensor remembers which inclusive timestamp ranges were transmitted.
//! Ranges are appended one per successful batch, so they are periodically
//! coalesced to keep the list short, and new chunks are split against them so
//! only the unsent remainder is emitted.

use std::ops::Range;

use tracing::warn;

use super::partition::find_transition;
use crate::app::models::{SentRange, TimeClass, Timestamp};

/// Coalesce sorted-by-start intervals
///
/// `joins(running_end, next_start)` decides whether the next interval
/// continues the running one. Overlapping intervals should always join.
pub fn merge_intervals<T, F>(mut intervals: Vec<(T, T)>, mut joins: F) -> Vec<(T, T)>
where
    T: Ord + Copy,
    F: FnMut(T, T) -> bool,
{
    intervals.sort();

    let mut merged: Vec<(T, T)> = Vec::with_capacity(intervals.len());
    for (from, to) in intervals {
        match merged.last_mut() {
            Some(running) if joins(running.1, from) => running.1 = running.1.max(to),
            _ => merged.push((from, to)),
        }
    }
    merged
}

/// Merge overlapping and adjacent sent ranges
///
/// Adjacency depends on the time class: hourly ranges one hour apart join, as
/// do daily ranges one day apart. An unrecognized class only joins ranges
/// that overlap or touch.
pub fn merge_sent_ranges(ranges: &[SentRange], time_class: &TimeClass) -> Vec<SentRange> {
    if ranges.len() < 2 {
        return ranges.to_vec();
    }

    let tolerance = match time_class.adjacency_tolerance() {
        Some(tolerance) => tolerance,
        None => {
            warn!(
                "Unrecognized time class '{}', merging only overlapping sent ranges",
                time_class
            );
            chrono::Duration::zero()
        }
    };

    let intervals = ranges.iter().map(|r| (r.from, r.to)).collect();
    merge_intervals(intervals, |running_end: Timestamp, next_start: Timestamp| {
        next_start <= running_end + tolerance
    })
    .into_iter()
    .map(|(from, to)| SentRange::new(from, to))
    .collect()
}

/// Row ranges inside `rows` not covered by any sent range
///
/// `sent` must be sorted by start and disjoint, as produced by
/// [`merge_sent_ranges`]. Sent ranges are inclusive on both ends.
pub fn split_by_already_sent(
    timestamps: &[Timestamp],
    rows: Range<usize>,
    sent: &[SentRange],
) -> Vec<Range<usize>> {
    let end = rows.end.min(timestamps.len());
    let mut cursor = rows.start;
    let mut unsent = Vec::new();

    for range in sent {
        if cursor >= end {
            break;
        }
        let before = find_transition(timestamps, cursor, end, |ts| *ts < range.from);
        if before > cursor {
            unsent.push(cursor..before);
        }
        cursor = find_transition(timestamps, before, end, |ts| *ts <= range.to);
    }

    if cursor < end {
        unsent.push(cursor..end);
    }
    unsent
}
