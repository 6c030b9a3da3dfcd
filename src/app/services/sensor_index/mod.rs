//! Sensor interval index and partitioning
//!
//! Splits a station's sorted observations first by sensor validity window
//! and then by what each sensor already transmitted.
//!
//! ## Architecture
//!
//! - [`partition`] - Transition finder and per-sensor chunking
//! - [`sent_ranges`] - Sent-range merging and unsent-remainder splitting
//! - [`index`] - Store-backed snapshot of one local id's sensors

pub mod index;
pub mod partition;
pub mod sent_ranges;

#[cfg(test)]
pub mod tests;

pub use index::{Partition, SensorIndex};
pub use partition::{SensorChunk, belongs_to_sensor, find_transition, separate_by_sensor};
pub use sent_ranges::{merge_intervals, merge_sent_ranges, split_by_already_sent};
