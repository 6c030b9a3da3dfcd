//! Batch emission of unsent observations
//!
//! For each sensor chunk the emitter drops rows covered by already-sent
//! ranges, slices the rest into bounded batches, converts the raw values and
//! pushes them. Every accepted batch is recorded as a sent range.
//!
//! ## Architecture
//!
//! - [`emitter`] - Batching, pushing and sent-range recording
//! - [`values`] - Per-measurand value conversion

pub mod emitter;
pub mod values;

#[cfg(test)]
pub mod tests;

pub use emitter::{BatchEmitter, EmitStats, batchify};
pub use values::convert_value;
