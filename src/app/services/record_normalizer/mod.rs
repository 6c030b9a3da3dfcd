//! Record normalization for DWD product files
//!
//! Turns the raw `;`-delimited rows of one station-and-period product file into
//! a clean, timestamp-sorted table that the sensor index can partition.
//!
//! ## Architecture
//!
//! - [`normalizer`] - Row cleaning, station filtering and sorting
//! - [`timestamps`] - Raw `MESS_DATUM` parsing into canonical timestamps
//!
//! ## Usage
//!
//! ```rust
//! use dwd_importer::app::services::record_normalizer::normalize;
//!
//! let header = "STATIONS_ID;MESS_DATUM;QN_9;TT_TU;RF_TU;eor";
//! let rows = vec![
//!     "3;2020010101;3;5.0;80.0;eor".to_string(),
//!     "3;2020010100;3;4.5;81.0;eor".to_string(),
//! ];
//! let product = normalize(header, &rows).unwrap();
//! assert_eq!(product.station_id, "3");
//! assert_eq!(product.len(), 2);
//! ```

pub mod normalizer;
pub mod timestamps;

#[cfg(test)]
pub mod tests;

// Re-export main types for easy access
pub use normalizer::{NormalizeStats, NormalizedProduct, normalize, split_line};
pub use timestamps::parse_raw_timestamp;
