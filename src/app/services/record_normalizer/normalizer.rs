//! Row cleaning, station filtering and timestamp ordering
//!
//! Raw rows are split on `;` and stripped of whitespace like the header. Rows
//! that are empty, unreadable or whose field count differs from the header are
//! discarded. The remaining rows are restricted to the file's station, sorted
//! by raw timestamp and given a canonical timestamp each.

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, info};

use super::timestamps::parse_raw_timestamp;
use crate::app::models::Timestamp;
use crate::app::services::field_mapper::FieldMapping;
use crate::constants::FIELD_DELIMITER;
use crate::{Error, Result};

/// Counters describing what normalization kept and dropped
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct NormalizeStats {
    /// Non-empty input rows
    pub input_rows: usize,

    /// Rows that could not be read or whose width mismatched the header
    pub malformed: usize,

    /// Rows belonging to another station id
    pub foreign_station: usize,

    /// Rows with an unparsable timestamp
    pub bad_timestamps: usize,

    /// Rows repeating an earlier timestamp
    pub duplicates: usize,

    /// Rows kept
    pub kept: usize,
}

/// Sorted, single-station table of observations
#[derive(Debug, Clone)]
pub struct NormalizedProduct {
    /// Station id shared by all rows
    pub station_id: String,

    /// Column positions of the header
    pub mapping: FieldMapping,

    /// Canonical timestamps, strictly increasing
    pub timestamps: Vec<Timestamp>,

    /// Rows in timestamp order, parallel to `timestamps`
    pub rows: Vec<StringRecord>,

    pub stats: NormalizeStats,
}

impl NormalizedProduct {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Raw text of `column` in row `row`
    pub fn value(&self, row: usize, column: usize) -> &str {
        self.rows[row].get(column).unwrap_or("")
    }
}

/// Remove all whitespace from a field, inside and around
fn clean_field(field: &str) -> String {
    field.split_whitespace().collect()
}

/// Split one delimited line into whitespace-free fields
pub fn split_line(line: &str) -> Vec<String> {
    line.split(FIELD_DELIMITER as char).map(clean_field).collect()
}

fn is_station_id(candidate: &str) -> bool {
    !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_digit())
}

/// Normalize the rows of one product file
pub fn normalize(header_line: &str, lines: &[String]) -> Result<NormalizedProduct> {
    let header = split_line(header_line);
    let mapping = FieldMapping::analyze(&header)?;
    let width = mapping.width();

    let mut stats = NormalizeStats::default();

    let body = lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    // Quotes carry no meaning in DWD products; a stray one must not span rows
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .delimiter(FIELD_DELIMITER)
        .from_reader(body.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        stats.input_rows += 1;
        match result {
            Ok(record) => {
                records.push(record.iter().map(clean_field).collect::<StringRecord>())
            }
            Err(e) => {
                stats.malformed += 1;
                debug!("Skipped unreadable row {}: {}", stats.input_rows, e);
            }
        }
    }

    let station_id = records
        .iter()
        .take(2)
        .filter_map(|record| record.get(mapping.station_id))
        .find(|candidate| is_station_id(candidate))
        .map(str::to_string)
        .ok_or_else(|| {
            Error::missing_station_id(
                records
                    .iter()
                    .take(2)
                    .map(|r| r.get(mapping.station_id).unwrap_or_default().to_string())
                    .collect(),
            )
        })?;
    debug!("Station id: {}", station_id);

    let mut rows: Vec<StringRecord> = Vec::with_capacity(records.len());
    for record in records {
        if record.len() != width {
            stats.malformed += 1;
        } else if record.get(mapping.station_id) != Some(station_id.as_str()) {
            stats.foreign_station += 1;
        } else {
            rows.push(record);
        }
    }

    // Fixed-width raw timestamps sort like the instants they encode
    rows.sort_by(|a, b| a.get(mapping.timestamp).cmp(&b.get(mapping.timestamp)));

    let mut timestamps: Vec<Timestamp> = Vec::with_capacity(rows.len());
    let mut kept_rows = Vec::with_capacity(rows.len());
    for record in rows {
        let raw = record.get(mapping.timestamp).unwrap_or_default();
        match parse_raw_timestamp(raw) {
            Ok(ts) if timestamps.last() == Some(&ts) => stats.duplicates += 1,
            Ok(ts) => {
                timestamps.push(ts);
                kept_rows.push(record);
            }
            Err(e) => {
                stats.bad_timestamps += 1;
                debug!("Skipped row with bad timestamp: {}", e);
            }
        }
    }
    stats.kept = kept_rows.len();

    info!(
        "Normalized station {}: {} of {} rows kept ({} malformed, {} foreign, {} bad timestamps, {} duplicates)",
        station_id,
        stats.kept,
        stats.input_rows,
        stats.malformed,
        stats.foreign_station,
        stats.bad_timestamps,
        stats.duplicates
    );

    Ok(NormalizedProduct {
        station_id,
        mapping,
        timestamps,
        rows: kept_rows,
        stats,
    })
}
