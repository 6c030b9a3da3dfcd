//! Header analysis for DWD product files
//!
//! Locates the logical fields of a product header. DWD renamed most columns
//! when it moved to its current product layout, so every field is looked up
//! through a prioritized alias list.

use crate::app::models::Measurand;
use crate::constants::fields;
use crate::{Error, Result};
use std::collections::HashMap;
use tracing::debug;

/// Column positions resolved from a product header
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    /// Trimmed header columns
    pub header: Vec<String>,

    /// Station id column (required)
    pub station_id: usize,

    /// Raw timestamp column (required)
    pub timestamp: usize,

    /// Quality level column
    pub quality: Option<usize>,

    /// Structure version column
    pub structure_version: Option<usize>,

    /// Measurand value columns present in this header
    measurands: HashMap<Measurand, usize>,
}

/// Index of the first alias present in `header`
pub fn index_of(header: &[String], aliases: &[&str]) -> Option<usize> {
    aliases
        .iter()
        .find_map(|alias| header.iter().position(|column| column == alias))
}

impl FieldMapping {
    /// Resolve all known fields in a header row
    pub fn analyze(header: &[String]) -> Result<Self> {
        let station_id = index_of(header, fields::STATION_ID).ok_or_else(|| {
            Error::schema(format!("Header does not contain a station id field: {:?}", header))
        })?;
        let timestamp = index_of(header, fields::TIMESTAMP).ok_or_else(|| {
            Error::schema(format!("Header does not contain a timestamp field: {:?}", header))
        })?;

        let measurands: HashMap<Measurand, usize> = Measurand::ALL
            .iter()
            .filter_map(|&m| index_of(header, m.aliases()).map(|idx| (m, idx)))
            .collect();

        let mapping = FieldMapping {
            header: header.to_vec(),
            station_id,
            timestamp,
            quality: index_of(header, fields::QUALITY),
            structure_version: index_of(header, fields::STRUCTURE_VERSION),
            measurands,
        };

        debug!(
            "Field mapping: station_id={}, timestamp={}, quality={:?}, {} measurand columns",
            mapping.station_id,
            mapping.timestamp,
            mapping.quality,
            mapping.measurands.len()
        );

        Ok(mapping)
    }

    /// Column index of a measurand, if the header carries it
    pub fn measurand_index(&self, measurand: Measurand) -> Option<usize> {
        self.measurands.get(&measurand).copied()
    }

    /// Number of columns every data row must have
    pub fn width(&self) -> usize {
        self.header.len()
    }
}
