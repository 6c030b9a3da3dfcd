//! DWD Importer Library
//!
//! A Rust library for forwarding DWD (Deutscher Wetterdienst) station observations
//! to a sensor-data API without sending the same value twice.
//!
//! This library provides tools for:
//! - Mapping DWD product headers to measurand columns, including legacy aliases
//! - Normalizing raw `;`-delimited product rows into sorted, canonical observations
//! - Partitioning observations across a station's sensor validity intervals
//! - Merging already-sent ranges and emitting only the unsent remainder in batches
//! - Creating local and remote sensors from station metadata files
//! - Retrying and caching API calls through explicit, injectable wrappers

pub mod config;
pub mod constants;

// Core application modules
pub mod app {
    pub mod models;
    pub mod services {
        pub mod batch_emitter;
        pub mod content_handler;
        pub mod field_mapper;
        pub mod file_catalog;
        pub mod metadata_handler;
        pub mod record_normalizer;
        pub mod sensor_index;
        pub mod unit_of_work;
    }
    pub mod adapters {
        pub mod api_resilience;
        pub mod fake_api;
        pub mod osn_client;
        pub mod product_source;
        pub mod sensor_api;
        pub mod sensor_store;
    }
}

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use app::models::{Measurand, SentRange, Sensor, SensorMapping, TimeClass};
pub use config::Config;

/// Result type alias for the DWD importer
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for DWD import operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Delimited text could not be read
    #[error("CSV parsing error: {message}")]
    CsvParsing {
        message: String,
        #[source]
        source: Option<csv::Error>,
    },

    /// Header lacks a required field
    #[error("Schema error: {message}")]
    Schema { message: String },

    /// No valid station id in the first two rows
    #[error("Could not find a valid station id (candidates: {candidates:?})")]
    MissingStationId { candidates: Vec<String> },

    /// A single value could not be converted
    #[error("Value parse error in column '{column}': '{value}'")]
    ValueParse { column: String, value: String },

    /// Sensor API call failed after retries
    #[error("Sensor API error during {operation}: {source}")]
    TransientApi {
        operation: String,
        #[source]
        source: app::adapters::sensor_api::ApiError,
    },

    /// Persistence layer not reachable or refused an operation
    #[error("Persistence unavailable: {message}")]
    PersistenceUnavailable { message: String },

    /// Sensor mapping missing for a local id
    #[error("No sensor mapping found for local id: {local_id}")]
    MappingNotFound { local_id: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Date/time parsing error
    #[error("Date/time parsing error: {message}")]
    DateTimeParsing {
        message: String,
        #[source]
        source: chrono::ParseError,
    },

    /// JSON (de)serialization error
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// File name does not follow the DWD naming scheme
    #[error("Unrecognized file name: {name}")]
    FileName { name: String },
}

impl Error {
    /// Create an I/O error with context
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a schema error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Create a missing station id error
    pub fn missing_station_id(candidates: Vec<String>) -> Self {
        Self::MissingStationId { candidates }
    }

    /// Create a value parse error
    pub fn value_parse(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::ValueParse {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Create an API error for the named operation
    pub fn transient_api(
        operation: impl Into<String>,
        source: app::adapters::sensor_api::ApiError,
    ) -> Self {
        Self::TransientApi {
            operation: operation.into(),
            source,
        }
    }

    /// Create a persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::PersistenceUnavailable {
            message: message.into(),
        }
    }

    /// Create a mapping not found error
    pub fn mapping_not_found(local_id: impl Into<String>) -> Self {
        Self::MappingNotFound {
            local_id: local_id.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a date/time parsing error
    pub fn datetime_parsing(message: impl Into<String>, source: chrono::ParseError) -> Self {
        Self::DateTimeParsing {
            message: message.into(),
            source,
        }
    }

    /// Create a JSON error with context
    pub fn json(message: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            message: message.into(),
            source,
        }
    }

    /// Create a file name error
    pub fn file_name(name: impl Into<String>) -> Self {
        Self::FileName { name: name.into() }
    }
}

// Automatic conversions from common error types
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: "I/O operation failed".to_string(),
            source: error,
        }
    }
}

impl From<csv::Error> for Error {
    fn from(error: csv::Error) -> Self {
        Self::CsvParsing {
            message: "CSV parsing failed".to_string(),
            source: Some(error),
        }
    }
}

impl From<chrono::ParseError> for Error {
    fn from(error: chrono::ParseError) -> Self {
        Self::DateTimeParsing {
            message: "Date/time parsing failed".to_string(),
            source: error,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::Json {
            message: "JSON processing failed".to_string(),
            source: error,
        }
    }
}
