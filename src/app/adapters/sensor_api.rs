//! Sensor API capability
//!
//! The importer only needs six calls from the sensor-data API. They are
//! expressed as a trait so the HTTP client, its retrying wrapper and test
//! doubles are interchangeable.

use async_trait::async_trait;

use crate::app::models::{CatalogEntry, RemoteSensorSpec, ValueBatch};

/// Failure classes reported by the sensor API
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Request refused for lack of authorization; a fresh login may help
    #[error("permission denied: {0}")]
    Permission(String),

    /// Server closed the connection or the request timed out
    #[error("timeout: {0}")]
    Timeout(String),

    /// Any other failure
    #[error("request failed: {0}")]
    Other(String),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Permission(_) => "permission",
            ApiError::Timeout(_) => "timeout",
            ApiError::Other(_) => "generic",
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Calls the importer makes against the sensor API
#[async_trait]
pub trait SensorApi: Send + Sync {
    /// Authenticate and return the session token
    async fn login(&self, username: &str, password: &str) -> ApiResult<String>;

    /// Create a remote sensor and return its id
    async fn add_sensor(&self, spec: &RemoteSensorSpec) -> ApiResult<u64>;

    async fn get_measurands(&self, name: &str) -> ApiResult<Vec<CatalogEntry>>;

    async fn get_units(&self, name: &str, measurand_id: u64) -> ApiResult<Vec<CatalogEntry>>;

    async fn get_licenses(&self, short_name: &str) -> ApiResult<Vec<CatalogEntry>>;

    /// Push a batch of values, returning the server's status string
    async fn add_multiple_values(&self, batch: &ValueBatch) -> ApiResult<String>;
}
