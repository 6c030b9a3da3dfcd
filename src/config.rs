//! Configuration management and validation.
//!
//! Settings come from four layers, later ones winning: built-in defaults, an
//! optional JSON config file, `DWD_IMPORTER_*` environment variables, and
//! command-line overrides applied by the CLI through the `with_*` builders.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::adapters::api_resilience::RetryPolicy;
use crate::app::models::TimeClass;
use crate::constants::{
    APP_DIR_NAME, CONFIG_FILE_NAME, DEFAULT_API_URL, DEFAULT_BATCH_SIZE, DEFAULT_LOOKUP_TTL_SECS,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BACKOFF_MS,
    DEFAULT_TIME_CLASS, MAX_BATCH_SIZE, STORE_FILE_NAME, env_vars, sensor_defaults,
};
use crate::{Error, Result};

/// Sensor API connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL including the version path
    pub url: String,

    pub username: Option<String>,

    pub password: Option<String>,

    /// Attempts per call for timeouts and generic failures
    pub retry_attempts: u32,

    /// Delay before the first retry in milliseconds
    pub retry_backoff_ms: u64,

    /// Lifetime of cached catalog lookups
    pub lookup_ttl_secs: u64,

    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_URL.to_string(),
            username: None,
            password: None,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            lookup_ttl_secs: DEFAULT_LOOKUP_TTL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn lookup_ttl(&self) -> Duration {
        Duration::from_secs(self.lookup_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Username and password, when both are set
    pub fn credentials(&self) -> Option<(String, String)> {
        match (&self.username, &self.password) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            _ => None,
        }
    }
}

/// Ingest behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Values per pushed batch
    pub batch_size: usize,

    /// Time class for files whose name does not reveal one
    pub time_class: TimeClass,

    /// License short name attached to created sensors
    pub license: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            time_class: TimeClass::from(DEFAULT_TIME_CLASS),
            license: sensor_defaults::LICENSE_SHORT_NAME.to_string(),
        }
    }
}

/// Sensor store location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_data_dir().join(STORE_FILE_NAME),
        }
    }
}

/// Global configuration for DWD imports
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub ingest: IngestConfig,
    pub store: StoreConfig,
}

/// Per-user data directory of the importer
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Config file consulted when none is given explicitly
pub fn default_config_path() -> PathBuf {
    default_data_dir().join(CONFIG_FILE_NAME)
}

impl Config {
    /// Read a JSON config file; missing sections fall back to defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("Failed to read config {}", path.display()), e))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::json(format!("Invalid config file {}", path.display()), e))
    }

    /// Defaults, then `path` (or the default config file if it exists), then environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = default_config_path();
                if default_path.is_file() {
                    debug!("Loading config from {}", default_path.display());
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Apply environment overrides looked up through `var`
    pub fn with_env_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = var(env_vars::API_URL) {
            self.api.url = url;
        }
        if let Some(user) = var(env_vars::API_USER) {
            self.api.username = Some(user);
        }
        if let Some(password) = var(env_vars::API_PASSWORD) {
            self.api.password = Some(password);
        }
        if let Some(store) = var(env_vars::STORE_PATH) {
            self.store.path = PathBuf::from(store);
        }
        self
    }

    /// Set the batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.ingest.batch_size = batch_size;
        self
    }

    /// Set the fallback time class
    pub fn with_time_class(mut self, time_class: TimeClass) -> Self {
        self.ingest.time_class = time_class;
        self
    }

    /// Set the sensor store path
    pub fn with_store_path(mut self, path: PathBuf) -> Self {
        self.store.path = path;
        self
    }

    /// Set the API base URL
    pub fn with_api_url(mut self, url: String) -> Self {
        self.api.url = url;
        self
    }

    /// Check value ranges before anything runs
    pub fn validate(&self) -> Result<()> {
        if self.ingest.batch_size == 0 || self.ingest.batch_size > MAX_BATCH_SIZE {
            return Err(Error::configuration(format!(
                "Batch size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.ingest.batch_size
            )));
        }
        if self.api.retry_attempts == 0 {
            return Err(Error::configuration("Retry attempts must be at least 1"));
        }
        if self.api.request_timeout_secs == 0 {
            return Err(Error::configuration("Request timeout must be positive"));
        }
        if self.api.url.trim().is_empty() {
            return Err(Error::configuration("API url must not be empty"));
        }
        if self.api.username.is_some() != self.api.password.is_some() {
            return Err(Error::configuration(
                "API username and password must be given together",
            ));
        }
        if self.ingest.license.trim().is_empty() {
            return Err(Error::configuration("License short name must not be empty"));
        }
        Ok(())
    }
}
