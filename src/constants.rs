//! Application constants for the DWD importer
//!
//! This module contains the column aliases, sentinel values, API defaults and
//! sensor attribution constants used throughout the importer.

// =============================================================================
// Product File Layout
// =============================================================================

/// Field delimiter used by DWD product and metadata files
pub const FIELD_DELIMITER: u8 = b';';

/// Minimum number of columns in a station metadata line
pub const MIN_METADATA_FIELDS: usize = 7;

/// Raw timestamp format for hourly products (`MESS_DATUM`)
pub const HOURLY_TIMESTAMP_FORMAT: &str = "%Y%m%d%H";

/// Raw timestamp format for daily products and metadata dates
pub const DAILY_TIMESTAMP_FORMAT: &str = "%Y%m%d";

/// Canonical ISO-8601 rendering of timestamps
pub const ISO_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Header aliases for the logical product fields, in priority order
pub mod fields {
    pub const STATION_ID: &[&str] = &["STATIONS_ID"];
    pub const TIMESTAMP: &[&str] = &["MESS_DATUM"];
    pub const QUALITY: &[&str] = &["QUALITAETS_NIVEAU", "QN_9", "QN_8", "QN_7", "QN_3"];
    pub const STRUCTURE_VERSION: &[&str] = &["STRUKTUR_VERSION"];

    pub const AIR_TEMPERATURE: &[&str] = &["LUFTTEMPERATUR", "TT_TU"];
    pub const HUMIDITY: &[&str] = &["REL_FEUCHTE", "RF_TU"];
    pub const CLOUDINESS: &[&str] = &["GESAMT_BEDECKUNGSGRAD", "V_N"];
    pub const PRECIPITATION_AMOUNT: &[&str] = &["NIEDERSCHLAGSHOEHE", "R1"];
    pub const AIR_PRESSURE_NN: &[&str] = &["LUFTDRUCK_REDUZIERT", "P"];
    pub const AIR_PRESSURE: &[&str] = &["LUFTDRUCK_STATIONSHOEHE", "P0"];
    pub const SUNSHINE_DURATION: &[&str] = &["STUNDENSUMME_SONNENSCHEIN", "SD_SO"];
    pub const WIND_SPEED: &[&str] = &["WINDGESCHWINDIGKEIT", "F"];
    pub const WIND_DIRECTION: &[&str] = &["WINDRICHTUNG", "D"];
}

// =============================================================================
// Value Sentinels
// =============================================================================

/// DWD missing-value marker for float measurands
pub const MISSING_VALUE: f64 = -999.0;

/// Cloud cover is reported in eighths; 8 and above are not forwarded
pub const CLOUDINESS_EIGHTHS: i64 = 8;

// =============================================================================
// Ingest Defaults
// =============================================================================

/// Default upper bound on values per `addMultipleValues` call
pub const DEFAULT_BATCH_SIZE: usize = 2000;

/// Largest batch size the API accepts without timing out
pub const MAX_BATCH_SIZE: usize = 3000;

/// Default time class used when merging sent ranges
pub const DEFAULT_TIME_CLASS: &str = "hourly";

// =============================================================================
// Sensor API Defaults
// =============================================================================

/// Default API endpoint
pub const DEFAULT_API_URL: &str = "https://dep2.osn.k8s.ise-apps.de/api/v1.0";

/// Attempts per API call before the error propagates
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Base backoff between attempts in milliseconds
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;

/// Time-to-live of cached measurand/unit/license lookups in seconds
pub const DEFAULT_LOOKUP_TTL_SECS: u64 = 300;

/// Per-request timeout of the HTTP client in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Status string returned by `addMultipleValues` on success
pub const PUSH_OK_STATUS: &str = "OK";

// =============================================================================
// Remote Sensor Attributes
// =============================================================================

pub mod sensor_defaults {
    /// License short name for DWD open data
    pub const LICENSE_SHORT_NAME: &str = "DE-GeoNutzV-1.0";
    pub const ALTITUDE_ABOVE_GROUND: f64 = 2.0;
    pub const DIRECTION_VERTICAL: f64 = 0.0;
    pub const DIRECTION_HORIZONTAL: f64 = 2.0;
    pub const ACCURACY: u32 = 10;
    pub const SENSOR_MODEL: &str = "DWD station";
    pub const ATTRIBUTION_TEXT: &str = "Deutscher Wetterdienst (DWD)";
    pub const ATTRIBUTION_URL: &str = "ftp://ftp-cdc.dwd.de/pub/CDC/";
}

// =============================================================================
// Environment and Paths
// =============================================================================

/// Environment variables read by the layered configuration
pub mod env_vars {
    pub const API_URL: &str = "DWD_IMPORTER_API_URL";
    pub const API_USER: &str = "DWD_IMPORTER_API_USER";
    pub const API_PASSWORD: &str = "DWD_IMPORTER_API_PASSWORD";
    pub const STORE_PATH: &str = "DWD_IMPORTER_STORE";
}

/// Application directory name under the user data directory
pub const APP_DIR_NAME: &str = "dwd-importer";

/// Default store file name
pub const STORE_FILE_NAME: &str = "sensors.json";

/// Default config file name
pub const CONFIG_FILE_NAME: &str = "config.json";
