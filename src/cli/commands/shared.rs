//! Shared components for CLI commands
//!
//! Logging setup, layered configuration loading, store access and progress
//! bars used by several subcommands.

use crate::app::adapters::sensor_store::{JsonFileStore, StoreState};
use crate::cli::args::LogArgs;
use crate::config::Config;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Set up structured logging on stderr
///
/// `RUST_LOG` wins over the verbosity flags when it is set.
pub fn setup_logging(log: &LogArgs) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = log.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("dwd_importer={}", log_level)));

    if log.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
            .context("Failed to initialize logging")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .context("Failed to initialize logging")?;
    }

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Load configuration from file and environment, then apply the store override
///
/// Command-specific overrides are applied by the caller before validation.
pub fn load_configuration(config_file: Option<&Path>, store: Option<&PathBuf>) -> Result<Config> {
    match config_file {
        Some(path) => info!("Using config file: {}", path.display()),
        None => debug!("No config file given, using defaults and environment variables"),
    }

    let mut config = Config::load(config_file).context("Failed to load configuration")?;
    if let Some(store) = store {
        config = config.with_store_path(store.clone());
    }
    Ok(config)
}

/// Open the sensor store file, creating it on first write
pub async fn open_store(path: &Path) -> Result<JsonFileStore> {
    JsonFileStore::open(path)
        .await
        .with_context(|| format!("Failed to open sensor store {}", path.display()))
}

/// Read the store contents without creating anything on disk
pub async fn read_store_state(path: &Path) -> Result<StoreState> {
    if !path.is_file() {
        info!("No sensor store at {}, starting empty", path.display());
        return Ok(StoreState::default());
    }
    Ok(open_store(path).await?.snapshot().await)
}

/// Print any report as pretty JSON on stdout
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    println!("{}", json);
    Ok(())
}

/// Create a progress bar with consistent styling
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} [{per_sec}] ETA: {eta}",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(message.to_string());
    pb
}
