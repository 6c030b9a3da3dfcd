//! Command-line argument definitions for the DWD importer
//!
//! The CLI is defined with the clap derive API. Every subcommand carries its
//! own verbosity flags so logging can be set up before anything else runs.

use crate::app::models::{Measurand, TimeClass};
use crate::{Error, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CLI arguments for the DWD importer
///
/// Forwards DWD station observations to the sensor-data API, creating sensors
/// from station metadata and never sending the same time range twice.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dwd-importer",
    version,
    about = "Forward DWD weather observations to a sensor-data API",
    long_about = "Imports DWD (Deutscher Wetterdienst) hourly and daily station products into \
                  a sensor-data API. Station metadata files create and close sensors; product \
                  files are split across sensor validity intervals and only ranges that were \
                  not sent before are pushed."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Import product files and their station metadata
    Ingest(IngestArgs),
    /// Report the sensors and counters held in the store
    Sensors(SensorsArgs),
    /// Merge the sent ranges of every sensor in the store
    Compact(CompactArgs),
    /// Split a list of archive names into groups for separate invocations
    Plan(PlanArgs),
}

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Human,
    /// JSON for further processing
    Json,
}

/// Verbosity flags shared by all subcommands
#[derive(Debug, Clone, Default, clap::Args)]
pub struct LogArgs {
    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors and suppress progress output
    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,
}

impl LogArgs {
    /// Determine the log level from the verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Progress bars are shown unless quiet
    pub fn show_progress(&self) -> bool {
        !self.quiet
    }
}

/// Arguments for the ingest command
#[derive(Debug, Clone, Parser)]
pub struct IngestArgs {
    /// Product file, or directory searched recursively for product files
    #[arg(value_name = "PATH")]
    pub input: PathBuf,

    /// Station metadata file for a single product file
    ///
    /// Directory inputs pair products with the metadata files found next to them.
    #[arg(short = 'm', long = "metadata", value_name = "FILE")]
    pub metadata: Option<PathBuf>,

    /// Product group the files belong to (e.g. temperature, cloudiness)
    ///
    /// Defaults to the group derived from each file name.
    #[arg(short = 'g', long = "group", value_name = "MEASURAND")]
    pub group: Option<Measurand>,

    /// Values per pushed batch
    #[arg(short = 'b', long = "batch-size", value_name = "N")]
    pub batch_size: Option<usize>,

    /// Time class used when merging sent ranges (hourly, daily)
    #[arg(short = 't', long = "time-class", value_name = "CLASS")]
    pub time_class: Option<String>,

    /// Sensor store file
    #[arg(short = 's', long = "store", value_name = "FILE")]
    pub store: Option<PathBuf>,

    /// Configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Sensor API base URL
    #[arg(long = "api-url", value_name = "URL")]
    pub api_url: Option<String>,

    /// Run against an in-process API and leave the store file untouched
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Output format of the final report
    #[arg(short = 'f', long = "format", value_enum, default_value = "human")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub log: LogArgs,
}

impl IngestArgs {
    /// Check argument combinations before any work starts
    pub fn validate(&self) -> Result<()> {
        if !self.input.exists() {
            return Err(Error::configuration(format!(
                "Input path does not exist: {}",
                self.input.display()
            )));
        }
        if self.metadata.is_some() && self.input.is_dir() {
            return Err(Error::configuration(
                "--metadata can only be combined with a single product file",
            ));
        }
        if let Some(metadata) = &self.metadata {
            if !metadata.is_file() {
                return Err(Error::configuration(format!(
                    "Metadata file does not exist: {}",
                    metadata.display()
                )));
            }
        }
        Ok(())
    }

    pub fn time_class(&self) -> Option<TimeClass> {
        self.time_class.as_deref().map(TimeClass::from)
    }
}

/// Arguments for the sensors command
#[derive(Debug, Clone, Parser)]
pub struct SensorsArgs {
    /// Sensor store file
    #[arg(short = 's', long = "store", value_name = "FILE")]
    pub store: Option<PathBuf>,

    /// Configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Only list mappings whose local id contains this text
    #[arg(long = "filter", value_name = "TEXT")]
    pub filter: Option<String>,

    /// Show every sensor with its sent ranges
    #[arg(short = 'd', long = "detailed")]
    pub detailed: bool,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum, default_value = "human")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub log: LogArgs,
}

/// Arguments for the compact command
#[derive(Debug, Clone, Parser)]
pub struct CompactArgs {
    /// Sensor store file
    #[arg(short = 's', long = "store", value_name = "FILE")]
    pub store: Option<PathBuf>,

    /// Configuration file
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Time class used for the merge tolerance (hourly, daily)
    #[arg(short = 't', long = "time-class", value_name = "CLASS")]
    pub time_class: Option<String>,

    #[command(flatten)]
    pub log: LogArgs,
}

impl CompactArgs {
    pub fn time_class(&self) -> Option<TimeClass> {
        self.time_class.as_deref().map(TimeClass::from)
    }
}

/// Arguments for the plan command
#[derive(Debug, Clone, Parser)]
pub struct PlanArgs {
    /// Directory to list, or a file of names separated by commas or newlines
    #[arg(value_name = "PATH")]
    pub source: PathBuf,

    /// Number of groups
    #[arg(short = 'n', long = "groups", value_name = "N", default_value_t = 1)]
    pub groups: usize,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum, default_value = "human")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub log: LogArgs,
}

impl PlanArgs {
    pub fn validate(&self) -> Result<()> {
        if self.groups < 1 {
            return Err(Error::configuration("Number of groups must be at least 1"));
        }
        if !self.source.exists() {
            return Err(Error::configuration(format!(
                "Source does not exist: {}",
                self.source.display()
            )));
        }
        Ok(())
    }
}
