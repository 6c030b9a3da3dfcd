//! Command implementations for the DWD importer CLI
//!
//! Each subcommand lives in its own module; shared setup such as logging,
//! configuration and store access is in [`shared`].

pub mod compact;
pub mod ingest;
pub mod plan;
pub mod sensors;
pub mod shared;

use crate::cli::args::{Args, Commands};
use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// Main command runner
///
/// `shutdown` is raised on Ctrl-C; long-running commands check it between
/// units of work.
pub async fn run(args: Args, shutdown: Arc<AtomicBool>) -> Result<()> {
    match args.command {
        Some(Commands::Ingest(ingest_args)) => ingest::run_ingest(ingest_args, shutdown).await,
        Some(Commands::Sensors(sensors_args)) => sensors::run_sensors(sensors_args).await,
        Some(Commands::Compact(compact_args)) => compact::run_compact(compact_args).await,
        Some(Commands::Plan(plan_args)) => plan::run_plan(plan_args).await,
        None => anyhow::bail!("No command given"),
    }
}
