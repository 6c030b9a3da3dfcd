//! Compact command implementation
//!
//! Merges the sent ranges of every sensor in the store, the same merge a
//! content pass applies to the sensors it touches.

use crate::app::adapters::sensor_store::SensorStore;
use crate::app::models::TimeClass;
use crate::app::services::sensor_index::SensorIndex;
use crate::cli::args::CompactArgs;
use crate::cli::commands::shared::{load_configuration, open_store, setup_logging};
use anyhow::Result;
use colored::*;
use tracing::info;

/// Range counts before and after compaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactReport {
    pub mappings: usize,
    pub ranges_before: usize,
    pub ranges_after: usize,
}

/// Merge the sent ranges of every mapping in `store`
pub async fn compact_store(
    store: &dyn SensorStore,
    time_class: &TimeClass,
) -> crate::Result<CompactReport> {
    let mut report = CompactReport::default();

    for mapping in store.all_mappings().await? {
        report.mappings += 1;
        report.ranges_before += mapping
            .sensors
            .iter()
            .map(|s| s.sent_ranges.len())
            .sum::<usize>();

        report.ranges_after +=
            SensorIndex::merge_stored_ranges(store, &mapping.local_id, time_class).await?;
    }
    Ok(report)
}

/// Run the compact command
pub async fn run_compact(args: CompactArgs) -> Result<()> {
    setup_logging(&args.log)?;

    let mut config = load_configuration(args.config_file.as_deref(), args.store.as_ref())?;
    if let Some(time_class) = args.time_class() {
        config = config.with_time_class(time_class);
    }
    config.validate()?;

    let store = open_store(&config.store.path).await?;
    info!(
        "Compacting {} with {} tolerance",
        config.store.path.display(),
        config.ingest.time_class
    );
    let report = compact_store(&store, &config.ingest.time_class).await?;

    println!("\n{}", "Compaction Complete".bright_green().bold());
    println!("  Mappings: {}", report.mappings);
    println!(
        "  Sent ranges: {} -> {}",
        report.ranges_before,
        report.ranges_after.to_string().bright_white().bold()
    );
    Ok(())
}
