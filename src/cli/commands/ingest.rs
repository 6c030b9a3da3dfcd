//! Ingest command implementation
//!
//! Collects units of work from the input path and runs them one after the
//! other. A failing unit is reported and the next one starts; Ctrl-C stops
//! the run between units.

use crate::app::adapters::api_resilience::{LookupCache, RetryingApi};
use crate::app::adapters::fake_api::FakeApi;
use crate::app::adapters::osn_client::OsnClient;
use crate::app::adapters::sensor_api::SensorApi;
use crate::app::adapters::sensor_store::{MemoryStore, SensorStore};
use crate::app::services::batch_emitter::EmitStats;
use crate::app::services::file_catalog::{
    DwdFile, WorkUnit, discover_units, parse_file_name, product_group,
};
use crate::app::services::unit_of_work::{RunSettings, UnitOutcome, UnitRunner};
use crate::cli::args::{IngestArgs, OutputFormat};
use crate::cli::commands::shared::{
    create_progress_bar, load_configuration, open_store, print_json, read_store_state,
    setup_logging,
};
use crate::config::Config;
use anyhow::{Context, Result, bail};
use colored::*;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{info, warn};

/// Totals over all units of one ingest run
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestSummary {
    pub units: usize,
    pub finished: usize,
    pub failed: usize,
    pub interrupted: bool,
    pub dry_run: bool,
    pub sensors_created: usize,
    pub elapsed_secs: f64,
    pub emit: EmitStats,
    pub outcomes: Vec<UnitOutcome>,
}

impl IngestSummary {
    fn record(&mut self, outcome: UnitOutcome) {
        match &outcome {
            UnitOutcome::Finished { report, .. } => {
                self.finished += 1;
                self.emit.absorb(&report.content.emit_totals());
                if let Some(metadata) = &report.metadata {
                    self.sensors_created += metadata.created;
                }
            }
            UnitOutcome::Failed { .. } => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }
}

/// Run the ingest command
pub async fn run_ingest(args: IngestArgs, shutdown: Arc<AtomicBool>) -> Result<()> {
    setup_logging(&args.log)?;
    args.validate()?;

    let config = resolve_config(&args)?;
    let units = collect_units(&args, &config)?;
    if units.is_empty() {
        warn!("No importable product files under {}", args.input.display());
        return Ok(());
    }

    let settings = RunSettings {
        credentials: config.api.credentials(),
        batch_size: config.ingest.batch_size,
        license: config.ingest.license.clone(),
    };
    let cache = Arc::new(LookupCache::new(config.api.lookup_ttl()));

    let (api, store): (Arc<dyn SensorApi>, Arc<dyn SensorStore>) = if args.dry_run {
        info!("Dry run: values go to an in-process API, the store file is not written");
        let state = read_store_state(&config.store.path).await?;
        (Arc::new(FakeApi::new()), Arc::new(MemoryStore::with_state(state)))
    } else {
        let client = OsnClient::new(config.api.url.clone(), config.api.request_timeout())
            .context("Failed to create sensor API client")?;
        let api = RetryingApi::new(client, config.api.retry_policy());
        (Arc::new(api), Arc::new(open_store(&config.store.path).await?))
    };

    let runner = UnitRunner::new(api, store, cache, settings);
    let summary = run_units(&runner, &units, &args, &shutdown).await;

    match args.format {
        OutputFormat::Human => print_summary(&summary),
        OutputFormat::Json => print_json(&summary)?,
    }

    if summary.interrupted {
        bail!(
            "Interrupted after {} of {} units",
            summary.finished + summary.failed,
            summary.units
        );
    }
    if summary.failed > 0 {
        bail!("{} of {} units failed", summary.failed, summary.units);
    }
    Ok(())
}

fn resolve_config(args: &IngestArgs) -> Result<Config> {
    let mut config = load_configuration(args.config_file.as_deref(), args.store.as_ref())?;
    if let Some(batch_size) = args.batch_size {
        config = config.with_batch_size(batch_size);
    }
    if let Some(time_class) = args.time_class() {
        config = config.with_time_class(time_class);
    }
    if let Some(url) = &args.api_url {
        config = config.with_api_url(url.clone());
    }
    config.validate()?;
    Ok(config)
}

/// Units for a directory or a single product file
fn collect_units(args: &IngestArgs, config: &Config) -> Result<Vec<WorkUnit>> {
    let mut units = if args.input.is_dir() {
        discover_units(&args.input, args.group)?
    } else {
        vec![single_unit(args, config)?]
    };

    if args.time_class.is_some() {
        for unit in &mut units {
            unit.time_class = config.ingest.time_class.clone();
        }
    }
    Ok(units)
}

fn single_unit(args: &IngestArgs, config: &Config) -> Result<WorkUnit> {
    let name = args
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();

    let (station_id, code, time_class) = match parse_file_name(name) {
        Ok(DwdFile::Product(product)) => (
            product.station_id,
            Some(product.product_code),
            product.time_class,
        ),
        Ok(other) => bail!("{} is not a product file ({:?})", name, other),
        Err(_) => (String::new(), None, config.ingest.time_class.clone()),
    };

    let group = match args.group.or_else(|| code.as_deref().and_then(product_group)) {
        Some(group) => group,
        None => bail!("Cannot derive the product group of {}; pass --group", name),
    };

    Ok(WorkUnit {
        product: args.input.clone(),
        metadata: args.metadata.clone(),
        station_id,
        group,
        time_class,
    })
}

async fn run_units(
    runner: &UnitRunner,
    units: &[WorkUnit],
    args: &IngestArgs,
    shutdown: &AtomicBool,
) -> IngestSummary {
    let started = Instant::now();
    let mut summary = IngestSummary {
        units: units.len(),
        dry_run: args.dry_run,
        ..Default::default()
    };

    let progress = (units.len() > 1 && args.log.show_progress())
        .then(|| create_progress_bar(units.len() as u64, "Importing"));

    for unit in units {
        if shutdown.load(Ordering::SeqCst) {
            warn!("Stopping before {}", unit.label());
            summary.interrupted = true;
            break;
        }
        if let Some(pb) = &progress {
            pb.set_message(unit.label());
        }

        summary.record(runner.run(unit).await);

        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }
    summary.elapsed_secs = started.elapsed().as_secs_f64();
    summary
}

fn print_summary(summary: &IngestSummary) {
    let title = if summary.dry_run {
        "Import Summary (dry run)"
    } else {
        "Import Summary"
    };
    println!("\n{}", title.bright_green().bold());
    println!(
        "  Units: {} finished, {} failed of {}",
        summary.finished.to_string().bright_white().bold(),
        if summary.failed > 0 {
            summary.failed.to_string().bright_red().bold()
        } else {
            summary.failed.to_string().normal()
        },
        summary.units
    );
    println!("  Sensors created: {}", summary.sensors_created);
    println!(
        "  Values sent: {} of {} attempted",
        summary.emit.values_sent.to_string().bright_white().bold(),
        summary.emit.values_aimed
    );
    println!(
        "  Batches: {} pushed, {} failed, {} empty",
        summary.emit.batches_pushed, summary.emit.batches_failed, summary.emit.batches_empty
    );
    println!(
        "  Skipped: {} already sent, {} missing, {} invalid",
        summary.emit.rows_already_sent, summary.emit.values_missing, summary.emit.values_invalid
    );

    for outcome in &summary.outcomes {
        if let UnitOutcome::Failed { unit, message } = outcome {
            println!("  {} {}: {}", "failed".bright_red(), unit, message);
        }
    }
    println!("  Elapsed: {:.1}s", summary.elapsed_secs);
    if summary.interrupted {
        println!("  {}", "Interrupted before all units ran".yellow());
    }
}
