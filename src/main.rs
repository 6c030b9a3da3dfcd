use clap::Parser;
use dwd_importer::cli::{args::Args, commands};
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn main() {
    let args = Args::parse();

    // If no subcommand was provided, show help and available commands
    if args.command.is_none() {
        show_help_and_commands();
        process::exit(0);
    }

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        let shutdown = Arc::new(AtomicBool::new(false));

        // The first Ctrl-C lets the current unit finish, a second one aborts
        let signal_flag = Arc::clone(&shutdown);
        let shutdown_signal = async move {
            wait_for_ctrl_c().await;
            eprintln!("\nReceived CTRL+C, stopping after the current unit...");
            signal_flag.store(true, Ordering::SeqCst);
            wait_for_ctrl_c().await;
        };

        tokio::select! {
            result = commands::run(args, shutdown) => result,
            _ = shutdown_signal => Err(anyhow::anyhow!("Interrupted by user")),
        }
    });

    match result {
        Ok(()) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

/// Resolve on Ctrl-C; never resolves if the handler cannot be installed
async fn wait_for_ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Show help information and available commands when no subcommand is provided
fn show_help_and_commands() {
    println!("DWD Importer - Weather Observations to Sensor API");
    println!("=================================================");
    println!();
    println!("Forward DWD station observations to a sensor-data API, creating sensors");
    println!("from station metadata and never sending the same range twice.");
    println!();
    println!("USAGE:");
    println!("    dwd-importer <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    ingest      Import product files and their station metadata");
    println!("    sensors     Report the sensors and counters held in the store");
    println!("    compact     Merge the sent ranges of every sensor in the store");
    println!("    plan        Split a list of archive names into groups");
    println!("    help        Show this help message or help for specific commands");
    println!();
    println!("EXAMPLES:");
    println!("    # Import every product file below a directory:");
    println!("    dwd-importer ingest /data/dwd/hourly/air_temperature -v");
    println!();
    println!("    # Import one file with its metadata, without touching the API:");
    println!("    dwd-importer ingest produkt_tu_stunde_19500401_20231231_00003.txt \\");
    println!("                        --metadata Metadaten_Geographie_00003.txt --dry-run");
    println!();
    println!("    # Inspect the sensor store:");
    println!("    dwd-importer sensors --detailed --format json");
    println!();
    println!("For detailed help on any command, use:");
    println!("    dwd-importer <COMMAND> --help");
}
