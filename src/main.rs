use anyhow::{Context, Result};
use bearing::config::{Config, FilterStrategy};
use bearing::replay::ReplaySource;
use bearing::report::ReportGenerator;
use bearing::session::{LineFormat, ScanEngine};
use clap::{Parser, Subcommand};
use log::{info, warn, LevelFilter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "bearing")]
#[command(version = "0.1.0")]
#[command(about = "BLE beacon RSSI denoising and distance estimation logger")]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scan session over replayed sighting batches
    Run {
        /// Sighting input file, one JSON batch per line (stdin if not specified)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Denoiser strategy: kalman or mode (overrides config)
        #[arg(long)]
        filter: Option<String>,

        /// Kalman process noise Q (overrides config)
        #[arg(long)]
        process_noise: Option<f64>,

        /// Kalman measurement noise R (overrides config)
        #[arg(long)]
        measurement_noise: Option<f64>,

        /// Delay between batches in milliseconds (overrides config)
        #[arg(long)]
        pace_ms: Option<u64>,

        /// Render records as CSV lines regardless of strategy
        #[arg(long)]
        csv: bool,

        /// Save the observation log to a timestamped CSV when the session ends
        #[arg(long)]
        export: bool,

        /// Save the observation log to this file instead of the timestamped default
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Initialize a default configuration file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_secs()
        .init();

    // Handle init command before loading config
    if matches!(cli.command, Commands::Init) {
        return handle_init(&cli.config);
    }

    // Load configuration
    let mut config = if cli.config.exists() {
        Config::load(&cli.config).context("Failed to load config")?
    } else {
        info!("Config file not found, using defaults");
        Config::default()
    };

    match cli.command {
        Commands::Run {
            input,
            filter,
            process_noise,
            measurement_noise,
            pace_ms,
            csv,
            export,
            output,
        } => {
            // Override config with CLI args
            if let Some(name) = filter {
                config.filter.strategy = name.parse::<FilterStrategy>()?;
            }
            if let Some(q) = process_noise {
                config.filter.process_noise = q;
            }
            if let Some(r) = measurement_noise {
                config.filter.measurement_noise = r;
            }
            if let Some(pace) = pace_ms {
                config.replay.pace_ms = pace;
            }

            config.validate().context("Invalid configuration")?;

            handle_run(config, input, csv, export, output).await
        }
        Commands::Init => unreachable!(),
    }
}

async fn handle_run(
    config: Config,
    input: Option<PathBuf>,
    csv: bool,
    export: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let format = if csv {
        LineFormat::Csv
    } else {
        LineFormat::for_strategy(config.filter.strategy)
    };

    // Set up shared running flag for signal handling
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    // Set up Ctrl+C handler
    ctrlc::set_handler(move || {
        eprintln!("\nReceived Ctrl+C, stopping scan...");
        r.store(false, Ordering::SeqCst);
    })?;

    // Reader task feeding the session channel
    let (tx, rx) = mpsc::channel(16);
    let source = ReplaySource::new(input, config.replay.pace_ms);
    let reader_running = running.clone();
    let reader = tokio::task::spawn_blocking(move || source.run(tx, reader_running));

    // Run the session
    let engine = ScanEngine::new(config.clone(), format, running.clone());
    let log = engine.run(rx).await?;

    // A reader blocked on stdin never finishes after Ctrl+C; only report
    // its errors when it already has
    if reader.is_finished() {
        if let Ok(Err(e)) = reader.await {
            warn!("Replay reader error: {}", e);
        }
    }

    ReportGenerator::print_summary(&log);

    if let Some(path) = output {
        ReportGenerator::export_to(&log, &path)?;
        info!("Saved observation log to {:?}", path);
    } else if export {
        let path = ReportGenerator::export_csv(&log, Path::new(&config.export.directory))?;
        info!("Saved observation log to {:?}", path);
    }

    // Force exit to ensure a blocked reader thread terminates
    info!("Exiting...");
    std::process::exit(0);
}

fn handle_init(path: &Path) -> Result<()> {
    info!("Initializing bearing configuration...");

    let config = Config::default();
    config.save(path)?;
    info!("Created {:?}", path);
    info!("Edit it to choose the filter strategy and calibration constants.");
    info!("Run 'bearing run -i sightings.jsonl' to replay a capture.");

    Ok(())
}
