//! Fallwatch CLI
//!
//! Streaming fall detection from accelerometer samples.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use fallwatch_agent::{
    config::Config,
    core::{
        read_recording, write_feature_csv, AlertLogger, Clock, FallClassifier, LinearModel,
        StreamEngine,
    },
    stats::{create_shared_stats_with_persistence, StatsLog},
    transport::{drive, DriveOutcome, ReplayTransport, Transport, TransportEvent},
    VERSION,
};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fallwatch")]
#[command(version = VERSION)]
#[command(about = "Streaming accelerometer fall detector", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the per-user config location)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the detector on a sample stream
    Run {
        /// Replay a JSON-lines recording instead of subscribing to the broker
        #[arg(long, conflicts_with = "stdin")]
        replay: Option<PathBuf>,

        /// Read JSON-lines samples from standard input
        #[arg(long)]
        stdin: bool,

        /// Time source for cooldowns and reports (default: sample for --replay, wall otherwise)
        #[arg(long, value_enum)]
        clock: Option<ClockArg>,
    },

    /// Export a feature dataset (CSV) from a JSON-lines recording
    Features {
        /// Recording to read
        #[arg(long, short)]
        input: PathBuf,

        /// Output CSV file (stdout if omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Class label appended to every row
        #[arg(long)]
        label: Option<String>,
    },

    /// Show cumulative statistics and recorded alerts
    Status {
        /// Clear the cumulative statistics (the alert log is kept)
        #[arg(long)]
        reset: bool,
    },

    /// Show configuration
    Config {
        /// Write a template configuration file
        #[arg(long)]
        init: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ClockArg {
    Wall,
    Sample,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(Config::default_path);

    let result = match cli.command {
        Commands::Run {
            replay,
            stdin,
            clock,
        } => cmd_run(&config_path, replay, stdin, clock),
        Commands::Features {
            input,
            output,
            label,
        } => cmd_features(&config_path, &input, output, label.as_deref()),
        Commands::Status { reset } => cmd_status(&config_path, reset),
        Commands::Config { init } => cmd_config(&config_path, init),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Diagnostics go to stderr; stdout carries the detection report.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_run(
    config_path: &Path,
    replay: Option<PathBuf>,
    stdin: bool,
    clock: Option<ClockArg>,
) -> Result<()> {
    let config = Config::load(config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;

    let model = LinearModel::load(&config.model.path)
        .with_context(|| format!("loading classifier from {}", config.model.path.display()))?;
    let classifier = FallClassifier::new(model).context("binding classifier")?;

    let clock = match clock {
        Some(ClockArg::Wall) => Clock::Wall,
        Some(ClockArg::Sample) => Clock::Sample,
        None if replay.is_some() => Clock::Sample,
        None => Clock::Wall,
    };

    println!("Fallwatch Agent v{VERSION}");
    println!();
    println!(
        "  Window: {} samples ({}s at {} Hz)",
        config.stream.win_len(),
        config.stream.window_seconds,
        config.stream.sample_rate_hz
    );
    println!("  Step: {} samples", config.stream.step_len());
    println!("  Alert cooldown: {}s", config.logic.alert_cooldown_seconds);
    println!("  Alert log: {:?}", AlertLogger::new(&config.logging.dir).path());
    println!();

    let stats = create_shared_stats_with_persistence(config.data_path.join("stats.json"));
    let mut engine = StreamEngine::new(&config, classifier, stats.clone())?.with_clock(clock);

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    let capacity = config.transport.queue_capacity;
    let receiver = if let Some(path) = replay {
        ReplayTransport::open(&path, capacity)?.start()?
    } else if stdin {
        ReplayTransport::stdin(capacity).start()?
    } else {
        println!("Press Ctrl+C to stop");
        println!();
        start_broker(&config)?
    };

    if drive(&receiver, &mut engine, &running) == DriveOutcome::Stopped {
        println!();
        println!("Stopping...");
    }

    if let Err(e) = stats.save() {
        tracing::warn!("Could not save session statistics: {e}");
    }

    println!();
    println!("{}", stats.summary());
    Ok(())
}

#[cfg(feature = "mqtt")]
fn start_broker(config: &Config) -> Result<crossbeam_channel::Receiver<TransportEvent>> {
    let transport = fallwatch_agent::transport::MqttTransport::new(config.transport.clone());
    Ok(transport.start()?)
}

#[cfg(not(feature = "mqtt"))]
fn start_broker(config: &Config) -> Result<crossbeam_channel::Receiver<TransportEvent>> {
    bail!(
        "cannot subscribe to {}:{} (built without the `mqtt` feature); use --replay or --stdin",
        config.transport.host,
        config.transport.port
    )
}

fn cmd_features(
    config_path: &Path,
    input: &Path,
    output: Option<PathBuf>,
    label: Option<&str>,
) -> Result<()> {
    let config = load_or_default(config_path)?;
    let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let samples = read_recording(BufReader::new(file), config.stream.missing_fields)?;

    let win_len = config.stream.win_len();
    let step_len = config.stream.step_len();
    let rows = match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
            let rows = write_feature_csv(&samples, win_len, step_len, label, BufWriter::new(file))?;
            eprintln!("Wrote {rows} rows to {path:?}");
            rows
        }
        None => write_feature_csv(&samples, win_len, step_len, label, std::io::stdout().lock())?,
    };

    if rows == 0 {
        tracing::warn!(
            samples = samples.len(),
            win_len,
            "Recording is shorter than one window; no rows written"
        );
    }
    Ok(())
}

fn cmd_status(config_path: &Path, reset: bool) -> Result<()> {
    let config = load_or_default(config_path)?;
    let stats_path = config.data_path.join("stats.json");

    if reset {
        let stats = StatsLog::with_persistence(stats_path.clone());
        stats.reset();
        stats
            .save()
            .with_context(|| format!("saving {}", stats_path.display()))?;
        println!("Statistics reset ({stats_path:?})");
        return Ok(());
    }

    println!("Fallwatch Agent Status");
    println!("======================");
    println!();
    println!("Configuration:");
    println!(
        "  Window: {} samples, step {} samples",
        config.stream.win_len(),
        config.stream.step_len()
    );
    println!("  Alert cooldown: {}s", config.logic.alert_cooldown_seconds);
    println!("  Model: {:?}", config.model.path);
    println!();

    if stats_path.exists() {
        let content = std::fs::read_to_string(&stats_path)?;
        let stats: serde_json::Value = serde_json::from_str(&content)?;
        println!("Cumulative Statistics:");
        for key in [
            "samples_ingested",
            "inferences",
            "falls_classified",
            "alerts_fired",
            "alerts_suppressed",
            "messages_rejected",
        ] {
            if let Some(value) = stats.get(key) {
                println!("  {}: {value}", key.replace('_', " "));
            }
        }
    } else {
        println!("No previous session data found.");
    }
    println!();

    let logger = AlertLogger::new(&config.logging.dir);
    let alerts = logger.read_alerts()?;
    println!("Recorded alerts: {} ({:?})", alerts.len(), logger.path());
    if let Some(last) = alerts.last().and_then(|&ts| DateTime::<Utc>::from_timestamp(ts, 0)) {
        println!(
            "  Last alert: {}",
            last.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

fn cmd_config(config_path: &Path, init: bool) -> Result<()> {
    if init {
        if config_path.exists() {
            bail!("{} already exists", config_path.display());
        }
        Config::default().save(config_path)?;
        println!("Wrote template configuration to {config_path:?}");
        return Ok(());
    }

    let config = load_or_default(config_path)?;
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {config_path:?}");
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Load the config file if present, otherwise fall back to the template.
fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        Ok(Config::load(path)?)
    } else {
        tracing::info!("No configuration at {}; using defaults", path.display());
        Ok(Config::default())
    }
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl+C handler")
}
