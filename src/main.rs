//! Eklok - grid-load signals for home automation
//!
//! A CLI tool that retrieves the published grid-load series for today and
//! tomorrow, analyses it, and reports the current load band, whether now is
//! a good moment for heavy consumption, and the best moment per day.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, fetch, IO, etc.)
//!   2 - A supplied day failed validation and --fail-on-invalid is set

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod report;
mod signals;
mod source;

use analysis::{AnalysisEngine, EngineConfig};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cli::{Args, OutputFormat};
use config::Config;
use models::AnalysisSnapshot;
use report::ReportMetadata;
use source::{LoadClient, Source};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Eklok v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .eklok.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  .eklok.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .eklok.toml")?;

    println!("✅ Created .eklok.toml with default settings.");
    println!("   Edit it to customize the timezone, API endpoint and refresh interval.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Everything a cycle needs besides the engine.
struct Runtime {
    config: Config,
    tz: Tz,
    source: Source,
}

/// Load configuration, build the engine and run once or in watch mode.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    let tz = config.timezone()?;
    let source = match args.input {
        Some(ref path) => Source::File(path.clone()),
        None => Source::Api(LoadClient::new(&config.source)?),
    };
    info!("Reading series from {} (timezone {})", source.describe(), tz);

    let engine = AnalysisEngine::new(EngineConfig {
        timezone: tz,
        top_moments: config.signals.top_moments,
    });
    let runtime = Runtime { config, tz, source };

    if args.watch {
        run_watch(&runtime, &engine).await?;
        return Ok(0);
    }

    let now = args.now.unwrap_or_else(Utc::now);
    let input = runtime.source.fetch(now, &runtime.tz).await?;
    let snapshot = engine.refresh(&input, now);
    render(&runtime, &snapshot, now)?;

    let has_invalid_day = snapshot.today.error().is_some()
        || snapshot
            .tomorrow
            .as_ref()
            .map_or(false, |t| t.error().is_some());
    if args.fail_on_invalid && has_invalid_day {
        eprintln!("\n⛔ A day's series failed validation. Failing (exit code 2).");
        return Ok(2);
    }

    Ok(0)
}

/// Refresh on a fixed interval until Ctrl-C.
///
/// A tick that comes due while a cycle is still running is skipped, so
/// cycles never overlap and snapshots are published in fetch order.
async fn run_watch(runtime: &Runtime, engine: &AnalysisEngine) -> Result<()> {
    let period = Duration::from_secs(runtime.config.schedule.interval_minutes * 60);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "Watching: refreshing every {} minutes. Press Ctrl-C to stop.",
        runtime.config.schedule.interval_minutes
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = run_cycle(runtime, engine).await {
                    error!("Refresh cycle failed: {:#}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping watch");
                return Ok(());
            }
        }
    }
}

/// One scheduled cycle: fetch, refresh, render.
///
/// A failed fetch keeps the last snapshot; it is rendered again so that its
/// age shows up as staleness.
async fn run_cycle(runtime: &Runtime, engine: &AnalysisEngine) -> Result<()> {
    let now = Utc::now();

    match runtime.source.fetch(now, &runtime.tz).await {
        Ok(input) => {
            let snapshot = engine.refresh(&input, now);
            render(runtime, &snapshot, now)
        }
        Err(e) => {
            warn!("Fetch failed, keeping last snapshot: {:#}", e);
            match engine.snapshot() {
                Some(snapshot) => render(runtime, &snapshot, now),
                None => Err(e),
            }
        }
    }
}

/// Render the snapshot and its signals to the configured output.
fn render(runtime: &Runtime, snapshot: &AnalysisSnapshot, now: DateTime<Utc>) -> Result<()> {
    let stale_after = chrono::Duration::minutes(runtime.config.signals.stale_after_minutes as i64);
    let signals = signals::project(Some(snapshot), now, stale_after);

    let metadata = ReportMetadata {
        source: runtime.source.describe(),
        timezone: runtime.tz.name().to_string(),
        evaluated_at: now,
    };

    let output = match runtime.config.general.format {
        OutputFormat::Json => report::generate_json_report(&metadata, snapshot, &signals)?,
        OutputFormat::Markdown => {
            report::generate_markdown_report(&metadata, snapshot, &signals, &runtime.tz)
        }
    };

    match runtime.config.general.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            info!("Report saved to: {}", path.display());
        }
        None => println!("{}", output),
    }

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .eklok.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
