//! quality-watch - real-time image quality feedback
//!
//! Generates synthetic quality samples, analyzes them one at a time, and
//! prints the live set of feedback messages whenever it changes.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: a sample every 200ms, feedback live for 2s
//! cargo run --release
//!
//! # Reproducible 10 second run, one JSON line per change
//! cargo run --release -- --seed 7 --duration-secs 10 --json
//!
//! # Pick up threshold edits without restarting
//! cargo run --release -- --config quality_watch.toml --watch-config
//! ```
//!
//! # Environment Variables
//!
//! - `QUALITY_WATCH_CONFIG`: Path to a TOML config file
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use quality_watch::config::{self, defaults::CONFIG_EVENT_CHANNEL_SIZE, ConfigSource, PipelineConfig};
use quality_watch::pipeline::Orchestrator;
use quality_watch::types::FeedbackMessage;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "quality-watch")]
#[command(about = "Real-time image quality feedback pipeline")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides QUALITY_WATCH_CONFIG and ./quality_watch.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Milliseconds between generated samples (overrides [generator].interval_ms)
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Seed for the synthetic sample source, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many seconds (0 = run until Ctrl+C)
    #[arg(long, default_value = "0")]
    duration_secs: u64,

    /// Start with sample generation switched off
    #[arg(long)]
    paused: bool,

    /// Print each live-set change as one JSON line
    #[arg(long)]
    json: bool,

    /// Reload the config file when it changes on disk
    #[arg(long)]
    watch_config: bool,

    /// Print the effective config as TOML and exit
    #[arg(long)]
    print_config: bool,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    let (mut pipeline_config, source) = match &args.config {
        Some(path) => {
            let cfg = PipelineConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            (cfg, ConfigSource::File(path.clone()))
        }
        None => PipelineConfig::load(),
    };
    if let Some(ms) = args.interval_ms {
        pipeline_config.generator.interval_ms = ms;
    }
    if args.seed.is_some() {
        pipeline_config.generator.seed = args.seed;
    }
    pipeline_config
        .validate()
        .context("Invalid configuration after command-line overrides")?;

    if args.print_config {
        print!("{}", pipeline_config.to_toml()?);
        return Ok(());
    }

    info!("  quality-watch - image quality feedback");
    info!("  Config: {}", source);
    info!(
        "  Sampling every {}ms | analysis >= {}ms | feedback {}ms",
        pipeline_config.generator.interval_ms,
        pipeline_config.analyzer.effective_latency().as_millis(),
        pipeline_config.analyzer.feedback_duration_ms
    );
    config::init(pipeline_config.clone(), source);

    // Graceful shutdown via Ctrl+C or the duration limit
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });
    if args.duration_secs > 0 {
        let deadline_token = cancel_token.clone();
        let limit = Duration::from_secs(args.duration_secs);
        tokio::spawn(async move {
            tokio::select! {
                () = deadline_token.cancelled() => {}
                () = tokio::time::sleep(limit) => {
                    info!(secs = limit.as_secs(), "Run duration reached");
                    deadline_token.cancel();
                }
            }
        });
    }

    // Optional config hot reload
    let config_events = match (args.watch_config, config::source_path()) {
        (true, Some(path)) => {
            let (tx, rx) = mpsc::channel(CONFIG_EVENT_CHANNEL_SIZE);
            tokio::spawn(config::watcher::run_config_watcher(
                path.to_path_buf(),
                tx,
                cancel_token.clone(),
            ));
            Some(rx)
        }
        (true, None) => {
            warn!("--watch-config given but no config file is in use, ignoring");
            None
        }
        (false, _) => None,
    };

    let mut orchestrator = Orchestrator::synthetic(&pipeline_config)?;
    let renderer = tokio::spawn(render_live_set(
        orchestrator.subscribe(),
        args.json,
        cancel_token.clone(),
    ));

    if args.paused || !pipeline_config.generator.enabled {
        info!("Sample generation paused at startup");
    } else {
        orchestrator.start()?;
    }

    let stats = orchestrator.run(cancel_token.clone(), config_events).await;
    cancel_token.cancel();
    renderer.await.ok();

    info!("Final stats: {}", stats);
    info!("quality-watch shutdown complete");
    Ok(())
}

// ============================================================================
// Display
// ============================================================================

/// Print the live set every time it changes.
async fn render_live_set(
    mut live: watch::Receiver<Vec<FeedbackMessage>>,
    json: bool,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            changed = live.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }

        let snapshot = live.borrow_and_update().clone();
        if json {
            match serde_json::to_string(&snapshot) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(error = %e, "Failed to serialize live set"),
            }
        } else {
            println!("{}", format_live_set(&snapshot));
        }
    }
}

fn format_live_set(messages: &[FeedbackMessage]) -> String {
    if messages.is_empty() {
        return "(no feedback)".to_string();
    }
    messages
        .iter()
        .map(|m| format!("[{}] {}", m.severity, m.text))
        .collect::<Vec<_>>()
        .join(" | ")
}
