//! page-send - Background daemon for recorded entries
//!
//! Publishes pending entries once they are due and deletes published
//! content whose auto-delete time has passed.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use libpagecast::logging::LoggingConfig;
use libpagecast::service::PagecastService;
use libpagecast::{Config, PagecastError, Result};
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "page-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled posting and auto-deletion")]
#[command(long_about = "\
page-send - Background daemon for scheduled posting and auto-deletion

DESCRIPTION:
    page-send is a long-running daemon that works through the entries
    recorded by page-post --start.

    Every poll it publishes pending entries whose time has come, marking
    each one posted or failed, and removes stored media nothing pending
    needs any more. It then deletes published content whose auto-delete
    time has passed. A delete that fails is tried again on the next poll.

USAGE:
    # Run in foreground (logs to stderr)
    page-send

    # Run with custom poll interval
    page-send --poll-interval 30

    # Enable verbose logging
    page-send --verbose

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current pass)

CONFIGURATION:
    Configuration file: ~/.config/pagecast/config.toml
    Database location: ~/.local/share/pagecast/entries.db

    [scheduling]
    poll_interval = 60  # seconds between polls

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    poll_interval: Option<u64>,

    /// Configuration file (defaults to $PAGECAST_CONFIG or the XDG location)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Process due entries once and exit
    #[arg(long, hide = true)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let poll_interval = cli.poll_interval.unwrap_or(config.scheduling.poll_interval).max(1);

    let service = PagecastService::from_config(config).await?;
    info!("page-send daemon starting");

    if cli.once {
        process_pass(&service).await?;
        info!("page-send: processed entries once, exiting");
        return Ok(());
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(Arc::clone(&shutdown))?;

    info!("Poll interval: {}s", poll_interval);
    run_daemon_loop(&service, poll_interval, shutdown).await;

    info!("page-send daemon stopped");
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| PagecastError::InvalidInput(format!("Signal setup failed: {}", e)))?;

    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            info!("Received shutdown signal, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) -> Result<()> {
    Ok(())
}

async fn run_daemon_loop(service: &PagecastService, poll_interval: u64, shutdown: Arc<AtomicBool>) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        if let Err(e) = process_pass(service).await {
            error!("Error processing entries: {}", e);
        }

        // Check shutdown every second while waiting
        for _ in 0..poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }
}

/// Publish what is due, then delete what has expired
async fn process_pass(service: &PagecastService) -> Result<()> {
    let now = Utc::now().timestamp();
    let dispatch = service.dispatch();

    let report = dispatch.dispatch_due(now).await?;
    if report.due > 0 {
        info!(
            "Dispatched {} entr{}: {} published, {} failed, {} media file(s) released",
            report.due,
            if report.due == 1 { "y" } else { "ies" },
            report.published,
            report.failed,
            report.media_removed
        );
    }

    let reaped = dispatch.reap_expired(now).await?;
    if reaped > 0 {
        info!("Auto-deleted {} expired item(s)", reaped);
    }

    Ok(())
}
