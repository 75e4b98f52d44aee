//! page-post - Publish or schedule content on managed pages

use std::io::{self, Read};
use std::path::PathBuf;

use chrono::{Duration, Utc};
use clap::Parser;
use libpagecast::logging::LoggingConfig;
use libpagecast::media::MediaBlob;
use libpagecast::scheduling::{parse_duration, parse_start_time, Timing};
use libpagecast::service::events::EventReceiver;
use libpagecast::service::publishing::{Submission, SubmissionMode, SubmissionOutcome};
use libpagecast::service::PagecastService;
use libpagecast::{Config, MediaKind, PagecastError, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "page-post")]
#[command(version)]
#[command(about = "Publish or schedule content on managed pages")]
#[command(long_about = "\
page-post - Publish or schedule content on managed pages

DESCRIPTION:
    page-post publishes a message, photos, videos or reels to one or more
    configured pages. Without --start everything is published right away,
    one media item at a time with a short random pause between items.

    With --start nothing is published now: every (media item, page) pair is
    recorded for page-send, which publishes it when it becomes due. Media
    items are released in batches of --batch-size every --interval, each
    batch shifted by up to --jitter.

USAGE:
    # Post a message to one page
    page-post --page Bakery \"Fresh bread at 7!\"

    # Read the message from stdin
    echo \"Closed on Monday\" | page-post --page Bakery

    # Upload two photos and a reel to every configured page
    page-post --all-pages --media a.jpg --media b.jpg --media clip.mp4 --kind reel

    # Schedule one photo per hour from tomorrow 9am, delete after a week
    page-post --page Bakery --media *.jpg --start \"tomorrow 9am\" \\
        --interval 1h --jitter 10m --delete-after-days 7

EXIT CODES:
    0 - Published or scheduled (at least one page accepted the content)
    1 - Publishing failed everywhere, or a runtime error
    2 - Authentication error (page token missing or rejected)
    3 - Invalid input (no page, no content, bad time or duration)
")]
struct Cli {
    /// Message to post (reads from stdin if not provided)
    message: Option<String>,

    /// Target page by id or name (repeatable)
    #[arg(short, long = "page", value_name = "PAGE")]
    pages: Vec<String>,

    /// Target every configured page
    #[arg(long, conflicts_with = "pages")]
    all_pages: bool,

    /// Image or video file to publish (repeatable)
    #[arg(short, long = "media", value_name = "FILE")]
    media: Vec<PathBuf>,

    /// How videos are published: video or reel
    #[arg(short, long, default_value = "video")]
    kind: String,

    /// Schedule instead of publishing now ("2025-11-20 15:00", "+2h", "tomorrow 9am")
    #[arg(long, value_name = "TIME")]
    start: Option<String>,

    /// Time between batches when scheduling ("30m", "1h", "2 days")
    #[arg(long, value_name = "DURATION", requires = "start")]
    interval: Option<String>,

    /// Media items per batch when scheduling
    #[arg(long, value_name = "N", requires = "start")]
    batch_size: Option<u32>,

    /// Maximum random shift of each batch when scheduling
    #[arg(long, value_name = "DURATION", requires = "start")]
    jitter: Option<String>,

    /// Delete published content after this many days
    #[arg(long, value_name = "DAYS")]
    delete_after_days: Option<u32>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Print progress events to stderr while publishing
    #[arg(long)]
    progress: bool,

    /// Configuration file (defaults to $PAGECAST_CONFIG or the XDG location)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
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
    if cli.format != "text" && cli.format != "json" {
        return Err(PagecastError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            cli.format
        )));
    }

    let video_kind: MediaKind = cli.kind.parse()?;
    if video_kind == MediaKind::Photo {
        return Err(PagecastError::InvalidInput(
            "--kind selects how videos are published: video or reel".to_string(),
        ));
    }

    let timing = build_timing(&cli)?;
    let config = load_config(cli.config.as_deref())?;

    let targets = if cli.all_pages {
        config.all_targets()?
    } else {
        config.select_targets(&cli.pages)?
    };

    let message = read_message(cli.message)?;

    let mut media = Vec::with_capacity(cli.media.len());
    for path in &cli.media {
        media.push(MediaBlob::from_path(path).await?);
    }

    let service = PagecastService::from_config(config).await?;
    let printer = cli.progress.then(|| spawn_progress_printer(service.subscribe()));

    let result = service
        .publishing()
        .submit(Submission {
            message,
            targets,
            media,
            video_kind,
            timing,
            retention_days: cli.delete_after_days,
        })
        .await;

    // Dropping the service closes the event channel so the printer drains and stops
    drop(service);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let outcome = result?;
    if cli.format == "json" {
        output_json(&outcome);
    } else {
        output_text(&outcome);
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

/// Timing parameters, present only when `--start` was given
fn build_timing(cli: &Cli) -> Result<Option<Timing>> {
    let Some(start) = cli.start.as_deref() else {
        return Ok(None);
    };

    let start_time = parse_start_time(start, Utc::now())?;
    let interval = match cli.interval.as_deref() {
        Some(interval) => parse_duration(interval)?,
        None => Duration::hours(1),
    };
    let jitter = match cli.jitter.as_deref() {
        Some(jitter) => parse_duration(jitter)?,
        None => Duration::zero(),
    };

    debug!("Scheduling from {} every {} (jitter {})", start_time, interval, jitter);

    Ok(Some(Timing {
        start_time,
        interval,
        batch_size: cli.batch_size.unwrap_or(1),
        jitter,
    }))
}

/// Message from the argument, or from piped stdin
fn read_message(arg: Option<String>) -> Result<Option<String>> {
    if arg.is_some() {
        return Ok(arg);
    }

    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer).map_err(|e| {
        PagecastError::InvalidInput(format!("Failed to read message from stdin: {}", e))
    })?;

    Ok(Some(buffer))
}

fn spawn_progress_printer(mut events: EventReceiver) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => eprintln!("{}", event),
                Err(RecvError::Lagged(skipped)) => {
                    eprintln!("... {} progress event(s) skipped", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn output_json(outcome: &SubmissionOutcome) {
    match serde_json::to_string_pretty(outcome) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: failed to serialize outcome: {}", e),
    }
}

fn output_text(outcome: &SubmissionOutcome) {
    match outcome.mode {
        SubmissionMode::Immediate => {
            for result in &outcome.results {
                let what = result.media.as_deref().unwrap_or("message");
                match (&result.content_id, &result.error) {
                    (Some(id), _) => {
                        println!("✓ {} {} → page {}: {}", result.kind, what, result.target_id, id)
                    }
                    (None, Some(error)) => {
                        println!("✗ {} {} → page {}: {}", result.kind, what, result.target_id, error)
                    }
                    (None, None) => println!("✗ {} {} → page {}", result.kind, what, result.target_id),
                }
            }
        }
        SubmissionMode::Deferred => {
            for entry in &outcome.entries {
                let what = entry.media.as_deref().unwrap_or("message");
                let when = chrono::DateTime::from_timestamp(entry.scheduled_at, 0)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                    .unwrap_or_else(|| entry.scheduled_at.to_string());
                println!("  {} {} → page {} at {}", entry.kind, what, entry.target_id, when);
            }
        }
    }

    println!("{}", outcome.summary);
}
