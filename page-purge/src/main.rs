//! page-purge - Delete every post from managed pages

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use libpagecast::logging::LoggingConfig;
use libpagecast::service::{PagecastService, PurgeReport};
use libpagecast::{Config, PagecastError, Result};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "page-purge")]
#[command(version)]
#[command(about = "Delete every post from managed pages")]
#[command(long_about = "\
page-purge - Delete every post from managed pages

DESCRIPTION:
    page-purge walks the feed of each selected page and deletes every item
    it finds, pausing briefly after each delete. Items that can't be deleted
    are skipped and counted; a page whose feed can't be read is left as is.

    This cannot be undone. Without --force you are asked to confirm.

USAGE:
    # Empty one page
    page-purge --page Bakery

    # Empty every configured page without asking, JSON report
    page-purge --all-pages --force --format json

EXIT CODES:
    0 - Walk finished (check the report for items that failed)
    1 - Runtime error
    2 - Authentication error (page token missing)
    3 - Invalid input (no page selected, unknown page)
")]
struct Cli {
    /// Target page by id or name (repeatable)
    #[arg(short, long = "page", value_name = "PAGE")]
    pages: Vec<String>,

    /// Target every configured page
    #[arg(long, conflicts_with = "pages")]
    all_pages: bool,

    /// Skip the confirmation prompt
    #[arg(long)]
    force: bool,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

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

    let config = load_config(cli.config.as_deref())?;
    let targets = if cli.all_pages {
        config.all_targets()?
    } else {
        config.select_targets(&cli.pages)?
    };

    if targets.is_empty() {
        return Err(PagecastError::InvalidInput(
            "Please select at least one page (--page or --all-pages)".to_string(),
        ));
    }

    if !cli.force && !confirm(targets.len())? {
        println!("Cancelled");
        return Ok(());
    }

    let service = PagecastService::from_config(config).await?;
    info!("Purging {} page(s)", targets.len());
    let report = service.purge().delete_all(&targets).await;

    if cli.format == "json" {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error: failed to serialize report: {}", e),
        }
    } else {
        output_text(&report);
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

/// Ask before deleting
///
/// Without a terminal there is nobody to ask, so the purge is refused and
/// `--force` is required.
fn confirm(page_count: usize) -> Result<bool> {
    if !atty::is(atty::Stream::Stdin) {
        return Err(PagecastError::InvalidInput(
            "Refusing to purge without confirmation; use --force when stdin is not a terminal"
                .to_string(),
        ));
    }

    print!(
        "Delete ALL posts from {} page(s)? This cannot be undone. [y/N]: ",
        page_count
    );
    let mut input = String::new();
    io::stdout()
        .flush()
        .and_then(|_| io::stdin().read_line(&mut input))
        .map_err(|e| PagecastError::InvalidInput(format!("Failed to read confirmation: {}", e)))?;

    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn output_text(report: &PurgeReport) {
    if report.failed > 0 {
        println!("✗ {} item(s) could not be deleted", report.failed);
    }
    println!("✓ {}", report.summary());
}
