//! Logging setup shared by the Pagecast binaries
//!
//! All binaries log to stderr so stdout stays reserved for results
//! (summaries, JSON reports). Output format and level come from:
//! - `PAGECAST_LOG_FORMAT`: `text` (default), `json` or `pretty`
//! - `PAGECAST_LOG_LEVEL`: any `EnvFilter` directive, default `info`
//! - `RUST_LOG`, which takes precedence over both when set
//!
//! ```no_run
//! use libpagecast::logging::LoggingConfig;
//!
//! // `--verbose` forces debug output for pagecast modules
//! LoggingConfig::from_env(true).init();
//! ```

use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Directives appended to every filter so HTTP and SQL internals stay quiet
const QUIET_DEPENDENCIES: &[&str] = &["sqlx=warn", "hyper=warn", "reqwest=warn", "h2=warn"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable text output (no colors, for piping)
    Text,
    /// Machine-parseable JSON (one JSON object per line)
    Json,
    /// Pretty-printed with colors (for development)
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

/// Logging settings for one binary
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
}

impl LoggingConfig {
    pub fn new(format: LogFormat, level: impl Into<String>) -> Self {
        Self {
            format,
            level: level.into(),
        }
    }

    /// Read `PAGECAST_LOG_FORMAT` / `PAGECAST_LOG_LEVEL`
    ///
    /// An unparseable format falls back to text. `verbose` overrides the
    /// level with `debug`.
    pub fn from_env(verbose: bool) -> Self {
        let format = std::env::var("PAGECAST_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(LogFormat::Text);

        let level = if verbose {
            "debug".to_string()
        } else {
            std::env::var("PAGECAST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
        };

        Self::new(format, level)
    }

    /// Filter directive string including the dependency overrides
    pub fn directives(&self) -> String {
        let mut directives = vec![self.level.clone()];
        directives.extend(QUIET_DEPENDENCIES.iter().map(|d| d.to_string()));
        directives.join(",")
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directives()))
    }

    /// Install the global subscriber
    ///
    /// A second call in the same process is ignored, which keeps test
    /// binaries that initialise logging more than once from panicking.
    pub fn init(&self) {
        let filter = self.filter();

        let installed = match self.format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .flatten_event(true)
                .with_target(true)
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::fmt()
                .pretty()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true)
                .try_init(),
            LogFormat::Text => tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(false)
                .try_init(),
        };

        if installed.is_err() {
            tracing::debug!("Logging already initialised, keeping existing subscriber");
        }
    }
}
