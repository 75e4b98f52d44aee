//! Configuration management for Pagecast

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, PlatformError, Result};
use crate::types::Target;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
    #[serde(default)]
    pub pages: Vec<PageConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Graph API endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub api_base: String,
    /// Host used to derive transfer URLs for resumable video uploads
    pub video_base: String,
    pub api_version: String,
    pub timeout_secs: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            api_base: "https://graph.facebook.com".to_string(),
            video_base: "https://graph-video.facebook.com".to_string(),
            api_version: "v19.0".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub dir: String,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            dir: "~/.local/share/pagecast/media".to_string(),
        }
    }
}

/// Deliberate delays that keep request patterns under platform throttling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Lower bound of the random wait between media items (immediate mode)
    pub publish_min_secs: u64,
    /// Upper bound of the random wait between media items (immediate mode)
    pub publish_max_secs: u64,
    /// Wait after each successful delete during bulk deletion
    pub delete_delay_ms: u64,
    /// Items requested per feed page during bulk deletion
    pub feed_page_size: u32,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            publish_min_secs: 20,
            publish_max_secs: 40,
            delete_delay_ms: 1000,
            feed_page_size: 25,
        }
    }
}

impl PacingConfig {
    /// No waits at all, for tests and dry environments
    pub fn none() -> Self {
        Self {
            publish_min_secs: 0,
            publish_max_secs: 0,
            delete_delay_ms: 0,
            ..Self::default()
        }
    }

    pub fn delete_delay(&self) -> Duration {
        Duration::from_millis(self.delete_delay_ms)
    }

    /// Feed page size clamped to what the Graph API accepts
    pub fn page_size(&self) -> u32 {
        self.feed_page_size.clamp(1, 100)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Seconds between dispatcher polls
    pub poll_interval: u64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self { poll_interval: 60 }
    }
}

/// A managed page and where its access token lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub token_file: String,
}

impl PageConfig {
    /// Whether `selector` names this page by id or (case-insensitive) name
    pub fn matches(&self, selector: &str) -> bool {
        self.id == selector
            || self
                .name
                .as_deref()
                .map(|n| n.eq_ignore_ascii_case(selector))
                .unwrap_or(false)
    }

    /// Read the page token and build a publish target
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Authentication` if the token file cannot be
    /// read or is empty.
    pub fn load_target(&self) -> Result<Target> {
        let token_path = shellexpand::full(&self.token_file).map_err(|e| {
            PlatformError::Authentication(format!(
                "Failed to expand token file path for page {}: {}",
                self.id, e
            ))
        })?;

        let token = std::fs::read_to_string(token_path.as_ref())
            .map_err(|e| {
                PlatformError::Authentication(format!(
                    "Failed to read token file for page {}: {}",
                    self.id, e
                ))
            })?
            .trim()
            .to_string();

        if token.is_empty() {
            return Err(PlatformError::Authentication(format!(
                "Token file for page {} is empty",
                self.id
            ))
            .into());
        }

        Ok(Target::new(self.id.clone(), token))
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let mut config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/pagecast/entries.db".to_string(),
            },
            graph: GraphConfig::default(),
            media: MediaConfig::default(),
            pacing: PacingConfig::default(),
            scheduling: SchedulingConfig::default(),
            pages: Vec::new(),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("PAGECAST_DB_PATH") {
            if !path.trim().is_empty() {
                self.database.path = path;
            }
        }
    }

    /// Resolve page selectors (ids or names) into targets
    ///
    /// # Errors
    ///
    /// Returns `PagecastError::InvalidInput` for a selector matching no
    /// configured page, or an authentication error if a token can't be read.
    pub fn select_targets(&self, selectors: &[String]) -> Result<Vec<Target>> {
        let mut targets: Vec<Target> = Vec::new();

        for selector in selectors {
            let page = self
                .pages
                .iter()
                .find(|p| p.matches(selector))
                .ok_or_else(|| {
                    crate::PagecastError::InvalidInput(format!(
                        "Page '{}' is not configured",
                        selector
                    ))
                })?;

            if targets.iter().any(|t| t.id == page.id) {
                continue;
            }
            targets.push(page.load_target()?);
        }

        Ok(targets)
    }

    /// Targets for every configured page
    pub fn all_targets(&self) -> Result<Vec<Target>> {
        self.pages.iter().map(PageConfig::load_target).collect()
    }
}

/// Resolve the configuration file path following XDG conventions
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("PAGECAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("pagecast").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    #[serial]
    fn test_load_minimal_config_uses_defaults() {
        std::env::remove_var("PAGECAST_DB_PATH");
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[database]\npath = \"/tmp/pagecast.db\"\n");

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.database.path, "/tmp/pagecast.db");
        assert_eq!(config.graph.api_version, "v19.0");
        assert_eq!(config.pacing.feed_page_size, 25);
        assert_eq!(config.pacing.delete_delay_ms, 1000);
        assert_eq!(config.scheduling.poll_interval, 60);
        assert!(config.pages.is_empty());
    }

    #[test]
    #[serial]
    fn test_load_full_config() {
        std::env::remove_var("PAGECAST_DB_PATH");
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
[database]
path = "/tmp/pagecast.db"

[graph]
api_base = "http://localhost:9000"
api_version = "v20.0"

[pacing]
publish_min_secs = 5
publish_max_secs = 10
feed_page_size = 500

[[pages]]
id = "1001"
name = "Bakery"
token_file = "/tmp/bakery.token"
"#,
        );

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.graph.api_base, "http://localhost:9000");
        assert_eq!(config.graph.video_base, "https://graph-video.facebook.com");
        assert_eq!(config.pacing.publish_min_secs, 5);
        assert_eq!(config.pacing.page_size(), 100);
        assert_eq!(config.pages.len(), 1);
        assert!(config.pages[0].matches("bakery"));
        assert!(config.pages[0].matches("1001"));
        assert!(!config.pages[0].matches("1002"));
    }

    #[test]
    #[serial]
    fn test_db_path_env_override() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "[database]\npath = \"/tmp/pagecast.db\"\n");

        std::env::set_var("PAGECAST_DB_PATH", "/tmp/override.db");
        let config = Config::load_from_path(&path).unwrap();
        std::env::remove_var("PAGECAST_DB_PATH");

        assert_eq!(config.database.path, "/tmp/override.db");
    }

    #[test]
    fn test_missing_config_file() {
        let result = Config::load_from_path(Path::new("/nonexistent/pagecast/config.toml"));
        assert!(matches!(
            result,
            Err(crate::PagecastError::Config(ConfigError::ReadError(_)))
        ));
    }

    #[test]
    fn test_select_targets_reads_tokens() {
        let dir = TempDir::new().unwrap();
        let token_path = dir.path().join("bakery.token");
        std::fs::write(&token_path, "  token-abc\n").unwrap();

        let mut config = Config::default_config();
        config.pages.push(PageConfig {
            id: "1001".to_string(),
            name: Some("Bakery".to_string()),
            token_file: token_path.to_string_lossy().to_string(),
        });

        let targets = config
            .select_targets(&["Bakery".to_string(), "1001".to_string()])
            .unwrap();
        assert_eq!(targets.len(), 1, "Duplicate selectors collapse to one target");
        assert_eq!(targets[0].id, "1001");
        assert_eq!(targets[0].credential.expose(), "token-abc");
    }

    #[test]
    fn test_select_unknown_page() {
        let config = Config::default_config();
        let result = config.select_targets(&["nope".to_string()]);
        assert!(matches!(result, Err(crate::PagecastError::InvalidInput(_))));
    }

    #[test]
    fn test_empty_token_file_is_authentication_error() {
        let dir = TempDir::new().unwrap();
        let token_path = dir.path().join("empty.token");
        std::fs::write(&token_path, "\n").unwrap();

        let page = PageConfig {
            id: "1001".to_string(),
            name: None,
            token_file: token_path.to_string_lossy().to_string(),
        };
        let result = page.load_target();
        assert!(matches!(
            result,
            Err(crate::PagecastError::Platform(PlatformError::Authentication(_)))
        ));
    }
}
