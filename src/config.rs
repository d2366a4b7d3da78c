//! Configuration file parser for `newsroom.toml`.
//!
//! The config file is optional. A missing or empty file yields
//! `Config::default()`, which carries the built-in Albuquerque feed list.
//! Unknown top-level keys are accepted by serde but logged as warnings so
//! typos do not go unnoticed.
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// Well-formed TOML whose values break an engine invariant.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// A single configured news feed.
///
/// `name` is the join key between the registry, imported posts and batch
/// reports, so it must be unique across the feed list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Upper bound on posts created from this feed in one run.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// When non-empty, an entry must mention at least one of these.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Any match disqualifies the entry, even if `keywords` also match.
    #[serde(default)]
    pub exclude_keywords: Vec<String>,
    #[serde(default = "default_category")]
    pub category: String,
}

impl FeedConfig {
    /// Builds an unfiltered, enabled feed definition.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            enabled: true,
            max_items: default_max_items(),
            keywords: Vec::new(),
            exclude_keywords: Vec::new(),
            category: default_category(),
        }
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exclude_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

fn default_enabled() -> bool {
    true
}

fn default_max_items() -> usize {
    10
}

fn default_category() -> String {
    "news".to_string()
}

/// Top-level engine configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database holding imported draft posts.
    pub database_path: PathBuf,

    /// Minutes between scheduled batches. Must be positive.
    pub interval_minutes: u64,

    /// Per-request timeout for feed retrieval.
    pub fetch_timeout_secs: u64,

    /// Item cap for ad-hoc URL imports when the caller gives none.
    pub default_max_items: usize,

    /// Permit ad-hoc imports from loopback and private-network hosts.
    pub allow_private_hosts: bool,

    pub user_agent: String,

    pub feeds: Vec<FeedConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("newsroom.db"),
            interval_minutes: 60,
            fetch_timeout_secs: 30,
            default_max_items: 10,
            allow_private_hosts: false,
            user_agent: format!("newsroom/{}", env!("CARGO_PKG_VERSION")),
            feeds: default_feeds(),
        }
    }
}

/// Local news sources imported when no feed list is configured.
fn default_feeds() -> Vec<FeedConfig> {
    vec![
        FeedConfig::new(
            "Albuquerque Journal",
            "https://www.abqjournal.com/feed/",
        )
        .with_max_items(5),
        FeedConfig::new("KOB 4", "https://www.kob.com/feed/")
            .with_max_items(5)
            .with_exclude_keywords(["sponsored"]),
        FeedConfig::new("KRQE", "https://www.krqe.com/feed/")
            .with_max_items(5)
            .with_exclude_keywords(["sponsored"]),
        FeedConfig::new("Source NM", "https://sourcenm.com/feed/")
            .with_max_items(3)
            .with_keywords(["albuquerque", "bernalillo", "abq"]),
        FeedConfig::new("City of Albuquerque", "https://www.cabq.gov/news/RSS")
            .with_max_items(3)
            .with_category("city"),
    ]
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 7] = [
        "database_path",
        "interval_minutes",
        "fetch_timeout_secs",
        "default_max_items",
        "allow_private_hosts",
        "user_agent",
        "feeds",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)`
    /// - Broken invariants (duplicate feed names, zero caps) → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        let config = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            feeds = config.feeds.len(),
            interval_minutes = config.interval_minutes,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the engine relies on at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "interval_minutes must be greater than 0".to_string(),
            ));
        }
        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "fetch_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.default_max_items == 0 {
            return Err(ConfigError::Invalid(
                "default_max_items must be greater than 0".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for feed in &self.feeds {
            if feed.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "feed with url '{}' has an empty name",
                    feed.url
                )));
            }
            if !seen.insert(feed.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate feed name '{}'",
                    feed.name
                )));
            }
            if feed.max_items == 0 {
                return Err(ConfigError::Invalid(format!(
                    "feed '{}' has max_items = 0",
                    feed.name
                )));
            }
            if let Err(e) = url::Url::parse(&feed.url) {
                return Err(ConfigError::Invalid(format!(
                    "feed '{}' has an invalid url: {}",
                    feed.name, e
                )));
            }
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================
