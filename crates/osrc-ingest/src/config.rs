//! Ingester configuration loaded from a TOML file with environment overrides.
//!
//! ```toml
//! database_path = "./data/osrc.db"
//! archive_url = "https://data.gharchive.org"
//! continue_on_error = true
//!
//! [fetch]
//! timeout_secs = 300
//! attempts = 1
//! backoff_ms = 2000
//! ```
//!
//! Every key is optional. After the file is parsed, `OSRC_DATABASE_PATH` and
//! `OSRC_ARCHIVE_URL` override the corresponding values.

use crate::{Error, Result};
use osrc_core::DEFAULT_ARCHIVE_URL;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Ingester configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Path to the SQLite store.
    pub database_path: PathBuf,

    /// Base URL that remote shard names are appended to.
    pub archive_url: String,

    /// Skip records that fail to parse or resolve instead of aborting the shard.
    pub continue_on_error: bool,

    /// Shard fetch settings.
    pub fetch: FetchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./data/osrc.db"),
            archive_url: DEFAULT_ARCHIVE_URL.to_string(),
            continue_on_error: true,
            fetch: FetchConfig::default(),
        }
    }
}

/// HTTP fetch settings for remote shards.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Timeout for a whole request, body included.
    pub timeout_secs: u64,

    /// Attempts per shard before giving up. 1 means no retry.
    pub attempts: u32,

    /// Base delay between attempts; attempt `n` waits `n * backoff_ms`.
    pub backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            attempts: 1,
            backoff_ms: 2000,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Config {
    /// Load configuration from `path`, then apply environment overrides.
    ///
    /// The file must exist; an empty file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {}", path.display(), e))
        })?;

        let mut config = Self::from_toml_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.apply_env_overrides();
        config.validate()?;

        tracing::info!(
            config = %path.display(),
            database_path = %config.database_path.display(),
            archive_url = %config.archive_url,
            continue_on_error = config.continue_on_error,
            fetch_timeout_secs = config.fetch.timeout_secs,
            fetch_attempts = config.fetch.attempts,
            "ingest configuration loaded"
        );

        Ok(config)
    }

    /// Parse configuration from TOML text without consulting the environment.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: Self =
            toml::from_str(text).map_err(|e| Error::Config(e.message().to_string()))?;
        config.archive_url = config.archive_url.trim_end_matches('/').to_string();
        Ok(config)
    }

    /// Apply `OSRC_DATABASE_PATH` and `OSRC_ARCHIVE_URL` if set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        if let Some(path) = non_empty_env("OSRC_DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(url) = non_empty_env("OSRC_ARCHIVE_URL") {
            self.archive_url = url.trim_end_matches('/').to_string();
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.archive_url.starts_with("http://") || self.archive_url.starts_with("https://"))
        {
            return Err(Error::Config(format!(
                "archive_url must be an http(s) URL, got {:?}",
                self.archive_url
            )));
        }
        if self.fetch.attempts == 0 {
            return Err(Error::Config("fetch.attempts must be at least 1".into()));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(Error::Config("fetch.timeout_secs must be positive".into()));
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
