//! Screener configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is valid:
//!
//! ```toml
//! data_dir = "data"
//! max_age_hours = 24
//! default_sort = "expected_return"
//!
//! [display]
//! min_height = 600
//! per_row = 20
//! max_height = 2400
//!
//! [yahoo]
//! max_retries = 3
//! base_delay_ms = 500
//! timeout_secs = 30
//! breaker_cooldown_secs = 1800
//! ```

use crate::data::circuit_breaker::DEFAULT_FAILURE_THRESHOLD;
use crate::data::{CacheLayout, YahooSettings, DEFAULT_DATA_DIR};
use crate::domain::Universe;
use crate::screen::{DisplayConfig, RankMetric};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upper bound on `yahoo.max_retries`; backoff doubles per attempt.
pub const MAX_YAHOO_RETRIES: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to load universe: {0}")]
    Universe(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YahooConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub timeout_secs: u64,
    pub breaker_cooldown_secs: u64,
    pub breaker_failure_threshold: u32,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            timeout_secs: 30,
            breaker_cooldown_secs: 30 * 60,
            breaker_failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

impl YahooConfig {
    pub fn settings(&self) -> YahooSettings {
        YahooSettings {
            max_retries: self.max_retries,
            base_delay: std::time::Duration::from_millis(self.base_delay_ms),
            timeout: std::time::Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn breaker_cooldown(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.breaker_cooldown_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenerConfig {
    pub data_dir: PathBuf,
    /// A snapshot older than this is refreshed by `load_or_refresh`.
    pub max_age_hours: u32,
    pub default_sort: RankMetric,
    pub display: DisplayConfig,
    /// Optional TOML file replacing the built-in market universe.
    pub universe_file: Option<PathBuf>,
    pub yahoo: YahooConfig,
}

impl Default for ScreenerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            max_age_hours: 24,
            default_sort: RankMetric::default(),
            display: DisplayConfig::default(),
            universe_file: None,
            yahoo: YahooConfig::default(),
        }
    }
}

impl ScreenerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_age_hours == 0 {
            return Err(ConfigError::Invalid("max_age_hours must be at least 1".into()));
        }
        if self.display.max_height < self.display.min_height {
            return Err(ConfigError::Invalid(format!(
                "display.max_height ({}) is below display.min_height ({})",
                self.display.max_height, self.display.min_height
            )));
        }
        if self.yahoo.max_retries > MAX_YAHOO_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "yahoo.max_retries ({}) exceeds {MAX_YAHOO_RETRIES}",
                self.yahoo.max_retries
            )));
        }
        if self.yahoo.timeout_secs == 0 {
            return Err(ConfigError::Invalid("yahoo.timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn max_age(&self) -> Duration {
        Duration::hours(i64::from(self.max_age_hours))
    }

    pub fn layout(&self) -> CacheLayout {
        CacheLayout::new(&self.data_dir)
    }

    /// The configured universe file, or the built-in lists.
    pub fn universe(&self) -> Result<Universe, ConfigError> {
        match &self.universe_file {
            Some(path) => Universe::from_file(path).map_err(ConfigError::Universe),
            None => Ok(Universe::builtin()),
        }
    }
}
