// Mon Jan 19 2026 - Alex

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Tuning knobs for shard-split queries. Defaults match the values the
/// splitting heuristics were tuned with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub shard_label: String,
    pub sentinel_shard: i64,
    /// Windows at or below this length request the catch-all group first.
    pub short_window_secs: u64,
    /// Retries allowed per cycle on top of the first attempt.
    pub max_retries: u32,
    /// Error text marking the store's hard series limit; never retried.
    pub max_series_marker: String,
    /// Overrides the square-root group count when set.
    pub max_groups: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shard_label: "__stream_shard__".to_string(),
            sentinel_shard: -1,
            short_window_secs: 6 * 60 * 60,
            max_retries: 2,
            max_series_marker: "maximum of series".to_string(),
            max_groups: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_shard_label(mut self, label: &str) -> Self {
        self.shard_label = label.to_string();
        self
    }

    pub fn with_sentinel_shard(mut self, sentinel: i64) -> Self {
        self.sentinel_shard = sentinel;
        self
    }

    pub fn with_short_window(mut self, window: Duration) -> Self {
        self.short_window_secs = window.as_secs();
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_max_groups(mut self, groups: usize) -> Self {
        self.max_groups = Some(groups);
        self
    }

    pub fn short_window(&self) -> Duration {
        Duration::from_secs(self.short_window_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shard_label.trim().is_empty() {
            return Err(ConfigError::Invalid("shard_label must not be empty".to_string()));
        }
        if self.sentinel_shard >= 0 {
            return Err(ConfigError::Invalid(
                "sentinel_shard must be negative so it cannot collide with a real shard".to_string(),
            ));
        }
        if self.max_series_marker.trim().is_empty() {
            return Err(ConfigError::Invalid("max_series_marker must not be empty".to_string()));
        }
        if self.max_groups == Some(0) {
            return Err(ConfigError::Invalid("max_groups must be greater than 0".to_string()));
        }
        Ok(())
    }
}
