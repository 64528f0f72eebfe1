//! Sync cache configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::timezone::parse_zone;

/// Tunables for [`crate::sync::SyncCache`], loadable from TOML.
///
/// Every key is optional; missing keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Zone for floating times when a feed does not name one.
    pub default_timezone: String,
    pub background_interval_secs: u64,
    /// Focus-triggered refreshes within this window of the last one are ignored.
    pub visibility_refresh_window_secs: u64,
    pub max_cache_age_secs: u64,
    pub fetch_timeout_secs: u64,
    /// Chunk size for `sync_all_feeds`.
    pub max_concurrent_fetches: usize,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_timezone: "UTC".to_string(),
            background_interval_secs: 15 * 60,
            visibility_refresh_window_secs: 5 * 60,
            max_cache_age_secs: 24 * 60 * 60,
            fetch_timeout_secs: 30,
            max_concurrent_fetches: 3,
            backoff_base_ms: 1_000,
            backoff_cap_ms: 30 * 60 * 1_000,
        }
    }
}

impl SyncConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_zone(&self.default_timezone).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.max_concurrent_fetches == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_fetches must be at least 1".into(),
            ));
        }
        if self.background_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "background_interval_secs must be positive".into(),
            ));
        }
        if self.backoff_cap_ms < self.backoff_base_ms {
            return Err(ConfigError::Invalid(
                "backoff_cap_ms must not be below backoff_base_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn background_interval(&self) -> Duration {
        Duration::from_secs(self.background_interval_secs)
    }

    pub fn visibility_refresh_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(to_i64(self.visibility_refresh_window_secs))
    }

    pub fn max_cache_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(to_i64(self.max_cache_age_secs))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn to_i64(secs: u64) -> i64 {
    // chrono durations are millisecond-bounded.
    i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1_000)
}
