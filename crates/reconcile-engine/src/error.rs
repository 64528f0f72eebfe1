//! Error types for reconcile-engine operations.
//!
//! Time resolution and duplicate resolution are total for valid zones, so the
//! only error they can raise is [`ZoneResolutionError`]. Everything else here
//! belongs to the sync layer, which is the one place errors are converted into
//! cache fallback.

use thiserror::Error;

/// An IANA time-zone identifier that `chrono-tz` does not know.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid timezone: {0}")]
pub struct ZoneResolutionError(pub String);

/// A feed fetch that failed or did not finish in time. Always transient.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkFetchError {
    #[error("Feed fetch failed: {0}")]
    Failed(String),

    #[error("Feed fetch timed out after {seconds}s")]
    TimedOut { seconds: u64 },
}

/// The persistence substrate failed to read or write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cache store error: {0}")]
pub struct StoreError(pub String);

/// Errors surfaced by the sync cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error(transparent)]
    ZoneResolution(#[from] ZoneResolutionError),

    /// The fetch failed and there is no earlier snapshot to fall back to.
    #[error("No cached data for feed '{feed_id}'")]
    NoCachedData { feed_id: String },

    #[error(transparent)]
    CacheStore(#[from] StoreError),

    #[error("Feed '{0}' is not registered")]
    UnknownFeed(String),

    /// A stored record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The task running a feed's sync ended without producing a result.
    #[error("Sync of feed '{feed_id}' was interrupted: {reason}")]
    Interrupted { feed_id: String, reason: String },
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

/// Errors from loading or validating a [`crate::config::SyncConfig`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Config parse error: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ZoneResolutionError>;

pub type SyncResult<T> = std::result::Result<T, SyncError>;
