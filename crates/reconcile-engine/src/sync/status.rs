//! Persisted per-feed records: the cached snapshot and the sync status.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::event::CanonicalEvent;

/// The last successfully synced canonical events of one feed.
///
/// Always written whole; a snapshot is never patched in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedFeedSnapshot {
    pub feed_id: String,
    pub feed_name: String,
    pub events: Vec<CanonicalEvent>,
    pub last_sync: DateTime<Utc>,
    /// Incremented on every successful sync of this feed.
    pub sync_version: u64,
}

impl CachedFeedSnapshot {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_sync
    }
}

/// Outcome history of a feed's sync attempts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub failure_count: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl SyncStatus {
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.last_attempt = Some(now);
        self.last_success = Some(now);
        self.failure_count = 0;
        self.next_retry_at = None;
        self.last_error = None;
    }

    pub fn record_failure(&mut self, now: DateTime<Utc>, error: String, backoff: &Backoff) {
        self.last_attempt = Some(now);
        self.failure_count = self.failure_count.saturating_add(1);
        self.next_retry_at = Some(now + backoff.delay(self.failure_count));
        self.last_error = Some(error);
    }

    /// Whether backoff currently forbids an automatic retry.
    pub fn in_backoff(&self, now: DateTime<Utc>) -> bool {
        self.next_retry_at.is_some_and(|at| now < at)
    }
}

/// Exponential retry delay: `min(base * 2^failures, cap)` milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base_ms: u64,
    pub cap_ms: u64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base_ms: 1_000,
            cap_ms: 1_800_000,
        }
    }
}

impl Backoff {
    pub fn delay_ms(&self, failure_count: u32) -> u64 {
        let factor = 1u64.checked_shl(failure_count).unwrap_or(u64::MAX);
        self.base_ms.saturating_mul(factor).min(self.cap_ms)
    }

    pub fn delay(&self, failure_count: u32) -> Duration {
        let ms = i64::try_from(self.delay_ms(failure_count)).unwrap_or(i64::MAX);
        Duration::milliseconds(ms.min(i64::MAX / 1_000))
    }
}
