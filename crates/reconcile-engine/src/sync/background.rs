//! Periodic background refresh of stale feeds.

use std::sync::{Arc, PoisonError, Weak};

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::cache::{Inner, SyncCache};

/// A running background loop and the token that stops it.
pub(super) struct BackgroundTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl BackgroundTask {
    pub(super) fn stop(self) {
        self.cancel.cancel();
    }

    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl SyncCache {
    /// Start syncing stale feeds every `background_interval`.
    ///
    /// The first pass runs immediately. Returns `false` if background sync
    /// was already running. Must be called from within a tokio runtime.
    pub fn enable_background_sync(&self) -> bool {
        let mut slot = self
            .inner
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(BackgroundTask::is_running) {
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(Arc::downgrade(&self.inner), cancel.clone()));
        *slot = Some(BackgroundTask { cancel, handle });
        info!(
            interval_secs = self.inner.config.background_interval_secs,
            "background sync enabled"
        );
        true
    }

    /// Stop the background loop. A pass that is already running finishes
    /// first; no new pass starts.
    ///
    /// Returns `false` if background sync was not running.
    pub fn disable_background_sync(&self) -> bool {
        let task = self
            .inner
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match task {
            Some(task) => {
                task.stop();
                info!("background sync disabled");
                true
            }
            None => false,
        }
    }

    pub fn is_background_sync_enabled(&self) -> bool {
        self.inner
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(BackgroundTask::is_running)
    }
}

/// Holds only a weak reference so dropping the last `SyncCache` ends the loop.
async fn run(weak: Weak<Inner>, cancel: CancellationToken) {
    let period = match weak.upgrade() {
        Some(inner) => inner.config.background_interval(),
        None => return,
    };
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(inner) = weak.upgrade() else { break };
        let cache = SyncCache { inner };
        if !cache.is_online() {
            debug!("offline, skipping background sync");
            continue;
        }

        // Cancellation is only observed between passes.
        match cache.sync_stale_feeds().await {
            Ok(outcomes) if !outcomes.is_empty() => {
                let failed = outcomes.values().filter(|r| r.is_err()).count();
                info!(feeds = outcomes.len(), failed, "background sync pass finished");
            }
            Ok(_) => debug!("background sync pass found nothing stale"),
            Err(err) => error!(error = %err, "background sync pass failed"),
        }
        if cancel.is_cancelled() {
            break;
        }
    }

    debug!("background sync loop stopped");
}
