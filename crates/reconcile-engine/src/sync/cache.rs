//! The per-feed canonical event cache and the sync paths that refresh it.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::background::BackgroundTask;
use super::clock::{AlwaysOnline, Clock, Connectivity, SystemClock};
use super::fetch::{Feed, FeedFetcher};
use super::status::{Backoff, CachedFeedSnapshot, SyncStatus};
use super::store::KvStore;
use crate::config::SyncConfig;
use crate::dedup::DuplicateResolver;
use crate::error::{ConfigError, NetworkFetchError, SyncError, SyncResult};
use crate::event::CanonicalEvent;
use crate::timezone::{parse_zone, validate_all_day_span_in};

/// Store namespace holding one [`CachedFeedSnapshot`] per feed id.
pub const SNAPSHOT_NAMESPACE: &str = "snapshots";
/// Store namespace holding one [`SyncStatus`] per feed id.
pub const STATUS_NAMESPACE: &str = "sync-status";

const UPDATE_CHANNEL_CAPACITY: usize = 64;

type SharedSync = Shared<BoxFuture<'static, SyncResult<Vec<CanonicalEvent>>>>;

/// Outcome of a batch sync, keyed by feed id.
pub type FeedOutcomes = BTreeMap<String, SyncResult<Vec<CanonicalEvent>>>;

/// Change notification sent to [`SyncCache::subscribe`] receivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheUpdate {
    Synced {
        feed_id: String,
        sync_version: u64,
        event_count: usize,
    },
    /// `feed_id` is `None` when the whole cache was cleared.
    Cleared { feed_id: Option<String> },
}

/// Owns the cached canonical events of every feed and mediates all refreshes.
///
/// Cheap to clone; clones share the same state. Calls for different feeds
/// run concurrently, while a second call for a feed that is already syncing
/// waits for the first one's result instead of fetching again.
#[derive(Clone)]
pub struct SyncCache {
    pub(super) inner: Arc<Inner>,
}

pub(super) struct Inner {
    pub(super) config: SyncConfig,
    default_tz: Tz,
    backoff: Backoff,
    store: Arc<dyn KvStore>,
    fetcher: Arc<dyn FeedFetcher>,
    clock: Arc<dyn Clock>,
    connectivity: Arc<dyn Connectivity>,
    feeds: RwLock<BTreeMap<String, Feed>>,
    in_flight: Mutex<HashMap<String, SharedSync>>,
    updates: broadcast::Sender<CacheUpdate>,
    last_visibility_refresh: Mutex<Option<DateTime<Utc>>>,
    pub(super) background: StdMutex<Option<BackgroundTask>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let slot = self
            .background
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = slot.take() {
            task.stop();
        }
    }
}

/// Assembles a [`SyncCache`] from its collaborators.
pub struct SyncCacheBuilder {
    config: SyncConfig,
    store: Arc<dyn KvStore>,
    fetcher: Arc<dyn FeedFetcher>,
    clock: Arc<dyn Clock>,
    connectivity: Arc<dyn Connectivity>,
}

impl SyncCacheBuilder {
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// # Errors
    /// Returns `ConfigError::Invalid` when the config does not validate.
    pub fn build(self) -> Result<SyncCache, ConfigError> {
        self.config.validate()?;
        let default_tz = parse_zone(&self.config.default_timezone)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let backoff = Backoff {
            base_ms: self.config.backoff_base_ms,
            cap_ms: self.config.backoff_cap_ms,
        };
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);

        Ok(SyncCache {
            inner: Arc::new(Inner {
                config: self.config,
                default_tz,
                backoff,
                store: self.store,
                fetcher: self.fetcher,
                clock: self.clock,
                connectivity: self.connectivity,
                feeds: RwLock::new(BTreeMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                updates,
                last_visibility_refresh: Mutex::new(None),
                background: StdMutex::new(None),
            }),
        })
    }
}

impl SyncCache {
    /// Start building a cache over `store` and `fetcher`, with the default
    /// config, the system clock, and an always-online connectivity signal.
    pub fn builder(store: Arc<dyn KvStore>, fetcher: Arc<dyn FeedFetcher>) -> SyncCacheBuilder {
        SyncCacheBuilder {
            config: SyncConfig::default(),
            store,
            fetcher,
            clock: Arc::new(SystemClock),
            connectivity: Arc::new(AlwaysOnline),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    // ── Feed registry ───────────────────────────────────────────────────────

    /// Make a feed known to background and visibility-triggered syncs.
    pub async fn register_feed(&self, feed: Feed) {
        self.inner.feeds.write().await.insert(feed.id.clone(), feed);
    }

    /// Forget a feed. Its cached snapshot and status are left in place.
    pub async fn unregister_feed(&self, feed_id: &str) -> Option<Feed> {
        self.inner.feeds.write().await.remove(feed_id)
    }

    pub async fn feeds(&self) -> Vec<Feed> {
        self.inner.feeds.read().await.values().cloned().collect()
    }

    // ── Sync ────────────────────────────────────────────────────────────────

    /// Fetch, resolve and cache one feed.
    ///
    /// On fetch failure or timeout the failure is recorded with backoff and
    /// the last cached events are returned instead.
    ///
    /// The sync runs as its own task: dropping this future does not cancel it,
    /// and later calls for the same feed join it until it finishes.
    ///
    /// # Errors
    /// - `ZoneResolution` if the feed names an unknown zone (nothing is fetched).
    /// - `NoCachedData` if the fetch failed and the feed was never synced.
    /// - `CacheStore` if the store could not be read or written.
    /// - `Interrupted` if the sync task panicked or its runtime shut down.
    pub async fn sync_feed(&self, feed: &Feed) -> SyncResult<Vec<CanonicalEvent>> {
        self.register_feed(feed.clone()).await;

        let shared = {
            let mut in_flight = self.inner.in_flight.lock().await;
            match in_flight.get(&feed.id) {
                Some(existing) => {
                    debug!(feed_id = %feed.id, "joining in-flight sync");
                    existing.clone()
                }
                None => {
                    // The task removes this entry when it finishes; the stored
                    // future holds only its handle.
                    let feed_id = feed.id.clone();
                    let handle = tokio::spawn(Arc::clone(&self.inner).run_sync(feed.clone()));
                    let sync = async move {
                        handle.await.unwrap_or_else(|err| {
                            Err(SyncError::Interrupted {
                                feed_id,
                                reason: err.to_string(),
                            })
                        })
                    }
                    .boxed()
                    .shared();
                    in_flight.insert(feed.id.clone(), sync.clone());
                    sync
                }
            }
        };

        shared.await
    }

    /// Sync `feeds` a fixed-size chunk at a time.
    ///
    /// Each feed's outcome is independent: a failure never aborts the batch.
    pub async fn sync_all_feeds(&self, feeds: &[Feed]) -> FeedOutcomes {
        let chunk_size = self.inner.config.max_concurrent_fetches.max(1);
        let mut outcomes = FeedOutcomes::new();

        for chunk in feeds.chunks(chunk_size) {
            let results = join_all(chunk.iter().map(|feed| self.sync_feed(feed))).await;
            for (feed, result) in chunk.iter().zip(results) {
                if let Err(err) = &result {
                    warn!(feed_id = %feed.id, error = %err, "feed unavailable");
                }
                outcomes.insert(feed.id.clone(), result);
            }
        }

        outcomes
    }

    /// Sync a registered feed by id.
    pub async fn refresh_feed(&self, feed_id: &str) -> SyncResult<Vec<CanonicalEvent>> {
        let feed = self
            .inner
            .feeds
            .read()
            .await
            .get(feed_id)
            .cloned()
            .ok_or_else(|| SyncError::UnknownFeed(feed_id.to_string()))?;
        self.sync_feed(&feed).await
    }

    /// Sync several registered feeds; unknown ids map to `UnknownFeed`.
    pub async fn refresh_feeds(&self, feed_ids: &[&str]) -> FeedOutcomes {
        let mut known = Vec::new();
        let mut outcomes = FeedOutcomes::new();
        {
            let feeds = self.inner.feeds.read().await;
            for id in feed_ids {
                match feeds.get(*id) {
                    Some(feed) => known.push(feed.clone()),
                    None => {
                        outcomes.insert(id.to_string(), Err(SyncError::UnknownFeed(id.to_string())));
                    }
                }
            }
        }
        outcomes.extend(self.sync_all_feeds(&known).await);
        outcomes
    }

    /// Registered feeds that have never synced or whose snapshot is older
    /// than `max_cache_age`, excluding those still in retry backoff.
    pub async fn feeds_needing_refresh(&self) -> SyncResult<Vec<Feed>> {
        let now = self.inner.clock.now();
        let max_age = self.inner.config.max_cache_age();
        let mut due = Vec::new();

        for feed in self.feeds().await {
            let stale = match self.inner.load_snapshot(&feed.id).await? {
                Some(snapshot) => snapshot.age(now) >= max_age,
                None => true,
            };
            let backing_off = self
                .inner
                .load_status(&feed.id)
                .await?
                .is_some_and(|status| status.in_backoff(now));
            if stale && !backing_off {
                due.push(feed);
            }
        }

        Ok(due)
    }

    /// Sync every feed needing refresh; does nothing while offline.
    pub async fn sync_stale_feeds(&self) -> SyncResult<FeedOutcomes> {
        if !self.inner.connectivity.is_online() {
            debug!("offline, skipping stale feed sync");
            return Ok(FeedOutcomes::new());
        }
        let due = self.feeds_needing_refresh().await?;
        if due.is_empty() {
            return Ok(FeedOutcomes::new());
        }
        info!(feeds = due.len(), "refreshing stale feeds");
        Ok(self.sync_all_feeds(&due).await)
    }

    /// Host regained foreground focus: refresh all registered feeds, at most
    /// once per rate-limit window.
    ///
    /// Returns `None` when the call was suppressed by the window or because
    /// the process is offline. An offline call does not consume the window.
    pub async fn on_visibility_regained(&self) -> Option<FeedOutcomes> {
        if !self.inner.connectivity.is_online() {
            debug!("offline, ignoring visibility refresh");
            return None;
        }

        let now = self.inner.clock.now();
        {
            let mut last = self.inner.last_visibility_refresh.lock().await;
            if let Some(previous) = *last {
                if now - previous < self.inner.config.visibility_refresh_window() {
                    debug!(since = %previous, "visibility refresh rate-limited");
                    return None;
                }
            }
            *last = Some(now);
        }

        let feeds = self.feeds().await;
        Some(self.sync_all_feeds(&feeds).await)
    }

    // ── Cache reads ─────────────────────────────────────────────────────────

    /// Events of the last successful sync, or an empty list. Never fetches.
    pub async fn get_cached_events(&self, feed_id: &str) -> SyncResult<Vec<CanonicalEvent>> {
        Ok(self
            .inner
            .load_snapshot(feed_id)
            .await?
            .map(|snapshot| snapshot.events)
            .unwrap_or_default())
    }

    /// Consumer-facing name for [`SyncCache::get_cached_events`].
    pub async fn get_canonical_events(&self, feed_id: &str) -> SyncResult<Vec<CanonicalEvent>> {
        self.get_cached_events(feed_id).await
    }

    pub async fn snapshot(&self, feed_id: &str) -> SyncResult<Option<CachedFeedSnapshot>> {
        self.inner.load_snapshot(feed_id).await
    }

    /// True if the feed's snapshot is younger than `max_age`.
    pub async fn is_cache_valid(&self, feed_id: &str, max_age: Duration) -> SyncResult<bool> {
        let now = self.inner.clock.now();
        Ok(self
            .inner
            .load_snapshot(feed_id)
            .await?
            .is_some_and(|snapshot| snapshot.age(now) < max_age))
    }

    /// [`SyncCache::is_cache_valid`] with the configured max cache age.
    pub async fn is_cache_fresh(&self, feed_id: &str) -> SyncResult<bool> {
        self.is_cache_valid(feed_id, self.inner.config.max_cache_age())
            .await
    }

    pub async fn get_sync_status(&self, feed_id: &str) -> SyncResult<Option<SyncStatus>> {
        self.inner.load_status(feed_id).await
    }

    /// Remove one feed's snapshot and status, or every feed's when `None`.
    pub async fn clear_cache(&self, feed_id: Option<&str>) -> SyncResult<()> {
        let store = &self.inner.store;
        match feed_id {
            Some(id) => {
                store.delete(SNAPSHOT_NAMESPACE, id).await?;
                store.delete(STATUS_NAMESPACE, id).await?;
            }
            None => {
                for namespace in [SNAPSHOT_NAMESPACE, STATUS_NAMESPACE] {
                    for key in store.keys(namespace).await? {
                        store.delete(namespace, &key).await?;
                    }
                }
            }
        }
        info!(feed_id = ?feed_id, "cache cleared");
        let _ = self.inner.updates.send(CacheUpdate::Cleared {
            feed_id: feed_id.map(str::to_string),
        });
        Ok(())
    }

    /// Receive a [`CacheUpdate`] after every snapshot write or clear.
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheUpdate> {
        self.inner.updates.subscribe()
    }

    pub(super) fn is_online(&self) -> bool {
        self.inner.connectivity.is_online()
    }
}

impl Inner {
    async fn run_sync(self: Arc<Self>, feed: Feed) -> SyncResult<Vec<CanonicalEvent>> {
        let result = self.sync_once(&feed).await;
        self.in_flight.lock().await.remove(&feed.id);
        result
    }

    async fn sync_once(&self, feed: &Feed) -> SyncResult<Vec<CanonicalEvent>> {
        let tz = match &feed.timezone {
            Some(zone) => parse_zone(zone)?,
            None => self.default_tz,
        };

        info!(feed_id = %feed.id, "syncing feed");
        let limit = self.config.fetch_timeout();
        let fetched = match timeout(limit, self.fetcher.fetch_events(feed)).await {
            Ok(result) => result,
            Err(_) => Err(NetworkFetchError::TimedOut {
                seconds: limit.as_secs(),
            }),
        };

        match fetched {
            Ok(events) => {
                for event in events.iter().filter(|e| !validate_all_day_span_in(e, &tz)) {
                    warn!(
                        feed_id = %feed.id,
                        event_id = %event.id,
                        "all-day event spans more than one date"
                    );
                }
                let canonical = DuplicateResolver::with_zone(tz).resolve(&events);
                self.commit(feed, canonical).await
            }
            Err(err) => self.fall_back(feed, err).await,
        }
    }

    async fn commit(
        &self,
        feed: &Feed,
        canonical: Vec<CanonicalEvent>,
    ) -> SyncResult<Vec<CanonicalEvent>> {
        let now = self.clock.now();
        let sync_version = self
            .load_snapshot(&feed.id)
            .await?
            .map_or(1, |previous| previous.sync_version + 1);

        let snapshot = CachedFeedSnapshot {
            feed_id: feed.id.clone(),
            feed_name: feed.name.clone(),
            events: canonical,
            last_sync: now,
            sync_version,
        };
        self.put_json(SNAPSHOT_NAMESPACE, &feed.id, &snapshot).await?;

        let mut status = self.load_status(&feed.id).await?.unwrap_or_default();
        status.record_success(now);
        self.put_json(STATUS_NAMESPACE, &feed.id, &status).await?;

        info!(
            feed_id = %feed.id,
            events = snapshot.events.len(),
            sync_version,
            "feed synced"
        );
        let _ = self.updates.send(CacheUpdate::Synced {
            feed_id: feed.id.clone(),
            sync_version,
            event_count: snapshot.events.len(),
        });
        Ok(snapshot.events)
    }

    async fn fall_back(
        &self,
        feed: &Feed,
        err: NetworkFetchError,
    ) -> SyncResult<Vec<CanonicalEvent>> {
        let now = self.clock.now();
        let mut status = self.load_status(&feed.id).await?.unwrap_or_default();
        status.record_failure(now, err.to_string(), &self.backoff);
        self.put_json(STATUS_NAMESPACE, &feed.id, &status).await?;

        warn!(
            feed_id = %feed.id,
            error = %err,
            failure_count = status.failure_count,
            next_retry_at = ?status.next_retry_at,
            "feed fetch failed, serving cached events"
        );

        match self.load_snapshot(&feed.id).await? {
            Some(snapshot) => Ok(snapshot.events),
            None => Err(SyncError::NoCachedData {
                feed_id: feed.id.clone(),
            }),
        }
    }

    async fn load_snapshot(&self, feed_id: &str) -> SyncResult<Option<CachedFeedSnapshot>> {
        self.get_json(SNAPSHOT_NAMESPACE, feed_id).await
    }

    async fn load_status(&self, feed_id: &str) -> SyncResult<Option<SyncStatus>> {
        self.get_json(STATUS_NAMESPACE, feed_id).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        namespace: &str,
        key: &str,
    ) -> SyncResult<Option<T>> {
        match self.store.get(namespace, key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_json<T: Serialize>(&self, namespace: &str, key: &str, value: &T) -> SyncResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.store.put(namespace, key, bytes).await?;
        Ok(())
    }
}
