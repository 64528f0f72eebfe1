//! Offline-first feed synchronization.
//!
//! [`SyncCache`] fetches feeds through a [`FeedFetcher`], resolves duplicates,
//! and persists one [`CachedFeedSnapshot`] plus one [`SyncStatus`] per feed in
//! a [`KvStore`]. When a fetch fails the last snapshot is served and the
//! failure is recorded with exponential backoff.

mod background;
pub mod cache;
pub mod clock;
pub mod fetch;
pub mod status;
pub mod store;

pub use cache::{CacheUpdate, FeedOutcomes, SyncCache, SyncCacheBuilder};
pub use clock::{AlwaysOnline, Clock, Connectivity, ManualClock, OnlineFlag, SystemClock};
pub use fetch::{Feed, FeedFetcher};
pub use status::{Backoff, CachedFeedSnapshot, SyncStatus};
pub use store::{KvStore, MemoryStore};
