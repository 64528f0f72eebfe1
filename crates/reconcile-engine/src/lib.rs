//! # reconcile-engine
//!
//! Calendar event reconciliation with DST-safe time handling and an
//! offline-first feed cache.
//!
//! Events arrive from the user's own calendar, from external feed imports and
//! from friends' mirrored calendars. The engine merges duplicates into one
//! canonical timeline, resolves floating times across zones and DST
//! transitions, and keeps a persisted copy per feed that stays usable when the
//! network is not.
//!
//! ## Modules
//!
//! - [`timezone`] - floating ↔ zoned conversion, DST gaps and overlaps, all-day bounds
//! - [`dst`] - classification of wall-clock times around DST transitions
//! - [`dedup`] - duplicate grouping and canonical winner selection
//! - [`event`] - source events and canonical events
//! - [`sync`] - per-feed cache, retry backoff, background and focus refresh
//! - [`config`] - sync tunables loaded from TOML
//! - [`error`] - Error types

pub mod config;
pub mod dedup;
pub mod dst;
pub mod error;
pub mod event;
pub mod sync;
pub mod timezone;

pub use config::SyncConfig;
pub use dedup::DuplicateResolver;
pub use dst::Occurrence;
pub use error::{ConfigError, NetworkFetchError, StoreError, SyncError, ZoneResolutionError};
pub use event::{CanonicalEvent, Event, EventSource, EventTime, FriendAttribution, SourceRef};
pub use sync::{Feed, FeedFetcher, KvStore, SyncCache};
pub use timezone::{
    convert, day_bounds, resolve_fall_back, resolve_floating, resolve_spring_forward,
    validate_all_day_span,
};
