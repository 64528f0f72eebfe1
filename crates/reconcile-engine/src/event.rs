//! Event records as they arrive from feeds, and the canonical records produced
//! by duplicate resolution.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A start or end time as reported by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventTime {
    /// An instant with an explicit zone, normalized to UTC.
    Zoned { at: DateTime<Utc> },
    /// A wall-clock value to be read in a caller-supplied zone.
    Floating { wall_clock: NaiveDateTime },
}

impl EventTime {
    pub fn zoned(at: DateTime<Utc>) -> Self {
        EventTime::Zoned { at }
    }

    pub fn floating(wall_clock: NaiveDateTime) -> Self {
        EventTime::Floating { wall_clock }
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, EventTime::Floating { .. })
    }
}

/// Attribution carried by events mirrored from a friend's calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendAttribution {
    pub friend_user_id: String,
    pub friend_username: String,
    /// The event's id in the friend's own calendar.
    pub original_event_id: String,
}

/// Where an event came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventSource {
    Local,
    ExternalFeed,
    Friend(FriendAttribution),
}

impl EventSource {
    /// Rank used when duplicates tie on sequence: external feed > friend > local.
    pub fn priority(&self) -> u8 {
        match self {
            EventSource::ExternalFeed => 2,
            EventSource::Friend(_) => 1,
            EventSource::Local => 0,
        }
    }

    pub fn friend(&self) -> Option<&FriendAttribution> {
        match self {
            EventSource::Friend(attribution) => Some(attribution),
            EventSource::Local | EventSource::ExternalFeed => None,
        }
    }
}

/// One event record from one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Source-scoped identifier; not unique across feeds.
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
    pub start: EventTime,
    pub end: EventTime,
    #[serde(default)]
    pub is_all_day: bool,
    pub feed_id: String,
    pub feed_name: String,
    /// Stable identifier issued by the source (an iCal UID, a friend's event id).
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub sequence: Option<u32>,
    pub source: EventSource,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

impl Event {
    /// The external id usable as a grouping key; empty ids do not count.
    pub fn grouping_key(&self) -> Option<&str> {
        self.external_id.as_deref().filter(|id| !id.is_empty())
    }

    /// This record's entry in a canonical event's `merged_from` set.
    pub fn source_ref(&self) -> SourceRef {
        SourceRef {
            feed_id: self.feed_id.clone(),
            external_id: self.external_id.clone(),
        }
    }
}

/// A `(feed_id, external_id)` pair that collapsed into a canonical event.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub feed_id: String,
    pub external_id: Option<String>,
}

/// The single representative chosen for a group of duplicate events.
///
/// Every descriptive field comes from the winning record; losers contribute
/// only their [`SourceRef`] to `merged_from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub canonical_id: String,
    /// `id` of the winning source record.
    pub source_event_id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub attendees: Vec<String>,
    pub start: EventTime,
    pub end: EventTime,
    pub is_all_day: bool,
    pub feed_id: String,
    pub feed_name: String,
    pub external_id: Option<String>,
    pub sequence: Option<u32>,
    pub source: EventSource,
    pub last_modified: Option<DateTime<Utc>>,
    pub merged_from: BTreeSet<SourceRef>,
}

impl CanonicalEvent {
    pub(crate) fn from_winner(
        canonical_id: String,
        winner: &Event,
        merged_from: BTreeSet<SourceRef>,
    ) -> Self {
        CanonicalEvent {
            canonical_id,
            source_event_id: winner.id.clone(),
            title: winner.title.clone(),
            description: winner.description.clone(),
            location: winner.location.clone(),
            attendees: winner.attendees.clone(),
            start: winner.start,
            end: winner.end,
            is_all_day: winner.is_all_day,
            feed_id: winner.feed_id.clone(),
            feed_name: winner.feed_name.clone(),
            external_id: winner.external_id.clone(),
            sequence: winner.sequence,
            source: winner.source.clone(),
            last_modified: winner.last_modified,
            merged_from,
        }
    }

    /// Friend attribution, present only when the winner was a friend mirror.
    pub fn friend(&self) -> Option<&FriendAttribution> {
        self.source.friend()
    }

    /// The winning source record this canonical event was built from.
    pub fn to_event(&self) -> Event {
        Event {
            id: self.source_event_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            attendees: self.attendees.clone(),
            start: self.start,
            end: self.end,
            is_all_day: self.is_all_day,
            feed_id: self.feed_id.clone(),
            feed_name: self.feed_name.clone(),
            external_id: self.external_id.clone(),
            sequence: self.sequence,
            source: self.source.clone(),
            last_modified: self.last_modified,
        }
    }
}
