//! Collapse events from overlapping feeds into one canonical record per
//! logical event.
//!
//! Events sharing an external id (exact, case-sensitive) form a group. The
//! group's winner is chosen by, in order:
//!
//! 1. higher `sequence` (absent sorts below any value),
//! 2. source priority `external-feed > friend > local`,
//! 3. later `last_modified` (absent sorts below any value),
//! 4. a fixed lexical fallback: smallest `feed_id`, then smallest source `id`,
//!    then earliest start, then the stored start and end values, then the
//!    remaining descriptive fields.
//!
//! Nothing depends on input order: the same multiset of events always yields
//! the same canonical set, in the same order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::Result;
use crate::event::{CanonicalEvent, Event, EventTime, SourceRef};
use crate::timezone::{instant_of, parse_zone};

/// Length of the hex-encoded canonical id.
const CANONICAL_ID_LEN: usize = 32;

/// Groups duplicate events and picks one representative per group.
///
/// The zone is only used to place floating times on the timeline for ordering
/// and tie-breaking; it never alters the events themselves.
#[derive(Debug, Clone)]
pub struct DuplicateResolver {
    tz: Tz,
}

/// An event plus the provenance it already carries.
struct Candidate {
    event: Event,
    merged_from: BTreeSet<SourceRef>,
}

impl DuplicateResolver {
    /// Build a resolver that reads floating times in `timezone`.
    ///
    /// # Errors
    /// Returns `ZoneResolutionError` if `timezone` is not a valid IANA identifier.
    pub fn new(timezone: &str) -> Result<Self> {
        Ok(Self::with_zone(parse_zone(timezone)?))
    }

    pub fn with_zone(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn zone(&self) -> Tz {
        self.tz
    }

    /// Resolve raw source events into canonical events.
    pub fn resolve(&self, events: &[Event]) -> Vec<CanonicalEvent> {
        let candidates = events
            .iter()
            .map(|event| Candidate {
                event: event.clone(),
                merged_from: BTreeSet::from([event.source_ref()]),
            })
            .collect();
        self.resolve_candidates(candidates)
    }

    /// Re-resolve canonical events, keeping their `merged_from` provenance.
    ///
    /// Resolving a set that already holds one record per external id returns
    /// it unchanged.
    pub fn resolve_canonical(&self, events: &[CanonicalEvent]) -> Vec<CanonicalEvent> {
        let candidates = events
            .iter()
            .map(|canonical| Candidate {
                event: canonical.to_event(),
                merged_from: canonical.merged_from.clone(),
            })
            .collect();
        self.resolve_candidates(candidates)
    }

    /// Order two events by precedence; `Greater` means `a` wins.
    pub fn precedence(&self, a: &Event, b: &Event) -> Ordering {
        a.sequence
            .cmp(&b.sequence)
            .then_with(|| a.source.priority().cmp(&b.source.priority()))
            .then_with(|| a.last_modified.cmp(&b.last_modified))
            // Past this point the smaller key wins, hence the reversed operands.
            .then_with(|| self.tiebreak_key(b).cmp(&self.tiebreak_key(a)))
    }

    fn resolve_candidates(&self, candidates: Vec<Candidate>) -> Vec<CanonicalEvent> {
        let mut groups: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();
        let mut standalone: Vec<Candidate> = Vec::new();

        for candidate in candidates {
            match candidate.event.grouping_key() {
                Some(key) => groups.entry(key.to_string()).or_default().push(candidate),
                None => standalone.push(candidate),
            }
        }

        let group_count = groups.len();
        let standalone_count = standalone.len();
        let mut resolved: Vec<CanonicalEvent> = Vec::with_capacity(group_count + standalone_count);

        for (external_id, members) in groups {
            let merged_from: BTreeSet<SourceRef> = members
                .iter()
                .flat_map(|c| c.merged_from.iter().cloned())
                .collect();
            let winner = members
                .iter()
                .map(|c| &c.event)
                .max_by(|a, b| self.precedence(a, b));
            if let Some(winner) = winner {
                let id = canonical_id(&external_id, &winner.feed_id);
                resolved.push(CanonicalEvent::from_winner(id, winner, merged_from));
            }
        }

        for candidate in standalone {
            let id = standalone_id(&candidate.event.feed_id, &candidate.event.id);
            resolved.push(CanonicalEvent::from_winner(
                id,
                &candidate.event,
                candidate.merged_from,
            ));
        }

        resolved.sort_by(|a, b| {
            instant_of(&a.start, &self.tz)
                .cmp(&instant_of(&b.start, &self.tz))
                .then_with(|| a.canonical_id.cmp(&b.canonical_id))
                .then_with(|| self.precedence(&b.to_event(), &a.to_event()))
        });

        debug!(
            groups = group_count,
            standalone = standalone_count,
            canonical = resolved.len(),
            "resolved duplicate events"
        );
        resolved
    }

    fn tiebreak_key<'a>(&self, event: &'a Event) -> TiebreakKey<'a> {
        TiebreakKey {
            feed_id: &event.feed_id,
            id: &event.id,
            external_id: event.external_id.as_deref(),
            start: instant_of(&event.start, &self.tz),
            end: instant_of(&event.end, &self.tz),
            start_raw: raw_time(&event.start),
            end_raw: raw_time(&event.end),
            title: &event.title,
            description: event.description.as_deref(),
            location: event.location.as_deref(),
            attendees: &event.attendees,
            feed_name: &event.feed_name,
            is_all_day: event.is_all_day,
            friend: event.source.friend().map(|f| {
                (
                    f.friend_user_id.as_str(),
                    f.friend_username.as_str(),
                    f.original_event_id.as_str(),
                )
            }),
        }
    }
}

/// Fields compared, in order, once sequence, source and modification time tie.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct TiebreakKey<'a> {
    feed_id: &'a str,
    id: &'a str,
    external_id: Option<&'a str>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    // A gap wall clock and the time it shifts to share an instant.
    start_raw: (bool, NaiveDateTime),
    end_raw: (bool, NaiveDateTime),
    title: &'a str,
    description: Option<&'a str>,
    location: Option<&'a str>,
    attendees: &'a [String],
    feed_name: &'a str,
    is_all_day: bool,
    friend: Option<(&'a str, &'a str, &'a str)>,
}

/// An event time as stored: floating wall clocks and UTC instants never
/// compare equal.
fn raw_time(time: &EventTime) -> (bool, NaiveDateTime) {
    match time {
        EventTime::Floating { wall_clock } => (true, *wall_clock),
        EventTime::Zoned { at } => (false, at.naive_utc()),
    }
}

/// Canonical id of a group: a hash of its external id and the winner's feed.
pub fn canonical_id(external_id: &str, feed_id: &str) -> String {
    hash_id(&["ext", external_id, feed_id])
}

/// Canonical id of an event that has no usable external id.
pub fn standalone_id(feed_id: &str, event_id: &str) -> String {
    hash_id(&["src", feed_id, event_id])
}

fn hash_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0x1f]);
        }
        hasher.update(part.as_bytes());
    }
    let mut id = hex::encode(hasher.finalize());
    id.truncate(CANONICAL_ID_LEN);
    id
}
