//! DST transition classification for wall-clock times.
//!
//! A local wall-clock value can be normal (one instant), fall inside a
//! spring-forward gap (no instant), or be ambiguous during fall-back (two
//! instants). [`classify_local`] tells these apart so the resolvers in
//! [`crate::timezone`] can apply one documented convention per case.

use chrono::{DateTime, Duration, NaiveDateTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Farthest we search away from a gap for a valid neighbouring offset.
/// Larger than any real transition (Samoa skipped a whole day in 2011).
const GAP_SEARCH_LIMIT_MINUTES: i64 = 48 * 60;

/// Which instant to use when a wall-clock time occurs twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Occurrence {
    /// The first occurrence, i.e. the earlier UTC instant (pre-transition offset).
    #[default]
    Earlier,
    /// The second occurrence, after clocks were turned back.
    Later,
}

/// How a wall-clock value maps onto a zone's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalTimeKind {
    /// Exactly one instant has this local time.
    Normal(DateTime<Utc>),
    /// The local time was skipped; `size` is how far clocks jumped.
    Gap { size: Duration },
    /// The local time repeats.
    Ambiguous {
        earliest: DateTime<Utc>,
        latest: DateTime<Utc>,
    },
}

/// Classify `wall` in `tz`.
pub fn classify_local(wall: NaiveDateTime, tz: &Tz) -> LocalTimeKind {
    match tz.from_local_datetime(&wall) {
        chrono::LocalResult::Single(dt) => LocalTimeKind::Normal(dt.with_timezone(&Utc)),
        chrono::LocalResult::Ambiguous(a, b) => {
            let (a, b) = (a.with_timezone(&Utc), b.with_timezone(&Utc));
            LocalTimeKind::Ambiguous {
                earliest: a.min(b),
                latest: a.max(b),
            }
        }
        chrono::LocalResult::None => {
            let before = offset_seconds_near(wall, tz, -1);
            let after = offset_seconds_near(wall, tz, 1);
            LocalTimeKind::Gap {
                size: Duration::seconds(i64::from(after - before)),
            }
        }
    }
}

/// UTC offset (in seconds) in effect just before the gap containing `wall`.
///
/// Returns the offset at `wall` itself when `wall` is not in a gap.
pub(crate) fn offset_before_gap(wall: NaiveDateTime, tz: &Tz) -> i32 {
    offset_seconds_near(wall, tz, -1)
}

/// Walk from `wall` one minute at a time in `direction` until a valid local
/// time is found and return its UTC offset.
fn offset_seconds_near(wall: NaiveDateTime, tz: &Tz, direction: i64) -> i32 {
    for step in 0..=GAP_SEARCH_LIMIT_MINUTES {
        let Some(candidate) = wall.checked_add_signed(Duration::minutes(step * direction)) else {
            break;
        };
        if let Some(dt) = tz.from_local_datetime(&candidate).earliest() {
            return dt.offset().fix().local_minus_utc();
        }
    }
    // No valid neighbour within two days or before the calendar's edge: fall
    // back to the offset of the instant that shares `wall`'s digits in UTC.
    tz.offset_from_utc_datetime(&wall).fix().local_minus_utc()
}
