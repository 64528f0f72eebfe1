//! Floating/zoned time resolution with DST-safe conventions.
//!
//! Every public function taking a `&str` zone validates it first and returns
//! [`ZoneResolutionError`] for identifiers `chrono-tz` does not know. The `_in`
//! variants take an already-parsed [`Tz`] and are total.
//!
//! Conventions:
//! - A wall-clock time inside a spring-forward gap is shifted forward by the
//!   size of the gap (02:30 on a 02:00 to 03:00 gap becomes 03:30).
//! - A wall-clock time that repeats during fall-back resolves to the
//!   **earlier** instant unless [`Occurrence::Later`] is requested.
//! - All-day events are handled on calendar dates, never on clock times, so
//!   their date is the same in every zone.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::dst::{classify_local, offset_before_gap, LocalTimeKind, Occurrence};
use crate::error::{Result, ZoneResolutionError};
use crate::event::{Event, EventTime};

/// Parse an IANA zone identifier (e.g. "America/New_York").
pub fn parse_zone(timezone: &str) -> Result<Tz> {
    timezone
        .parse()
        .map_err(|_| ZoneResolutionError(timezone.to_string()))
}

/// Interpret a zone-less wall-clock value as observed in `timezone`.
///
/// Displaying the result back in `timezone` reproduces `wall_clock` whenever
/// that local time exists exactly once.
pub fn resolve_floating(wall_clock: NaiveDateTime, timezone: &str) -> Result<DateTime<Utc>> {
    let tz = parse_zone(timezone)?;
    Ok(resolve_floating_in(wall_clock, &tz))
}

/// [`resolve_floating`] for a parsed zone.
pub fn resolve_floating_in(wall_clock: NaiveDateTime, tz: &Tz) -> DateTime<Utc> {
    resolve_with(wall_clock, tz, Occurrence::Earlier)
}

/// Re-express a wall-clock time observed in `from` as the wall-clock time in `to`.
///
/// Symmetric (`convert(convert(x, A, B), B, A) == x`) whenever `x` is neither
/// skipped nor repeated in `A`, and the intermediate value is not repeated in `B`.
pub fn convert(wall_clock: NaiveDateTime, from: &str, to: &str) -> Result<NaiveDateTime> {
    let from = parse_zone(from)?;
    let to = parse_zone(to)?;
    Ok(convert_in(wall_clock, &from, &to))
}

/// [`convert`] for parsed zones.
pub fn convert_in(wall_clock: NaiveDateTime, from: &Tz, to: &Tz) -> NaiveDateTime {
    resolve_floating_in(wall_clock, from)
        .with_timezone(to)
        .naive_local()
}

/// Resolve a wall-clock time that may fall inside a spring-forward gap.
///
/// Inside a gap the result is the instant whose local time is `wall_clock`
/// plus the gap size. Outside a gap this behaves like [`resolve_floating`].
pub fn resolve_spring_forward(wall_clock: NaiveDateTime, timezone: &str) -> Result<DateTime<Utc>> {
    let tz = parse_zone(timezone)?;
    Ok(resolve_with(wall_clock, &tz, Occurrence::Earlier))
}

/// Resolve a wall-clock time that may occur twice during fall-back.
///
/// `Occurrence::Earlier` (the default convention) picks the first occurrence,
/// i.e. the pre-transition offset; `Occurrence::Later` picks the second.
pub fn resolve_fall_back(
    wall_clock: NaiveDateTime,
    timezone: &str,
    occurrence: Occurrence,
) -> Result<DateTime<Utc>> {
    let tz = parse_zone(timezone)?;
    Ok(resolve_with(wall_clock, &tz, occurrence))
}

fn resolve_with(wall_clock: NaiveDateTime, tz: &Tz, occurrence: Occurrence) -> DateTime<Utc> {
    match classify_local(wall_clock, tz) {
        LocalTimeKind::Normal(instant) => instant,
        LocalTimeKind::Ambiguous { earliest, latest } => match occurrence {
            Occurrence::Earlier => earliest,
            Occurrence::Later => latest,
        },
        LocalTimeKind::Gap { .. } => {
            // Reading the wall clock with the pre-gap offset lands exactly
            // `gap` past it on the post-gap side.
            let offset = offset_before_gap(wall_clock, tz);
            match wall_clock.checked_sub_signed(Duration::seconds(i64::from(offset))) {
                Some(utc) => Utc.from_utc_datetime(&utc),
                // Only reachable at the edges of the representable range.
                None if offset < 0 => DateTime::<Utc>::MAX_UTC,
                None => DateTime::<Utc>::MIN_UTC,
            }
        }
    }
}

/// Start (local 00:00:00) and end (local 23:59:59.999) of `date` in `timezone`.
pub fn day_bounds(date: NaiveDate, timezone: &str) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let tz = parse_zone(timezone)?;
    Ok(day_bounds_in(date, &tz))
}

/// [`day_bounds`] for a parsed zone.
///
/// When local midnight is skipped, the day starts at the first valid instant.
/// The end is one millisecond before the next day's start, so both bounds
/// always carry `date` as their local calendar date.
pub fn day_bounds_in(date: NaiveDate, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = start_of_day(date, tz);
    let next_start = match date.succ_opt() {
        Some(next) => start_of_day(next, tz),
        None => start
            .checked_add_signed(Duration::days(1))
            .unwrap_or(DateTime::<Utc>::MAX_UTC),
    };
    let end = next_start
        .checked_sub_signed(Duration::milliseconds(1))
        .unwrap_or(start);
    (start, end)
}

fn start_of_day(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    resolve_with(date.and_time(NaiveTime::MIN), tz, Occurrence::Earlier)
}

/// The instant an [`EventTime`] denotes; floating values are read in `tz`.
pub fn instant_of(time: &EventTime, tz: &Tz) -> DateTime<Utc> {
    match time {
        EventTime::Zoned { at } => *at,
        EventTime::Floating { wall_clock } => resolve_floating_in(*wall_clock, tz),
    }
}

/// The local calendar date of an [`EventTime`] in `tz`.
///
/// Floating values keep their own date; zone is irrelevant for them.
pub fn local_date(time: &EventTime, tz: &Tz) -> NaiveDate {
    match time {
        EventTime::Zoned { at } => at.with_timezone(tz).date_naive(),
        EventTime::Floating { wall_clock } => wall_clock.date(),
    }
}

/// Check that an all-day event covers a single calendar date in `timezone`.
///
/// Both the inclusive (`23:59:59.999`) and the iCalendar exclusive (next
/// midnight) end conventions are accepted. Events that are not all-day are
/// always valid.
pub fn validate_all_day_span(event: &Event, timezone: &str) -> Result<bool> {
    let tz = parse_zone(timezone)?;
    Ok(validate_all_day_span_in(event, &tz))
}

/// [`validate_all_day_span`] for a parsed zone.
pub fn validate_all_day_span_in(event: &Event, tz: &Tz) -> bool {
    if !event.is_all_day {
        return true;
    }

    let start = instant_of(&event.start, tz);
    let end = instant_of(&event.end, tz);
    if end < start {
        return false;
    }

    let (day_start, day_end) = day_bounds_in(local_date(&event.start, tz), tz);
    let next_day_start = day_end.checked_add_signed(Duration::milliseconds(1));
    start >= day_start && (end <= day_end || Some(end) == next_day_start)
}

/// Move an all-day event from `from` to `to`, keeping its calendar dates.
///
/// The returned event has zoned bounds produced by [`day_bounds_in`] in `to`.
pub fn convert_all_day(event: &Event, from: &str, to: &str) -> Result<Event> {
    let from = parse_zone(from)?;
    let to = parse_zone(to)?;
    Ok(convert_all_day_in(event, &from, &to))
}

/// [`convert_all_day`] for parsed zones. Non-all-day events are returned as-is.
pub fn convert_all_day_in(event: &Event, from: &Tz, to: &Tz) -> Event {
    if !event.is_all_day {
        return event.clone();
    }

    let start_date = local_date(&event.start, from);
    let end_date = last_covered_date(event, from).max(start_date);

    let mut converted = event.clone();
    converted.start = EventTime::zoned(day_bounds_in(start_date, to).0);
    converted.end = EventTime::zoned(day_bounds_in(end_date, to).1);
    converted
}

/// The last date an all-day event covers, treating a midnight end as exclusive.
fn last_covered_date(event: &Event, tz: &Tz) -> NaiveDate {
    let end_date = local_date(&event.end, tz);
    let end = instant_of(&event.end, tz);
    let (end_day_start, _) = day_bounds_in(end_date, tz);
    if end == end_day_start && end > instant_of(&event.start, tz) {
        end_date.pred_opt().unwrap_or(end_date)
    } else {
        end_date
    }
}
