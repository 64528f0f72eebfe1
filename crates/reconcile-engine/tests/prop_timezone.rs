//! Property-based tests for time resolution using proptest.
//!
//! These check invariants over arbitrary dates, times and zone pairs rather
//! than the fixed DST dates in `timezone_tests.rs`.

use chrono::{NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use proptest::prelude::*;
use reconcile_engine::dst::{classify_local, LocalTimeKind};
use reconcile_engine::event::{Event, EventSource, EventTime};
use reconcile_engine::timezone::{
    convert_in, convert_all_day_in, day_bounds_in, local_date, resolve_floating_in,
    validate_all_day_span_in,
};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

const ZONES: &[&str] = &[
    "UTC",
    "America/New_York",
    "America/Los_Angeles",
    "America/Santiago",
    "America/St_Johns",
    "Europe/London",
    "Europe/Berlin",
    "Asia/Tokyo",
    "Asia/Kolkata",
    "Australia/Sydney",
    "Australia/Lord_Howe",
    "Pacific/Auckland",
    "Pacific/Honolulu",
    "Pacific/Kiritimati",
];

fn arb_zone() -> impl Strategy<Value = Tz> {
    prop::sample::select(ZONES).prop_map(|name| name.parse::<Tz>().unwrap())
}

/// Dates in 2024-2028; day capped at 28 to keep every month valid.
fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (2024i32..=2028, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn arb_wall_clock() -> impl Strategy<Value = NaiveDateTime> {
    (arb_date(), 0u32..=23, 0u32..=59)
        .prop_map(|(date, h, min)| date.and_hms_opt(h, min, 0).unwrap())
}

fn all_day_event(date: NaiveDate) -> Event {
    let start = date.and_hms_opt(0, 0, 0).unwrap();
    Event {
        id: "e".to_string(),
        title: "All day".to_string(),
        description: None,
        location: None,
        attendees: vec![],
        start: EventTime::floating(start),
        end: EventTime::floating(start + chrono::Duration::days(1)),
        is_all_day: true,
        feed_id: "f".to_string(),
        feed_name: "F".to_string(),
        external_id: None,
        sequence: None,
        source: EventSource::Local,
        last_modified: None,
    }
}

fn config() -> ProptestConfig {
    ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Property 1: Day bounds carry the requested date in local time
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn day_bounds_stay_on_their_date(date in arb_date(), tz in arb_zone()) {
        let (start, end) = day_bounds_in(date, &tz);
        prop_assert!(start < end);
        prop_assert_eq!(start.with_timezone(&tz).date_naive(), date);
        prop_assert_eq!(end.with_timezone(&tz).date_naive(), date);
    }
}

// ---------------------------------------------------------------------------
// Property 2: Converting an all-day event never changes its calendar date
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn all_day_date_is_zone_invariant(date in arb_date(), from in arb_zone(), to in arb_zone()) {
        let event = all_day_event(date);
        prop_assert!(validate_all_day_span_in(&event, &from));

        let converted = convert_all_day_in(&event, &from, &to);
        prop_assert_eq!(local_date(&converted.start, &to), date);
        prop_assert_eq!(local_date(&converted.end, &to), date);
        prop_assert!(validate_all_day_span_in(&converted, &to));

        let back = convert_all_day_in(&converted, &to, &from);
        prop_assert_eq!(local_date(&back.start, &from), date);
        prop_assert_eq!(local_date(&back.end, &from), date);
    }
}

// ---------------------------------------------------------------------------
// Property 3: Floating times round-trip wherever the local time is unique
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn floating_round_trip(wall in arb_wall_clock(), tz in arb_zone()) {
        let instant = resolve_floating_in(wall, &tz);
        match classify_local(wall, &tz) {
            LocalTimeKind::Normal(_) | LocalTimeKind::Ambiguous { .. } => {
                prop_assert_eq!(instant.with_timezone(&tz).naive_local(), wall);
            }
            LocalTimeKind::Gap { size } => {
                prop_assert_eq!(instant.with_timezone(&tz).naive_local(), wall + size);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Property 4: Conversion is symmetric away from DST anomalies
// ---------------------------------------------------------------------------
proptest! {
    #![proptest_config(config())]

    #[test]
    fn convert_is_symmetric(wall in arb_wall_clock(), a in arb_zone(), b in arb_zone()) {
        let there = convert_in(wall, &a, &b);
        let unique_in_a = matches!(classify_local(wall, &a), LocalTimeKind::Normal(_));
        let unique_in_b = matches!(classify_local(there, &b), LocalTimeKind::Normal(_));
        prop_assume!(unique_in_a && unique_in_b);

        prop_assert_eq!(convert_in(there, &b, &a), wall);
    }
}
