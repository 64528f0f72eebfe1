//! Tests for classifying wall-clock times around DST transitions.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use reconcile_engine::dst::{classify_local, LocalTimeKind};

fn wall(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

#[test]
fn spring_forward_gap_is_one_hour_in_new_york() {
    let tz: Tz = "America/New_York".parse().unwrap();
    assert_eq!(
        classify_local(wall(2026, 3, 8, 2, 30), &tz),
        LocalTimeKind::Gap {
            size: Duration::hours(1)
        }
    );
}

#[test]
fn lord_howe_gap_is_thirty_minutes() {
    let tz: Tz = "Australia/Lord_Howe".parse().unwrap();
    // Lord Howe springs forward from 02:00 to 02:30 on the first Sunday of October.
    assert_eq!(
        classify_local(wall(2026, 10, 4, 2, 10), &tz),
        LocalTimeKind::Gap {
            size: Duration::minutes(30)
        }
    );
}

#[test]
fn fall_back_hour_is_ambiguous() {
    let tz: Tz = "America/New_York".parse().unwrap();
    match classify_local(wall(2026, 11, 1, 1, 30), &tz) {
        LocalTimeKind::Ambiguous { earliest, latest } => {
            assert_eq!(latest - earliest, Duration::hours(1));
        }
        other => panic!("expected ambiguous, got {other:?}"),
    }
}

#[test]
fn ordinary_time_is_normal() {
    let tz: Tz = "Europe/Berlin".parse().unwrap();
    assert!(matches!(
        classify_local(wall(2026, 6, 1, 12, 0), &tz),
        LocalTimeKind::Normal(_)
    ));
}

#[test]
fn calendar_extremes_classify_without_panicking() {
    for zone in ["America/New_York", "Asia/Tokyo", "Australia/Lord_Howe"] {
        let tz: Tz = zone.parse().unwrap();
        classify_local(NaiveDateTime::MAX, &tz);
        classify_local(NaiveDateTime::MIN, &tz);
    }
}
