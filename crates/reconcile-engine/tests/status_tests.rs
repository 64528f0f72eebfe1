//! Tests for retry backoff and per-feed sync status bookkeeping.

use chrono::{Duration, TimeZone, Utc};
use reconcile_engine::sync::{Backoff, SyncStatus};

#[test]
fn delay_doubles_per_failure() {
    let backoff = Backoff::default();
    assert_eq!(backoff.delay_ms(1), 2_000);
    assert_eq!(backoff.delay_ms(2), 4_000);
    assert_eq!(backoff.delay_ms(3), 8_000);
}

#[test]
fn delay_is_capped_at_thirty_minutes() {
    let backoff = Backoff::default();
    assert_eq!(backoff.delay_ms(11), 1_800_000);
    assert_eq!(backoff.delay_ms(40), 1_800_000);
    assert_eq!(backoff.delay_ms(u32::MAX), 1_800_000);
    assert_eq!(backoff.delay(u32::MAX), Duration::minutes(30));
}

#[test]
fn success_resets_failures() {
    let now = Utc.with_ymd_and_hms(2026, 3, 16, 9, 0, 0).unwrap();
    let mut status = SyncStatus::default();
    status.record_failure(now, "boom".into(), &Backoff::default());
    status.record_failure(now, "boom".into(), &Backoff::default());
    assert_eq!(status.failure_count, 2);
    assert!(status.in_backoff(now));

    status.record_success(now);
    assert_eq!(status.failure_count, 0);
    assert_eq!(status.next_retry_at, None);
    assert_eq!(status.last_error, None);
    assert!(!status.in_backoff(now));
}
