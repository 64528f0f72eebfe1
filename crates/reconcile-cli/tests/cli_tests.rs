//! Integration tests for the `reconcile` CLI binary.
//!
//! These tests use `assert_cmd` and `predicates` to exercise every subcommand
//! through the actual binary, including stdin/stdout piping, file I/O and
//! error handling.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper: path to the events.json fixture.
fn events_json_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/events.json")
}

/// Helper: path to the invalid_all_day.json fixture.
fn invalid_all_day_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/invalid_all_day.json")
}

fn events_json() -> String {
    std::fs::read_to_string(events_json_path()).expect("events.json fixture must exist")
}

fn reconcile() -> Command {
    Command::cargo_bin("reconcile").unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolve subcommand
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn resolve_merges_duplicates_from_file() {
    let output = reconcile()
        .args(["resolve", "--zone", "America/New_York", "-i", events_json_path()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let canonical: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let events = canonical.as_array().unwrap();
    assert_eq!(events.len(), 3);

    // 08:30 floating in New York (12:30Z) sorts before the 14:00Z meeting.
    assert_eq!(events[0]["source_event_id"], "local-1");
    assert_eq!(events[1]["source_event_id"], "ical-77");
    assert_eq!(events[1]["source"]["type"], "external-feed");
    assert_eq!(events[1]["merged_from"].as_array().unwrap().len(), 2);
    assert!(events[1]["source"].get("friend_user_id").is_none());
    assert_eq!(events[2]["source_event_id"], "holiday-1");
}

#[test]
fn resolve_stdin_to_stdout() {
    reconcile()
        .arg("resolve")
        .write_stdin(events_json())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"canonical_id\""))
        .stdout(predicate::str::contains("Quarterly planning"))
        .stdout(predicate::str::contains("Quarterly planning (old)").not());
}

#[test]
fn resolve_file_to_file() {
    let output_path = std::env::temp_dir().join("reconcile-test-resolve-output.json");
    let _ = std::fs::remove_file(&output_path);

    reconcile()
        .args(["resolve", "-i", events_json_path(), "-o"])
        .arg(&output_path)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let content = std::fs::read_to_string(&output_path).expect("output file must exist");
    let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 3);

    let _ = std::fs::remove_file(&output_path);
}

#[test]
fn resolve_rejects_unknown_zone() {
    reconcile()
        .args(["resolve", "--zone", "Mars/Olympus_Mons", "-i", events_json_path()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid timezone: Mars/Olympus_Mons"));
}

#[test]
fn resolve_rejects_malformed_json() {
    reconcile()
        .arg("resolve")
        .write_stdin("[{\"id\": ")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse events JSON"));
}

#[test]
fn resolve_missing_input_file() {
    reconcile()
        .args(["resolve", "-i", "/nonexistent/events.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read file"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Floating subcommand
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn floating_resolves_in_zone() {
    reconcile()
        .args(["floating", "2026-06-15T09:00", "--zone", "America/New_York"])
        .assert()
        .success()
        .stdout("2026-06-15T13:00:00Z\n");
}

#[test]
fn floating_inside_gap_shifts_forward() {
    reconcile()
        .args(["floating", "2026-03-08T02:30:00", "--zone", "America/New_York"])
        .assert()
        .success()
        .stdout("2026-03-08T07:30:00Z\n");
}

#[test]
fn floating_repeated_hour_earlier_and_later() {
    reconcile()
        .args(["floating", "2026-11-01T01:30", "--zone", "America/New_York"])
        .assert()
        .success()
        .stdout("2026-11-01T05:30:00Z\n");

    reconcile()
        .args(["floating", "2026-11-01T01:30", "--zone", "America/New_York", "--later"])
        .assert()
        .success()
        .stdout("2026-11-01T06:30:00Z\n");
}

#[test]
fn floating_rejects_bad_wall_clock() {
    reconcile()
        .args(["floating", "yesterday at noon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid wall-clock time"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Day-bounds subcommand
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn day_bounds_on_spring_forward_day() {
    reconcile()
        .args(["day-bounds", "2026-03-08", "--zone", "America/New_York"])
        .assert()
        .success()
        .stdout(predicate::str::contains("start: 2026-03-08T05:00:00.000Z"))
        .stdout(predicate::str::contains("end:   2026-03-09T03:59:59.999Z"));
}

#[test]
fn day_bounds_rejects_bad_date() {
    reconcile()
        .args(["day-bounds", "2026-02-30"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid date"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Validate subcommand
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn validate_passes_clean_input() {
    reconcile()
        .args(["validate", "--zone", "Europe/Berlin", "-i", events_json_path()])
        .assert()
        .success()
        .stdout(predicate::str::contains("All 4 events have valid spans"));
}

#[test]
fn validate_lists_multi_day_all_day_events() {
    reconcile()
        .args(["validate", "-i", invalid_all_day_path()])
        .assert()
        .failure()
        .stdout(predicate::str::contains("conference"))
        .stdout(predicate::str::contains("holiday-1").not())
        .stderr(predicate::str::contains("1 all-day event(s)"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Help
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn help_lists_subcommands() {
    reconcile()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("resolve"))
        .stdout(predicate::str::contains("floating"))
        .stdout(predicate::str::contains("day-bounds"))
        .stdout(predicate::str::contains("validate"));
}
