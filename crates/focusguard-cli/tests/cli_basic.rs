//! Basic CLI E2E tests.
//!
//! Each test runs the binary with HOME pointed at its own temp directory, so
//! storage and config never leak between tests.

use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_focusguard-cli"))
        .args(args)
        .env("HOME", home)
        .env("FOCUSGUARD_ENV", "dev")
        .env_remove("FOCUSGUARD_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(home: &Path, args: &[&str]) -> Value {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

#[test]
fn test_status_on_fresh_profile() {
    let home = TempDir::new().unwrap();
    let status = run_json(home.path(), &["blocking", "status"]);
    assert_eq!(status["enabled"], false);
    assert_eq!(status["session"], "off");
    assert_eq!(status["blockedSites"], serde_json::json!([]));
}

#[test]
fn test_site_add_and_list() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["site", "add", "www.YouTube.com/"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("*youtube.com"));

    run_cli(home.path(), &["site", "add", "https://reddit.com"]);
    let sites = run_json(home.path(), &["site", "list"]);
    assert_eq!(sites, serde_json::json!(["https://reddit.com", "*youtube.com"]));
}

#[test]
fn test_duplicate_site_fails() {
    let home = TempDir::new().unwrap();
    run_cli(home.path(), &["site", "add", "youtube.com"]);
    let (_, stderr, code) = run_cli(home.path(), &["site", "add", "*youtube.com"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error"));
}

#[test]
fn test_blocking_on_with_duration() {
    let home = TempDir::new().unwrap();
    let status = run_json(home.path(), &["blocking", "on", "--duration", "25"]);
    assert_eq!(status["enabled"], true);
    assert_eq!(status["duration"], "25");
    assert_eq!(status["session"], "running");
    assert!(status["endTime"].as_i64().is_some());
    let remaining = status["remainingMs"].as_i64().unwrap();
    assert!(remaining > 24 * 60_000 && remaining <= 25 * 60_000);

    // Still running in the next invocation.
    let status = run_json(home.path(), &["blocking", "status"]);
    assert_eq!(status["enabled"], true);
    assert_eq!(status["session"], "running");
}

#[test]
fn test_blocking_off_ends_session() {
    let home = TempDir::new().unwrap();
    run_json(home.path(), &["blocking", "on"]);
    let status = run_json(home.path(), &["blocking", "off"]);
    assert_eq!(status["enabled"], false);
    assert_eq!(status["session"], "off");
    assert!(status["endTime"].is_null());
}

#[test]
fn test_invalid_duration_rejected() {
    let home = TempDir::new().unwrap();
    let (_, _, code) = run_cli(home.path(), &["blocking", "on", "--duration", "0"]);
    assert_ne!(code, 0);
}

#[test]
fn test_site_list_locked_while_blocking() {
    let home = TempDir::new().unwrap();
    run_cli(home.path(), &["site", "add", "youtube.com"]);
    run_json(home.path(), &["blocking", "on"]);

    let (_, _, code) = run_cli(home.path(), &["site", "remove", "youtube.com"]);
    assert_ne!(code, 0);

    run_json(home.path(), &["blocking", "off"]);
    let (stdout, _, code) = run_cli(home.path(), &["site", "remove", "youtube.com"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("removed"));
}

#[test]
fn test_lock_pauses_and_unlock_resumes() {
    let home = TempDir::new().unwrap();
    run_json(home.path(), &["blocking", "on"]);

    let status = run_json(home.path(), &["idle", "locked"]);
    assert_eq!(status["session"], "paused");

    let status = run_json(home.path(), &["idle", "active"]);
    assert_eq!(status["session"], "running");
}

#[test]
fn test_tick_keeps_session_running() {
    let home = TempDir::new().unwrap();
    run_json(home.path(), &["blocking", "on", "--duration", "60"]);
    let status = run_json(home.path(), &["tick"]);
    assert_eq!(status["enabled"], true);
    assert_eq!(status["session"], "running");
}

#[test]
fn test_stats_summary() {
    let home = TempDir::new().unwrap();
    let summary = run_json(home.path(), &["stats", "summary"]);
    assert!(summary.is_object());
    let ledger = run_json(home.path(), &["stats", "ledger"]);
    assert_eq!(ledger["totalMinutes"], 0);
}

#[test]
fn test_export_and_import() {
    let source = TempDir::new().unwrap();
    run_cli(source.path(), &["site", "add", "youtube.com"]);
    let file = source.path().join("backup.json");
    let (_, _, code) = run_cli(
        source.path(),
        &["export", "--output", file.to_str().unwrap()],
    );
    assert_eq!(code, 0);

    let target = TempDir::new().unwrap();
    let summary = run_json(target.path(), &["import", file.to_str().unwrap()]);
    assert_eq!(summary["sitesAdded"], 1);
    let sites = run_json(target.path(), &["site", "list"]);
    assert_eq!(sites, serde_json::json!(["*youtube.com"]));
}

#[test]
fn test_export_with_no_sites_fails() {
    let home = TempDir::new().unwrap();
    let (_, _, code) = run_cli(home.path(), &["export"]);
    assert_ne!(code, 0);
}

#[test]
fn test_config_get_set() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "session.gap_threshold_minutes"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "30");

    let (_, _, code) = run_cli(
        home.path(),
        &["config", "set", "session.gap_threshold_minutes", "45"],
    );
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(home.path(), &["config", "get", "session.gap_threshold_minutes"]);
    assert_eq!(stdout.trim(), "45");
}

#[test]
fn test_config_rejects_zero_and_unknown_keys() {
    let home = TempDir::new().unwrap();
    let (_, _, code) = run_cli(home.path(), &["config", "set", "stats.retention_days", "0"]);
    assert_ne!(code, 0);
    let (_, _, code) = run_cli(home.path(), &["config", "get", "no.such_key"]);
    assert_ne!(code, 0);
}

#[test]
fn test_config_path_uses_dev_dir() {
    let home = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["config", "path"]);
    assert_eq!(code, 0);
    assert!(stdout.trim().ends_with("focusguard-dev/config.toml"));
}
