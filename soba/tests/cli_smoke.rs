//! Binary smoke tests for the `soba` CLI.
//!
//! These run the actual compiled binary via `assert_cmd` against a temp
//! `SOBA_DIR`, so they catch regressions like "soba status crashes when
//! nothing has ever run" without needing a real GitHub repo or tmux.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[allow(deprecated)]
fn soba() -> Command {
    Command::cargo_bin("soba").unwrap()
}

// ── Binary builds and runs ──────────────────────────────────────────────────

#[test]
fn binary_exists() {
    soba();
}

// ── Help ────────────────────────────────────────────────────────────────────

#[test]
fn help_flag() {
    soba()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("GitHub issue workflow daemon"));
}

#[test]
fn help_lists_subcommands() {
    let output = soba().arg("--help").output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in &["start", "stop", "status", "open", "monitor"] {
        assert!(
            stdout.contains(cmd),
            "help text should mention '{cmd}' subcommand"
        );
    }
}

#[test]
fn version_flag() {
    soba().arg("--version").assert().success();
}

// ── Status ──────────────────────────────────────────────────────────────────

#[test]
fn status_with_no_prior_run_reports_not_running() {
    let dir = TempDir::new().unwrap();
    soba()
        .arg("status")
        .env("SOBA_DIR", dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("not running"));
}

#[test]
fn status_json_with_no_prior_run() {
    let dir = TempDir::new().unwrap();
    soba()
        .args(["status", "--json"])
        .env("SOBA_DIR", dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"running\": false"));
}

// ── Stop ────────────────────────────────────────────────────────────────────

#[test]
fn stop_with_no_pid_file_reports_not_running_and_fails() {
    let dir = TempDir::new().unwrap();
    soba()
        .arg("stop")
        .env("SOBA_DIR", dir.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("not running"));
}

#[test]
fn stop_removes_stale_pid_file_for_dead_process() {
    let dir = TempDir::new().unwrap();
    // pid 1 is (almost always) not a process this test owns, but to avoid
    // any flakiness around pid 1's special status we pick a pid unlikely to
    // be alive and not sensitive to platform: a freshly-made temp dir's
    // inode number plus a large offset would still collide eventually, so
    // instead spawn and immediately reap a child and reuse its now-dead pid.
    let child = std::process::Command::new("true")
        .spawn()
        .expect("failed to spawn helper process");
    let dead_pid = child.id();
    let mut child = child;
    child.wait().unwrap();

    std::fs::write(dir.path().join("soba.pid"), dead_pid.to_string()).unwrap();

    soba()
        .arg("stop")
        .env("SOBA_DIR", dir.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("not running"));
}

// ── Start without a config ──────────────────────────────────────────────────

#[test]
fn start_without_config_file_fails_with_actionable_message() {
    let dir = TempDir::new().unwrap();
    let cwd = TempDir::new().unwrap();
    soba()
        .args(["start", "--no-tmux"])
        .env("SOBA_DIR", dir.path())
        .current_dir(cwd.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("default_yaml"));
}

// ── Monitor ─────────────────────────────────────────────────────────────────

#[test]
fn monitor_without_cleanup_lists_sessions() {
    let dir = TempDir::new().unwrap();
    let cwd = TempDir::new().unwrap();
    std::fs::write(
        cwd.path().join("soba-config.yml"),
        "github:\n  repository: \"o/r\"\n  token: \"x\"\n",
    )
    .unwrap();
    // `tmux` may not be installed in this environment; either a clean empty
    // listing or a failed tmux invocation are both acceptable here, as long
    // as the binary doesn't panic.
    let _ = soba()
        .args(["monitor", "--config"])
        .arg(cwd.path().join("soba-config.yml"))
        .env("SOBA_DIR", dir.path())
        .output();
}

// ── Unknown subcommand ──────────────────────────────────────────────────────

#[test]
fn unknown_subcommand_fails() {
    soba()
        .arg("nonexistent-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}
