//! End-to-end tests driving the real binary.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn updater() -> Command {
    let mut cmd = Command::cargo_bin("moviebot-updater").unwrap();
    // Keep the host environment out of the tests.
    cmd.env_remove("UPDATE_SOURCE_URL");
    cmd.env_remove("AUTO_UPDATE");
    cmd.env("UPDATER_SPAWN", "0");
    cmd
}

#[test]
fn help_lists_all_subcommands() {
    updater()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("apply"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn check_without_source_reports_not_configured() {
    let dir = TempDir::new().unwrap();
    updater()
        .args(["check", "--app-dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No update source configured"));
}

#[test]
fn check_respects_auto_update_kill_switch() {
    let dir = TempDir::new().unwrap();
    updater()
        .env("AUTO_UPDATE", "0")
        .env("UPDATE_SOURCE_URL", "https://releases.invalid/versions/")
        .args(["check", "--app-dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("disabled"));
}

#[test]
fn check_degrades_unreachable_source_to_no_update() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("VERSION"), "v1.0.0").unwrap();
    // A reserved .invalid domain never resolves; the check must still
    // exit zero and simply report nothing new.
    updater()
        .args(["check", "--source", "https://releases.invalid/versions/", "--app-dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("v1.0.0"));
}

#[test]
fn apply_without_source_fails_with_guidance() {
    let dir = TempDir::new().unwrap();
    updater()
        .args(["apply", "--yes", "--app-dir"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("UPDATE_SOURCE_URL"));
}

#[test]
fn apply_refuses_while_lock_marker_present() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".updating.lock"), "1").unwrap();
    updater()
        .args(["apply", "--yes", "--source", "https://releases.invalid/versions/", "--app-dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("already in progress"));
}

#[test]
fn run_with_missing_plan_fails() {
    let dir = TempDir::new().unwrap();
    updater()
        .args(["run", "--plan"])
        .arg(dir.path().join("nonexistent.json"))
        .assert()
        .failure();
}

#[test]
fn run_executes_a_staged_plan_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let app = tmp.path().join("app");
    let staging = tmp.path().join("staging");
    fs::create_dir_all(app.join("app/web")).unwrap();
    fs::create_dir_all(&staging).unwrap();

    // Live installation.
    fs::write(app.join("VERSION"), "v1.0.0").unwrap();
    fs::write(app.join("main.py"), "old entry").unwrap();
    fs::write(app.join("app/web/stale.py"), "drop me").unwrap();
    fs::write(app.join(".env"), "TOKEN=secret").unwrap();

    // Staged payload.
    fs::write(staging.join("main.py"), "new entry").unwrap();
    fs::create_dir_all(staging.join("app")).unwrap();
    fs::write(staging.join("app/catalog.py"), "catalog").unwrap();
    fs::write(staging.join("delete"), "app/web/stale.py\n../escape.txt\n").unwrap();

    let plan_path = tmp.path().join("plan.json");
    write_plan(&plan_path, &app, &staging);

    updater()
        .args(["run", "--plan"])
        .arg(&plan_path)
        .assert()
        .success();

    assert_eq!(fs::read_to_string(app.join("VERSION")).unwrap(), "v1.1.0");
    assert_eq!(fs::read_to_string(app.join("main.py")).unwrap(), "new entry");
    assert_eq!(fs::read_to_string(app.join("app/catalog.py")).unwrap(), "catalog");
    assert!(!app.join("app/web/stale.py").exists());
    // Excluded secrets survive untouched.
    assert_eq!(fs::read_to_string(app.join(".env")).unwrap(), "TOKEN=secret");
    // A pre-mutation backup was taken.
    let backups: Vec<_> = fs::read_dir(app.join("backups"))
        .unwrap()
        .flatten()
        .collect();
    assert_eq!(backups.len(), 1);
    // Transients are consumed and the lock marker is gone.
    assert!(!plan_path.exists());
    assert!(!staging.exists());
    assert!(!app.join(".updating.lock").exists());
    // The persistent log recorded the run.
    let log = fs::read_to_string(app.join("logs/updater.log")).unwrap();
    assert!(log.contains("Update applied"));
}

fn write_plan(path: &Path, app: &Path, staging: &Path) {
    let plan = serde_json::json!({
        "app_dir": app,
        "dir": staging,
        "version": "v1.1.0",
        "exclude": [],
        "post_install": [],
        "cleanup_dir": true,
    });
    fs::write(path, serde_json::to_vec_pretty(&plan).unwrap()).unwrap();
}
