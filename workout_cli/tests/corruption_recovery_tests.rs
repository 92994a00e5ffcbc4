//! Corruption recovery tests for wtrack.
//!
//! These tests verify the system can handle:
//! - Corrupted store files
//! - Stored data that breaks domain rules
//! - Corrupted queue lines
//! - Missing files

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write as IoWrite;
use tempfile::TempDir;
use uuid::Uuid;
use workout_core::FileStore;

fn cli(dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("wtrack"));
    cmd.env("XDG_CONFIG_HOME", dir.path().join("config"))
        .arg("--data-dir")
        .arg(dir.path().join("data"));
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

#[test]
fn test_corrupted_store_is_an_error() {
    let temp_dir = setup_test_dir();
    let store_path = temp_dir.path().join("data/store.json");
    fs::create_dir_all(store_path.parent().unwrap()).unwrap();
    fs::write(&store_path, "{ invalid json }}}}").unwrap();

    cli(&temp_dir)
        .arg("--user")
        .arg(Uuid::new_v4().to_string())
        .arg("start")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Json"));

    // The corrupt file is left for inspection, not overwritten
    assert_eq!(
        fs::read_to_string(&store_path).unwrap(),
        "{ invalid json }}}}"
    );
}

#[test]
fn test_stored_session_breaking_invariants_is_rejected() {
    let temp_dir = setup_test_dir();
    let user = Uuid::new_v4();

    cli(&temp_dir)
        .arg("--user")
        .arg(user.to_string())
        .arg("start")
        .assert()
        .success();

    // Mark the in-progress session completed without an end time
    let store_path = temp_dir.path().join("data/store.json");
    let mut doc: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&store_path).unwrap()).unwrap();
    for session in doc["sessions"].as_object_mut().unwrap().values_mut() {
        session["status"] = "completed".into();
    }
    fs::write(&store_path, doc.to_string()).unwrap();

    assert!(FileStore::load(&store_path).is_err());
    cli(&temp_dir)
        .arg("--user")
        .arg(user.to_string())
        .arg("stats")
        .assert()
        .failure();
}

#[test]
fn test_corrupted_queue_lines_are_skipped() {
    let temp_dir = setup_test_dir();
    let user = Uuid::new_v4();

    cli(&temp_dir)
        .arg("--user")
        .arg(user.to_string())
        .args(["profile", "--weight", "75"])
        .assert()
        .success();

    let queue_path = temp_dir.path().join("data/queue/measurements.jsonl");
    {
        let mut file = fs::OpenOptions::new().append(true).open(&queue_path).unwrap();
        writeln!(file, "{{\"revision_id\": truncated").unwrap();
    }

    cli(&temp_dir)
        .arg("--user")
        .arg(user.to_string())
        .args(["profile", "--height", "180"])
        .assert()
        .success();

    cli(&temp_dir)
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 metric(s) created"));
}

#[test]
fn test_missing_files_start_empty() {
    let temp_dir = setup_test_dir();

    cli(&temp_dir)
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("No pending profile changes"));

    cli(&temp_dir)
        .arg("--user")
        .arg(Uuid::new_v4().to_string())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sessions:   0"));
}
