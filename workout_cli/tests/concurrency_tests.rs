//! Concurrency tests for wtrack.
//!
//! These tests verify that multiple processes can safely:
//! - Write to the store simultaneously (file locking)
//! - Publish profile changes while a sync drains the queue
//! - Run several syncs against the same queue

use assert_cmd::Command;
use std::thread;
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
fn test_concurrent_metric_writes() {
    let temp_dir = setup_test_dir();
    let user = Uuid::new_v4();

    thread::scope(|scope| {
        for i in 0..6 {
            let dir = &temp_dir;
            scope.spawn(move || {
                cli(dir)
                    .arg("--user")
                    .arg(user.to_string())
                    .args(["metric", "record", "--type", "weight", "--value"])
                    .arg(format!("{}", 80 + i))
                    .assert()
                    .success();
            });
        }
    });

    // No write may be lost to a concurrent load-modify-save
    let data = FileStore::load(&temp_dir.path().join("data/store.json")).unwrap();
    assert_eq!(data.metrics().count(), 6);
}

#[test]
fn test_publish_during_sync_is_not_lost() {
    let temp_dir = setup_test_dir();
    let user = Uuid::new_v4();

    thread::scope(|scope| {
        let dir = &temp_dir;
        scope.spawn(move || {
            for i in 0..5 {
                cli(dir)
                    .arg("--user")
                    .arg(user.to_string())
                    .args(["profile", "--weight"])
                    .arg(format!("{}", 70 + i))
                    .assert()
                    .success();
            }
        });
        scope.spawn(move || {
            for _ in 0..3 {
                cli(dir).arg("sync").assert().success();
            }
        });
    });

    // Drain whatever arrived after the last concurrent sync
    cli(&temp_dir).arg("sync").assert().success();

    let data = FileStore::load(&temp_dir.path().join("data/store.json")).unwrap();
    assert_eq!(data.metrics().count(), 5);
}

#[test]
fn test_concurrent_syncs_all_succeed() {
    let temp_dir = setup_test_dir();

    for i in 0..8 {
        cli(&temp_dir)
            .arg("--user")
            .arg(Uuid::new_v4().to_string())
            .args(["profile", "--weight"])
            .arg(format!("{}", 60 + i))
            .assert()
            .success();
    }

    thread::scope(|scope| {
        for _ in 0..4 {
            let dir = &temp_dir;
            scope.spawn(move || {
                cli(dir).arg("sync").assert().success();
            });
        }
    });

    let data = FileStore::load(&temp_dir.path().join("data/store.json")).unwrap();
    assert_eq!(data.metrics().count(), 8);

    // Every batch ended up archived exactly once
    let leftovers = std::fs::read_dir(temp_dir.path().join("data"))
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".draining"))
        .count();
    assert_eq!(leftovers, 0);
}
