//! Integration tests for the page-send daemon

use assert_cmd::Command;
use libpagecast::{Database, EntryStatus, ScheduledEntry, Target};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Config with the Graph API pointed at a port nothing listens on
fn setup_test_env() -> (TempDir, String, String) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let db_path = temp_dir.path().join("entries.db");

    let config_content = format!(
        r#"
[database]
path = "{}"

[media]
dir = "{}"

[graph]
api_base = "http://127.0.0.1:9"
timeout_secs = 5

[scheduling]
poll_interval = 1
"#,
        db_path.display().to_string().replace('\\', "/"),
        temp_dir.path().join("media").display().to_string().replace('\\', "/"),
    );
    fs::write(&config_path, config_content).unwrap();

    (
        temp_dir,
        config_path.to_string_lossy().to_string(),
        db_path.to_string_lossy().to_string(),
    )
}

fn page_send(config_path: &str) -> Command {
    let mut cmd = Command::cargo_bin("page-send").unwrap();
    cmd.env("PAGECAST_CONFIG", config_path)
        .env_remove("PAGECAST_DB_PATH")
        .env("PAGECAST_LOG_LEVEL", "error");
    cmd
}

#[test]
fn test_help_describes_daemon() {
    Command::cargo_bin("page-send")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--poll-interval"));
}

#[test]
fn test_once_with_empty_database() {
    let (_dir, config, db_path) = setup_test_env();

    page_send(&config).arg("--once").assert().success();

    // The database was created and migrated on the way
    assert!(std::path::Path::new(&db_path).exists());
}

#[test]
fn test_missing_config_fails() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    page_send(&missing.to_string_lossy())
        .arg("--once")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}

#[tokio::test]
async fn test_once_marks_unpublishable_entry_failed() {
    let (_dir, config, db_path) = setup_test_env();

    let db = Database::new(&db_path).await.unwrap();
    let now = chrono::Utc::now().timestamp();
    let due = ScheduledEntry::pending(
        "submission-1",
        &Target::new("1001", "token"),
        Some("Due already"),
        None,
        now - 10,
        None,
    );
    let later = ScheduledEntry::pending(
        "submission-1",
        &Target::new("1001", "token"),
        Some("Not yet"),
        None,
        now + 3600,
        None,
    );
    db.create_entries(&[due.clone(), later.clone()]).await.unwrap();

    page_send(&config).arg("--once").assert().success();

    let due = db.get_entry(&due.id).await.unwrap().unwrap();
    assert_eq!(due.status, EntryStatus::Failed);
    assert!(due.error_message.is_some());

    let later = db.get_entry(&later.id).await.unwrap().unwrap();
    assert_eq!(later.status, EntryStatus::Pending);
}
