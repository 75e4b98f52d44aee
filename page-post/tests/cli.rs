//! CLI integration tests for page-post
//!
//! Nothing here reaches the Graph API: every case either fails validation
//! or schedules entries for later.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const TOKEN: &str = "EAAB-page-token-do-not-print";

/// Helper to escape path for TOML on Windows
fn escape_path_for_toml(path: &str) -> String {
    path.replace('\\', "\\\\")
}

/// Config with one page ("Bakery", id 1001) and its token file
fn setup_test_env() -> (TempDir, String) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let db_path = temp_dir.path().join("entries.db");
    let media_dir = temp_dir.path().join("media");
    let token_path = temp_dir.path().join("bakery.token");

    fs::write(&token_path, TOKEN).unwrap();

    let config_content = format!(
        r#"
[database]
path = "{}"

[media]
dir = "{}"

[[pages]]
id = "1001"
name = "Bakery"
token_file = "{}"
"#,
        escape_path_for_toml(&db_path.to_string_lossy()),
        escape_path_for_toml(&media_dir.to_string_lossy()),
        escape_path_for_toml(&token_path.to_string_lossy()),
    );
    fs::write(&config_path, config_content).unwrap();

    (temp_dir, config_path.to_string_lossy().to_string())
}

fn page_post(config_path: &str) -> Command {
    let mut cmd = Command::cargo_bin("page-post").unwrap();
    cmd.env("PAGECAST_CONFIG", config_path)
        .env_remove("PAGECAST_DB_PATH")
        .env("PAGECAST_LOG_LEVEL", "error");
    cmd
}

#[test]
fn test_help_lists_options() {
    Command::cargo_bin("page-post")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Publish or schedule content"))
        .stdout(predicate::str::contains("--page"))
        .stdout(predicate::str::contains("--media"))
        .stdout(predicate::str::contains("--start"))
        .stdout(predicate::str::contains("--delete-after-days"));
}

#[test]
fn test_no_page_selected_is_invalid_input() {
    let (_dir, config) = setup_test_env();

    page_post(&config)
        .arg("hello")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Please select at least one page"));
}

#[test]
fn test_unknown_page_is_invalid_input() {
    let (_dir, config) = setup_test_env();

    page_post(&config)
        .args(["--page", "Florist", "hello"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("'Florist' is not configured"));
}

#[test]
fn test_no_content_is_invalid_input() {
    let (_dir, config) = setup_test_env();

    page_post(&config)
        .args(["--page", "Bakery"])
        .write_stdin("   \n")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Please write a message or upload a file"));
}

#[test]
fn test_photo_is_not_a_video_kind() {
    let (_dir, config) = setup_test_env();

    page_post(&config)
        .args(["--page", "Bakery", "--kind", "photo", "hello"])
        .assert()
        .code(3);
}

#[test]
fn test_unparseable_start_time() {
    let (_dir, config) = setup_test_env();

    page_post(&config)
        .args(["--page", "Bakery", "--start", "whenever you like", "hello"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Could not parse start time"));
}

#[test]
fn test_interval_requires_start() {
    let (_dir, config) = setup_test_env();

    page_post(&config)
        .args(["--page", "Bakery", "--interval", "1h", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--start"));
}

#[test]
fn test_scheduled_text_post() {
    let (_dir, config) = setup_test_env();

    page_post(&config)
        .args(["--page", "Bakery", "--start", "2030-01-01 10:00", "Happy new year"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Scheduled 1 post(s) to 1 page(s)"))
        .stdout(predicate::str::contains("2030-01-01 10:00:00 UTC"));
}

#[test]
fn test_scheduled_media_json_output_hides_token() {
    let (dir, config) = setup_test_env();
    let photo = dir.path().join("loaf.png");
    fs::write(&photo, [0x89, 0x50, 0x4e, 0x47]).unwrap();
    let photo = photo.to_string_lossy().to_string();

    page_post(&config)
        .args([
            "--page",
            "1001",
            "--media",
            photo.as_str(),
            "--media",
            photo.as_str(),
            "--start",
            "2030-01-01T10:00:00Z",
            "--interval",
            "2h",
            "--delete-after-days",
            "3",
            "--format",
            "json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"mode\": \"deferred\""))
        .stdout(predicate::str::contains("\"scheduled\": 2"))
        .stdout(predicate::str::contains("loaf.png"))
        .stdout(predicate::str::contains(TOKEN).not());

    // Both uploads are kept for the dispatcher
    assert_eq!(fs::read_dir(dir.path().join("media")).unwrap().count(), 2);
}

#[test]
fn test_invalid_format_rejected() {
    let (_dir, config) = setup_test_env();

    page_post(&config)
        .args(["--page", "Bakery", "--format", "xml", "hello"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Invalid format"));
}

#[test]
fn test_unknown_media_extension_is_invalid_input() {
    let (dir, config) = setup_test_env();
    let notes = dir.path().join("notes.txt");
    fs::write(&notes, "not a picture").unwrap();
    let notes = notes.to_string_lossy().to_string();

    page_post(&config)
        .args(["--page", "Bakery", "--media", notes.as_str(), "hello"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("unknown extension"));
}
