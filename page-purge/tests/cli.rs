//! CLI integration tests for page-purge

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn escape_path_for_toml(path: &str) -> String {
    path.replace('\\', "\\\\")
}

/// One configured page, Graph API pointed at a port nothing listens on
fn setup_test_env() -> (TempDir, String) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    let token_path = temp_dir.path().join("bakery.token");
    fs::write(&token_path, "purge-token").unwrap();

    let config_content = format!(
        r#"
[database]
path = "{}"

[media]
dir = "{}"

[graph]
api_base = "http://127.0.0.1:9"
timeout_secs = 5

[pacing]
delete_delay_ms = 0

[[pages]]
id = "1001"
name = "Bakery"
token_file = "{}"
"#,
        escape_path_for_toml(&temp_dir.path().join("entries.db").to_string_lossy()),
        escape_path_for_toml(&temp_dir.path().join("media").to_string_lossy()),
        escape_path_for_toml(&token_path.to_string_lossy()),
    );
    fs::write(&config_path, config_content).unwrap();

    (temp_dir, config_path.to_string_lossy().to_string())
}

fn page_purge(config_path: &str) -> Command {
    let mut cmd = Command::cargo_bin("page-purge").unwrap();
    cmd.env("PAGECAST_CONFIG", config_path)
        .env_remove("PAGECAST_DB_PATH")
        .env("PAGECAST_LOG_LEVEL", "error");
    cmd
}

#[test]
fn test_help_mentions_force() {
    Command::cargo_bin("page-purge")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--force"))
        .stdout(predicate::str::contains("--all-pages"));
}

#[test]
fn test_requires_a_page() {
    let (_dir, config) = setup_test_env();

    page_purge(&config)
        .arg("--force")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("select at least one page"));
}

#[test]
fn test_refuses_without_confirmation_when_piped() {
    let (_dir, config) = setup_test_env();

    page_purge(&config)
        .args(["--page", "Bakery"])
        .write_stdin("y\n")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn test_unreadable_feed_still_exits_cleanly() {
    let (_dir, config) = setup_test_env();

    page_purge(&config)
        .args(["--all-pages", "--force", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"deleted\": 0"))
        .stdout(predicate::str::contains("\"targets\": 1"))
        .stdout(predicate::str::contains("purge-token").not());
}
