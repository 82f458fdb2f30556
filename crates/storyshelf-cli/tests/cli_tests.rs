//! CLI Tests
//!
//! Drive the `storyshelf` binary against a temporary data directory.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn storyshelf(data: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_storyshelf"))
        .arg("--data")
        .arg(data)
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("STORYSHELF_LOG")
        .output()
        .expect("failed to run storyshelf")
}

fn stdout_of(data: &Path, args: &[&str]) -> String {
    let out = storyshelf(data, args);
    assert!(
        out.status.success(),
        "storyshelf {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).into_owned()
}

// ============================================================================
// Happy path
// ============================================================================

#[test]
fn test_build_chain_and_resolve() {
    let dir = tempdir().unwrap();
    let data = dir.path();

    stdout_of(data, &["category", "add", "Genre", "--color", "#3366cc"]);
    stdout_of(data, &["tag", "add", "Fantasy", "--category", "1"]);
    stdout_of(data, &["tag", "add", "Epic", "--category", "1", "--implies", "1"]);
    stdout_of(data, &["tag", "add", "Saga", "--category", "1", "--implies", "2"]);

    let resolved = stdout_of(data, &["resolve", "3"]);
    assert!(resolved.contains("Epic"));
    assert!(resolved.contains("Fantasy"));
    assert!(!resolved.contains("Saga"));

    let shown = stdout_of(data, &["tag", "show", "saga"]);
    assert!(shown.contains("indirectly implies"));
    assert!(shown.contains("Fantasy"));

    let categories = stdout_of(data, &["category", "list"]);
    assert!(categories.contains("Genre"));
    assert!(categories.contains("(3 tags)"));
}

#[test]
fn test_state_survives_between_invocations() {
    let dir = tempdir().unwrap();
    let data = dir.path();

    stdout_of(data, &["category", "add", "Mood"]);
    stdout_of(data, &["tag", "add", "Dark", "--category", "1"]);

    let raw = std::fs::read_to_string(data.join("tags.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["version"], "storyshelf_snapshot_v1");
    assert_eq!(json["tags"][0]["name"], "Dark");

    let listed = stdout_of(data, &["tag", "list"]);
    assert!(listed.contains("Dark"));
    assert!(listed.contains("[Mood]"));
}

// ============================================================================
// Implications and deletion
// ============================================================================

#[test]
fn test_imply_unimply_and_purge() {
    let dir = tempdir().unwrap();
    let data = dir.path();

    stdout_of(data, &["category", "add", "Genre"]);
    stdout_of(data, &["tag", "add", "A", "--category", "1"]);
    stdout_of(data, &["tag", "add", "B", "--category", "1"]);
    stdout_of(data, &["tag", "imply", "1", "2"]);
    assert!(stdout_of(data, &["resolve", "1"]).contains('B'));

    let blocked = storyshelf(data, &["tag", "rm", "2"]);
    assert!(!blocked.status.success());
    assert!(String::from_utf8_lossy(&blocked.stderr).contains("still referenced"));

    stdout_of(data, &["tag", "unimply", "1", "2"]);
    assert!(stdout_of(data, &["resolve", "1"]).contains("No implied tags."));

    stdout_of(data, &["tag", "imply", "1", "2"]);
    let purged = stdout_of(data, &["tag", "rm", "2", "--purge"]);
    assert!(purged.contains("stripped"));
    assert!(!stdout_of(data, &["tag", "list"]).contains("  B  "));
}

#[test]
fn test_errors_exit_non_zero() {
    let dir = tempdir().unwrap();
    let data = dir.path();

    stdout_of(data, &["category", "add", "Genre"]);
    let dup = storyshelf(data, &["category", "add", "genre"]);
    assert!(!dup.status.success());

    let missing = storyshelf(data, &["tag", "add", "X", "--category", "7"]);
    assert!(!missing.status.success());

    stdout_of(data, &["tag", "add", "X", "--category", "1"]);
    let blocked = storyshelf(data, &["category", "rm", "1"]);
    assert!(!blocked.status.success());
}

#[test]
fn test_category_rename_collision_is_rejected() {
    let dir = tempdir().unwrap();
    let data = dir.path();

    stdout_of(data, &["category", "add", "Genre"]);
    stdout_of(data, &["category", "add", "Mood"]);

    let clash = storyshelf(data, &["category", "rename", "2", "GENRE"]);
    assert!(!clash.status.success());
    assert!(String::from_utf8_lossy(&clash.stderr).contains("already used by category 1"));

    stdout_of(data, &["category", "rename", "2", "MOOD"]);
    let listed = stdout_of(data, &["category", "list"]);
    assert!(listed.contains("MOOD"));
    assert!(listed.contains("Genre"));
}

#[test]
fn test_show_numeric_name_falls_back_from_id() {
    let dir = tempdir().unwrap();
    let data = dir.path();

    stdout_of(data, &["category", "add", "Era"]);
    stdout_of(data, &["tag", "add", "Modern", "--category", "1"]);
    stdout_of(data, &["tag", "add", "1984", "--category", "1"]);

    assert!(stdout_of(data, &["tag", "show", "1"]).contains("Modern"));
    assert!(stdout_of(data, &["tag", "show", "1984"]).contains("1984"));
    assert!(!storyshelf(data, &["tag", "show", "77"]).status.success());
}

#[test]
fn test_config_file_sets_snapshot_path() {
    let dir = tempdir().unwrap();
    let snapshot = dir.path().join("elsewhere").join("library.json");
    let config = dir.path().join("storyshelf.json");
    std::fs::write(
        &config,
        format!(r#"{{"snapshot_path": {}}}"#, serde_json::to_string(&snapshot).unwrap()),
    )
    .unwrap();

    let out = Command::new(env!("CARGO_BIN_EXE_storyshelf"))
        .arg("--config")
        .arg(&config)
        .args(["category", "add", "Genre"])
        .env("NO_COLOR", "1")
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(snapshot.exists());
}
