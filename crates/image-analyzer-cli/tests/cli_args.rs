//! CLI argument validation tests.
//!
//! Tests command-line argument parsing, validation, and error handling.
//! No test needs a running Ollama server: the port below refuses connections.

#![allow(clippy::unwrap_used)]
#![allow(deprecated)] // cargo_bin deprecation

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

const UNREACHABLE_HOST: &str = "http://127.0.0.1:9";

/// Command isolated from the user's config files.
fn isolated(temp: &Path) -> Command {
    let mut cmd = Command::cargo_bin("image-analyzer").unwrap();
    cmd.current_dir(temp)
        .env("XDG_CONFIG_HOME", temp.join("xdg"))
        .env("HOME", temp);
    cmd
}

fn image_in(dir: &Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"not really a jpeg").unwrap();
    path
}

// === Missing/Invalid Path Tests ===

#[test]
fn test_missing_path_shows_error() {
    let temp = tempfile::tempdir().unwrap();
    // No path argument at all - error goes to stderr
    isolated(temp.path()).assert().code(2).stderr(
        predicate::str::contains("No paths specified")
            .or(predicate::str::contains("required"))
            .or(predicate::str::contains("PATHS")),
    );
}

#[test]
fn test_nonexistent_path_warns_and_exits_cleanly() {
    let temp = tempfile::tempdir().unwrap();
    isolated(temp.path())
        .arg("analyze")
        .arg("/nonexistent/path/to/image.jpg")
        .arg("--host")
        .arg(UNREACHABLE_HOST)
        .assert()
        .code(0)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_empty_directory() {
    let temp = tempfile::tempdir().unwrap();
    let empty = temp.path().join("empty");
    fs::create_dir(&empty).unwrap();

    isolated(temp.path())
        .arg(&empty)
        .arg("--host")
        .arg(UNREACHABLE_HOST)
        .assert()
        .code(0)
        .stderr(predicate::str::contains("No supported images found"));
}

#[test]
fn test_unsupported_file_is_skipped() {
    let temp = tempfile::tempdir().unwrap();
    let notes = temp.path().join("notes.txt");
    fs::write(&notes, "hello").unwrap();

    isolated(temp.path())
        .arg(&notes)
        .arg("--host")
        .arg(UNREACHABLE_HOST)
        .assert()
        .code(0)
        .stderr(predicate::str::contains("Skipping unsupported file"));
}

// === Connection Tests ===

#[test]
fn test_unreachable_server_exits_with_setup_error() {
    let temp = tempfile::tempdir().unwrap();
    let image = image_in(temp.path(), "photo.jpg");

    isolated(temp.path())
        .arg("analyze")
        .arg(&image)
        .arg("--host")
        .arg(UNREACHABLE_HOST)
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "Failed to connect to Ollama server at http://127.0.0.1:9",
        ));

    // Nothing is written when the batch never starts
    assert!(!temp.path().join("photo.txt").exists());
}

#[test]
fn test_default_command_is_analyze() {
    let temp = tempfile::tempdir().unwrap();
    let image = image_in(temp.path(), "photo.png");

    isolated(temp.path())
        .arg(&image)
        .arg("--host")
        .arg(UNREACHABLE_HOST)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to connect"));
}

#[test]
fn test_models_unreachable_server() {
    let temp = tempfile::tempdir().unwrap();
    isolated(temp.path())
        .arg("models")
        .arg("--host")
        .arg(UNREACHABLE_HOST)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to connect"));
}

// === Value Validation Tests ===

#[test]
fn test_host_without_scheme_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let image = image_in(temp.path(), "photo.jpg");

    isolated(temp.path())
        .arg(&image)
        .arg("--host")
        .arg("localhost:11434")
        .assert()
        .failure()
        .stderr(predicate::str::contains("must start with http:// or https://"));
}

#[test]
fn test_zero_timeout_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let image = image_in(temp.path(), "photo.jpg");

    isolated(temp.path())
        .arg(&image)
        .arg("--timeout")
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least 1 second"));
}

#[test]
fn test_non_numeric_timeout_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let image = image_in(temp.path(), "photo.jpg");

    isolated(temp.path())
        .arg(&image)
        .arg("--timeout")
        .arg("soon")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a whole number"));
}

// === Prompt Tests ===

#[test]
fn test_empty_prompt_file_is_setup_error() {
    let temp = tempfile::tempdir().unwrap();
    let image = image_in(temp.path(), "photo.jpg");
    let prompt = temp.path().join("prompt.txt");
    fs::write(&prompt, "   \n").unwrap();

    isolated(temp.path())
        .arg(&image)
        .arg("--prompt")
        .arg(&prompt)
        .arg("--host")
        .arg(UNREACHABLE_HOST)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Prompt file is empty"));
}

#[test]
fn test_missing_prompt_file_is_setup_error() {
    let temp = tempfile::tempdir().unwrap();
    let image = image_in(temp.path(), "photo.jpg");

    isolated(temp.path())
        .arg(&image)
        .arg("--prompt")
        .arg(temp.path().join("missing.txt"))
        .arg("--host")
        .arg(UNREACHABLE_HOST)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Could not access prompt file"));
}

// === Help/Version Tests ===

#[test]
fn test_help_flag() {
    let mut cmd = Command::cargo_bin("image-analyzer").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("models"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_analyze_help_lists_output_flags() {
    let mut cmd = Command::cargo_bin("image-analyzer").unwrap();
    cmd.args(["analyze", "--help"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--sidecar"))
        .stdout(predicate::str::contains("--metadata"))
        .stdout(predicate::str::contains("--no-overwrite"))
        .stdout(predicate::str::contains("--retry-failed"));
}

#[test]
fn test_version_flag() {
    let mut cmd = Command::cargo_bin("image-analyzer").unwrap();
    cmd.arg("--version");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("image-analyzer"));
}
