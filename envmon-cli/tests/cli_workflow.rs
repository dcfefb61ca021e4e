//! Integration tests for the CLI binary.
//!
//! These tests run the `envmon` binary against temporary catalogs and
//! configuration files and check its output and exit status.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Run a CLI command and capture output.
fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_envmon"))
        .args(args)
        .output()
        .expect("Failed to execute CLI command")
}

/// Assert a command succeeded.
fn assert_success(output: &Output, context: &str) {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        panic!("{} failed:\nstdout: {}\nstderr: {}", context, stdout, stderr);
    }
}

fn write_file(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, content).expect("Failed to write file");
    path.to_string_lossy().into_owned()
}

const CATALOG: &str = "\
[project.1]
name = rivers

[process.10]
name = river-levels
project = 1
frequency = 15
frequency_unit = minute
command = true

[process.11]
name = daily-report
project = 1
schedule_time = 06:30
schedule_unit = day
";

#[test]
fn test_check_lists_every_process() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let catalog = write_file(temp.path(), "catalog.ini", CATALOG);

    let output = run_cli(&["check", &catalog]);
    assert_success(&output, "check");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("1 project(s), 2 process(es)"));
    assert!(stdout.contains("river-levels"));
    assert!(stdout.contains("every 15m"));
    assert!(stdout.contains("daily at 06:30"));
    assert!(stdout.contains("Catalog OK"));
}

#[test]
fn test_check_rejects_unusable_schedule() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let catalog = write_file(
        temp.path(),
        "catalog.ini",
        "[project.1]\nname = rivers\n\n[process.1]\nproject = 1\n",
    );

    let output = run_cli(&["check", &catalog]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("INVALID"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unusable schedule"));
}

#[test]
fn test_check_reports_malformed_catalog() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let catalog = write_file(temp.path(), "catalog.ini", "[station.1]\nname = x\n");

    let output = run_cli(&["check", &catalog]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Invalid catalog"));
    assert!(stderr.contains("station.1"));
}

#[test]
fn test_config_show_reads_explicit_file() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let config = write_file(
        temp.path(),
        "config.ini",
        "[service]\ninstance_id = 7\nthreads = 3\n",
    );

    let output = run_cli(&["config", "show", "--config", &config]);
    assert_success(&output, "config show");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("instance_id = 7"));
    assert!(stdout.contains("threads = 3"));
    assert!(stdout.contains("catalog = (not set)"));
}

#[test]
fn test_run_without_catalog_fails() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let logs = temp.path().join("logs");
    let config = write_file(
        temp.path(),
        "config.ini",
        &format!("[logging]\ndirectory = {}\n", logs.display()),
    );

    let output = run_cli(&["run", "--config", &config]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("No process catalog configured"));
}
