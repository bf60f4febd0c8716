//! CLI integration tests

use std::process::Command;

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = Command::new("cargo")
        .args(["run", "-p", "scaleward-cli", "--", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("Scaleward replica controller"),
        "Should show app name"
    );
    assert!(stdout.contains("status"), "Should show status command");
    assert!(stdout.contains("health"), "Should show health command");
    assert!(stdout.contains("metrics"), "Should show metrics command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = Command::new("cargo")
        .args(["run", "-p", "scaleward-cli", "--", "--version"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("swctl"), "Should show binary name");
}

/// Test status subcommand help
#[test]
fn test_status_help() {
    let output = Command::new("cargo")
        .args(["run", "-p", "scaleward-cli", "--", "status", "--help"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "status --help should succeed");
}

/// Unknown subcommands are rejected
#[test]
fn test_unknown_command_fails() {
    let output = Command::new("cargo")
        .args(["run", "-p", "scaleward-cli", "--", "does-not-exist"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "unknown command should fail");
}
