//! Runs the built binary against a ledger file in a temporary directory.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{path::Path, process::Command};

const IDENTITY: &str = "0x71c7656ec7ab88b098defb751b7401b5f6d8976f";

fn heliowatch(ledger: &Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_heliowatch"))
        .arg("--ledger")
        .arg(ledger)
        .args(["--log-format", "text"])
        .args(args)
        .env("RUST_LOG", "error")
        .env_remove("HELIOWATCH__IDENTITY")
        .env_remove("HELIOWATCH__CONFIG")
        .output()
        .expect("binary runs")
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_submit_then_list_and_stats() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("ledger.json");

    let submitted = heliowatch(&ledger, &[
        "--identity",
        IDENTITY,
        "submit",
        "--severity",
        "4",
        "--impact",
        "Power Grid",
        "--location",
        "Texas",
    ]);
    assert!(submitted.status.success(), "{submitted:?}");
    assert!(stdout(&submitted).contains("Encrypted data submitted securely!"));

    let listed = heliowatch(&ledger, &["list", "--search", "TEX"]);
    assert!(listed.status.success());
    let text = stdout(&listed);
    assert!(text.contains("Texas"));
    assert!(text.contains("0x71c7...976f"));

    let nothing = heliowatch(&ledger, &["list", "--search", "ontario"]);
    assert_eq!(stdout(&nothing), "No space weather reports found\n");

    let stats = heliowatch(&ledger, &["stats"]);
    let text = stdout(&stats);
    assert!(text.contains("Total reports:     1"));
    assert!(text.contains("High severity:     1 (100.0%)"));
}

#[test]
fn test_invalid_report_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("ledger.json");

    let output = heliowatch(&ledger, &[
        "--identity",
        IDENTITY,
        "submit",
        "--severity",
        "9",
        "--impact",
        "Power Grid",
        "--location",
        "Texas",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Submission failed"));
    assert!(!ledger.exists());
}

#[test]
fn test_submit_requires_identity() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("ledger.json");

    let output = heliowatch(&ledger, &[
        "submit",
        "--severity",
        "2",
        "--impact",
        "Other",
        "--location",
        "Lagos",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("needs an identity"));
}

#[test]
fn test_config_example_prints_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let output = heliowatch(&dir.path().join("unused.json"), &["config", "example"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("spaceweather_keys"));
}
