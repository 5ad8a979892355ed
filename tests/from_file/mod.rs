//! Integration tests running the actual crate binary: setup failures and argument handling.

use std::path::PathBuf;
use std::process::{Command, Output};

fn run_binary(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_flow-ingest"))
        .args(args)
        .env("RUST_LOG", "info")
        .output()
        .expect("failed to execute binary")
}

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

#[test]
fn missing_input_file_fails_the_run() {
    let output = run_binary(&["flows", "does/not/exist.nfdump", "--no-geo"]);

    assert!(!output.status.success(), "binary should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Error encountered while reading input"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn missing_geo_database_fails_the_run() {
    let input = fixture_path("flows.nfdump");
    let output = run_binary(&[
        "flows",
        input.to_str().unwrap(),
        "--geo-db",
        "does/not/exist.mmdb",
    ]);

    assert!(!output.status.success(), "binary should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("cannot open geographic database"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn unreachable_store_fails_the_run() {
    let input = fixture_path("flows.nfdump");
    // nothing listens on port 1
    let output = run_binary(&[
        "flows",
        input.to_str().unwrap(),
        "--no-geo",
        "--redis-server",
        "127.0.0.1:1",
    ]);

    assert!(!output.status.success(), "binary should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot reach Redis"), "unexpected stderr: {stderr}");
}

#[test]
fn zero_workers_are_rejected() {
    let input = fixture_path("flows.nfdump");
    let output = run_binary(&["flows", input.to_str().unwrap(), "--workers", "0"]);

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn list_key_and_input_are_mandatory() {
    let output = run_binary(&["flows"]);
    assert!(!output.status.success());
}
