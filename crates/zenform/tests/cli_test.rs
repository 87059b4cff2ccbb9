//! Integration tests for the `zenform` CLI binary.
//!
//! Everything here runs offline: argument parsing, manifest validation,
//! dry-run planning and the error paths taken before any connection.
#![allow(clippy::unwrap_used)]

use std::io::Write;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::NamedTempFile;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `zenform` binary with env isolation.
fn zenform_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("zenform");
    cmd.env("HOME", "/tmp/zenform-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/zenform-cli-test-nonexistent")
        .env_remove("ZENFORM_PROFILE")
        .env_remove("ZENFORM_CONFIG")
        .env_remove("ZENML_SERVER_URL")
        .env_remove("ZENML_API_KEY")
        .env_remove("ZENML_API_TOKEN");
    cmd
}

fn manifest(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

const VALID: &str = r"
service_connectors:
  - name: aws-prod
    type: aws
    auth_method: secret-key
    resource_types: [s3-bucket]
    secrets:
      aws_secret_access_key: hunter2
components:
  - name: local-store
    type: artifact_store
    flavor: local
    configuration:
      path: /tmp/artifacts
  - name: local-orchestrator
    type: orchestrator
    flavor: local
stacks:
  - name: dev
    components:
      artifact_store: name:local-store
      orchestrator: name:local-orchestrator
";

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = zenform_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "Expected 'Usage' in:\n{stderr}");
}

#[test]
fn test_help_flag() {
    zenform_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("validate")
            .and(predicate::str::contains("plan"))
            .and(predicate::str::contains("apply"))
            .and(predicate::str::contains("destroy")),
    );
}

// ── validate ────────────────────────────────────────────────────────

#[test]
fn test_validate_accepts_a_valid_manifest() {
    let file = manifest(VALID);
    zenform_cmd()
        .arg("validate")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("4 entities valid"));
}

#[test]
fn test_validate_names_the_bad_field() {
    let file = manifest(
        r"
service_connectors:
  - name: aws-prod
    type: aws
    auth_method: password
    resource_types: [s3-bucket]
",
    );
    zenform_cmd()
        .arg("validate")
        .arg(file.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("auth_method"));
}

#[test]
fn test_validate_rejects_unresolved_reference() {
    let file = manifest(
        r"
stacks:
  - name: dev
    components:
      orchestrator: name:missing
",
    );
    zenform_cmd()
        .arg("validate")
        .arg(file.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("name:missing"));
}

#[test]
fn test_validate_rejects_unknown_section() {
    let file = manifest("pipelines: []\n");
    zenform_cmd()
        .arg("validate")
        .arg(file.path())
        .assert()
        .code(2);
}

// ── plan ────────────────────────────────────────────────────────────

#[test]
fn test_dry_run_plan_creates_everything() {
    let file = manifest(VALID);
    let output = zenform_cmd()
        .args(["plan", "--dry-run", "-o", "json"])
        .arg(file.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let actions: Vec<&str> = records
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["create"; 4]);
}

// ── Guards and connection errors ────────────────────────────────────

#[test]
fn test_destroy_requires_confirmation() {
    let file = manifest(VALID);
    zenform_cmd()
        .arg("destroy")
        .arg(file.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--yes"));
}

#[test]
fn test_apply_without_credentials_is_an_auth_error() {
    let file = manifest(VALID);
    zenform_cmd()
        .args(["--server", "http://127.0.0.1:9", "apply"])
        .arg(file.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No credentials"));
}

#[test]
fn test_api_key_and_token_conflict() {
    zenform_cmd()
        .args(["--api-key", "k", "--api-token", "t", "get", "server"])
        .assert()
        .code(2);
}
