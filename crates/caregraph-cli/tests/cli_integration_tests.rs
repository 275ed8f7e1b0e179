//! CLI integration tests for caregraph
//!
//! Runs the binary end-to-end with assert_cmd. Every test gets its own
//! config directory, and no test needs a graph database or a model endpoint.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const SECRET_VARS: [&str; 5] = [
    "CAREGRAPH_API_KEY",
    "GITHUB_TOKEN",
    "NEO4J_USERNAME",
    "NEO4J_PASSWORD",
    "NEO4J_URI",
];

/// Command isolated in `dir`: its own config directory, no credentials
#[allow(deprecated)]
fn caregraph_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("caregraph").unwrap();
    cmd.current_dir(dir.path());
    cmd.env("CAREGRAPH_CONFIG_DIR", dir.path());
    for var in SECRET_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    caregraph_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("query"))
        .stdout(predicate::str::contains("schema"))
        .stdout(predicate::str::contains("history"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_config_path_uses_config_dir() {
    let dir = TempDir::new().unwrap();
    caregraph_cmd(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"))
        .stdout(predicate::str::contains(dir.path().to_string_lossy().as_ref()));
}

#[test]
fn test_config_list_shows_defaults() {
    let dir = TempDir::new().unwrap();
    caregraph_cmd(&dir)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("llm.model = gpt-4o-mini"))
        .stdout(predicate::str::contains("pipeline.result_limit = 5"))
        .stdout(predicate::str::contains("graph.uri = http://localhost:7474"));
}

#[test]
fn test_config_set_then_get() {
    let dir = TempDir::new().unwrap();
    caregraph_cmd(&dir)
        .args(["config", "set", "pipeline.result_limit", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set pipeline.result_limit = 10"));

    caregraph_cmd(&dir)
        .args(["config", "get", "pipeline.result_limit"])
        .assert()
        .success()
        .stdout(predicate::str::diff("10\n"));

    assert!(dir.path().join("config.toml").exists());
}

#[test]
fn test_config_reset_restores_defaults() {
    let dir = TempDir::new().unwrap();
    caregraph_cmd(&dir)
        .args(["config", "set", "llm.model", "gpt-4o"])
        .assert()
        .success();

    caregraph_cmd(&dir).args(["config", "reset"]).assert().success();

    caregraph_cmd(&dir)
        .args(["config", "get", "llm.model"])
        .assert()
        .success()
        .stdout(predicate::str::diff("gpt-4o-mini\n"));
}

#[test]
fn test_config_rejects_bad_values() {
    let dir = TempDir::new().unwrap();
    caregraph_cmd(&dir)
        .args(["config", "set", "llm.temperature", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Temperature must be between 0.0 and 2.0"));

    caregraph_cmd(&dir)
        .args(["config", "set", "llm.api_key", "sk-secret"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("environment variable"));

    caregraph_cmd(&dir)
        .args(["config", "get", "no.such.key"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));
}

#[test]
fn test_config_list_json() {
    let dir = TempDir::new().unwrap();
    let output = caregraph_cmd(&dir)
        .args(["--format", "json", "config", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["llm.model"], "gpt-4o-mini");
}

#[test]
fn test_ask_without_credentials_fails() {
    let dir = TempDir::new().unwrap();
    caregraph_cmd(&dir)
        .args(["ask", "List patients with diabetes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing environment variables"))
        .stderr(predicate::str::contains("NEO4J_PASSWORD"));
}

#[test]
fn test_query_rejects_bolt_uri() {
    let dir = TempDir::new().unwrap();
    caregraph_cmd(&dir)
        .env("CAREGRAPH_API_KEY", "test-key")
        .env("NEO4J_USERNAME", "neo4j")
        .env("NEO4J_PASSWORD", "secret")
        .env("NEO4J_URI", "bolt://localhost:7687")
        .args(["query", "List patients"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported graph URI"));
}

#[test]
fn test_history_empty() {
    let dir = TempDir::new().unwrap();
    caregraph_cmd(&dir)
        .args(["history", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No conversations yet."));

    caregraph_cmd(&dir)
        .args(["--format", "json", "history", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_history_unknown_thread() {
    let dir = TempDir::new().unwrap();
    caregraph_cmd(&dir)
        .args(["history", "show", "missing-thread"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Conversation not found: missing-thread"));

    caregraph_cmd(&dir)
        .args(["history", "delete", "missing-thread"])
        .assert()
        .failure();
}

#[test]
fn test_doctor_reports_missing_credentials() {
    let dir = TempDir::new().unwrap();
    caregraph_cmd(&dir)
        .arg("doctor")
        .assert()
        .failure()
        .stdout(predicate::str::contains("[!!] Credentials"))
        .stdout(predicate::str::contains("[OK] History"));
}
