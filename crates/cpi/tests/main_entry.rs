//! Integration tests for the `cpi` binary entry point.
//!
//! Each test runs the real executable with a memory-backed cloud document
//! and checks the response written to stdout.

use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

fn cloud_document(plugin: &str) -> (TempDir, PathBuf) {
    let directory = TempDir::new().expect("temp dir");
    let path = directory.path().join("cloud.json");
    let document = serde_json::json!({
        "cloud": {
            "plugin": plugin,
            "properties": {
                "google": {"project": "integration", "default_zone": "us-central1-a"},
                "agent": {"mbus": "http://127.0.0.1", "blobstore": {"provider": "local"}},
                "registry": {"use_gce_metadata": true}
            }
        }
    });
    std::fs::write(&path, document.to_string()).expect("write cloud document");
    (directory, path)
}

fn stdout_lines(output: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(output)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("response is JSON"))
        .collect()
}

#[test]
fn serve_once_answers_on_stdout() {
    let (_directory, path) = cloud_document("memory");
    let mut command = cargo_bin_cmd!("cpi");
    command
        .env("CPI_CLOUD_CONFIG", &path)
        .env("CPI_LOG_FORMAT", "compact")
        .write_stdin(r#"{"method":"create_disk","arguments":[1024,{}],"context":{"director_uuid":"d-1"}}"#);
    let assert = command.assert().success();
    let responses = stdout_lines(&assert.get_output().stdout);
    assert_eq!(responses.len(), 1);
    let response = responses.first().expect("one response");
    assert!(response["error"].is_null(), "response: {response}");
    assert!(
        response["result"]
            .as_str()
            .is_some_and(|cid| cid.starts_with("disk-")),
        "response: {response}"
    );
    assert!(
        response["log"]
            .as_str()
            .is_some_and(|log| log.contains("created disk")),
        "response: {response}"
    );
}

#[test]
fn json_log_format_keeps_stderr_homogeneous() {
    let (_directory, path) = cloud_document("memory");
    let mut command = cargo_bin_cmd!("cpi");
    command
        .env("CPI_CLOUD_CONFIG", &path)
        .env("CPI_LOG_FORMAT", "json")
        .env("CPI_LOG_FILTER", "info")
        .write_stdin(r#"{"method":"create_disk","arguments":[1024,{}]}"#);
    let assert = command.assert().success();
    let output = assert.get_output();

    let records: Vec<Value> = String::from_utf8_lossy(&output.stderr)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).unwrap_or_else(|_| panic!("not JSON: {line}")))
        .collect();
    assert!(
        records.iter().any(|record| record["message"] == "created disk"),
        "records: {records:?}"
    );

    let responses = stdout_lines(&output.stdout);
    let log = responses.first().expect("one response")["log"]
        .as_str()
        .expect("log is text")
        .to_owned();
    assert!(log.contains("created disk"), "log: {log}");
    assert!(!log.trim_start().starts_with('{'), "log: {log}");
}

#[test]
fn unknown_method_is_reported_in_the_response() {
    let (_directory, path) = cloud_document("memory");
    let mut command = cargo_bin_cmd!("cpi");
    command
        .env("CPI_CLOUD_CONFIG", &path)
        .write_stdin(r#"{"method":"resize_disk","arguments":[],"context":{}}"#);
    let assert = command.assert().success();
    let responses = stdout_lines(&assert.get_output().stdout);
    let response = responses.first().expect("one response");
    assert_eq!(response["error"]["type"], "UnknownAction");
    assert!(response["result"].is_null());
}

#[test]
fn continuous_mode_answers_every_line() {
    let (_directory, path) = cloud_document("memory");
    let mut command = cargo_bin_cmd!("cpi");
    command
        .env("CPI_CLOUD_CONFIG", &path)
        .env("CPI_SERVE_MODE", "continuous")
        .write_stdin(concat!(
            r#"{"method":"info","arguments":[]}"#,
            "\n",
            r#"{"method":"create_disk","arguments":[0,{}]}"#,
            "\n",
            "not json\n",
        ));
    let assert = command.assert().success();
    let responses = stdout_lines(&assert.get_output().stdout);
    let kinds: Vec<&Value> = responses
        .iter()
        .map(|response| &response["error"]["type"])
        .collect();
    assert_eq!(
        kinds,
        vec![
            &Value::Null,
            &Value::from("ActionError"),
            &Value::from("ProtocolError"),
        ]
    );
}

#[test]
fn unsupported_plugin_exits_with_failure() {
    let (_directory, path) = cloud_document("google");
    let mut command = cargo_bin_cmd!("cpi");
    command
        .env("CPI_CLOUD_CONFIG", &path)
        .write_stdin(r#"{"method":"info","arguments":[]}"#);
    command
        .assert()
        .failure()
        .stderr(contains("unsupported cloud plugin 'google'"));
}

#[test]
fn missing_cloud_document_exits_with_failure() {
    let directory = TempDir::new().expect("temp dir");
    let mut command = cargo_bin_cmd!("cpi");
    command
        .env("CPI_CLOUD_CONFIG", directory.path().join("absent.json"))
        .write_stdin("");
    command
        .assert()
        .failure()
        .stderr(contains("failed to load cloud configuration"));
}
