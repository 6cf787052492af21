//! Integration tests for the command-line surface

use assert_cmd::Command;
use tempfile::TempDir;

use crate::support::{column, identifiers_csv, write_csv};

fn bin() -> Command {
    Command::cargo_bin("aircraft-enricher").unwrap()
}

/// A local URL nothing listens on.
fn refused_endpoint() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/search")
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_status_reports_resume_index() {
    let dir = TempDir::new().unwrap();
    let input = write_csv(
        dir.path(),
        "aircraft.csv",
        "N-NUMBER,STATUS\nN1,Valid\nN2,Valid\nN3,\nN4,\n",
    );

    let output = bin()
        .args(["status", "--input", input.to_str().unwrap(), "--output-format", "json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["status"]["total"], 4);
    assert_eq!(json["status"]["complete"], 2);
    assert_eq!(json["status"]["resume_index"], 2);
}

#[test]
fn test_status_human_output() {
    let dir = TempDir::new().unwrap();
    let input = identifiers_csv(dir.path(), "aircraft.csv", &["N1", "N2"]);

    let output = bin()
        .args(["status", "--input", input.to_str().unwrap()])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Records: 2"));
    assert!(stdout.contains("Next run resumes at record 0."));
}

#[test]
fn test_enrich_with_unreachable_registry_leaves_rows_incomplete() {
    let dir = TempDir::new().unwrap();
    let input = identifiers_csv(dir.path(), "aircraft.csv", &["N1", "N2", "N3"]);
    let endpoint = refused_endpoint();

    let output = bin()
        .args([
            "enrich",
            "--input",
            input.to_str().unwrap(),
            "--endpoint",
            endpoint.as_str(),
            "--fields",
            "STATUS,MODEL",
            "--batch-size",
            "2",
            "--timeout-secs",
            "5",
            "--output-format",
            "json",
        ])
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let json = stdout_json(&output);
    assert_eq!(json["success"], true);
    assert_eq!(json["summary"]["fetch_failed"], 3);
    assert_eq!(json["summary"]["enriched"], 0);
    assert_eq!(json["summary"]["batches_flushed"], 2);
    assert_eq!(json["summary"]["next_index"], 0);

    assert_eq!(column(&input, "STATUS"), vec!["", "", ""]);
    assert_eq!(column(&input, "SERIAL NUMBER"), vec!["SN0", "SN1", "SN2"]);
}

#[test]
fn test_failed_flush_reports_summary_in_json() {
    let dir = TempDir::new().unwrap();
    let input = identifiers_csv(dir.path(), "aircraft.csv", &["N1"]);
    let out_dir = dir.path().join("out.csv");
    std::fs::create_dir(&out_dir).unwrap();
    let endpoint = refused_endpoint();

    let output = bin()
        .args([
            "enrich",
            "--input",
            input.to_str().unwrap(),
            "--output",
            out_dir.to_str().unwrap(),
            "--force",
            "--endpoint",
            endpoint.as_str(),
            "--fields",
            "STATUS",
            "--timeout-secs",
            "5",
            "--output-format",
            "json",
        ])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let json = stdout_json(&output);
    assert_eq!(json["success"], false);
    assert_eq!(json["summary"]["status"], "failed");
    assert_eq!(json["summary"]["fetch_failed"], 1);
    assert_eq!(json["summary"]["next_index"], 0);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("failed to persist dataset").count(), 1, "stderr: {stderr}");
}

#[test]
fn test_invalid_batch_size_is_rejected() {
    let dir = TempDir::new().unwrap();
    let input = identifiers_csv(dir.path(), "aircraft.csv", &["N1"]);

    bin()
        .args(["enrich", "--input", input.to_str().unwrap(), "--batch-size", "0"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_unknown_completion_field_is_config_error() {
    let dir = TempDir::new().unwrap();
    let input = identifiers_csv(dir.path(), "aircraft.csv", &["N1"]);

    bin()
        .args([
            "enrich",
            "--input",
            input.to_str().unwrap(),
            "--fields",
            "MODEL",
            "--completion-field",
            "STATUS",
        ])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_missing_input_fails() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.csv");

    bin()
        .args(["status", "--input", missing.to_str().unwrap()])
        .assert()
        .failure()
        .code(1);
}
