// ABOUTME: Integration tests for the pager CLI binary.
// ABOUTME: Tests config loading, JSON output to stdout and file, preview mode, and error exit codes.

use assert_cmd::assert::OutputAssertExt;
use assert_cmd::cargo::CommandCargoExt;
use httpmock::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

fn pager_cmd() -> Command {
    Command::cargo_bin("pager").unwrap()
}

fn write_config(dir: &TempDir, base_url: &str) -> PathBuf {
    let config = serde_json::json!({
        "base_url": base_url,
        "rules": {
            "item": "div.event",
            "title": ["h2", "h3"],
            "venue": "span.venue"
        },
        "max_pages": 2,
        "page_delay": [0.0, 0.0]
    });
    let path = dir.path().join("crawl.json");
    fs::write(&path, config.to_string()).unwrap();
    path
}

fn serve_listings(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path("/events/");
        then.status(200)
            .header("content-type", "text/html; charset=utf-8")
            .body(
                r#"<html><body>
                <div class="event"><h2>Spring Fair</h2><span class="venue">Park</span></div>
                <div class="event"><h3>Night Market</h3></div>
                </body></html>"#,
            );
    });
    server.mock(|when, then| {
        when.method(GET).path("/events/2.html");
        then.status(200)
            .header("content-type", "text/html; charset=utf-8")
            .body(r#"<div class="event"><h2>Lantern Walk</h2></div>"#);
    });
}

#[test]
fn crawl_prints_records_and_summary() {
    let server = MockServer::start();
    serve_listings(&server);
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&temp_dir, &server.url("/events/"));

    pager_cmd()
        .arg("--config")
        .arg(&config)
        .arg("--compact")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"stop_reason\":\"reached_limit\""))
        .stdout(predicate::str::contains("Spring Fair"))
        .stdout(predicate::str::contains("Night Market"))
        .stdout(predicate::str::contains("Lantern Walk"))
        .stdout(predicate::str::contains("\"venue\":\"unknown\""));
}

#[test]
fn max_pages_flag_overrides_config() {
    let server = MockServer::start();
    serve_listings(&server);
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&temp_dir, &server.url("/events/"));

    pager_cmd()
        .arg("--config")
        .arg(&config)
        .arg("--max-pages")
        .arg("1")
        .assert()
        .success()
        .stdout(predicate::str::contains("Spring Fair"))
        .stdout(predicate::str::contains("Lantern Walk").not());
}

#[test]
fn output_file_receives_json() {
    let server = MockServer::start();
    serve_listings(&server);
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&temp_dir, &server.url("/events/"));
    let output = temp_dir.path().join("out.json");

    pager_cmd()
        .arg("--config")
        .arg(&config)
        .arg("-o")
        .arg(&output)
        .assert()
        .success();

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written["summary"]["pages_processed"], 2);
    assert_eq!(written["records"].as_array().map(|r| r.len()), Some(3));
}

#[test]
fn fetch_failure_still_exits_zero() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&temp_dir, "http://127.0.0.1:9/events/");

    pager_cmd()
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("fetch_error"));
}

#[test]
fn invalid_config_exits_with_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("crawl.json");
    fs::write(
        &path,
        r#"{"base_url": "https://example.com/", "rules": {"item": "div[[["}}"#,
    )
    .unwrap();

    pager_cmd()
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn missing_config_file_exits_with_error() {
    pager_cmd()
        .arg("--config")
        .arg("/nonexistent/crawl.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn preview_prints_candidate_counts() {
    let server = MockServer::start();
    serve_listings(&server);

    pager_cmd()
        .arg("--preview")
        .arg(server.url("/events/"))
        .arg("--candidate")
        .arg("li.none")
        .arg("--candidate")
        .arg("div.event")
        .arg("--compact")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""selector":"li.none","count":0"#))
        .stdout(predicate::str::contains(r#""selector":"div.event","count":2"#));
}

#[test]
fn preview_of_unreachable_page_exits_with_error() {
    pager_cmd()
        .arg("--preview")
        .arg("http://127.0.0.1:9/events/")
        .assert()
        .failure();
}
