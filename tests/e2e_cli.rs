
use std::fs;

use tempfile::tempdir;

use support_server::{Behavior, run_tester, spawn_http_server};

fn failure(output: &std::process::Output) -> String {
    format!(
        "status: {:?}\nstdout: {}\nstderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

#[test]
fn e2e_json_output_reports_detected_headers() -> Result<(), String> {
    let (url, _server) = spawn_http_server(Behavior::ThrottleEveryThird)?;
    let output = run_tester([
        "--url",
        url.as_str(),
        "--rps",
        "12",
        "--burst-size",
        "3",
        "--duration",
        "500ms",
        "--output-format",
        "json",
    ])?;
    if !output.status.success() {
        return Err(failure(&output));
    }
    let value: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|err| format!("stdout is not JSON: {}\n{}", err, failure(&output)))?;
    if value.pointer("/detected_headers/retry-after") != Some(&serde_json::json!("10")) {
        return Err(format!("Missing Retry-After: {}", value));
    }
    if value.pointer("/total_requests") != Some(&serde_json::json!(6)) {
        return Err(format!("Expected 6 requests: {}", value));
    }
    Ok(())
}

#[test]
fn e2e_text_summary_and_exports() -> Result<(), String> {
    let (url, _server) = spawn_http_server(Behavior::Ok)?;
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let csv = dir.path().join("records.csv");
    let jsonl = dir.path().join("records.jsonl");

    let output = run_tester([
        "-u",
        url.as_str(),
        "-r",
        "10",
        "-b",
        "2",
        "-t",
        "400ms",
        "--export-csv",
        &csv.to_string_lossy(),
        "--export-jsonl",
        &jsonl.to_string_lossy(),
    ])?;
    if !output.status.success() {
        return Err(failure(&output));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.contains("x-ratelimit-limit: 1000") {
        return Err(format!("Summary misses detected headers:\n{}", stdout));
    }

    let csv_text = fs::read_to_string(&csv).map_err(|err| format!("read csv failed: {}", err))?;
    let mut csv_lines = csv_text.lines();
    if csv_lines.next() != Some("relative_time,latency,status_code,error") {
        return Err(format!("Unexpected CSV header:\n{}", csv_text));
    }
    if csv_lines.count() != 4 {
        return Err(format!("Expected 4 CSV rows:\n{}", csv_text));
    }

    let jsonl_text =
        fs::read_to_string(&jsonl).map_err(|err| format!("read jsonl failed: {}", err))?;
    if !jsonl_text.starts_with("{\"type\":\"summary\"") || jsonl_text.lines().count() != 5 {
        return Err(format!("Unexpected JSONL:\n{}", jsonl_text));
    }
    Ok(())
}

#[test]
fn e2e_config_file_supplies_target() -> Result<(), String> {
    let (url, _server) = spawn_http_server(Behavior::Ok)?;
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let config_path = dir.path().join("probe.toml");
    let config = format!(
        "url = \"{}\"\nrps = 4\nduration = \"250ms\"\nburst_size = 1\noutput_format = \"csv\"\n",
        url
    );
    fs::write(&config_path, config).map_err(|err| format!("write config failed: {}", err))?;

    let output = run_tester(["--config", &config_path.to_string_lossy()])?;
    if !output.status.success() {
        return Err(failure(&output));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.starts_with("relative_time,latency,status_code,error") {
        return Err(format!("Expected CSV on stdout:\n{}", stdout));
    }
    Ok(())
}

#[test]
fn e2e_rejects_invalid_rate() -> Result<(), String> {
    let (url, server) = spawn_http_server(Behavior::Ok)?;
    let output = run_tester(["--url", url.as_str(), "--rps", "0"])?;
    if output.status.success() {
        return Err(format!("Expected failure\n{}", failure(&output)));
    }
    if server.hits() != 0 {
        return Err("No request should be sent".to_owned());
    }
    Ok(())
}

#[test]
fn e2e_output_requires_machine_format() -> Result<(), String> {
    let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
    let out = dir.path().join("out.txt");
    let output = run_tester([
        "--url",
        "http://127.0.0.1:9/",
        "--output",
        &out.to_string_lossy(),
    ])?;
    if output.status.success() {
        return Err(format!("Expected failure\n{}", failure(&output)));
    }
    Ok(())
}
