//! End-to-end tests for the reconstruct command.
//!
//! Drives the compiled binary over file and stdin inputs and checks the
//! emitted record stream.

use std::io::Write;
use std::process::{Command, Stdio};

use tempfile::TempDir;

fn basal_binary() -> String {
    env!("CARGO_BIN_EXE_basal").to_string()
}

/// The carelink scenario used throughout: a scheduled rate interrupted by a
/// temp override, followed by two more rate changes.
fn carelink_events() -> serde_json::Value {
    serde_json::json!([
        {
            "id": "abcd", "type": "basal", "deliveryType": "scheduled",
            "source": "carelink", "deviceId": "pump-1",
            "deviceTime": "2014-03-07T01:00:00", "value": 0.65,
            "scheduleName": "night-shift"
        },
        {
            "id": "abcde", "type": "basal", "deliveryType": "temp",
            "source": "carelink", "deviceId": "pump-1",
            "deviceTime": "2014-03-07T01:38:27", "value": 1.7,
            "duration": 3_600_000
        },
        {
            "id": "abcdef", "type": "basal", "deliveryType": "scheduled",
            "source": "carelink", "deviceId": "pump-1",
            "deviceTime": "2014-03-07T04:00:00", "value": 0.32,
            "scheduleName": "night-shift"
        },
        {
            "id": "abcdefg", "type": "basal", "deliveryType": "scheduled",
            "source": "carelink", "deviceId": "pump-1",
            "deviceTime": "2014-03-07T12:00:00", "value": 1.02,
            "scheduleName": "night-shift"
        }
    ])
}

fn run_with_file(temp: &TempDir, input: &str, args: &[&str]) -> std::process::Output {
    let path = temp.path().join("events.json");
    std::fs::write(&path, input).unwrap();

    Command::new(basal_binary())
        .env("HOME", temp.path())
        .arg("reconstruct")
        .arg(&path)
        .args(args)
        .output()
        .expect("failed to run basal reconstruct")
}

fn parse_jsonl(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("output line should be JSON"))
        .collect()
}

#[test]
fn test_reconstruct_json_array_file() {
    let temp = TempDir::new().unwrap();
    let output = run_with_file(&temp, &carelink_events().to_string(), &[]);
    assert!(
        output.status.success(),
        "reconstruct should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let records = parse_jsonl(&output.stdout);
    assert_eq!(records.len(), 4);
    for record in &records {
        assert_eq!(record["type"], "basal-rate-segment");
    }

    assert_eq!(records[0]["start"], "2014-03-07T01:00:00");
    assert_eq!(records[0]["end"], "2014-03-07T04:00:00");
    assert_eq!(records[0]["scheduleName"], "night-shift");

    assert_eq!(records[1]["id"], "abcde");
    assert_eq!(records[1]["end"], "2014-03-07T02:38:27");

    assert_eq!(records[2]["start"], "2014-03-07T04:00:00");
    assert_eq!(records[2]["end"], "2014-03-07T12:00:00");

    // Final segment is still open: end is present but null.
    assert_eq!(records[3]["start"], "2014-03-07T12:00:00");
    assert!(records[3]["end"].is_null());
    assert!(records[3].as_object().unwrap().contains_key("end"));
}

#[test]
fn test_reconstruct_jsonl_from_stdin() {
    let events = carelink_events();
    let jsonl: String = events
        .as_array()
        .unwrap()
        .iter()
        .map(|event| format!("{event}\n"))
        .collect();

    let temp = TempDir::new().unwrap();
    let mut child = Command::new(basal_binary())
        .env("HOME", temp.path())
        .arg("reconstruct")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .as_mut()
        .unwrap()
        .write_all(jsonl.as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    let records = parse_jsonl(&output.stdout);
    assert_eq!(records.len(), 4);
}

#[test]
fn test_pretty_flag_emits_one_array() {
    let temp = TempDir::new().unwrap();
    let output = run_with_file(&temp, &carelink_events().to_string(), &["--pretty"]);
    assert!(output.status.success());

    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(records.as_array().unwrap().len(), 4);
}

#[test]
fn test_pretty_via_config_file() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("config.toml");
    std::fs::write(&config_path, "pretty = true\n").unwrap();

    let input_path = temp.path().join("events.json");
    std::fs::write(&input_path, carelink_events().to_string()).unwrap();

    let output = Command::new(basal_binary())
        .env("HOME", temp.path())
        .arg("--config")
        .arg(&config_path)
        .arg("reconstruct")
        .arg(&input_path)
        .output()
        .unwrap();

    assert!(output.status.success());
    let records: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(records.is_array());
}

#[test]
fn test_boluses_flag_merges_dual_wave() {
    let input = serde_json::json!([
        {
            "id": "b1", "type": "bolus", "subType": "dual/normal",
            "deviceTime": "2014-01-01T01:00:00", "value": 3.5,
            "joinKey": "k1"
        },
        {
            "id": "b2", "type": "bolus", "subType": "dual/square",
            "deviceTime": "2014-01-01T01:00:00", "value": 1.5,
            "joinKey": "k1", "duration": 14_400_000
        }
    ]);

    let temp = TempDir::new().unwrap();
    let output = run_with_file(&temp, &input.to_string(), &["--boluses"]);
    assert!(output.status.success());

    let records = parse_jsonl(&output.stdout);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["id"], "b1");
    assert_eq!(records[0]["value"], 5.0);
    assert_eq!(records[0]["extended"], true);
}

#[test]
fn test_malformed_event_fails_with_offending_id() {
    let input = serde_json::json!([
        {
            "id": "broken", "type": "basal", "deliveryType": "temp",
            "source": "carelink", "duration": 3_600_000
        }
    ]);

    let temp = TempDir::new().unwrap();
    let output = run_with_file(&temp, &input.to_string(), &[]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("broken"));
}

#[test]
fn test_unparseable_line_reports_line_number() {
    let temp = TempDir::new().unwrap();
    let output = run_with_file(&temp, "{\"id\": \"a\", \"type\": \"smbg\"}\nnope\n", &[]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("line 2"));
}
