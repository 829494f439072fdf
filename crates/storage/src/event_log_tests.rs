// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;

use super::*;
use tempfile::tempdir;

fn ctx() -> BTreeMap<String, String> {
    let mut c = BTreeMap::new();
    c.insert("agent_id".to_string(), "abc123".to_string());
    c
}

#[test]
fn log_appends_one_line_per_event() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("agent.jsonl");
    let mut log = EventLog::new(&path, ctx());
    log.open().unwrap();
    log.log("agent.created", None).unwrap();
    log.log("agent.activated", Some(serde_json::json!({"k": "v"}))).unwrap();
    log.close();

    let entries = read_log(&path).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].event, "agent.created");
    assert_eq!(entries[1].event, "agent.activated");
    assert_eq!(entries[1].data.as_ref().unwrap()["k"], "v");
    assert_eq!(entries[0].context["agent_id"], "abc123");
}

#[test]
fn log_before_open_is_not_open_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("agent.jsonl");
    let mut log = EventLog::new(&path, ctx());
    match log.log("x", None) {
        Err(EventLogError::NotOpen) => {}
        other => panic!("expected NotOpen, got {other:?}"),
    }
}

#[test]
fn no_pending_file_left_after_successful_log() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("agent.jsonl");
    let mut log = EventLog::new(&path, ctx());
    log.open().unwrap();
    log.log("evt", None).unwrap();
    assert!(!path.with_extension("pending").exists());
}

#[test]
fn recovers_pending_entry_not_yet_in_main_log() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("agent.jsonl");
    let pending_path = path.with_extension("pending");

    let line = b"{\"ts\":\"t\",\"event\":\"crashed\"}\n";
    let mut f = fs::File::create(&pending_path).unwrap();
    f.write_all(line).unwrap();
    drop(f);

    let mut log = EventLog::new(&path, ctx());
    log.open().unwrap();
    log.close();

    assert!(!pending_path.exists());
    let entries = read_log(&path).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].event, "crashed");
}

#[test]
fn recovery_is_idempotent_when_pending_already_tail_of_log() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("agent.jsonl");
    let pending_path = path.with_extension("pending");

    let line = b"{\"ts\":\"t\",\"event\":\"done\"}\n";
    fs::write(&path, line).unwrap();
    fs::write(&pending_path, line).unwrap();

    let mut log = EventLog::new(&path, ctx());
    log.open().unwrap();
    log.close();

    assert!(!pending_path.exists());
    let entries = read_log(&path).unwrap();
    assert_eq!(entries.len(), 1);
}

#[test]
fn truncates_partial_trailing_line_on_open() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("agent.jsonl");
    fs::write(&path, b"{\"ts\":\"t\",\"event\":\"ok\"}\n{\"ts\":\"t\",\"event\":\"tor").unwrap();

    let mut log = EventLog::new(&path, ctx());
    log.open().unwrap();
    log.close();

    let entries = read_log(&path).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].event, "ok");
}

#[test]
fn read_log_on_missing_file_returns_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing.jsonl");
    assert_eq!(read_log(&path).unwrap().len(), 0);
}

#[test]
fn read_log_skips_corrupt_middle_line() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("agent.jsonl");
    fs::write(
        &path,
        b"{\"ts\":\"t\",\"event\":\"a\"}\nnot json at all\n{\"ts\":\"t\",\"event\":\"b\"}\n",
    )
    .unwrap();

    let entries = read_log(&path).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].event, "a");
    assert_eq!(entries[1].event, "b");
}

#[test]
fn read_log_without_open_drops_truncated_tail_directly() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("agent.jsonl");
    fs::write(&path, b"{\"ts\":\"t\",\"event\":\"ok\"}\n{\"ts\":\"t\",\"eve").unwrap();

    let entries = read_log(&path).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].event, "ok");
}
