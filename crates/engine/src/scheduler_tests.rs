// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use super::*;
use substrat_core::SessionState;
use substrat_providers::{FakeProvider, ProviderCall};
use substrat_storage::SessionStore;
use tempfile::tempdir;

fn scheduler(dir: &std::path::Path, max_slots: usize) -> (TurnScheduler, FakeProvider) {
    let store = Arc::new(SessionStore::new(dir.join("sessions")));
    let provider = FakeProvider::new("fake");
    let mut scheduler = TurnScheduler::new(store, max_slots).with_log_root(dir.join("sessions"));
    scheduler.register_provider(Arc::new(provider.clone()));
    (scheduler, provider)
}

#[tokio::test]
async fn create_session_activates_and_logs() {
    let dir = tempdir().unwrap();
    let (mut scheduler, _provider) = scheduler(dir.path(), 2);

    let session = scheduler.create_session("fake", "model-x", "be nice").await.unwrap();
    assert_eq!(session.state, SessionState::Active);

    let log_path = dir.path().join("sessions").join(session.id.hex()).join("events.jsonl");
    let entries = substrat_storage::read_log(&log_path).unwrap();
    assert!(entries.iter().any(|e| e.event == "session.created"));
}

#[tokio::test]
async fn create_session_fails_on_unknown_provider() {
    let dir = tempdir().unwrap();
    let (mut scheduler, _provider) = scheduler(dir.path(), 2);
    let result = scheduler.create_session("nope", "model-x", "p").await;
    assert!(matches!(result, Err(SchedulerError::UnknownProvider(name)) if name == "nope"));
}

#[tokio::test]
async fn send_turn_returns_concatenated_chunks_and_logs_turn_events() {
    let dir = tempdir().unwrap();
    let (mut scheduler, provider) = scheduler(dir.path(), 2);
    provider.set_default_response(vec!["hello ".to_string(), "world".to_string()]);

    let session = scheduler.create_session("fake", "model-x", "p").await.unwrap();
    let response = scheduler.send_turn(session.id, "hi").await.unwrap();
    assert_eq!(response, "hello world");

    let log_path = dir.path().join("sessions").join(session.id.hex()).join("events.jsonl");
    let entries = substrat_storage::read_log(&log_path).unwrap();
    assert!(entries.iter().any(|e| e.event == "turn.start"));
    let complete = entries.iter().find(|e| e.event == "turn.complete").unwrap();
    assert_eq!(complete.data.as_ref().unwrap()["response"], "hello world");
}

#[tokio::test]
async fn send_turn_releases_slot_and_skips_deferred_on_provider_failure() {
    let dir = tempdir().unwrap();
    let (mut scheduler, provider) = scheduler(dir.path(), 2);

    let session = scheduler.create_session("fake", "model-x", "p").await.unwrap();
    provider.fail_all_sends();

    let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let ran_clone = ran.clone();
    scheduler.defer(Box::pin(async move {
        ran_clone.store(true, std::sync::atomic::Ordering::SeqCst);
    }));

    let result = scheduler.send_turn(session.id, "go").await;
    assert!(result.is_err());
    assert!(scheduler.mux().contains(session.id));
    assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
}

#[tokio::test]
async fn eviction_then_send_turn_transparently_restores_and_logs_session_restored() {
    let dir = tempdir().unwrap();
    let (mut scheduler, provider) = scheduler(dir.path(), 1);
    provider.set_default_response(vec!["response".to_string()]);

    let s1 = scheduler.create_session("fake", "model-x", "p").await.unwrap();
    let s2 = scheduler.create_session("fake", "model-x", "p").await.unwrap();
    assert!(!scheduler.mux().contains(s1.id));
    assert!(scheduler.mux().contains(s2.id));

    let response = scheduler.send_turn(s1.id, "hello").await.unwrap();
    assert_eq!(response, "response");
    assert!(scheduler.mux().contains(s1.id));
    assert!(!scheduler.mux().contains(s2.id));

    let log_path = dir.path().join("sessions").join(s1.id.hex()).join("events.jsonl");
    let entries = substrat_storage::read_log(&log_path).unwrap();
    assert!(entries.iter().any(|e| e.event == "session.restored"));
    assert!(provider.calls().iter().any(|c| matches!(c, ProviderCall::Restore { .. })));
}

#[tokio::test]
async fn terminate_session_stops_provider_and_removes_from_mux() {
    let dir = tempdir().unwrap();
    let (mut scheduler, provider) = scheduler(dir.path(), 2);
    let session = scheduler.create_session("fake", "model-x", "p").await.unwrap();

    scheduler.terminate_session(session.id).await.unwrap();

    assert!(!scheduler.mux().contains(session.id));
    assert!(provider.calls().iter().any(|c| matches!(c, ProviderCall::Stop)));
}
