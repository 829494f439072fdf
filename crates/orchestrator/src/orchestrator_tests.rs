// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use substrat_core::agent::{AgentState, TreeError};
use substrat_providers::FakeProvider;
use substrat_storage::{read_log, SessionStore};
use tempfile::tempdir;

use super::*;

fn new_orchestrator(dir: &std::path::Path, max_slots: usize) -> (Orchestrator, FakeProvider) {
    let store = Arc::new(SessionStore::new(dir.join("sessions")));
    let provider = FakeProvider::new("fake");
    let mut scheduler = TurnScheduler::new(store, max_slots).with_log_root(dir.join("sessions"));
    scheduler.register_provider(Arc::new(provider.clone()));
    let orchestrator = Orchestrator::new(scheduler, "fake", "model-x");
    (orchestrator, provider)
}

fn events_path(dir: &std::path::Path, session_id: substrat_core::ids::SessionId) -> std::path::PathBuf {
    dir.join("sessions").join(session_id.hex()).join("events.jsonl")
}

#[tokio::test]
async fn basic_turn_returns_response_and_logs_lifecycle() {
    let dir = tempdir().unwrap();
    let (orchestrator, provider) = new_orchestrator(dir.path(), 2);
    provider.set_default_response(vec!["response".to_string()]);

    let alpha = orchestrator
        .create_root_agent("alpha", "do things", None, None)
        .await
        .unwrap();
    let response = orchestrator.run_turn(alpha, "hello").await.unwrap();
    assert_eq!(response, "response");

    let session_id = orchestrator.agent_snapshot(alpha).unwrap().session_id;
    let entries = read_log(&events_path(dir.path(), session_id)).unwrap();
    let events: Vec<&str> = entries.iter().map(|e| e.event.as_str()).collect();
    assert!(events.contains(&"agent.created"));
    assert!(events.contains(&"session.created"));
    assert!(events.contains(&"turn.start"));
    let complete = entries.iter().find(|e| e.event == "turn.complete").unwrap();
    assert_eq!(complete.data.as_ref().unwrap()["response"], "response");

    assert_eq!(orchestrator.agent_snapshot(alpha).unwrap().state, AgentState::Idle);
}

#[tokio::test]
async fn spawn_and_grandchild_resolve_parent_session_ids() {
    let dir = tempdir().unwrap();
    let (orchestrator, provider) = new_orchestrator(dir.path(), 4);
    provider.set_default_response(vec!["ok".to_string()]);

    let root = orchestrator
        .create_root_agent("root", "ri", None, None)
        .await
        .unwrap();
    let spawn = orchestrator.spawn_agent(root, "child", "ci").await.unwrap();
    let child_id: AgentId = spawn.agent_id.parse().unwrap();

    // Child is in the tree with an eager inbox but no handler yet.
    assert!(!orchestrator.has_handler(child_id));

    orchestrator.run_turn(root, "go").await.unwrap();

    // The deferred spawn callback has run by now.
    assert!(orchestrator.has_handler(child_id));
    let child_session = orchestrator.agent_snapshot(child_id).unwrap().session_id;
    let root_session = orchestrator.agent_snapshot(root).unwrap().session_id;

    let entries = read_log(&events_path(dir.path(), child_session)).unwrap();
    let created = entries.iter().find(|e| e.event == "agent.created").unwrap();
    assert_eq!(
        created.data.as_ref().unwrap()["parent_session_id"],
        root_session.hex()
    );

    let grandspawn = orchestrator
        .spawn_agent(child_id, "grandchild", "gi")
        .await
        .unwrap();
    let grandchild_id: AgentId = grandspawn.agent_id.parse().unwrap();
    orchestrator.run_turn(child_id, "go").await.unwrap();

    assert!(orchestrator.has_handler(grandchild_id));
    assert_eq!(orchestrator.agent_count(), 3);

    let grandchild_session = orchestrator.agent_snapshot(grandchild_id).unwrap().session_id;
    let entries = read_log(&events_path(dir.path(), grandchild_session)).unwrap();
    let created = entries.iter().find(|e| e.event == "agent.created").unwrap();
    assert_eq!(
        created.data.as_ref().unwrap()["parent_session_id"],
        child_session.hex()
    );
}

#[tokio::test]
async fn eviction_then_run_turn_transparently_restores() {
    let dir = tempdir().unwrap();
    let (orchestrator, provider) = new_orchestrator(dir.path(), 1);
    provider.set_default_response(vec!["response".to_string()]);

    let a = orchestrator.create_root_agent("a", "pa", None, None).await.unwrap();
    // Creating b, with max_slots = 1, evicts a's slot.
    let _b = orchestrator.create_root_agent("b", "pb", None, None).await.unwrap();

    let response = orchestrator.run_turn(a, "hello").await.unwrap();
    assert_eq!(response, "response");

    let a_session = orchestrator.agent_snapshot(a).unwrap().session_id;
    let entries = read_log(&events_path(dir.path(), a_session)).unwrap();
    assert!(entries.iter().any(|e| e.event == "session.restored"));
}

#[tokio::test]
async fn provider_failure_resets_agent_to_idle_and_keeps_slot() {
    let dir = tempdir().unwrap();
    let (orchestrator, provider) = new_orchestrator(dir.path(), 2);

    let x = orchestrator.create_root_agent("x", "p", None, None).await.unwrap();
    let spawn = orchestrator.spawn_agent(x, "child", "ci").await.unwrap();
    let child_id: AgentId = spawn.agent_id.parse().unwrap();
    provider.fail_all_sends();

    let result = orchestrator.run_turn(x, "go").await;
    assert!(result.is_err());
    assert_eq!(orchestrator.agent_snapshot(x).unwrap().state, AgentState::Idle);

    // The child's session was never created because the turn aborted before
    // the scheduler's post-turn deferred drain ran.
    assert!(!orchestrator.has_handler(child_id));
}

#[tokio::test]
async fn terminate_agent_fails_with_children_and_succeeds_on_leaf() {
    let dir = tempdir().unwrap();
    let (orchestrator, provider) = new_orchestrator(dir.path(), 4);
    provider.set_default_response(vec!["ok".to_string()]);

    let root = orchestrator.create_root_agent("root", "ri", None, None).await.unwrap();
    orchestrator.spawn_agent(root, "child", "ci").await.unwrap();
    orchestrator.run_turn(root, "go").await.unwrap();
    let child_id = orchestrator
        .agent_snapshot(root)
        .unwrap()
        .children
        .first()
        .copied()
        .unwrap();

    let err = orchestrator.terminate_agent(root).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::Tree(TreeError::HasChildren(_))));

    orchestrator.terminate_agent(child_id).await.unwrap();
    orchestrator.terminate_agent(root).await.unwrap();
    assert_eq!(orchestrator.agent_count(), 0);
}

#[tokio::test]
async fn send_message_and_check_inbox_round_trip() {
    let dir = tempdir().unwrap();
    let (orchestrator, provider) = new_orchestrator(dir.path(), 4);
    provider.set_default_response(vec!["ok".to_string()]);

    let root = orchestrator.create_root_agent("root", "ri", None, None).await.unwrap();
    orchestrator.spawn_agent(root, "child", "ci").await.unwrap();
    orchestrator.run_turn(root, "go").await.unwrap();
    let child_id = orchestrator
        .agent_snapshot(root)
        .unwrap()
        .children
        .first()
        .copied()
        .unwrap();

    let sent = orchestrator
        .send_message(root, "child", "hello from root", false)
        .await
        .unwrap();
    assert_eq!(sent.status, "sent");

    let inbox = orchestrator.check_inbox(child_id).await;
    assert_eq!(inbox.messages.len(), 1);
    assert_eq!(inbox.messages[0].text, "hello from root");
    assert_eq!(inbox.messages[0].from, "root");
}
