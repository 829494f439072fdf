// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup recovery: reconstruct the tree, inboxes, handler registry, and
//! pending messages from persisted session records and their event logs.
//!
//! Run once against a freshly constructed [`Orchestrator`] backed by the
//! same store a prior process used.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use serde_json::Value;

use substrat_core::agent::AgentNode;
use substrat_core::ids::{AgentId, MessageId, SessionId};
use substrat_core::message::{MessageEnvelope, MessageKind};
use substrat_core::{Session, SessionState};
use substrat_storage::LogEntry;

use crate::error::OrchestratorError;
use crate::orchestrator::{HandlerEntry, Orchestrator};

/// A session whose `agent.created` record resolved cleanly; a candidate for
/// re-installation into the tree.
struct Recovered {
    session: Session,
    agent_id: AgentId,
    name: String,
    instructions: String,
    parent_session_id: Option<SessionId>,
    created_at: String,
}

impl Orchestrator {
    /// Reconstruct everything this orchestrator owns from the session
    /// store and each session's event log. Must run before any other call
    /// on a fresh orchestrator.
    pub async fn recover(&self) -> Result<(), OrchestratorError> {
        let sessions = {
            let scheduler = self.inner.scheduler.lock().await;
            scheduler.store().recover()?
        };

        let mut recovered: Vec<Recovered> = Vec::new();

        for session in sessions {
            if session.state == SessionState::Terminated {
                continue;
            }

            let entries = {
                let scheduler = self.inner.scheduler.lock().await;
                scheduler.read_session_log(session.id)?
            };

            if entries.iter().any(|e| e.event == "agent.terminated") {
                // Crash happened between logging the intent to terminate
                // and persisting the terminal session state. Treat it as
                // already gone; don't resurrect it.
                continue;
            }

            match parse_agent_created(&entries) {
                Some(parsed) => recovered.push(Recovered {
                    session,
                    agent_id: parsed.agent_id,
                    name: parsed.name,
                    instructions: parsed.instructions,
                    parent_session_id: parsed.parent_session_id,
                    created_at: parsed.created_at,
                }),
                None => {
                    tracing::warn!(session_id = %session.id, "orphan session with no agent.created record, terminating");
                    self.terminate_orphan(&session).await?;
                }
            }
        }

        let session_to_agent: HashMap<SessionId, AgentId> = recovered
            .iter()
            .map(|r| (r.session.id, r.agent_id))
            .collect();

        let mut pending: Vec<Recovered> = Vec::new();
        for r in recovered {
            let parent_resolves = match r.parent_session_id {
                None => true,
                Some(psid) => session_to_agent.contains_key(&psid),
            };
            if parent_resolves {
                pending.push(r);
            } else {
                tracing::warn!(agent_id = %r.agent_id, "agent's parent session does not resolve, terminating");
                self.terminate_orphan(&r.session).await?;
            }
        }

        // Topological placement: roots (no parent) and any agent whose
        // parent has already been placed. A pass that places nothing means
        // whatever remains is a cycle or otherwise unresolvable.
        let mut placed_ids: HashSet<AgentId> = HashSet::new();
        let mut ordered: Vec<Recovered> = Vec::new();
        let mut remaining = pending;

        loop {
            if remaining.is_empty() {
                break;
            }
            let mut progressed = false;
            let mut next_round = Vec::new();
            for r in remaining {
                let ready = match r.parent_session_id {
                    None => true,
                    Some(psid) => session_to_agent
                        .get(&psid)
                        .map(|paid| placed_ids.contains(paid))
                        .unwrap_or(false),
                };
                if ready {
                    placed_ids.insert(r.agent_id);
                    ordered.push(r);
                    progressed = true;
                } else {
                    next_round.push(r);
                }
            }
            remaining = next_round;
            if !progressed {
                for r in remaining {
                    tracing::warn!(agent_id = %r.agent_id, "agent stuck in an unresolvable parent cycle, terminating");
                    self.terminate_orphan(&r.session).await?;
                }
                break;
            }
        }

        // Install nodes, inboxes, and handler entries in topological order
        // (parents before children) without holding any lock across an
        // await point.
        {
            let mut tree = self.inner.tree.lock();
            let mut inboxes = self.inner.inboxes.lock();
            let mut handlers = self.inner.handlers.lock();
            for r in &ordered {
                let mut node = AgentNode::new(r.session.id, r.name.clone(), r.instructions.clone())
                    .with_id(r.agent_id);
                if let Some(psid) = r.parent_session_id {
                    if let Some(parent_agent_id) = session_to_agent.get(&psid) {
                        node = node.with_parent(*parent_agent_id);
                    }
                }
                node.created_at = r.created_at.clone();
                if let Err(err) = tree.add(node) {
                    tracing::warn!(agent_id = %r.agent_id, error = %err, "failed to reinsert recovered agent, skipping");
                    continue;
                }
                inboxes.insert(r.agent_id, substrat_core::inbox::Inbox::new());
                handlers.insert(
                    r.agent_id,
                    HandlerEntry {
                        provider: r.session.provider_name.clone(),
                        model: r.session.model.clone(),
                    },
                );
            }
        }

        for r in &ordered {
            let mut scheduler = self.inner.scheduler.lock().await;
            scheduler.restore_session(r.session.clone())?;
        }

        // Message recovery: replay enqueued/delivered events per surviving
        // agent's own log, which already only ever records messages
        // addressed to (enqueued) or drained by (delivered) that agent.
        let mut logs_by_agent = Vec::with_capacity(ordered.len());
        for r in &ordered {
            let entries = {
                let scheduler = self.inner.scheduler.lock().await;
                scheduler.read_session_log(r.session.id)?
            };
            logs_by_agent.push((r.agent_id, entries));
        }

        {
            let mut inboxes = self.inner.inboxes.lock();
            for (agent_id, entries) in logs_by_agent {
                replay_messages(&mut inboxes, agent_id, &entries);
            }
        }

        Ok(())
    }

    async fn terminate_orphan(&self, session: &Session) -> Result<(), OrchestratorError> {
        if session.state == SessionState::Terminated {
            return Ok(());
        }
        let mut scheduler = self.inner.scheduler.lock().await;
        scheduler.terminate_session(session.id).await?;
        Ok(())
    }
}

struct ParsedCreated {
    agent_id: AgentId,
    name: String,
    instructions: String,
    parent_session_id: Option<SessionId>,
    created_at: String,
}

/// Find the most recent `agent.created` entry and parse its fields. `None`
/// if no such entry exists or its `agent_id` doesn't parse.
fn parse_agent_created(entries: &[LogEntry]) -> Option<ParsedCreated> {
    let entry = entries.iter().rev().find(|e| e.event == "agent.created")?;
    let data = entry.data.as_ref()?;
    let agent_id = data.get("agent_id")?.as_str()?.parse::<AgentId>().ok()?;
    let name = data
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let instructions = data
        .get("instructions")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let parent_session_id = match data.get("parent_session_id") {
        Some(Value::String(s)) => s.parse::<SessionId>().ok(),
        _ => None,
    };
    Some(ParsedCreated {
        agent_id,
        name,
        instructions,
        parent_session_id,
        created_at: entry.ts.clone(),
    })
}

/// Reconstruct a [`MessageEnvelope`] from a `message.enqueued` event's data.
fn envelope_from_enqueued(data: &Value) -> Option<MessageEnvelope> {
    let id = data.get("message_id")?.as_str()?.parse::<MessageId>().ok()?;
    let sender = data.get("sender")?.as_str()?.parse::<AgentId>().ok()?;
    let recipient = match data.get("recipient") {
        Some(Value::String(s)) => s.parse::<AgentId>().ok(),
        _ => None,
    };
    let timestamp = data
        .get("timestamp")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let payload = data
        .get("payload")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let kind = match data.get("kind").and_then(Value::as_str) {
        Some("request") => MessageKind::Request,
        Some("response") => MessageKind::Response,
        Some("notification") => MessageKind::Notification,
        Some("multicast") => MessageKind::Multicast,
        _ => return None,
    };
    let metadata = data
        .get("metadata")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();

    Some(MessageEnvelope {
        id,
        timestamp,
        sender,
        recipient,
        reply_to: None,
        kind,
        payload,
        metadata,
    })
}

fn replay_messages(
    inboxes: &mut substrat_core::tools::InboxRegistry,
    agent_id: AgentId,
    entries: &[LogEntry],
) {
    for entry in entries {
        if entry.event != "message.enqueued" {
            continue;
        }
        let Some(data) = &entry.data else { continue };
        let Some(envelope) = envelope_from_enqueued(data) else {
            continue;
        };
        inboxes
            .entry(agent_id)
            .or_insert_with(substrat_core::inbox::Inbox::new)
            .deliver(envelope);
    }

    for entry in entries {
        if entry.event != "message.delivered" {
            continue;
        }
        let Some(data) = &entry.data else { continue };
        let Some(message_id) = data
            .get("message_id")
            .and_then(Value::as_str)
            .and_then(|s| MessageId::from_str(s).ok())
        else {
            continue;
        };
        if let Some(inbox) = inboxes.get_mut(&agent_id) {
            inbox.retain(|m| m.id != message_id);
        }
    }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
