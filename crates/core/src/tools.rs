// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool logic layer — pure operations on the agent tree and inboxes.
//!
//! Five agent-facing tools implemented as methods on [`ToolHandler`]. No
//! wire protocol, no I/O, no daemon — the transport wrapper lives in
//! `substrat-daemon`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::agent::{AgentNode, AgentTree};
use crate::ids::{is_sentinel, AgentId};
use crate::inbox::Inbox;
use crate::message::{MessageEnvelope, MessageKind};
use crate::router::{resolve_broadcast, validate_route, RoutingError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("no reachable agent named {0:?}")]
    NoSuchReachableAgent(String),
    #[error("no child agent named {0:?}")]
    NoSuchChild(String),
    #[error(transparent)]
    Routing(#[from] RoutingError),
}

/// Deferred unit of async work, returned by `spawn_agent` for the caller to
/// drive — typically starting the child's provider session.
pub type DeferredWork = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Invoked synchronously inside `spawn_agent`, given the newly created
/// child node, to produce the deferred work item.
pub type SpawnCallback = Arc<dyn Fn(AgentNode) -> DeferredWork + Send + Sync>;

/// Invoked synchronously whenever the handler wants to emit a structured
/// event: the target agent id (the event's log owner), the event name, and
/// a JSON payload.
pub type LogCallback = Arc<dyn Fn(AgentId, &str, Value) + Send + Sync>;

pub type InboxRegistry = HashMap<AgentId, Inbox>;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SentMessage {
    pub status: &'static str,
    pub message_id: String,
    pub waiting_for_reply: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BroadcastResult {
    pub status: &'static str,
    pub message_id: String,
    pub recipient_count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InboxMessageView {
    pub from: String,
    pub text: String,
    pub message_id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CheckInboxResult {
    pub messages: Vec<InboxMessageView>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SpawnResult {
    pub status: &'static str,
    pub agent_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InspectResult {
    pub state: String,
    pub recent_messages: Vec<InboxMessageView>,
}

/// Per-agent tool handler. One instance per agent, `caller_id` baked in at
/// construction. Tool methods return `Err(ToolError)` for recoverable
/// failures (bad name, unreachable target); programming bugs propagate as
/// ordinary panics elsewhere, never from here.
pub struct ToolHandler<'a> {
    tree: &'a mut AgentTree,
    inboxes: &'a mut InboxRegistry,
    caller_id: AgentId,
    spawn_callback: Option<SpawnCallback>,
    log_callback: Option<LogCallback>,
    deferred: Vec<DeferredWork>,
}

impl<'a> ToolHandler<'a> {
    pub fn new(tree: &'a mut AgentTree, inboxes: &'a mut InboxRegistry, caller_id: AgentId) -> Self {
        Self {
            tree,
            inboxes,
            caller_id,
            spawn_callback: None,
            log_callback: None,
            deferred: Vec::new(),
        }
    }

    pub fn with_spawn_callback(mut self, cb: SpawnCallback) -> Self {
        self.spawn_callback = Some(cb);
        self
    }

    pub fn with_log_callback(mut self, cb: LogCallback) -> Self {
        self.log_callback = Some(cb);
        self
    }

    /// Send a message to a reachable agent by name.
    pub fn send_message(&mut self, recipient: &str, text: &str, sync: bool) -> Result<SentMessage, ToolError> {
        let target_id = self.resolve_name(recipient)?;
        validate_route(self.tree, self.caller_id, target_id)?;
        let mut metadata = HashMap::new();
        metadata.insert("sync".to_string(), sync.to_string());
        let envelope = MessageEnvelope::new(self.caller_id, MessageKind::Request, text)
            .with_recipient(target_id)
            .with_metadata(metadata);
        let message_id = envelope.id.to_string();
        self.deliver(target_id, envelope);
        Ok(SentMessage {
            status: "sent",
            message_id,
            waiting_for_reply: sync,
        })
    }

    /// Multicast to all siblings in the caller's team.
    pub fn broadcast(&mut self, text: &str) -> Result<BroadcastResult, ToolError> {
        let sibling_ids = resolve_broadcast(self.tree, self.caller_id)?;
        let broadcast_id = crate::ids::MessageId::new();
        for sid in &sibling_ids {
            let mut metadata = HashMap::new();
            metadata.insert("broadcast_id".to_string(), broadcast_id.to_string());
            let envelope = MessageEnvelope::new(self.caller_id, MessageKind::Multicast, text)
                .with_recipient(*sid)
                .with_metadata(metadata);
            self.deliver(*sid, envelope);
        }
        Ok(BroadcastResult {
            status: "sent",
            message_id: broadcast_id.to_string(),
            recipient_count: sibling_ids.len(),
        })
    }

    /// Drain the caller's inbox and return the messages it held.
    pub fn check_inbox(&mut self) -> CheckInboxResult {
        let Some(inbox) = self.inboxes.get_mut(&self.caller_id) else {
            return CheckInboxResult { messages: Vec::new() };
        };
        let messages = inbox.collect();
        let views = messages
            .iter()
            .map(|m| {
                let view = self.view(m);
                self.log(
                    self.caller_id,
                    "message.delivered",
                    json!({
                        "message_id": m.id.hex(),
                        "from": view.from,
                        "text": view.text,
                    }),
                );
                view
            })
            .collect();
        CheckInboxResult { messages: views }
    }

    /// Create a child agent. Session creation is deferred to the caller via
    /// the spawn callback.
    pub fn spawn_agent(
        &mut self,
        name: &str,
        instructions: &str,
    ) -> Result<SpawnResult, crate::agent::TreeError> {
        let child = AgentNode::new(crate::ids::SessionId::new(), name, instructions)
            .with_parent(self.caller_id);
        self.tree.add(child.clone())?;
        // Eager inbox so messages sent before the provider starts are queued.
        self.inboxes.insert(child.id, Inbox::new());
        if let Some(cb) = &self.spawn_callback {
            self.deferred.push(cb(child.clone()));
        }
        Ok(SpawnResult {
            status: "accepted",
            agent_id: child.id.to_string(),
            name: child.name,
        })
    }

    /// View a subordinate's state and recent messages.
    pub fn inspect_agent(&self, name: &str) -> Result<InspectResult, ToolError> {
        let child_id = self.resolve_child_name(name)?;
        let child = self
            .tree
            .get(child_id)
            .map_err(|_| ToolError::NoSuchChild(name.to_string()))?;
        let recent = self
            .inboxes
            .get(&child_id)
            .map(Inbox::peek)
            .unwrap_or_default();
        Ok(InspectResult {
            state: format!("{:?}", child.state).to_lowercase(),
            recent_messages: recent.iter().map(|m| self.view(m)).collect(),
        })
    }

    /// Return and clear accumulated deferred callbacks.
    pub fn drain_deferred(&mut self) -> Vec<DeferredWork> {
        std::mem::take(&mut self.deferred)
    }

    // --- Private helpers ---

    fn resolve_name(&self, name: &str) -> Result<AgentId, ToolError> {
        let node = self
            .tree
            .get(self.caller_id)
            .map_err(|_| ToolError::NoSuchReachableAgent(name.to_string()))?;
        if let Some(parent_id) = node.parent_id {
            if let Ok(parent) = self.tree.get(parent_id) {
                if parent.name == name {
                    return Ok(parent.id);
                }
            }
        }
        if let Ok(children) = self.tree.children(self.caller_id) {
            if let Some(child) = children.iter().find(|c| c.name == name) {
                return Ok(child.id);
            }
        }
        if let Ok(siblings) = self.tree.team(self.caller_id) {
            if let Some(sibling) = siblings.iter().find(|s| s.name == name) {
                return Ok(sibling.id);
            }
        }
        Err(ToolError::NoSuchReachableAgent(name.to_string()))
    }

    fn resolve_child_name(&self, name: &str) -> Result<AgentId, ToolError> {
        let children = self
            .tree
            .children(self.caller_id)
            .map_err(|_| ToolError::NoSuchChild(name.to_string()))?;
        children
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.id)
            .ok_or_else(|| ToolError::NoSuchChild(name.to_string()))
    }

    fn sender_display_name(&self, sender_id: AgentId) -> String {
        if is_sentinel(sender_id) {
            return sender_id.to_string();
        }
        match self.tree.get(sender_id) {
            Ok(node) if !node.name.is_empty() => node.name.clone(),
            _ => sender_id.to_string(),
        }
    }

    fn view(&self, envelope: &MessageEnvelope) -> InboxMessageView {
        InboxMessageView {
            from: self.sender_display_name(envelope.sender),
            text: envelope.payload.clone(),
            message_id: envelope.id.to_string(),
        }
    }

    /// Deliver an envelope to the recipient's inbox, creating it if needed.
    /// Logs `message.enqueued` to the recipient *before* the inbox mutation.
    fn deliver(&mut self, recipient_id: AgentId, envelope: MessageEnvelope) {
        self.log(
            recipient_id,
            "message.enqueued",
            json!({
                "message_id": envelope.id.hex(),
                "sender": envelope.sender.hex(),
                "recipient": recipient_id.hex(),
                "payload": envelope.payload,
                "kind": envelope.kind.as_str(),
                "timestamp": envelope.timestamp,
                "metadata": envelope.metadata,
            }),
        );
        self.inboxes
            .entry(recipient_id)
            .or_insert_with(Inbox::new)
            .deliver(envelope);
    }

    fn log(&self, agent_id: AgentId, event: &str, data: Value) {
        if let Some(cb) = &self.log_callback {
            cb(agent_id, event, data);
        }
    }
}

#[cfg(test)]
#[path = "tools_tests.rs"]
mod tests;
