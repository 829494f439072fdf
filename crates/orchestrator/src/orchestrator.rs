// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composition root: bridges the in-memory agent tree to provider-backed
//! sessions. Owns the tree, the inbox registry, and the handler registry;
//! drives the scheduler for everything session-shaped.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::Mutex as AsyncMutex;

use substrat_core::agent::{AgentNode, AgentState, AgentTree};
use substrat_core::ids::{AgentId, SessionId};
use substrat_core::inbox::Inbox;
use substrat_core::tools::{
    BroadcastResult, CheckInboxResult, DeferredWork, InboxRegistry, InspectResult, LogCallback,
    SentMessage, SpawnCallback, SpawnResult, ToolError, ToolHandler,
};
use substrat_core::TreeError;
use substrat_engine::{LogSink, TurnScheduler};

use crate::error::OrchestratorError;

/// Per-agent record of which provider/model backs its session. Doubles as
/// the "handler registry" from the invariants: an agent id present here has
/// a fully installed tool handler; a spawned-but-not-yet-resolved child has
/// an inbox but no entry here yet.
#[derive(Debug, Clone)]
pub(crate) struct HandlerEntry {
    pub provider: String,
    pub model: String,
}

/// Shared state behind every [`Orchestrator`] clone. Held as `Arc<Inner>` so
/// the spawn callback — which outlives the tool call that created it — can
/// reach the tree, the handler registry, and the scheduler on its own.
pub(crate) struct Inner {
    pub(crate) tree: Mutex<AgentTree>,
    pub(crate) inboxes: Mutex<InboxRegistry>,
    pub(crate) handlers: Mutex<HashMap<AgentId, HandlerEntry>>,
    pub(crate) scheduler: AsyncMutex<TurnScheduler>,
    pub(crate) log_sink: LogSink,
    pub(crate) default_provider: String,
    pub(crate) default_model: String,
}

impl Inner {
    /// Deferred spawn callback body: create the child's session, splice its
    /// real id into the tree node, log `agent.created` on the child's new
    /// log, and install its handler entry. Failures are logged and
    /// swallowed — `DeferredWork` has no return channel to propagate them.
    pub(crate) async fn complete_spawn(
        self: Arc<Self>,
        child: AgentNode,
        provider: String,
        model: String,
        parent_session_hex: String,
    ) {
        let created = {
            let mut scheduler = self.scheduler.lock().await;
            scheduler
                .create_session(&provider, &model, &child.instructions)
                .await
        };
        let session = match created {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(agent_id = %child.id, error = %err, "deferred child session creation failed");
                return;
            }
        };

        {
            let mut tree = self.tree.lock();
            if let Ok(node) = tree.get_mut(child.id) {
                node.session_id = session.id;
            }
        }

        {
            let mut scheduler = self.scheduler.lock().await;
            let logged = scheduler.log_event(
                session.id,
                "agent.created",
                Some(json!({
                    "agent_id": child.id.hex(),
                    "name": child.name,
                    "parent_session_id": parent_session_hex,
                    "instructions": child.instructions,
                })),
            );
            if let Err(err) = logged {
                tracing::warn!(agent_id = %child.id, error = %err, "failed to log agent.created for spawned child");
            }
        }

        self.handlers
            .lock()
            .insert(child.id, HandlerEntry { provider, model });
    }
}

/// The composition root. Cheaply cloneable — every clone shares the same
/// tree, inboxes, handler registry, and scheduler.
#[derive(Clone)]
pub struct Orchestrator {
    pub(crate) inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(
        scheduler: TurnScheduler,
        default_provider: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Self {
        let log_sink = scheduler.log_sink();
        let inner = Inner {
            tree: Mutex::new(AgentTree::new()),
            inboxes: Mutex::new(HashMap::new()),
            handlers: Mutex::new(HashMap::new()),
            scheduler: AsyncMutex::new(scheduler),
            log_sink,
            default_provider: default_provider.into(),
            default_model: default_model.into(),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Create a root agent: a fresh session, a tree node with no parent, an
    /// eager inbox, and a handler entry. On tree-insertion failure the
    /// just-created session is terminated so no orphan session survives.
    pub async fn create_root_agent(
        &self,
        name: &str,
        instructions: &str,
        provider: Option<&str>,
        model: Option<&str>,
    ) -> Result<AgentId, OrchestratorError> {
        let provider = provider.unwrap_or(&self.inner.default_provider).to_string();
        let model = model.unwrap_or(&self.inner.default_model).to_string();

        let session = {
            let mut scheduler = self.inner.scheduler.lock().await;
            scheduler
                .create_session(&provider, &model, instructions)
                .await?
        };

        let node = AgentNode::new(session.id, name, instructions);
        let agent_id = node.id;

        {
            let mut tree = self.inner.tree.lock();
            if let Err(err) = tree.add(node) {
                drop(tree);
                let mut scheduler = self.inner.scheduler.lock().await;
                let _ = scheduler.terminate_session(session.id).await;
                return Err(err.into());
            }
        }

        {
            let scheduler = self.inner.scheduler.lock().await;
            scheduler.log_event(
                session.id,
                "agent.created",
                Some(json!({
                    "agent_id": agent_id.hex(),
                    "name": name,
                    "parent_session_id": serde_json::Value::Null,
                    "instructions": instructions,
                })),
            )?;
        }

        self.inner.inboxes.lock().insert(agent_id, Inbox::new());
        self.inner
            .handlers
            .lock()
            .insert(agent_id, HandlerEntry { provider, model });

        Ok(agent_id)
    }

    /// Run one turn: IDLE -> BUSY, drive the scheduler, then BUSY -> IDLE
    /// regardless of outcome. Deferred spawn work enqueued via tool calls on
    /// this agent rides along inside the scheduler's own post-turn drain.
    pub async fn run_turn(&self, agent_id: AgentId, prompt: &str) -> Result<String, OrchestratorError> {
        let session_id = {
            let mut tree = self.inner.tree.lock();
            let node = tree.get_mut(agent_id)?;
            node.activate()?;
            node.session_id
        };

        let result = {
            let mut scheduler = self.inner.scheduler.lock().await;
            scheduler.send_turn(session_id, prompt).await
        };

        {
            let mut tree = self.inner.tree.lock();
            if let Ok(node) = tree.get_mut(agent_id) {
                if node.state == AgentState::Busy {
                    node.finish()?;
                }
            }
        }

        Ok(result?)
    }

    /// Terminate a leaf agent: fails if it still has children. Removes the
    /// node, its handler entry, and its inbox; stops the backing session.
    pub async fn terminate_agent(&self, agent_id: AgentId) -> Result<(), OrchestratorError> {
        let session_id = {
            let tree = self.inner.tree.lock();
            let node = tree.get(agent_id)?;
            if !node.children.is_empty() {
                return Err(TreeError::HasChildren(agent_id).into());
            }
            node.session_id
        };

        {
            let mut tree = self.inner.tree.lock();
            let node = tree.get_mut(agent_id)?;
            node.terminate()?;
        }

        {
            let mut scheduler = self.inner.scheduler.lock().await;
            scheduler.log_event(
                session_id,
                "agent.terminated",
                Some(json!({"agent_id": agent_id.hex()})),
            )?;
            scheduler.terminate_session(session_id).await?;
        }

        self.inner.tree.lock().remove(agent_id)?;
        self.inner.handlers.lock().remove(&agent_id);
        self.inner.inboxes.lock().remove(&agent_id);
        Ok(())
    }

    /// Send a message from `agent_id` to a reachable agent by name.
    pub async fn send_message(
        &self,
        agent_id: AgentId,
        recipient: &str,
        text: &str,
        sync: bool,
    ) -> Result<SentMessage, ToolError> {
        self.invoke_tool(agent_id, |h| h.send_message(recipient, text, sync))
            .await
    }

    /// Broadcast a message from `agent_id` to its whole team.
    pub async fn broadcast(&self, agent_id: AgentId, text: &str) -> Result<BroadcastResult, ToolError> {
        self.invoke_tool(agent_id, |h| h.broadcast(text)).await
    }

    /// Drain `agent_id`'s inbox.
    pub async fn check_inbox(&self, agent_id: AgentId) -> CheckInboxResult {
        self.invoke_tool(agent_id, |h| h.check_inbox()).await
    }

    /// Spawn a child under `agent_id`. Session creation for the child is
    /// deferred; it completes after `agent_id`'s next successful turn.
    pub async fn spawn_agent(
        &self,
        agent_id: AgentId,
        name: &str,
        instructions: &str,
    ) -> Result<SpawnResult, TreeError> {
        self.invoke_tool(agent_id, |h| h.spawn_agent(name, instructions))
            .await
    }

    /// Inspect a direct child of `agent_id`. Pure read, no logging, no
    /// deferred work — never needs the scheduler.
    pub fn inspect_agent(&self, agent_id: AgentId, name: &str) -> Result<InspectResult, ToolError> {
        let (result, _deferred) = self.with_tool_handler(agent_id, |h| h.inspect_agent(name));
        result
    }

    /// Snapshot of an agent's current node, for inspection by callers that
    /// don't want to reach through the tool-handler surface.
    pub fn agent_snapshot(&self, agent_id: AgentId) -> Result<AgentNode, TreeError> {
        self.inner.tree.lock().get(agent_id).map(|n| n.clone())
    }

    /// Snapshot of every agent currently in the tree, in no particular
    /// order.
    pub fn agent_snapshot_all(&self) -> Vec<AgentNode> {
        let tree = self.inner.tree.lock();
        tree.ids().into_iter().filter_map(|id| tree.get(id).ok().cloned()).collect()
    }

    /// True once the agent has a fully installed handler (provider/model
    /// resolved). False for a child whose spawn callback hasn't run yet.
    pub fn has_handler(&self, agent_id: AgentId) -> bool {
        self.inner.handlers.lock().contains_key(&agent_id)
    }

    pub fn agent_count(&self) -> usize {
        self.inner.tree.lock().len()
    }

    // --- Private helpers ---

    fn handler_entry(&self, agent_id: AgentId) -> (String, String) {
        self.inner
            .handlers
            .lock()
            .get(&agent_id)
            .map(|e| (e.provider.clone(), e.model.clone()))
            .unwrap_or_else(|| {
                (
                    self.inner.default_provider.clone(),
                    self.inner.default_model.clone(),
                )
            })
    }

    /// Build a short-lived [`ToolHandler`] over the tree and inbox
    /// registry, wire its log and spawn callbacks, run `f`, and return the
    /// deferred work it accumulated for the caller to push onward.
    fn with_tool_handler<R>(
        &self,
        agent_id: AgentId,
        f: impl FnOnce(&mut ToolHandler) -> R,
    ) -> (R, Vec<DeferredWork>) {
        let mut tree = self.inner.tree.lock();
        let mut inboxes = self.inner.inboxes.lock();

        // Snapshot id -> session_id so the log callback can resolve a
        // target agent to its log without re-entering the tree lock it's
        // invoked from.
        let id_to_session: HashMap<AgentId, SessionId> = tree
            .ids()
            .into_iter()
            .filter_map(|id| tree.get(id).ok().map(|n| (id, n.session_id)))
            .collect();
        let log_sink = self.inner.log_sink.clone();
        let log_callback: LogCallback = Arc::new(move |target, event, data| {
            if let Some(session_id) = id_to_session.get(&target) {
                log_sink.log(*session_id, event, data);
            }
        });

        let (provider, model) = self.handler_entry(agent_id);
        let parent_session_hex = tree.get(agent_id).ok().map(|n| n.session_id.hex());
        let inner = self.inner.clone();
        let spawn_callback: SpawnCallback = Arc::new(move |child: AgentNode| {
            let inner = inner.clone();
            let provider = provider.clone();
            let model = model.clone();
            let parent_session_hex = parent_session_hex.clone().unwrap_or_default();
            Box::pin(async move {
                inner
                    .complete_spawn(child, provider, model, parent_session_hex)
                    .await;
            })
        });

        let mut handler = ToolHandler::new(&mut tree, &mut inboxes, agent_id)
            .with_spawn_callback(spawn_callback)
            .with_log_callback(log_callback);

        let result = f(&mut handler);
        let deferred = handler.drain_deferred();
        (result, deferred)
    }

    /// Run a tool-handler operation and forward any deferred work it
    /// produced into the scheduler's post-turn drain.
    async fn invoke_tool<R>(&self, agent_id: AgentId, f: impl FnOnce(&mut ToolHandler) -> R) -> R {
        let (result, deferred) = self.with_tool_handler(agent_id, f);
        if !deferred.is_empty() {
            let mut scheduler = self.inner.scheduler.lock().await;
            for work in deferred {
                scheduler.defer(work);
            }
        }
        result
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
