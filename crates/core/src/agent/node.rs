// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent node data model and state machine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{AgentId, SessionId};
use crate::now_iso;

/// Lifecycle state of an [`AgentNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    Idle,
    Busy,
    Waiting,
    Terminated,
}

impl AgentState {
    fn allowed_targets(self) -> &'static [AgentState] {
        match self {
            AgentState::Idle => &[AgentState::Busy, AgentState::Terminated],
            AgentState::Busy => &[
                AgentState::Idle,
                AgentState::Waiting,
                AgentState::Terminated,
            ],
            AgentState::Waiting => &[AgentState::Busy, AgentState::Terminated],
            AgentState::Terminated => &[],
        }
    }
}

/// Raised on an invalid agent state transition. Always a programming bug.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid agent transition: {from:?} -> {to:?}")]
pub struct AgentStateError {
    pub from: AgentState,
    pub to: AgentState,
}

/// A single agent in the hierarchy. Knows nothing about messages or routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentNode {
    pub id: AgentId,
    pub name: String,
    pub parent_id: Option<AgentId>,
    pub children: Vec<AgentId>,
    /// 1:1 backing session. Required.
    pub session_id: SessionId,
    pub instructions: String,
    pub state: AgentState,
    pub created_at: String,
}

impl AgentNode {
    pub fn new(session_id: SessionId, name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            id: AgentId::new(),
            name: name.into(),
            parent_id: None,
            children: Vec::new(),
            session_id,
            instructions: instructions.into(),
            state: AgentState::Idle,
            created_at: now_iso(),
        }
    }

    pub fn with_parent(mut self, parent_id: AgentId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn with_id(mut self, id: AgentId) -> Self {
        self.id = id;
        self
    }

    /// Transition to a new state. Fails on an invalid edge.
    pub fn transition(&mut self, target: AgentState) -> Result<(), AgentStateError> {
        if !self.state.allowed_targets().contains(&target) {
            return Err(AgentStateError {
                from: self.state,
                to: target,
            });
        }
        self.state = target;
        Ok(())
    }

    /// IDLE -> BUSY.
    pub fn activate(&mut self) -> Result<(), AgentStateError> {
        self.transition(AgentState::Busy)
    }

    /// BUSY -> IDLE.
    pub fn finish(&mut self) -> Result<(), AgentStateError> {
        self.transition(AgentState::Idle)
    }

    /// BUSY -> WAITING.
    pub fn wait(&mut self) -> Result<(), AgentStateError> {
        self.transition(AgentState::Waiting)
    }

    /// Any non-terminated -> TERMINATED.
    pub fn terminate(&mut self) -> Result<(), AgentStateError> {
        self.transition(AgentState::Terminated)
    }
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
