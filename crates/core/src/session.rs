// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session data model and state machine.
//!
//! A [`Session`] knows nothing about agents or messages — it is the pure
//! data half of a provider-backed session. Persistence lives in
//! `substrat-storage`; process lifecycle lives in `substrat-providers`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::SessionId;
use crate::now_iso;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Created,
    Active,
    Suspended,
    Terminated,
}

impl SessionState {
    fn allowed_targets(self) -> &'static [SessionState] {
        match self {
            SessionState::Created => &[SessionState::Active],
            SessionState::Active => &[SessionState::Suspended, SessionState::Terminated],
            SessionState::Suspended => &[SessionState::Active, SessionState::Terminated],
            SessionState::Terminated => &[],
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid session transition: {from:?} -> {to:?}")]
pub struct SessionStateError {
    pub from: SessionState,
    pub to: SessionState,
}

/// A single provider session. The `provider_state` blob is opaque to this
/// crate — only the owning provider implementation can interpret it.
///
/// `substrat-storage` is responsible for base64-encoding this blob when it
/// persists a session to disk; here it is plain bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub state: SessionState,
    pub provider_name: String,
    pub model: String,
    pub created_at: String,
    pub suspended_at: Option<String>,
    pub provider_state: Vec<u8>,
}

impl Session {
    pub fn new(provider_name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(),
            state: SessionState::Created,
            provider_name: provider_name.into(),
            model: model.into(),
            created_at: now_iso(),
            suspended_at: None,
            provider_state: Vec::new(),
        }
    }

    pub fn transition(&mut self, target: SessionState) -> Result<(), SessionStateError> {
        if !self.state.allowed_targets().contains(&target) {
            return Err(SessionStateError {
                from: self.state,
                to: target,
            });
        }
        if target == SessionState::Suspended {
            self.suspended_at = Some(now_iso());
        }
        self.state = target;
        Ok(())
    }

    /// CREATED/SUSPENDED -> ACTIVE.
    pub fn activate(&mut self) -> Result<(), SessionStateError> {
        self.transition(SessionState::Active)?;
        self.suspended_at = None;
        Ok(())
    }

    /// ACTIVE -> SUSPENDED. Stores the provider's opaque state blob.
    pub fn suspend(&mut self, provider_state: Vec<u8>) -> Result<(), SessionStateError> {
        self.transition(SessionState::Suspended)?;
        self.provider_state = provider_state;
        Ok(())
    }

    /// ACTIVE/SUSPENDED -> TERMINATED.
    pub fn terminate(&mut self) -> Result<(), SessionStateError> {
        self.transition(SessionState::Terminated)
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
