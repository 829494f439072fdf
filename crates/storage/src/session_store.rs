// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent session store backed by per-session `session.json` files.

use std::fs;
use std::io;
use std::path::PathBuf;

use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persistence::atomic_write;
use substrat_core::{Session, SessionId, SessionState, SessionStateError};

const SESSION_FILE: &str = "session.json";

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session {0} not found")]
    NotFound(SessionId),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid base64 provider state: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid session id: {0}")]
    UuidParse(#[from] uuid::Error),
    #[error(transparent)]
    State(#[from] SessionStateError),
}

#[derive(Serialize, Deserialize)]
struct SessionDto {
    id: String,
    state: SessionState,
    provider_name: String,
    model: String,
    created_at: String,
    suspended_at: Option<String>,
    provider_state: String,
}

/// Thin I/O layer for session records. No in-memory cache.
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Return `root/<uuid-hex>/` for the given session.
    pub fn agent_dir(&self, session_id: SessionId) -> PathBuf {
        self.root.join(session_id.hex())
    }

    /// Serialize and atomically write `session.json`.
    pub fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        let dir = self.agent_dir(session.id);
        let bytes = Self::serialize(session)?;
        atomic_write(&dir.join(SESSION_FILE), &bytes)?;
        Ok(())
    }

    /// Load one session record.
    pub fn load(&self, session_id: SessionId) -> Result<Session, SessionStoreError> {
        let path = self.agent_dir(session_id).join(SESSION_FILE);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SessionStoreError::NotFound(session_id))
            }
            Err(e) => return Err(e.into()),
        };
        Self::deserialize(&bytes)
    }

    /// Load all session records under the store's root, in directory order.
    pub fn scan(&self) -> Result<Vec<Session>, SessionStoreError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut entries: Vec<PathBuf> = fs::read_dir(&self.root)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        entries.sort();

        let mut sessions = Vec::new();
        for dir in entries {
            let session_file = dir.join(SESSION_FILE);
            if session_file.is_file() {
                sessions.push(Self::deserialize(&fs::read(&session_file)?)?);
            }
        }
        Ok(sessions)
    }

    /// Startup recovery: flip every ACTIVE session to SUSPENDED and re-save.
    ///
    /// A process crash leaves ACTIVE sessions in an indeterminate state —
    /// the provider process is gone, so they must be treated as suspended
    /// until something explicitly resumes them.
    pub fn recover(&self) -> Result<Vec<Session>, SessionStoreError> {
        let mut sessions = self.scan()?;
        for session in &mut sessions {
            if session.state == SessionState::Active {
                session.transition(SessionState::Suspended)?;
                self.save(session)?;
            }
        }
        Ok(sessions)
    }

    fn serialize(session: &Session) -> Result<Vec<u8>, SessionStoreError> {
        let dto = SessionDto {
            id: session.id.hex(),
            state: session.state,
            provider_name: session.provider_name.clone(),
            model: session.model.clone(),
            created_at: session.created_at.clone(),
            suspended_at: session.suspended_at.clone(),
            provider_state: base64::engine::general_purpose::STANDARD.encode(&session.provider_state),
        };
        Ok(serde_json::to_vec_pretty(&dto)?)
    }

    fn deserialize(data: &[u8]) -> Result<Session, SessionStoreError> {
        let dto: SessionDto = serde_json::from_slice(data)?;
        let uuid = uuid::Uuid::parse_str(&dto.id)?;
        Ok(Session {
            id: SessionId::from(uuid),
            state: dto.state,
            provider_name: dto.provider_name,
            model: dto.model,
            created_at: dto.created_at,
            suspended_at: dto.suspended_at,
            provider_state: base64::engine::general_purpose::STANDARD.decode(dto.provider_state)?,
        })
    }
}

#[cfg(test)]
#[path = "session_store_tests.rs"]
mod tests;
