// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the multiplexer and turn scheduler.

use thiserror::Error;

use substrat_core::SessionId;
use substrat_providers::ProviderError;
use substrat_storage::{EventLogError, SessionStoreError};

/// Errors raised by [`crate::mux::SessionMux`].
#[derive(Debug, Error)]
pub enum MuxError {
    #[error("all {0} slots are held; nothing available to evict")]
    AllHeld(usize),
    #[error("session {0} is not suspended")]
    NotSuspended(SessionId),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Store(#[from] SessionStoreError),
    #[error(transparent)]
    State(#[from] substrat_core::SessionStateError),
}

/// Errors raised by [`crate::scheduler::TurnScheduler`].
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("no session cached for id {0}")]
    NotFound(SessionId),
    #[error(transparent)]
    Mux(#[from] MuxError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Store(#[from] SessionStoreError),
    #[error(transparent)]
    State(#[from] substrat_core::SessionStateError),
    #[error(transparent)]
    Log(#[from] EventLogError),
}
