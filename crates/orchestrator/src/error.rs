// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error type for the composition root.

use thiserror::Error;

use substrat_core::{AgentStateError, SessionStateError, ToolError, TreeError};
use substrat_engine::SchedulerError;
use substrat_storage::SessionStoreError;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    AgentState(#[from] AgentStateError),
    #[error(transparent)]
    SessionState(#[from] SessionStateError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Store(#[from] SessionStoreError),
}
