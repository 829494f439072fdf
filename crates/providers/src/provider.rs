// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent provider protocol — the interface all LLM/agent backends implement.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider process failed: {0}")]
    ProcessFailed(String),
    #[error("session already stopped")]
    AlreadyStopped,
    #[error("invalid suspended state: {0}")]
    InvalidState(String),
}

/// Streamed response chunks from a single `send` call.
pub type ChunkReceiver = mpsc::Receiver<String>;

/// A live conversation handle returned by a provider.
#[async_trait]
pub trait ProviderSession: Send {
    /// Send a message and stream the response back chunk by chunk.
    async fn send(&mut self, message: &str) -> Result<ChunkReceiver, ProviderError>;

    /// Serialize session state into an opaque blob for later restore.
    async fn suspend(&mut self) -> Result<Vec<u8>, ProviderError>;

    /// Terminate the session and release its resources.
    async fn stop(&mut self) -> Result<(), ProviderError>;
}

#[async_trait]
impl ProviderSession for Box<dyn ProviderSession> {
    async fn send(&mut self, message: &str) -> Result<ChunkReceiver, ProviderError> {
        (**self).send(message).await
    }

    async fn suspend(&mut self) -> Result<Vec<u8>, ProviderError> {
        (**self).suspend().await
    }

    async fn stop(&mut self) -> Result<(), ProviderError> {
        (**self).stop().await
    }
}

/// Factory for provider sessions.
///
/// Each provider type (cursor-agent, claude-cli, etc.) implements this
/// once. Sessions are the per-agent conversation handles it produces. The
/// caller owns the event log and passes context in — providers never
/// create their own logs.
#[async_trait]
pub trait AgentProvider: Send + Sync {
    /// Provider type identifier (e.g. `"cursor-agent"`, `"claude-cli"`).
    fn name(&self) -> &str;

    /// Start a new conversation with the given model and instructions.
    async fn create(
        &self,
        model: &str,
        system_prompt: &str,
    ) -> Result<Box<dyn ProviderSession>, ProviderError>;

    /// Recreate a session from a previously suspended state blob.
    async fn restore(&self, state: &[u8]) -> Result<Box<dyn ProviderSession>, ProviderError>;
}

/// Drain a response stream into a single owned string.
///
/// `TurnScheduler::send_turn` never needs partial chunks on its own — it
/// always collects the full response before releasing the session slot.
pub async fn collect_response(mut chunks: ChunkReceiver) -> String {
    let mut response = String::new();
    while let Some(chunk) = chunks.recv().await {
        response.push_str(&chunk);
    }
    response
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
