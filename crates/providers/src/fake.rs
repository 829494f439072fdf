// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake provider for deterministic testing. No subprocess, no network.
#![cfg_attr(coverage_nightly, coverage(off))]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::provider::{AgentProvider, ChunkReceiver, ProviderError, ProviderSession};

/// Recorded call on a [`FakeSession`] or [`FakeProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Create { model: String, system_prompt: String },
    Restore { state: Vec<u8> },
    Send { message: String },
    Suspend,
    Stop,
}

struct FakeProviderState {
    calls: Vec<ProviderCall>,
    responses: HashMap<String, Vec<String>>,
    default_response: Vec<String>,
    fail_sends: bool,
}

/// Fake [`AgentProvider`]. Creates [`FakeSession`] handles that echo
/// pre-scripted chunk sequences and record every call for assertions.
#[derive(Clone)]
pub struct FakeProvider {
    name: String,
    state: Arc<Mutex<FakeProviderState>>,
}

impl FakeProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(FakeProviderState {
                calls: Vec::new(),
                responses: HashMap::new(),
                default_response: vec!["ok".to_string()],
                fail_sends: false,
            })),
        }
    }

    /// Script the chunk sequence returned for a given prompt.
    pub fn set_response(&self, prompt: &str, chunks: Vec<String>) {
        self.state.lock().responses.insert(prompt.to_string(), chunks);
    }

    /// Script the chunk sequence returned for any unmatched prompt.
    pub fn set_default_response(&self, chunks: Vec<String>) {
        self.state.lock().default_response = chunks;
    }

    /// Every subsequent `send` on any session from this provider raises
    /// `ProcessFailed` instead of streaming a response. Used to exercise
    /// turn-failure rollback.
    pub fn fail_all_sends(&self) {
        self.state.lock().fail_sends = true;
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state.lock().calls.clone()
    }
}

#[async_trait]
impl AgentProvider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create(
        &self,
        model: &str,
        system_prompt: &str,
    ) -> Result<Box<dyn ProviderSession>, ProviderError> {
        self.state.lock().calls.push(ProviderCall::Create {
            model: model.to_string(),
            system_prompt: system_prompt.to_string(),
        });
        Ok(Box::new(FakeSession::new(self.state.clone())))
    }

    async fn restore(&self, state: &[u8]) -> Result<Box<dyn ProviderSession>, ProviderError> {
        self.state.lock().calls.push(ProviderCall::Restore {
            state: state.to_vec(),
        });
        Ok(Box::new(FakeSession::new(self.state.clone())))
    }
}

/// Fake session handle produced by [`FakeProvider`].
pub struct FakeSession {
    shared: Arc<Mutex<FakeProviderState>>,
    stopped: bool,
}

impl FakeSession {
    fn new(shared: Arc<Mutex<FakeProviderState>>) -> Self {
        Self {
            shared,
            stopped: false,
        }
    }
}

#[async_trait]
impl ProviderSession for FakeSession {
    async fn send(&mut self, message: &str) -> Result<ChunkReceiver, ProviderError> {
        if self.stopped {
            return Err(ProviderError::AlreadyStopped);
        }
        let chunks = {
            let mut state = self.shared.lock();
            state.calls.push(ProviderCall::Send {
                message: message.to_string(),
            });
            if state.fail_sends {
                return Err(ProviderError::ProcessFailed("fake provider configured to fail".to_string()));
            }
            state
                .responses
                .get(message)
                .cloned()
                .unwrap_or_else(|| state.default_response.clone())
        };
        let (tx, rx) = tokio::sync::mpsc::channel(chunks.len().max(1));
        for chunk in chunks {
            // Unbounded by construction (channel sized to chunk count); a
            // dropped receiver just stops delivery early.
            let _ = tx.send(chunk).await;
        }
        Ok(rx)
    }

    async fn suspend(&mut self) -> Result<Vec<u8>, ProviderError> {
        self.shared.lock().calls.push(ProviderCall::Suspend);
        Ok(b"fake-state".to_vec())
    }

    async fn stop(&mut self) -> Result<(), ProviderError> {
        self.shared.lock().calls.push(ProviderCall::Stop);
        self.stopped = true;
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
