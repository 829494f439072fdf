// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event-log wrapper for any [`ProviderSession`]. Adds consistent
//! before/after logging without each provider implementation doing it.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use substrat_storage::EventLog;

use crate::provider::{ChunkReceiver, ProviderError, ProviderSession};

/// Wraps a provider session, logging `send`/`send.result`,
/// `suspend`/`suspend.result`, and `stop`/`stop.result` to the given
/// event log. Mirrors the method-level before/after logging every other
/// provider-facing call gets.
pub struct LoggedSession<S> {
    inner: S,
    log: Mutex<EventLog>,
}

impl<S: ProviderSession> LoggedSession<S> {
    pub fn new(inner: S, log: EventLog) -> Self {
        Self {
            inner,
            log: Mutex::new(log),
        }
    }
}

#[async_trait]
impl<S: ProviderSession> ProviderSession for LoggedSession<S> {
    async fn send(&mut self, message: &str) -> Result<ChunkReceiver, ProviderError> {
        self.log
            .lock()
            .log("send", Some(json!({"message": message})))
            .ok();
        let mut rx = self.inner.send(message).await?;

        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk);
        }
        self.log
            .lock()
            .log("send.result", Some(json!({"result": chunks.concat()})))
            .ok();

        // Sized to the number of chunks actually produced, not a fixed
        // bound: re-forwarding after the inner stream is fully drained
        // means every chunk must fit without the sender blocking.
        let (tx, out_rx) = tokio::sync::mpsc::channel(chunks.len().max(1));
        for chunk in chunks {
            if tx.send(chunk).await.is_err() {
                break;
            }
        }
        Ok(out_rx)
    }

    async fn suspend(&mut self) -> Result<Vec<u8>, ProviderError> {
        self.log.lock().log("suspend", None).ok();
        let state = self.inner.suspend().await?;
        self.log
            .lock()
            .log("suspend.result", Some(json!({"state_size": state.len()})))
            .ok();
        Ok(state)
    }

    async fn stop(&mut self) -> Result<(), ProviderError> {
        self.log.lock().log("stop", None).ok();
        let result = self.inner.stop().await;
        self.log.lock().log("stop.result", None).ok();
        result
    }
}

#[cfg(test)]
#[path = "logged_tests.rs"]
mod tests;
