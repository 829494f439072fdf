// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Provider abstraction over external LLM/agent CLI processes, plus the
//! event-log wrapper that gives every provider consistent observability.

mod logged;
mod provider;

pub use logged::LoggedSession;
pub use provider::{collect_response, AgentProvider, ChunkReceiver, ProviderError, ProviderSession};

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeProvider, FakeSession, ProviderCall};
