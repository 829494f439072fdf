// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! substrat-core: agent tree, messaging, sessions, and tool surface.
//!
//! Pure data model and in-memory logic. No filesystem, no network, no
//! provider processes — those live in `substrat-storage`, `substrat-providers`,
//! and `substrat-engine`.

pub mod agent;
pub mod ids;
pub mod inbox;
pub mod message;
pub mod router;
pub mod session;
pub mod tools;

pub use agent::{AgentNode, AgentState, AgentStateError, AgentTree, TreeError};
pub use ids::{is_sentinel, AgentId, MessageId, SessionId, SYSTEM, USER};
pub use inbox::Inbox;
pub use message::{MessageEnvelope, MessageKind};
pub use router::{validate_route, RoutingError};
pub use session::{Session, SessionState, SessionStateError};
pub use tools::{ToolError, ToolHandler};

use chrono::{SecondsFormat, Utc};

/// Current instant formatted as UTC ISO-8601 with microsecond precision and
/// a trailing `Z`, matching the on-disk timestamp format used everywhere
/// else in the system (event log entries, session metadata, messages).
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
