// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message envelope — wire format for inter-agent messages.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ids::{AgentId, MessageId};
use crate::now_iso;

/// Kind of a [`MessageEnvelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Request,
    Response,
    Notification,
    Multicast,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Request => "request",
            MessageKind::Response => "response",
            MessageKind::Notification => "notification",
            MessageKind::Multicast => "multicast",
        }
    }
}

/// Wire format for inter-agent messages. `sender` is required — every
/// message has an origin, possibly a sentinel ([`crate::ids::SYSTEM`] /
/// [`crate::ids::USER`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub id: MessageId,
    pub timestamp: String,
    pub sender: AgentId,
    pub recipient: Option<AgentId>,
    pub reply_to: Option<MessageId>,
    pub kind: MessageKind,
    pub payload: String,
    pub metadata: HashMap<String, String>,
}

impl MessageEnvelope {
    pub fn new(sender: AgentId, kind: MessageKind, payload: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            timestamp: now_iso(),
            sender,
            recipient: None,
            reply_to: None,
            kind,
            payload: payload.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_recipient(mut self, recipient: AgentId) -> Self {
        self.recipient = Some(recipient);
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}
