// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! UUID-backed identifier newtypes shared across the agent/session layers.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Define a newtype ID wrapper around [`Uuid`].
///
/// Generates `new()`, `as_uuid()`, `Display` (lowercase hex, no hyphens),
/// `From<Uuid>`, `PartialEq<Uuid>`, and `Borrow<Uuid>` implementations.
macro_rules! define_uuid_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Lowercase hex without hyphens — matches the on-disk directory naming.
            pub fn hex(&self) -> String {
                self.0.as_simple().to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl PartialEq<Uuid> for $name {
            fn eq(&self, other: &Uuid) -> bool {
                self.0 == *other
            }
        }

        impl Borrow<Uuid> for $name {
            fn borrow(&self) -> &Uuid {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            /// Accepts both hyphenated and simple (no-hyphen) hex forms.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

define_uuid_id! {
    /// Identifies a single agent node in the tree.
    pub struct AgentId;
}

define_uuid_id! {
    /// Identifies a provider-backed session, 1:1 with an [`AgentId`].
    pub struct SessionId;
}

define_uuid_id! {
    /// Identifies a single message envelope.
    pub struct MessageId;
}

/// Well-known sentinel sender identity for system-originated messages.
///
/// Fixed at `AgentId(Uuid::from_u128(0))` so it serializes deterministically.
pub const SYSTEM: AgentId = AgentId(Uuid::from_u128(0));

/// Well-known sentinel sender identity for human-originated messages.
pub const USER: AgentId = AgentId(Uuid::from_u128(1));

/// True for [`SYSTEM`] and [`USER`] — identities that exist outside the tree.
pub fn is_sentinel(id: AgentId) -> bool {
    id == SYSTEM || id == USER
}
