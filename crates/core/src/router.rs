// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure-function message routing on top of the agent tree.
//!
//! No mutable state, no I/O. Validates one-hop reachability and resolves
//! broadcast targets.

use std::collections::HashSet;
use thiserror::Error;

use crate::agent::AgentTree;
use crate::ids::{is_sentinel, AgentId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("recipient {0} not in tree")]
    UnknownRecipient(AgentId),
    #[error("sender {0} not in tree")]
    UnknownSender(AgentId),
    #[error("{sender} cannot reach {recipient}")]
    Unreachable { sender: AgentId, recipient: AgentId },
    #[error("sentinels cannot broadcast")]
    SentinelBroadcast,
    #[error("{0} has no siblings")]
    NoSiblings(AgentId),
}

/// Agent ids reachable from `agent_id` in one hop: parent, children, and
/// siblings. Does not include `agent_id` itself.
pub fn reachable_set(tree: &AgentTree, agent_id: AgentId) -> Result<HashSet<AgentId>, RoutingError> {
    let node = tree
        .get(agent_id)
        .map_err(|_| RoutingError::UnknownSender(agent_id))?;
    let mut result = HashSet::new();
    if let Some(parent_id) = node.parent_id {
        result.insert(parent_id);
    }
    result.extend(node.children.iter().copied());
    let siblings = tree
        .team(agent_id)
        .map_err(|_| RoutingError::UnknownSender(agent_id))?;
    result.extend(siblings.iter().map(|n| n.id));
    Ok(result)
}

/// Validate that `sender` can route a message to `recipient`.
///
/// Sentinels ([`crate::ids::SYSTEM`] / [`crate::ids::USER`]) bypass the
/// one-hop constraint, but the recipient must still exist in the tree.
pub fn validate_route(tree: &AgentTree, sender: AgentId, recipient: AgentId) -> Result<(), RoutingError> {
    if !tree.contains(recipient) {
        return Err(RoutingError::UnknownRecipient(recipient));
    }
    if is_sentinel(sender) {
        return Ok(());
    }
    if !tree.contains(sender) {
        return Err(RoutingError::UnknownSender(sender));
    }
    let reachable = reachable_set(tree, sender)?;
    if !reachable.contains(&recipient) {
        return Err(RoutingError::Unreachable { sender, recipient });
    }
    Ok(())
}

/// Resolve the sibling ids a broadcast from `sender` would reach.
///
/// Sentinels cannot broadcast; they have no position in the tree.
pub fn resolve_broadcast(tree: &AgentTree, sender: AgentId) -> Result<Vec<AgentId>, RoutingError> {
    if is_sentinel(sender) {
        return Err(RoutingError::SentinelBroadcast);
    }
    if !tree.contains(sender) {
        return Err(RoutingError::UnknownSender(sender));
    }
    let siblings = tree
        .team(sender)
        .map_err(|_| RoutingError::UnknownSender(sender))?;
    if siblings.is_empty() {
        return Err(RoutingError::NoSiblings(sender));
    }
    Ok(siblings.iter().map(|n| n.id).collect())
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
