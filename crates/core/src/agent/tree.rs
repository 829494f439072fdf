// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent tree — pure in-memory hierarchy with structural queries.
//!
//! No routing, no persistence, no I/O. Just the tree and queries on it.

use std::collections::HashMap;
use thiserror::Error;

use super::node::AgentNode;
use crate::ids::AgentId;

/// Raised by mutating [`AgentTree`] operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("duplicate agent id: {0}")]
    DuplicateId(AgentId),
    #[error("parent {0} not in tree")]
    MissingParent(AgentId),
    #[error("sibling name collision: {0:?}")]
    SiblingNameCollision(String),
    #[error("agent {0} not in tree")]
    NotFound(AgentId),
    #[error("agent {0} has children; remove them first")]
    HasChildren(AgentId),
}

/// Maintains parent-child relationships between agents.
#[derive(Debug, Default)]
pub struct AgentTree {
    nodes: HashMap<AgentId, AgentNode>,
}

impl AgentTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node into the tree.
    pub fn add(&mut self, node: AgentNode) -> Result<(), TreeError> {
        if self.nodes.contains_key(&node.id) {
            return Err(TreeError::DuplicateId(node.id));
        }
        match node.parent_id {
            Some(parent_id) => {
                if !self.nodes.contains_key(&parent_id) {
                    return Err(TreeError::MissingParent(parent_id));
                }
                if !node.name.is_empty() {
                    let sibling_ids = self.nodes[&parent_id].children.clone();
                    self.check_name_collision(&node.name, &sibling_ids)?;
                }
                let id = node.id;
                self.nodes.insert(id, node);
                if let Some(parent) = self.nodes.get_mut(&parent_id) {
                    parent.children.push(id);
                }
            }
            None => {
                if !node.name.is_empty() {
                    // Roots are siblings of each other for name-uniqueness purposes.
                    let root_ids: Vec<AgentId> = self
                        .nodes
                        .values()
                        .filter(|n| n.parent_id.is_none())
                        .map(|n| n.id)
                        .collect();
                    self.check_name_collision(&node.name, &root_ids)?;
                }
                let id = node.id;
                self.nodes.insert(id, node);
            }
        }
        Ok(())
    }

    fn check_name_collision(&self, name: &str, sibling_ids: &[AgentId]) -> Result<(), TreeError> {
        if sibling_ids.iter().any(|sid| self.nodes[sid].name == name) {
            return Err(TreeError::SiblingNameCollision(name.to_string()));
        }
        Ok(())
    }

    /// Remove a leaf node from the tree and return it.
    pub fn remove(&mut self, agent_id: AgentId) -> Result<AgentNode, TreeError> {
        let node = self
            .nodes
            .get(&agent_id)
            .ok_or(TreeError::NotFound(agent_id))?;
        if !node.children.is_empty() {
            return Err(TreeError::HasChildren(agent_id));
        }
        let parent_id = node.parent_id;
        let Some(removed) = self.nodes.remove(&agent_id) else {
            return Err(TreeError::NotFound(agent_id));
        };
        if let Some(pid) = parent_id {
            if let Some(parent) = self.nodes.get_mut(&pid) {
                parent.children.retain(|c| *c != agent_id);
            }
        }
        Ok(removed)
    }

    pub fn get(&self, agent_id: AgentId) -> Result<&AgentNode, TreeError> {
        self.nodes.get(&agent_id).ok_or(TreeError::NotFound(agent_id))
    }

    pub fn get_mut(&mut self, agent_id: AgentId) -> Result<&mut AgentNode, TreeError> {
        self.nodes
            .get_mut(&agent_id)
            .ok_or(TreeError::NotFound(agent_id))
    }

    pub fn contains(&self, agent_id: AgentId) -> bool {
        self.nodes.contains_key(&agent_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Return the parent node, or `None` for roots.
    pub fn parent(&self, agent_id: AgentId) -> Result<Option<&AgentNode>, TreeError> {
        let node = self.get(agent_id)?;
        Ok(match node.parent_id {
            Some(pid) => Some(self.get(pid)?),
            None => None,
        })
    }

    /// Return direct children as nodes.
    pub fn children(&self, agent_id: AgentId) -> Result<Vec<&AgentNode>, TreeError> {
        let node = self.get(agent_id)?;
        node.children.iter().map(|cid| self.get(*cid)).collect()
    }

    /// Return siblings excluding self. Empty for roots.
    pub fn team(&self, agent_id: AgentId) -> Result<Vec<&AgentNode>, TreeError> {
        let node = self.get(agent_id)?;
        match node.parent_id {
            None => Ok(Vec::new()),
            Some(pid) => {
                let parent = self.get(pid)?;
                parent
                    .children
                    .iter()
                    .filter(|cid| **cid != agent_id)
                    .map(|cid| self.get(*cid))
                    .collect()
            }
        }
    }

    /// Return all root nodes (no parent).
    pub fn roots(&self) -> Vec<&AgentNode> {
        self.nodes.values().filter(|n| n.parent_id.is_none()).collect()
    }

    /// Return every agent identifier currently in the tree, in no
    /// particular order.
    pub fn ids(&self) -> Vec<AgentId> {
        self.nodes.keys().copied().collect()
    }

    /// Return all descendants depth-first. Does not include the node itself.
    pub fn subtree(&self, agent_id: AgentId) -> Result<Vec<&AgentNode>, TreeError> {
        let node = self.get(agent_id)?;
        let mut result = Vec::new();
        let mut stack: Vec<AgentId> = node.children.iter().rev().copied().collect();
        while let Some(nid) = stack.pop() {
            let child = self.get(nid)?;
            result.push(child);
            stack.extend(child.children.iter().rev().copied());
        }
        Ok(result)
    }
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tests;
