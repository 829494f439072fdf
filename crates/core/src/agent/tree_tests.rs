// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::ids::SessionId;

fn node(name: &str) -> AgentNode {
    AgentNode::new(SessionId::new(), name, "do things")
}

#[test]
fn add_and_get_root() {
    let mut tree = AgentTree::new();
    let n = node("root");
    let id = n.id;
    tree.add(n).unwrap();
    assert_eq!(tree.get(id).unwrap().name, "root");
    assert!(tree.contains(id));
}

#[test]
fn duplicate_id_rejected() {
    let mut tree = AgentTree::new();
    let n = node("root");
    let id = n.id;
    let dup = n.clone();
    tree.add(n).unwrap();
    assert_eq!(tree.add(dup), Err(TreeError::DuplicateId(id)));
}

#[test]
fn missing_parent_rejected() {
    let mut tree = AgentTree::new();
    let parent_id = crate::ids::AgentId::new();
    let child = node("child").with_parent(parent_id);
    assert_eq!(tree.add(child), Err(TreeError::MissingParent(parent_id)));
}

#[test]
fn sibling_name_collision_rejected_under_same_parent() {
    let mut tree = AgentTree::new();
    let root = node("root");
    let root_id = root.id;
    tree.add(root).unwrap();
    let child_a = node("worker").with_parent(root_id);
    let child_b = node("worker").with_parent(root_id);
    tree.add(child_a).unwrap();
    assert_eq!(
        tree.add(child_b),
        Err(TreeError::SiblingNameCollision("worker".to_string()))
    );
}

#[test]
fn roots_share_one_sibling_namespace() {
    let mut tree = AgentTree::new();
    tree.add(node("alpha")).unwrap();
    let dup_root = node("alpha");
    assert_eq!(
        tree.add(dup_root),
        Err(TreeError::SiblingNameCollision("alpha".to_string()))
    );
}

#[test]
fn different_parents_allow_same_name() {
    let mut tree = AgentTree::new();
    let root_a = node("team-a");
    let root_b = node("team-b");
    let (a_id, b_id) = (root_a.id, root_b.id);
    tree.add(root_a).unwrap();
    tree.add(root_b).unwrap();
    tree.add(node("worker").with_parent(a_id)).unwrap();
    // Same name under a different parent is fine.
    tree.add(node("worker").with_parent(b_id)).unwrap();
}

#[test]
fn remove_leaf_detaches_from_parent() {
    let mut tree = AgentTree::new();
    let root = node("root");
    let root_id = root.id;
    tree.add(root).unwrap();
    let child = node("child").with_parent(root_id);
    let child_id = child.id;
    tree.add(child).unwrap();

    tree.remove(child_id).unwrap();
    assert!(!tree.contains(child_id));
    assert_eq!(tree.children(root_id).unwrap().len(), 0);
}

#[test]
fn remove_node_with_children_fails() {
    let mut tree = AgentTree::new();
    let root = node("root");
    let root_id = root.id;
    tree.add(root).unwrap();
    tree.add(node("child").with_parent(root_id)).unwrap();
    assert_eq!(tree.remove(root_id), Err(TreeError::HasChildren(root_id)));
}

#[test]
fn remove_missing_fails() {
    let mut tree = AgentTree::new();
    let missing = crate::ids::AgentId::new();
    assert_eq!(tree.remove(missing), Err(TreeError::NotFound(missing)));
}

#[test]
fn team_excludes_self_and_is_empty_for_roots() {
    let mut tree = AgentTree::new();
    let root = node("root");
    let root_id = root.id;
    tree.add(root).unwrap();
    let a = node("a").with_parent(root_id);
    let b = node("b").with_parent(root_id);
    let (a_id, b_id) = (a.id, b.id);
    tree.add(a).unwrap();
    tree.add(b).unwrap();

    let team_a: Vec<_> = tree.team(a_id).unwrap().iter().map(|n| n.id).collect();
    assert_eq!(team_a, vec![b_id]);
    assert!(tree.team(root_id).unwrap().is_empty());
}

#[test]
fn subtree_is_depth_first_and_excludes_self() {
    let mut tree = AgentTree::new();
    let root = node("root");
    let root_id = root.id;
    tree.add(root).unwrap();
    let child = node("child").with_parent(root_id);
    let child_id = child.id;
    tree.add(child).unwrap();
    let grandchild = node("grandchild").with_parent(child_id);
    let grandchild_id = grandchild.id;
    tree.add(grandchild).unwrap();

    let ids: Vec<_> = tree.subtree(root_id).unwrap().iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![child_id, grandchild_id]);
}

#[test]
fn ids_returns_every_node_regardless_of_position() {
    let mut tree = AgentTree::new();
    let root = node("root");
    let root_id = root.id;
    tree.add(root).unwrap();
    let child = node("child").with_parent(root_id);
    let child_id = child.id;
    tree.add(child).unwrap();

    let mut ids = tree.ids();
    ids.sort();
    let mut expected = vec![root_id, child_id];
    expected.sort();
    assert_eq!(ids, expected);
}
