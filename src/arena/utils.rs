//! Utility functions for walking and moving whole subtrees.

use super::{NodeId, Tree};
use itertools::Itertools;
use std::collections::HashMap;

/// A node of a subtree flattened in pre-order. `parent` is the position of the parent within
/// the flattened sequence, `None` for the top node.
pub(super) struct FlatNode<Elem> {
    pub(super) parent: Option<usize>,
    pub(super) key: String,
    pub(super) value: Elem,
}

/// Handles of the subtree rooted at `start`, in depth-first pre-order
pub(super) fn preorder<Elem>(tree: &Tree<Elem>, start: NodeId) -> Vec<NodeId> {
    let mut result = vec![];
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        if let Some(node) = tree.get(id) {
            result.push(id);
            stack.extend(node.children.iter().rev());
        }
    }
    result
}

fn positions(subtree: &[NodeId]) -> HashMap<NodeId, usize> {
    subtree.iter().enumerate().map(|(i, id)| (*id, i)).collect()
}

/// Copies the subtree rooted at `start`. The tree is left untouched.
pub(super) fn flatten_cloned<Elem: Clone>(tree: &Tree<Elem>, start: NodeId) -> Vec<FlatNode<Elem>> {
    let subtree = preorder(tree, start);
    let positions = positions(&subtree);
    subtree
        .iter()
        .filter_map(|id| tree.get(*id))
        .map(|node| FlatNode {
            parent: node.parent.and_then(|p| positions.get(&p).copied()),
            key: node.key.clone(),
            value: node.value.clone(),
        })
        .collect_vec()
}

/// Moves the subtree rooted at `start` out of the arena. The top node must already be unlinked
/// from its parent.
pub(super) fn flatten_taken<Elem>(tree: &mut Tree<Elem>, start: NodeId) -> Vec<FlatNode<Elem>> {
    let subtree = preorder(tree, start);
    let positions = positions(&subtree);
    subtree
        .iter()
        .filter_map(|id| tree.release(*id))
        .map(|node| FlatNode {
            parent: node.parent.and_then(|p| positions.get(&p).copied()),
            key: node.key,
            value: node.value,
        })
        .collect_vec()
}
