//! Sibling-order recomputation for relative moves over a flat node list.
//!
//! # Invariants
//! - A move removes the node from its old sibling list, attaches it to the
//!   resolved parent and inserts it before/after the target sibling, or last
//!   for `child`.
//! - Both affected sibling lists are renumbered `0..n` in their new sequence.
//! - A node never ends up under itself or one of its descendants.

use crate::hierarchy::placement::{DropPosition, MoveRequest};
use crate::model::node::{Node, NodeId};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from applying a move to a node list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderError {
    NodeNotFound(NodeId),
    TargetNotFound(NodeId),
    /// `before`/`after` without a sibling id.
    MissingSibling,
    SelfTarget(NodeId),
    WouldCreateCycle { node_id: NodeId, parent_id: NodeId },
}

impl Display for ReorderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::TargetNotFound(id) => write!(f, "move target not found: {id}"),
            Self::MissingSibling => write!(f, "before/after move requires a sibling id"),
            Self::SelfTarget(id) => write!(f, "node cannot be moved relative to itself: {id}"),
            Self::WouldCreateCycle { node_id, parent_id } => write!(
                f,
                "move would create cycle: node {node_id} under parent {parent_id}"
            ),
        }
    }
}

impl Error for ReorderError {}

/// Parent implied by `request`, checked against `nodes`.
pub fn resolve_parent(
    nodes: &[Node],
    node_id: NodeId,
    request: &MoveRequest,
) -> Result<Option<NodeId>, ReorderError> {
    let parents: HashMap<NodeId, Option<NodeId>> =
        nodes.iter().map(|node| (node.id, node.parent_id)).collect();
    if !parents.contains_key(&node_id) {
        return Err(ReorderError::NodeNotFound(node_id));
    }
    if request.target_id == Some(node_id) {
        return Err(ReorderError::SelfTarget(node_id));
    }

    let parent_id = match (request.position, request.target_id) {
        (DropPosition::Child, None) => None,
        (DropPosition::Child, Some(target)) => {
            if !parents.contains_key(&target) {
                return Err(ReorderError::TargetNotFound(target));
            }
            Some(target)
        }
        (DropPosition::Before | DropPosition::After, None) => {
            return Err(ReorderError::MissingSibling);
        }
        (DropPosition::Before | DropPosition::After, Some(sibling)) => *parents
            .get(&sibling)
            .ok_or(ReorderError::TargetNotFound(sibling))?,
    };

    if let Some(parent_id) = parent_id {
        let mut visited = HashSet::new();
        let mut cursor = Some(parent_id);
        while let Some(current) = cursor {
            if current == node_id || !visited.insert(current) {
                return Err(ReorderError::WouldCreateCycle { node_id, parent_id });
            }
            cursor = parents.get(&current).copied().flatten();
        }
    }

    Ok(parent_id)
}

/// Index at which the moved node enters `siblings` (which excludes it).
pub fn insertion_index(siblings: &[NodeId], request: &MoveRequest) -> usize {
    let anchor = request
        .target_id
        .and_then(|target| siblings.iter().position(|id| *id == target));
    match (request.position, anchor) {
        (DropPosition::Before, Some(index)) => index,
        (DropPosition::After, Some(index)) => index + 1,
        _ => siblings.len(),
    }
}

/// Ordered ids of the children of `parent_id`, skipping `exclude`.
pub fn sorted_sibling_ids(
    nodes: &[Node],
    parent_id: Option<NodeId>,
    exclude: Option<NodeId>,
) -> Vec<NodeId> {
    let mut siblings: Vec<&Node> = nodes
        .iter()
        .filter(|node| node.parent_id == parent_id && Some(node.id) != exclude)
        .collect();
    siblings.sort_by_key(|node| node.sibling_key());
    siblings.into_iter().map(|node| node.id).collect()
}

/// Order for a node appended as last child of `parent_id`.
pub fn next_child_order(nodes: &[Node], parent_id: Option<NodeId>) -> i64 {
    nodes
        .iter()
        .filter(|node| node.parent_id == parent_id)
        .map(|node| node.order + 1)
        .max()
        .unwrap_or(0)
}

/// Applies a relative move to `nodes` in place and returns the new parent.
///
/// `updated_at` is set to `now` on every node whose parent or order changed.
pub fn apply_move(
    nodes: &mut [Node],
    node_id: NodeId,
    request: &MoveRequest,
    now: i64,
) -> Result<Option<NodeId>, ReorderError> {
    let new_parent = resolve_parent(nodes, node_id, request)?;
    let old_parent = nodes
        .iter()
        .find(|node| node.id == node_id)
        .and_then(|node| node.parent_id);

    let mut siblings = sorted_sibling_ids(nodes, new_parent, Some(node_id));
    let index = insertion_index(&siblings, request);
    siblings.insert(index, node_id);

    let mut sequences = vec![(new_parent, siblings)];
    if old_parent != new_parent {
        sequences.push((old_parent, sorted_sibling_ids(nodes, old_parent, Some(node_id))));
    }

    let mut assignments: HashMap<NodeId, (Option<NodeId>, i64)> = HashMap::new();
    for (parent_id, ids) in sequences {
        for (order, id) in ids.into_iter().enumerate() {
            assignments.insert(id, (parent_id, order as i64));
        }
    }

    for node in nodes.iter_mut() {
        if let Some((parent_id, order)) = assignments.get(&node.id) {
            if node.parent_id != *parent_id || node.order != *order {
                node.parent_id = *parent_id;
                node.order = *order;
                node.updated_at = now;
            }
        }
    }

    Ok(new_parent)
}
