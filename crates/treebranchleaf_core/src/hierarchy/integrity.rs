//! Genealogy, statistics and whole-tree integrity checks.
//!
//! # Responsibility
//! - Compute the root-to-node chain of any node with a depth guard.
//! - Summarize a tree (counts per kind, depth, roots, orphans).
//! - Report structural defects in persisted data without repairing them.
//!
//! # Invariants
//! - Checks are read-only over a `NodeStore` snapshot.
//! - Errors describe states the editor itself can never produce; warnings
//!   describe legal but unusual trees.

use crate::hierarchy::rules::{can_nest, is_root_allowed, ParentKind};
use crate::hierarchy::store::NodeStore;
use crate::model::node::{NodeId, NodeType};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Hard genealogy depth limit.
pub const DEFAULT_MAX_DEPTH: usize = 100;
/// Depth above which a node is reported as unusually deep.
pub const DEFAULT_DEEP_WARNING: usize = 20;
/// Node count above which a tree is reported as large.
pub const DEFAULT_LARGE_TREE_WARNING: usize = 1000;

/// Tunable thresholds for integrity checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityLimits {
    pub max_depth: usize,
    pub deep_warning: usize,
    pub large_tree_warning: usize,
}

impl Default for IntegrityLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            deep_warning: DEFAULT_DEEP_WARNING,
            large_tree_warning: DEFAULT_LARGE_TREE_WARNING,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenealogyError {
    NodeNotFound(NodeId),
    /// Walking up from `node_id` revisited `at`.
    Cycle { node_id: NodeId, at: NodeId },
    TooDeep { node_id: NodeId, limit: usize },
}

impl Display for GenealogyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::Cycle { node_id, at } => {
                write!(f, "cycle detected above node {node_id} at {at}")
            }
            Self::TooDeep { node_id, limit } => {
                write!(f, "node {node_id} is deeper than {limit} levels")
            }
        }
    }
}

impl Error for GenealogyError {}

/// Ids from the top-most reachable ancestor down to `id`, inclusive.
///
/// The walk stops at a missing parent.
pub fn genealogy(store: &NodeStore, id: NodeId) -> Result<Vec<NodeId>, GenealogyError> {
    genealogy_within(store, id, DEFAULT_MAX_DEPTH)
}

/// [`genealogy`] with an explicit depth limit.
pub fn genealogy_within(
    store: &NodeStore,
    id: NodeId,
    max_depth: usize,
) -> Result<Vec<NodeId>, GenealogyError> {
    let mut node = store.get(id).ok_or(GenealogyError::NodeNotFound(id))?;
    let mut chain = vec![id];
    let mut visited = HashSet::from([id]);

    while let Some(parent_id) = node.parent_id {
        if !visited.insert(parent_id) {
            return Err(GenealogyError::Cycle {
                node_id: id,
                at: parent_id,
            });
        }
        let Some(parent) = store.get(parent_id) else {
            break;
        };
        if chain.len() >= max_depth {
            return Err(GenealogyError::TooDeep {
                node_id: id,
                limit: max_depth,
            });
        }
        chain.push(parent_id);
        node = parent;
    }

    chain.reverse();
    Ok(chain)
}

/// Depth of `id`; root-level nodes are level 1.
pub fn level(store: &NodeStore, id: NodeId) -> Result<usize, GenealogyError> {
    genealogy(store, id).map(|chain| chain.len())
}

/// Label path from the root, e.g. `Roof > Panels > Count`.
pub fn genealogy_path(store: &NodeStore, id: NodeId) -> Result<String, GenealogyError> {
    let labels: Vec<&str> = genealogy(store, id)?
        .into_iter()
        .filter_map(|node_id| store.get(node_id))
        .map(|node| node.label.as_str())
        .collect();
    Ok(labels.join(" > "))
}

/// Summary counts for one tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyStats {
    pub total_nodes: usize,
    pub by_kind: BTreeMap<NodeType, usize>,
    pub leaf_count: usize,
    pub root_count: usize,
    pub orphan_count: usize,
    /// Deepest level among nodes with a valid genealogy.
    pub max_depth: usize,
}

pub fn statistics(store: &NodeStore) -> HierarchyStats {
    let mut stats = HierarchyStats {
        total_nodes: store.len(),
        root_count: store.roots().len(),
        orphan_count: store.orphans().len(),
        ..HierarchyStats::default()
    };
    for node in store.iter() {
        *stats.by_kind.entry(node.kind).or_default() += 1;
        if node.kind.is_leaf() {
            stats.leaf_count += 1;
        }
        if let Ok(depth) = level(store, node.id) {
            stats.max_depth = stats.max_depth.max(depth);
        }
    }
    stats
}

/// One finding of an integrity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "camelCase")]
pub enum IntegrityIssue {
    NoRoot,
    #[serde(rename_all = "camelCase")]
    Orphan { node_id: NodeId, parent_id: NodeId },
    #[serde(rename_all = "camelCase")]
    Cycle { node_id: NodeId },
    #[serde(rename_all = "camelCase")]
    TooDeep { node_id: NodeId, limit: usize },
    #[serde(rename_all = "camelCase")]
    IllegalNesting {
        node_id: NodeId,
        child: NodeType,
        parent: ParentKind,
    },
    #[serde(rename_all = "camelCase")]
    LeafAtRoot { node_id: NodeId },
    MultipleRoots { count: usize },
    #[serde(rename_all = "camelCase")]
    DeepNode { node_id: NodeId, depth: usize },
    LargeTree { count: usize },
}

impl Display for IntegrityIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRoot => write!(f, "tree has no root node"),
            Self::Orphan { node_id, parent_id } => {
                write!(f, "node {node_id} references missing parent {parent_id}")
            }
            Self::Cycle { node_id } => write!(f, "node {node_id} is part of a parent cycle"),
            Self::TooDeep { node_id, limit } => {
                write!(f, "node {node_id} exceeds depth limit {limit}")
            }
            Self::IllegalNesting {
                node_id,
                child,
                parent,
            } => write!(f, "node {node_id}: {child} cannot be placed under {parent}"),
            Self::LeafAtRoot { node_id } => write!(f, "leaf node {node_id} sits at the root"),
            Self::MultipleRoots { count } => write!(f, "tree has {count} root nodes"),
            Self::DeepNode { node_id, depth } => {
                write!(f, "node {node_id} is nested {depth} levels deep")
            }
            Self::LargeTree { count } => write!(f, "tree holds {count} nodes"),
        }
    }
}

/// Outcome of [`check_integrity`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub errors: Vec<IntegrityIssue>,
    pub warnings: Vec<IntegrityIssue>,
    pub node_count: usize,
    pub max_depth: usize,
}

impl IntegrityReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Checks a whole tree snapshot.
pub fn check_integrity(store: &NodeStore, limits: IntegrityLimits) -> IntegrityReport {
    let mut report = IntegrityReport {
        node_count: store.len(),
        ..IntegrityReport::default()
    };
    if store.is_empty() {
        return report;
    }

    let root_count = store.roots().len();
    if root_count == 0 {
        report.errors.push(IntegrityIssue::NoRoot);
    } else if root_count > 1 {
        report
            .warnings
            .push(IntegrityIssue::MultipleRoots { count: root_count });
    }

    for node in store.iter() {
        match node.parent_id {
            None if !is_root_allowed(node.kind) => {
                report
                    .errors
                    .push(IntegrityIssue::LeafAtRoot { node_id: node.id });
            }
            None => {}
            Some(parent_id) => match store.get(parent_id) {
                None => report.errors.push(IntegrityIssue::Orphan {
                    node_id: node.id,
                    parent_id,
                }),
                Some(parent) if !can_nest(node.kind, ParentKind::Node(parent.kind)) => {
                    report.errors.push(IntegrityIssue::IllegalNesting {
                        node_id: node.id,
                        child: node.kind,
                        parent: ParentKind::Node(parent.kind),
                    });
                }
                Some(_) => {}
            },
        }

        match genealogy_within(store, node.id, limits.max_depth) {
            Ok(chain) => {
                let depth = chain.len();
                report.max_depth = report.max_depth.max(depth);
                if depth > limits.deep_warning {
                    report.warnings.push(IntegrityIssue::DeepNode {
                        node_id: node.id,
                        depth,
                    });
                }
            }
            Err(GenealogyError::Cycle { .. }) => {
                report.errors.push(IntegrityIssue::Cycle { node_id: node.id });
            }
            Err(GenealogyError::TooDeep { limit, .. }) => {
                report.errors.push(IntegrityIssue::TooDeep {
                    node_id: node.id,
                    limit,
                });
            }
            Err(GenealogyError::NodeNotFound(_)) => {}
        }
    }

    if store.len() > limits.large_tree_warning {
        report.warnings.push(IntegrityIssue::LargeTree { count: store.len() });
    }

    report
}

#[cfg(test)]
mod tests {
    use super::{
        check_integrity, genealogy, genealogy_path, genealogy_within, level, statistics,
        GenealogyError, IntegrityIssue, IntegrityLimits,
    };
    use crate::hierarchy::store::NodeStore;
    use crate::model::node::{Node, NodeType};
    use uuid::Uuid;

    fn chain(depth: usize) -> Vec<Node> {
        let tree = Uuid::new_v4();
        let mut nodes = vec![Node::new(tree, NodeType::Branch, "level 1")];
        for index in 1..depth {
            let parent = nodes[index - 1].id;
            nodes.push(
                Node::new(tree, NodeType::Branch, format!("level {}", index + 1)).under(parent, 0),
            );
        }
        nodes
    }

    #[test]
    fn genealogy_runs_root_to_node() {
        let nodes = chain(3);
        let store = NodeStore::from_nodes(nodes.clone());
        let ids: Vec<_> = nodes.iter().map(|node| node.id).collect();
        assert_eq!(genealogy(&store, ids[2]).unwrap(), ids);
        assert_eq!(level(&store, ids[0]).unwrap(), 1);
        assert_eq!(
            genealogy_path(&store, ids[2]).unwrap(),
            "level 1 > level 2 > level 3"
        );
    }

    #[test]
    fn genealogy_enforces_depth_limit() {
        let nodes = chain(6);
        let store = NodeStore::from_nodes(nodes.clone());
        let deepest = nodes[5].id;
        assert_eq!(
            genealogy_within(&store, deepest, 5),
            Err(GenealogyError::TooDeep {
                node_id: deepest,
                limit: 5
            })
        );
        assert!(genealogy_within(&store, deepest, 6).is_ok());
    }

    #[test]
    fn statistics_count_kinds_and_depth() {
        let mut nodes = chain(2);
        let tree = nodes[0].tree_id;
        let leaf = Node::new(tree, NodeType::LeafOption, "yes").under(nodes[1].id, 0);
        nodes.push(leaf);

        let stats = statistics(&NodeStore::from_nodes(nodes));
        assert_eq!(stats.total_nodes, 3);
        assert_eq!(stats.by_kind[&NodeType::Branch], 2);
        assert_eq!(stats.leaf_count, 1);
        assert_eq!(stats.root_count, 1);
        assert_eq!(stats.max_depth, 3);
    }

    #[test]
    fn report_flags_corrupt_trees() {
        let tree = Uuid::new_v4();
        let leaf_root = Node::new(tree, NodeType::LeafField, "stray");
        let orphan = Node::new(tree, NodeType::LeafField, "orphan").under(Uuid::new_v4(), 0);
        let branch = Node::new(tree, NodeType::Branch, "B");
        let bad = Node::new(tree, NodeType::Branch, "inside leaf").under(leaf_root.id, 0);

        let store =
            NodeStore::from_nodes(vec![leaf_root.clone(), orphan.clone(), branch, bad.clone()]);
        let report = check_integrity(&store, IntegrityLimits::default());
        assert!(!report.is_valid());
        assert!(report
            .errors
            .contains(&IntegrityIssue::LeafAtRoot { node_id: leaf_root.id }));
        assert!(report.errors.iter().any(|issue| matches!(
            issue,
            IntegrityIssue::Orphan { node_id, .. } if *node_id == orphan.id
        )));
        assert!(report.errors.iter().any(|issue| matches!(
            issue,
            IntegrityIssue::IllegalNesting { node_id, .. } if *node_id == bad.id
        )));
        assert!(report
            .warnings
            .contains(&IntegrityIssue::MultipleRoots { count: 2 }));
    }

    #[test]
    fn report_flags_cycles_and_missing_root() {
        let tree = Uuid::new_v4();
        let mut a = Node::new(tree, NodeType::Branch, "a");
        let b = Node::new(tree, NodeType::Branch, "b").under(a.id, 0);
        a.parent_id = Some(b.id);

        let report =
            check_integrity(&NodeStore::from_nodes(vec![a, b]), IntegrityLimits::default());
        assert!(report.errors.contains(&IntegrityIssue::NoRoot));
        assert_eq!(
            report
                .errors
                .iter()
                .filter(|issue| matches!(issue, IntegrityIssue::Cycle { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn deep_and_large_trees_warn() {
        let limits = IntegrityLimits {
            max_depth: 100,
            deep_warning: 2,
            large_tree_warning: 2,
        };
        let report = check_integrity(&NodeStore::from_nodes(chain(3)), limits);
        assert!(report.is_valid());
        assert_eq!(report.max_depth, 3);
        assert!(report
            .warnings
            .iter()
            .any(|issue| matches!(issue, IntegrityIssue::DeepNode { depth: 3, .. })));
        assert!(report
            .warnings
            .contains(&IntegrityIssue::LargeTree { count: 3 }));
    }
}
