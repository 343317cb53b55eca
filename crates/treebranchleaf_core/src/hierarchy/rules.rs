//! Nesting rules between node kinds.
//!
//! # Invariants
//! - `branch` nests under `branch` or the root.
//! - `section` nests under `branch`, `section` or the root.
//! - Every leaf kind nests under `branch`, `section` or another leaf.
//! - Leaves never sit at the root.

use crate::model::node::NodeType;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Kind of the parent a node would be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "type")]
pub enum ParentKind {
    /// Implicit tree root.
    Root,
    Node(NodeType),
}

impl From<Option<NodeType>> for ParentKind {
    fn from(value: Option<NodeType>) -> Self {
        value.map_or(Self::Root, Self::Node)
    }
}

impl Display for ParentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Root => f.write_str("root"),
            Self::Node(kind) => write!(f, "{kind}"),
        }
    }
}

/// Whether a `child` node may be attached under `parent`.
pub fn can_nest(child: NodeType, parent: ParentKind) -> bool {
    use NodeType::{Branch, LeafField, LeafOption, LeafOptionField, Section};

    match (child, parent) {
        (Branch, ParentKind::Root | ParentKind::Node(Branch)) => true,
        (Section, ParentKind::Root | ParentKind::Node(Branch | Section)) => true,
        (
            LeafOption | LeafOptionField | LeafField,
            ParentKind::Node(Branch | Section | LeafOption | LeafOptionField | LeafField),
        ) => true,
        _ => false,
    }
}

/// Whether `kind` may be placed at the tree root.
pub fn is_root_allowed(kind: NodeType) -> bool {
    can_nest(kind, ParentKind::Root)
}

/// Kinds offered by the palette when dropping under `parent`.
pub fn allowed_child_kinds(parent: ParentKind) -> Vec<NodeType> {
    NodeType::ALL
        .into_iter()
        .filter(|kind| can_nest(*kind, parent))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{allowed_child_kinds, can_nest, is_root_allowed, ParentKind};
    use crate::model::node::NodeType;

    #[test]
    fn only_branch_and_section_are_root_allowed() {
        assert!(is_root_allowed(NodeType::Branch));
        assert!(is_root_allowed(NodeType::Section));
        for kind in NodeType::ALL.into_iter().filter(|kind| kind.is_leaf()) {
            assert!(!is_root_allowed(kind), "{kind} must not be root-allowed");
        }
    }

    #[test]
    fn full_nesting_table_matches_rules() {
        let expected = [
            // (child, parent, allowed)
            (NodeType::Branch, NodeType::Branch, true),
            (NodeType::Branch, NodeType::Section, false),
            (NodeType::Branch, NodeType::LeafField, false),
            (NodeType::Section, NodeType::Branch, true),
            (NodeType::Section, NodeType::Section, true),
            (NodeType::Section, NodeType::LeafOption, false),
            (NodeType::LeafField, NodeType::Branch, true),
            (NodeType::LeafField, NodeType::Section, true),
            (NodeType::LeafField, NodeType::LeafOption, true),
            (NodeType::LeafOption, NodeType::LeafOptionField, true),
            (NodeType::LeafOptionField, NodeType::LeafField, true),
        ];
        for (child, parent, allowed) in expected {
            assert_eq!(
                can_nest(child, ParentKind::Node(parent)),
                allowed,
                "{child} under {parent}"
            );
        }
    }

    #[test]
    fn palette_kinds_follow_parent() {
        assert_eq!(
            allowed_child_kinds(ParentKind::Root),
            vec![NodeType::Branch, NodeType::Section]
        );
        assert_eq!(
            allowed_child_kinds(ParentKind::Node(NodeType::Section)),
            vec![
                NodeType::Section,
                NodeType::LeafOption,
                NodeType::LeafOptionField,
                NodeType::LeafField,
            ]
        );
        assert_eq!(allowed_child_kinds(ParentKind::Node(NodeType::Branch)).len(), 5);
    }
}
