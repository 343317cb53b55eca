//! In-memory node store for one tree.
//!
//! # Responsibility
//! - Index a flat node list by id and by parent.
//! - Answer parent/child/ancestor queries in deterministic sibling order.
//! - Derive the nested view on demand.
//!
//! # Invariants
//! - The store is rebuilt from a full node list, never patched in place.
//! - Walks over parent links stop on repeated ids, so corrupt input with
//!   cycles cannot loop forever.
//! - Nodes whose parent is missing stay addressable by id.

use crate::model::node::{Node, NodeId};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Owned nested view of one node and its subtree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierarchyNode {
    #[serde(flatten)]
    pub node: Node,
    pub children: Vec<HierarchyNode>,
}

/// Indexed snapshot of one tree's nodes.
#[derive(Debug, Clone, Default)]
pub struct NodeStore {
    nodes: HashMap<NodeId, Node>,
    children: HashMap<Option<NodeId>, Vec<NodeId>>,
    /// First-seen order of ids in the source list.
    ids: Vec<NodeId>,
}

impl NodeStore {
    /// Builds the store in one pass over `nodes`. A repeated id keeps the
    /// last record.
    pub fn from_nodes(nodes: impl IntoIterator<Item = Node>) -> Self {
        let mut by_id: HashMap<NodeId, Node> = HashMap::new();
        let mut ids = Vec::new();
        for node in nodes {
            if !by_id.contains_key(&node.id) {
                ids.push(node.id);
            }
            by_id.insert(node.id, node);
        }

        let mut children: HashMap<Option<NodeId>, Vec<NodeId>> = HashMap::new();
        for id in &ids {
            let node = &by_id[id];
            children.entry(node.parent_id).or_default().push(node.id);
        }
        for siblings in children.values_mut() {
            siblings.sort_by_key(|id| by_id[id].sibling_key());
        }

        Self {
            nodes: by_id,
            children,
            ids,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Nodes in source-list order.
    pub fn iter(&self) -> impl Iterator<Item = &Node> + '_ {
        self.ids.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Ordered children of `parent_id`; `None` lists root-level nodes.
    pub fn children_of(&self, parent_id: Option<NodeId>) -> Vec<&Node> {
        self.child_ids(parent_id)
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }

    /// Ordered child ids of `parent_id`.
    pub fn child_ids(&self, parent_id: Option<NodeId>) -> &[NodeId] {
        self.children
            .get(&parent_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn roots(&self) -> Vec<&Node> {
        self.children_of(None)
    }

    /// Nodes whose `parent_id` names a node missing from the store.
    pub fn orphans(&self) -> Vec<&Node> {
        self.iter()
            .filter(|node| node.parent_id.is_some_and(|parent| !self.contains(parent)))
            .collect()
    }

    /// Index of `id` among its siblings.
    pub fn sibling_index(&self, id: NodeId) -> Option<usize> {
        let node = self.get(id)?;
        self.child_ids(node.parent_id)
            .iter()
            .position(|sibling| *sibling == id)
    }

    /// Ancestors of `id`, nearest first. Stops at a missing parent or a
    /// repeated id.
    pub fn ancestors_of(&self, id: NodeId) -> Vec<&Node> {
        let mut ancestors = Vec::new();
        let mut visited = HashSet::from([id]);
        let mut cursor = self.get(id).and_then(|node| node.parent_id);
        while let Some(current) = cursor {
            if !visited.insert(current) {
                break;
            }
            let Some(parent) = self.get(current) else {
                break;
            };
            ancestors.push(parent);
            cursor = parent.parent_id;
        }
        ancestors
    }

    /// Whether `candidate` sits strictly below `ancestor`.
    pub fn is_descendant(&self, ancestor: NodeId, candidate: NodeId) -> bool {
        if ancestor == candidate {
            return false;
        }
        let mut visited = HashSet::new();
        let mut cursor = self.get(candidate).and_then(|node| node.parent_id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            if !visited.insert(current) {
                return false;
            }
            cursor = self.get(current).and_then(|node| node.parent_id);
        }
        false
    }

    /// `id` and every node below it, pre-order in sibling order.
    pub fn subtree_ids(&self, id: NodeId) -> Vec<NodeId> {
        if !self.contains(id) {
            return Vec::new();
        }
        let mut out = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            out.push(current);
            stack.extend(self.child_ids(Some(current)).iter().rev().copied());
        }
        out
    }

    /// Nested view. Orphans are promoted to the top level after the real
    /// roots; nodes only reachable through a cycle are left out.
    pub fn hierarchy(&self) -> Vec<HierarchyNode> {
        let mut visited = HashSet::new();
        let tops = self
            .child_ids(None)
            .iter()
            .copied()
            .chain(self.orphans().into_iter().map(|node| node.id))
            .collect::<Vec<_>>();
        tops.into_iter()
            .filter_map(|id| self.build_hierarchy_node(id, &mut visited))
            .collect()
    }

    fn build_hierarchy_node(
        &self,
        id: NodeId,
        visited: &mut HashSet<NodeId>,
    ) -> Option<HierarchyNode> {
        if !visited.insert(id) {
            return None;
        }
        let node = self.get(id)?.clone();
        let children = self
            .child_ids(Some(id))
            .iter()
            .filter_map(|child| self.build_hierarchy_node(*child, visited))
            .collect();
        Some(HierarchyNode { node, children })
    }

    /// Releases the nodes in source-list order.
    pub fn into_nodes(mut self) -> Vec<Node> {
        self.ids
            .iter()
            .filter_map(|id| self.nodes.remove(id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::NodeStore;
    use crate::model::node::{Node, NodeType};
    use uuid::Uuid;

    #[test]
    fn children_follow_order_then_creation_then_id() {
        let tree = Uuid::new_v4();
        let root = Node::new(tree, NodeType::Branch, "root");
        let mut late = Node::new(tree, NodeType::LeafField, "late").under(root.id, 1);
        late.created_at = 20;
        let mut early = Node::new(tree, NodeType::LeafField, "early").under(root.id, 1);
        early.created_at = 10;
        let first = Node::new(tree, NodeType::LeafField, "first").under(root.id, 0);

        let store = NodeStore::from_nodes(vec![root.clone(), late, early, first]);
        let labels: Vec<&str> = store
            .children_of(Some(root.id))
            .iter()
            .map(|node| node.label.as_str())
            .collect();
        assert_eq!(labels, vec!["first", "early", "late"]);
    }

    #[test]
    fn ancestors_stop_on_cycle() {
        let tree = Uuid::new_v4();
        let mut a = Node::new(tree, NodeType::Branch, "a");
        let b = Node::new(tree, NodeType::Branch, "b").under(a.id, 0);
        a.parent_id = Some(b.id);

        let store = NodeStore::from_nodes(vec![a.clone(), b.clone()]);
        let ancestors = store.ancestors_of(a.id);
        assert_eq!(ancestors.len(), 1);
        assert_eq!(ancestors[0].id, b.id);
        assert!(store.is_descendant(a.id, b.id));
        assert!(store.is_descendant(b.id, a.id));
        assert!(store.hierarchy().is_empty());
    }

    #[test]
    fn orphans_are_promoted_in_hierarchy() {
        let tree = Uuid::new_v4();
        let root = Node::new(tree, NodeType::Branch, "root");
        let orphan = Node::new(tree, NodeType::LeafField, "orphan").under(Uuid::new_v4(), 0);

        let store = NodeStore::from_nodes(vec![root, orphan.clone()]);
        assert_eq!(store.orphans().len(), 1);
        let tops = store.hierarchy();
        assert_eq!(tops.len(), 2);
        assert_eq!(tops[1].node.id, orphan.id);
    }

    #[test]
    fn subtree_is_pre_order() {
        let tree = Uuid::new_v4();
        let root = Node::new(tree, NodeType::Branch, "root");
        let child = Node::new(tree, NodeType::Branch, "child").under(root.id, 0);
        let leaf = Node::new(tree, NodeType::LeafField, "leaf").under(child.id, 0);
        let sibling = Node::new(tree, NodeType::LeafField, "sibling").under(root.id, 1);

        let store = NodeStore::from_nodes(vec![
            leaf.clone(),
            sibling.clone(),
            child.clone(),
            root.clone(),
        ]);
        assert_eq!(
            store.subtree_ids(root.id),
            vec![root.id, child.id, leaf.id, sibling.id]
        );
        assert_eq!(store.sibling_index(sibling.id), Some(1));
        assert_eq!(store.into_nodes()[0].id, leaf.id);
    }
}
