//! In-memory node repository.
//!
//! Keeps trees and nodes in process memory with the same ordering and move
//! semantics as the SQLite repository. Used by tests and by embedders that
//! persist elsewhere.

use crate::hierarchy::placement::MoveRequest;
use crate::hierarchy::reorder::{apply_move, next_child_order};
use crate::hierarchy::store::NodeStore;
use crate::model::node::{NewNode, Node, NodeId, NodePatch};
use crate::model::now_epoch_ms;
use crate::model::tree::{NewTree, OrganizationId, Tree, TreeId, TreePatch};
use crate::repo::{NodeRepository, RepoError, RepoResult};
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct MemoryState {
    trees: Vec<Tree>,
    nodes: HashMap<TreeId, Vec<Node>>,
}

impl MemoryState {
    fn tree_nodes_mut(&mut self, tree_id: TreeId) -> RepoResult<&mut Vec<Node>> {
        self.nodes
            .get_mut(&tree_id)
            .ok_or(RepoError::TreeNotFound(tree_id))
    }
}

/// Process-local repository backed by plain collections.
#[derive(Debug, Default)]
pub struct MemoryNodeRepository {
    state: RefCell<MemoryState>,
}

impl MemoryNodeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts prebuilt records as-is, creating the tree entry when needed.
    ///
    /// Used to load fixtures, including corrupt ones, without validation.
    pub fn seed(&self, tree: Tree, nodes: Vec<Node>) {
        let mut state = self.state.borrow_mut();
        let tree_id = tree.id;
        state.trees.retain(|existing| existing.id != tree_id);
        state.trees.push(tree);
        state.nodes.insert(tree_id, nodes);
    }
}

fn sort_listing(nodes: &mut [Node]) {
    nodes.sort_by_key(|node| (node.parent_id, node.order, node.created_at, node.id));
}

impl NodeRepository for MemoryNodeRepository {
    fn list_trees(&self, organization_id: OrganizationId) -> RepoResult<Vec<Tree>> {
        let state = self.state.borrow();
        let mut trees: Vec<Tree> = state
            .trees
            .iter()
            .filter(|tree| tree.organization_id == organization_id)
            .cloned()
            .collect();
        trees.sort_by_key(|tree| (tree.created_at, tree.id));
        Ok(trees)
    }

    fn create_tree(&self, new_tree: &NewTree) -> RepoResult<Tree> {
        let mut tree = Tree::new(new_tree.organization_id, new_tree.name.clone());
        tree.description = new_tree.description.clone();

        let mut state = self.state.borrow_mut();
        state.nodes.insert(tree.id, Vec::new());
        state.trees.push(tree.clone());
        Ok(tree)
    }

    fn update_tree(&self, tree_id: TreeId, patch: &TreePatch) -> RepoResult<Tree> {
        let mut state = self.state.borrow_mut();
        let tree = state
            .trees
            .iter_mut()
            .find(|tree| tree.id == tree_id)
            .ok_or(RepoError::TreeNotFound(tree_id))?;
        patch.apply_to(tree);
        tree.updated_at = now_epoch_ms();
        Ok(tree.clone())
    }

    fn delete_tree(&self, tree_id: TreeId) -> RepoResult<()> {
        let mut state = self.state.borrow_mut();
        let before = state.trees.len();
        state.trees.retain(|tree| tree.id != tree_id);
        if state.trees.len() == before {
            return Err(RepoError::TreeNotFound(tree_id));
        }
        state.nodes.remove(&tree_id);
        Ok(())
    }

    fn list_nodes(&self, tree_id: TreeId) -> RepoResult<Vec<Node>> {
        let state = self.state.borrow();
        let mut nodes = state
            .nodes
            .get(&tree_id)
            .cloned()
            .ok_or(RepoError::TreeNotFound(tree_id))?;
        sort_listing(&mut nodes);
        Ok(nodes)
    }

    fn create_node(&self, tree_id: TreeId, new_node: &NewNode) -> RepoResult<Node> {
        let mut state = self.state.borrow_mut();
        let nodes = state.tree_nodes_mut(tree_id)?;
        if let Some(parent_id) = new_node.parent_id {
            if !nodes.iter().any(|node| node.id == parent_id) {
                return Err(RepoError::ParentNotFound(parent_id));
            }
        }

        let mut node = Node::new(tree_id, new_node.kind, new_node.label.clone());
        node.parent_id = new_node.parent_id;
        node.sub_type = new_node.sub_type;
        node.order = new_node
            .order
            .unwrap_or_else(|| next_child_order(nodes, new_node.parent_id));
        nodes.push(node.clone());
        Ok(node)
    }

    fn update_node(&self, tree_id: TreeId, node_id: NodeId, patch: &NodePatch) -> RepoResult<Node> {
        let mut state = self.state.borrow_mut();
        let node = state
            .tree_nodes_mut(tree_id)?
            .iter_mut()
            .find(|node| node.id == node_id)
            .ok_or(RepoError::NodeNotFound(node_id))?;
        patch.apply_to(node);
        node.updated_at = now_epoch_ms();
        Ok(node.clone())
    }

    fn move_node(
        &self,
        tree_id: TreeId,
        node_id: NodeId,
        request: &MoveRequest,
    ) -> RepoResult<Node> {
        let mut state = self.state.borrow_mut();
        let nodes = state.tree_nodes_mut(tree_id)?;
        apply_move(nodes, node_id, request, now_epoch_ms())?;
        nodes
            .iter()
            .find(|node| node.id == node_id)
            .cloned()
            .ok_or(RepoError::NodeNotFound(node_id))
    }

    fn delete_node(&self, tree_id: TreeId, node_id: NodeId) -> RepoResult<()> {
        let mut state = self.state.borrow_mut();
        let nodes = state.tree_nodes_mut(tree_id)?;
        if !nodes.iter().any(|node| node.id == node_id) {
            return Err(RepoError::NodeNotFound(node_id));
        }
        let doomed = NodeStore::from_nodes(nodes.iter().cloned()).subtree_ids(node_id);
        nodes.retain(|node| !doomed.contains(&node.id));
        Ok(())
    }
}
