//! Editor session state for the tree currently open in the editor.
//!
//! # Responsibility
//! - Hold the selected tree, its node snapshot and the selected node.
//! - Apply edits optimistically and track which nodes await confirmation.
//! - Merge authoritative responses, dropping the ones that arrive late.
//!
//! # Invariants
//! - Every optimistic edit bumps a session-wide revision; only the latest
//!   revision for a node may reconcile it.
//! - The selected node is resolved by id against the current snapshot, so it
//!   never outlives a refresh that removed it.
//! - Replacing the snapshot clears every pending flag.

use crate::hierarchy::placement::MoveRequest;
use crate::hierarchy::reorder::{apply_move, ReorderError};
use crate::hierarchy::store::NodeStore;
use crate::model::node::{Node, NodeId, NodePatch};
use crate::model::now_epoch_ms;
use crate::model::tree::TreeId;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Pending marker for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingEdit {
    pub revision: u64,
}

/// Handle returned by an optimistic edit, presented again on reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTicket {
    pub node_id: NodeId,
    pub revision: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Authoritative node merged into the snapshot.
    Applied,
    /// A newer edit superseded the ticket; the response was dropped.
    Stale,
}

/// Errors from session operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    NoTreeSelected,
    NodeNotFound(NodeId),
    InvalidMove(ReorderError),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoTreeSelected => write!(f, "no tree selected"),
            Self::NodeNotFound(id) => write!(f, "node not found in session: {id}"),
            Self::InvalidMove(err) => write!(f, "invalid move: {err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidMove(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ReorderError> for SessionError {
    fn from(value: ReorderError) -> Self {
        match value {
            ReorderError::NodeNotFound(id) => Self::NodeNotFound(id),
            other => Self::InvalidMove(other),
        }
    }
}

/// Snapshot and pending-edit bookkeeping for one open tree.
#[derive(Debug, Default)]
pub struct EditorSession {
    tree_id: Option<TreeId>,
    store: NodeStore,
    selected_node_id: Option<NodeId>,
    pending: HashMap<NodeId, PendingEdit>,
    last_revision: u64,
}

impl EditorSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `tree_id` with a fresh snapshot. Selection and pending edits of
    /// the previous tree are discarded.
    pub fn select_tree(&mut self, tree_id: TreeId, nodes: Vec<Node>) {
        self.tree_id = Some(tree_id);
        self.selected_node_id = None;
        self.replace_nodes(nodes);
    }

    pub fn tree_id(&self) -> Option<TreeId> {
        self.tree_id
    }

    /// Selected tree, or `NoTreeSelected`.
    pub fn require_tree(&self) -> Result<TreeId, SessionError> {
        self.tree_id.ok_or(SessionError::NoTreeSelected)
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    /// Replaces the snapshot wholesale and clears pending flags.
    pub fn replace_nodes(&mut self, nodes: Vec<Node>) {
        self.store = NodeStore::from_nodes(nodes);
        self.pending.clear();
        self.resync_selection();
    }

    pub fn select_node(&mut self, node_id: NodeId) -> Result<&Node, SessionError> {
        let node = self
            .store
            .get(node_id)
            .ok_or(SessionError::NodeNotFound(node_id))?;
        self.selected_node_id = Some(node_id);
        Ok(node)
    }

    pub fn clear_selection(&mut self) {
        self.selected_node_id = None;
    }

    /// Current record of the selected node.
    pub fn selected_node(&self) -> Option<&Node> {
        self.selected_node_id.and_then(|id| self.store.get(id))
    }

    pub fn is_pending(&self, node_id: NodeId) -> bool {
        self.pending.contains_key(&node_id)
    }

    pub fn pending_edit(&self, node_id: NodeId) -> Option<PendingEdit> {
        self.pending.get(&node_id).copied()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Applies `patch` to the local snapshot and marks the node pending.
    pub fn apply_optimistic(
        &mut self,
        node_id: NodeId,
        patch: &NodePatch,
    ) -> Result<PendingTicket, SessionError> {
        self.require_tree()?;
        if !self.store.contains(node_id) {
            return Err(SessionError::NodeNotFound(node_id));
        }

        let now = now_epoch_ms();
        let mut nodes = std::mem::take(&mut self.store).into_nodes();
        if let Some(node) = nodes.iter_mut().find(|node| node.id == node_id) {
            patch.apply_to(node);
            node.updated_at = now;
        }
        self.store = NodeStore::from_nodes(nodes);
        Ok(self.mark_pending(node_id))
    }

    /// Applies a relative move to the local snapshot and marks the node
    /// pending. The snapshot is left unchanged when the move is invalid.
    pub fn apply_optimistic_move(
        &mut self,
        node_id: NodeId,
        request: &MoveRequest,
    ) -> Result<PendingTicket, SessionError> {
        self.require_tree()?;

        let mut nodes = std::mem::take(&mut self.store).into_nodes();
        let moved = apply_move(&mut nodes, node_id, request, now_epoch_ms());
        self.store = NodeStore::from_nodes(nodes);
        moved?;
        Ok(self.mark_pending(node_id))
    }

    /// Merges the authoritative `node` for `ticket` when the ticket is still
    /// the latest edit of that node.
    pub fn reconcile(&mut self, ticket: PendingTicket, node: Node) -> ReconcileOutcome {
        if node.id != ticket.node_id || !self.is_latest(ticket) {
            return ReconcileOutcome::Stale;
        }
        self.pending.remove(&ticket.node_id);

        let mut nodes = std::mem::take(&mut self.store).into_nodes();
        match nodes.iter_mut().find(|existing| existing.id == node.id) {
            Some(existing) => *existing = node,
            None => nodes.push(node),
        }
        self.store = NodeStore::from_nodes(nodes);
        self.resync_selection();
        ReconcileOutcome::Applied
    }

    /// Drops the pending flag of a failed edit. Returns `false` when a newer
    /// edit already superseded `ticket`.
    ///
    /// The optimistic change stays in the snapshot; callers reload through
    /// [`EditorSession::replace_nodes`].
    pub fn abandon(&mut self, ticket: PendingTicket) -> bool {
        if !self.is_latest(ticket) {
            return false;
        }
        self.pending.remove(&ticket.node_id);
        true
    }

    fn is_latest(&self, ticket: PendingTicket) -> bool {
        self.pending
            .get(&ticket.node_id)
            .is_some_and(|pending| pending.revision == ticket.revision)
    }

    fn mark_pending(&mut self, node_id: NodeId) -> PendingTicket {
        self.last_revision += 1;
        let revision = self.last_revision;
        self.pending.insert(node_id, PendingEdit { revision });
        PendingTicket { node_id, revision }
    }

    fn resync_selection(&mut self) {
        if let Some(id) = self.selected_node_id {
            if !self.store.contains(id) {
                self.selected_node_id = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EditorSession, ReconcileOutcome, SessionError};
    use crate::hierarchy::placement::MoveRequest;
    use crate::model::node::{Node, NodePatch, NodeType};
    use uuid::Uuid;

    fn open_session() -> (EditorSession, Node, Node) {
        let tree = Uuid::new_v4();
        let branch = Node::new(tree, NodeType::Branch, "B");
        let leaf = Node::new(tree, NodeType::LeafField, "L").under(branch.id, 0);
        let mut session = EditorSession::new();
        session.select_tree(tree, vec![branch.clone(), leaf.clone()]);
        (session, branch, leaf)
    }

    #[test]
    fn edits_require_a_selected_tree() {
        let mut session = EditorSession::new();
        let err = session
            .apply_optimistic(Uuid::new_v4(), &NodePatch::label("x"))
            .unwrap_err();
        assert_eq!(err, SessionError::NoTreeSelected);
    }

    #[test]
    fn optimistic_edit_is_visible_and_pending() {
        let (mut session, _, leaf) = open_session();
        let ticket = session
            .apply_optimistic(leaf.id, &NodePatch::label("Renamed"))
            .unwrap();
        assert!(session.is_pending(leaf.id));
        assert_eq!(session.store().get(leaf.id).unwrap().label, "Renamed");

        let mut confirmed = leaf.clone();
        confirmed.label = "Renamed".to_string();
        assert_eq!(session.reconcile(ticket, confirmed), ReconcileOutcome::Applied);
        assert!(!session.is_pending(leaf.id));
    }

    #[test]
    fn invalid_optimistic_move_keeps_snapshot() {
        let (mut session, branch, leaf) = open_session();
        let err = session
            .apply_optimistic_move(branch.id, &MoveRequest::child_of(Some(leaf.id)))
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidMove(_)));
        assert_eq!(session.store().len(), 2);
        assert_eq!(session.store().get(leaf.id).unwrap().parent_id, Some(branch.id));
        assert_eq!(session.pending_count(), 0);
    }

    #[test]
    fn selection_is_dropped_when_node_disappears() {
        let (mut session, branch, leaf) = open_session();
        session.select_node(leaf.id).unwrap();
        session.replace_nodes(vec![branch]);
        assert!(session.selected_node().is_none());
    }
}
