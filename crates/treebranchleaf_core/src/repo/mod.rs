//! Repository contract consumed by the tree service, plus reference
//! implementations.
//!
//! # Responsibility
//! - Define the persistence operations the core depends on.
//! - Keep storage details (SQL, locking) behind the repository boundary.
//!
//! # Invariants
//! - Repositories own the authoritative sibling order and recompute it on
//!   every move.
//! - Listing returns nodes ordered by parent, then `order, created_at, id`.
//! - Deleting a node deletes its subtree.

use crate::db::DbError;
use crate::hierarchy::placement::MoveRequest;
use crate::hierarchy::reorder::ReorderError;
use crate::model::node::{NewNode, Node, NodeId, NodePatch};
use crate::model::tree::{NewTree, OrganizationId, Tree, TreeId, TreePatch};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory_repo;
pub mod sqlite_repo;

/// Result type used by repository operations.
pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    TreeNotFound(TreeId),
    NodeNotFound(NodeId),
    /// Create or move names a parent missing from the tree.
    ParentNotFound(NodeId),
    /// Move request cannot be applied.
    InvalidMove(ReorderError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::TreeNotFound(id) => write!(f, "tree not found: {id}"),
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent node not found: {id}"),
            Self::InvalidMove(err) => write!(f, "invalid move: {err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "node repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "node repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid tree data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidMove(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ReorderError> for RepoError {
    fn from(value: ReorderError) -> Self {
        match value {
            ReorderError::NodeNotFound(id) => Self::NodeNotFound(id),
            other => Self::InvalidMove(other),
        }
    }
}

/// Persistence operations for trees and their nodes.
pub trait NodeRepository {
    /// Lists trees owned by one organization, oldest first.
    fn list_trees(&self, organization_id: OrganizationId) -> RepoResult<Vec<Tree>>;
    fn create_tree(&self, new_tree: &NewTree) -> RepoResult<Tree>;
    fn update_tree(&self, tree_id: TreeId, patch: &TreePatch) -> RepoResult<Tree>;
    /// Deletes a tree with all its nodes.
    fn delete_tree(&self, tree_id: TreeId) -> RepoResult<()>;

    /// Lists every node of a tree as a flat list.
    fn list_nodes(&self, tree_id: TreeId) -> RepoResult<Vec<Node>>;
    /// Creates a node. Without an explicit order it becomes the parent's last
    /// child.
    fn create_node(&self, tree_id: TreeId, new_node: &NewNode) -> RepoResult<Node>;
    fn update_node(&self, tree_id: TreeId, node_id: NodeId, patch: &NodePatch) -> RepoResult<Node>;
    /// Moves a node relative to a sibling or under a new parent and
    /// renumbers the affected sibling lists.
    fn move_node(
        &self,
        tree_id: TreeId,
        node_id: NodeId,
        request: &MoveRequest,
    ) -> RepoResult<Node>;
    /// Deletes a node and its subtree.
    fn delete_node(&self, tree_id: TreeId, node_id: NodeId) -> RepoResult<()>;
}

impl<R: NodeRepository + ?Sized> NodeRepository for &R {
    fn list_trees(&self, organization_id: OrganizationId) -> RepoResult<Vec<Tree>> {
        (**self).list_trees(organization_id)
    }

    fn create_tree(&self, new_tree: &NewTree) -> RepoResult<Tree> {
        (**self).create_tree(new_tree)
    }

    fn update_tree(&self, tree_id: TreeId, patch: &TreePatch) -> RepoResult<Tree> {
        (**self).update_tree(tree_id, patch)
    }

    fn delete_tree(&self, tree_id: TreeId) -> RepoResult<()> {
        (**self).delete_tree(tree_id)
    }

    fn list_nodes(&self, tree_id: TreeId) -> RepoResult<Vec<Node>> {
        (**self).list_nodes(tree_id)
    }

    fn create_node(&self, tree_id: TreeId, new_node: &NewNode) -> RepoResult<Node> {
        (**self).create_node(tree_id, new_node)
    }

    fn update_node(&self, tree_id: TreeId, node_id: NodeId, patch: &NodePatch) -> RepoResult<Node> {
        (**self).update_node(tree_id, node_id, patch)
    }

    fn move_node(
        &self,
        tree_id: TreeId,
        node_id: NodeId,
        request: &MoveRequest,
    ) -> RepoResult<Node> {
        (**self).move_node(tree_id, node_id, request)
    }

    fn delete_node(&self, tree_id: TreeId, node_id: NodeId) -> RepoResult<()> {
        (**self).delete_node(tree_id, node_id)
    }
}
