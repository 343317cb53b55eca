//! Tree editing use-case service.
//!
//! # Responsibility
//! - Turn accepted drops into repository create/move calls.
//! - Validate labels and nesting above the repository layer.
//! - Toggle capabilities and persist condition sets.
//!
//! # Invariants
//! - Rejected placements never reach the repository.
//! - A palette drop before/after a sibling creates first and repositions
//!   second; a failed reposition keeps the created node and reports a
//!   warning instead of rolling back.
//! - Sibling order is always recomputed by the repository.

use crate::capability::{activation_patch, deactivation_patch, CapabilityKind};
use crate::condition::set::{ConditionConfig, ConditionSet};
use crate::hierarchy::placement::{plan_create, plan_move, DragItem, DropTarget, PlacementRejection};
use crate::hierarchy::rules::{can_nest, ParentKind};
use crate::hierarchy::store::NodeStore;
use crate::model::node::{NewNode, Node, NodeId, NodePatch, NodeType};
use crate::model::tree::{NewTree, OrganizationId, Tree, TreeId, TreePatch};
use crate::repo::{NodeRepository, RepoError};
use crate::service::session::{EditorSession, SessionError};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from tree service operations.
#[derive(Debug)]
pub enum TreeServiceError {
    /// Label or tree name is blank after trim.
    InvalidLabel,
    /// Drop or create refused by the placement rules.
    PlacementRejected(PlacementRejection),
    NodeNotFound(NodeId),
    TreeNotFound(TreeId),
    /// Session-scoped operation without an open tree.
    NoTreeSelected,
    /// Capability-scoped edit on a node where it is off.
    CapabilityInactive {
        node_id: NodeId,
        capability: CapabilityKind,
    },
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for TreeServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLabel => write!(f, "label must not be blank"),
            Self::PlacementRejected(rejection) => write!(f, "placement rejected: {rejection}"),
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::TreeNotFound(id) => write!(f, "tree not found: {id}"),
            Self::NoTreeSelected => write!(f, "no tree selected"),
            Self::CapabilityInactive {
                node_id,
                capability,
            } => write!(f, "capability `{capability}` is not active on node {node_id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TreeServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for TreeServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NodeNotFound(id) => Self::NodeNotFound(id),
            RepoError::TreeNotFound(id) => Self::TreeNotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<PlacementRejection> for TreeServiceError {
    fn from(value: PlacementRejection) -> Self {
        Self::PlacementRejected(value)
    }
}

impl From<SessionError> for TreeServiceError {
    fn from(value: SessionError) -> Self {
        match value {
            SessionError::NoTreeSelected => Self::NoTreeSelected,
            SessionError::NodeNotFound(id) => Self::NodeNotFound(id),
            SessionError::InvalidMove(err) => Self::Repo(RepoError::InvalidMove(err)),
        }
    }
}

/// Result of an accepted drop.
#[derive(Debug, Clone, PartialEq)]
pub enum DropOutcome {
    /// Palette drop created a node at the requested position.
    Created(Node),
    /// Node was created but the follow-up reposition failed; it stays the
    /// last child of its parent.
    CreatedWithWarning { node: Node, warning: String },
    Moved(Node),
}

impl DropOutcome {
    pub fn node(&self) -> &Node {
        match self {
            Self::Created(node) | Self::Moved(node) => node,
            Self::CreatedWithWarning { node, .. } => node,
        }
    }

    pub fn warning(&self) -> Option<&str> {
        match self {
            Self::CreatedWithWarning { warning, .. } => Some(warning),
            _ => None,
        }
    }
}

/// Tree editing service facade.
pub struct TreeService<R: NodeRepository> {
    repo: R,
}

impl<R: NodeRepository> TreeService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn list_trees(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Tree>, TreeServiceError> {
        self.repo.list_trees(organization_id).map_err(Into::into)
    }

    pub fn create_tree(
        &self,
        organization_id: OrganizationId,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Result<Tree, TreeServiceError> {
        let name = normalize_label(name.into())?;
        self.repo
            .create_tree(&NewTree {
                organization_id,
                name,
                description,
            })
            .map_err(Into::into)
    }

    pub fn update_tree(&self, tree_id: TreeId, patch: TreePatch) -> Result<Tree, TreeServiceError> {
        let mut patch = patch;
        if let Some(name) = patch.name.take() {
            patch.name = Some(normalize_label(name)?);
        }
        self.repo.update_tree(tree_id, &patch).map_err(Into::into)
    }

    pub fn delete_tree(&self, tree_id: TreeId) -> Result<(), TreeServiceError> {
        self.repo.delete_tree(tree_id).map_err(Into::into)
    }

    pub fn list_nodes(&self, tree_id: TreeId) -> Result<Vec<Node>, TreeServiceError> {
        self.repo.list_nodes(tree_id).map_err(Into::into)
    }

    /// Fresh store snapshot of one tree.
    pub fn load_store(&self, tree_id: TreeId) -> Result<NodeStore, TreeServiceError> {
        Ok(NodeStore::from_nodes(self.repo.list_nodes(tree_id)?))
    }

    /// Creates one node after checking its label and nesting.
    pub fn create_node(
        &self,
        tree_id: TreeId,
        new_node: NewNode,
    ) -> Result<Node, TreeServiceError> {
        let mut new_node = new_node;
        new_node.label = normalize_label(new_node.label)?;

        let store = self.load_store(tree_id)?;
        let parent_kind = match new_node.parent_id {
            None => ParentKind::Root,
            Some(parent_id) => {
                let parent = store
                    .get(parent_id)
                    .ok_or(TreeServiceError::NodeNotFound(parent_id))?;
                ParentKind::Node(parent.kind)
            }
        };
        if !can_nest(new_node.kind, parent_kind) {
            return Err(PlacementRejection::HierarchyViolation {
                child: new_node.kind,
                parent: parent_kind,
            }
            .into());
        }

        let node = self.repo.create_node(tree_id, &new_node)?;
        info!(
            "event=node_create module=tree_service status=ok node_id={} type={}",
            node.id, node.kind
        );
        Ok(node)
    }

    pub fn rename_node(
        &self,
        tree_id: TreeId,
        node_id: NodeId,
        label: impl Into<String>,
    ) -> Result<Node, TreeServiceError> {
        let label = normalize_label(label.into())?;
        self.repo
            .update_node(tree_id, node_id, &NodePatch::label(label))
            .map_err(Into::into)
    }

    /// Applies a partial update. A present label is normalized first.
    pub fn update_node(
        &self,
        tree_id: TreeId,
        node_id: NodeId,
        patch: NodePatch,
    ) -> Result<Node, TreeServiceError> {
        let mut patch = patch;
        if let Some(label) = patch.label.take() {
            patch.label = Some(normalize_label(label)?);
        }
        self.repo
            .update_node(tree_id, node_id, &patch)
            .map_err(Into::into)
    }

    /// Deletes a node with its subtree.
    pub fn delete_node(&self, tree_id: TreeId, node_id: NodeId) -> Result<(), TreeServiceError> {
        self.repo.delete_node(tree_id, node_id)?;
        info!("event=node_delete module=tree_service status=ok node_id={node_id}");
        Ok(())
    }

    /// Creates a palette item at `target`, validated against `store`.
    pub fn drop_palette(
        &self,
        tree_id: TreeId,
        store: &NodeStore,
        node_type: NodeType,
        target: &DropTarget,
    ) -> Result<DropOutcome, TreeServiceError> {
        let plan = plan_create(node_type, target, store)
            .map_err(|rejection| rejected("palette", &rejection))?;

        let created = self.repo.create_node(tree_id, &plan.new_node)?;
        let request = match plan.reposition {
            Some(request) => request,
            None => return Ok(DropOutcome::Created(created)),
        };

        match self.repo.move_node(tree_id, created.id, &request) {
            Ok(node) => Ok(DropOutcome::Created(node)),
            Err(err) => {
                warn!(
                    "event=drop_reposition module=tree_service status=error node_id={} error={}",
                    created.id, err
                );
                Ok(DropOutcome::CreatedWithWarning {
                    node: created,
                    warning: format!("node created but could not be positioned: {err}"),
                })
            }
        }
    }

    /// Moves an existing node to `target`, validated against `store`.
    pub fn drop_existing(
        &self,
        tree_id: TreeId,
        store: &NodeStore,
        node_id: NodeId,
        target: &DropTarget,
    ) -> Result<DropOutcome, TreeServiceError> {
        let plan =
            plan_move(node_id, target, store).map_err(|rejection| rejected("node", &rejection))?;
        let node = self.repo.move_node(tree_id, node_id, &plan.request())?;
        info!(
            "event=node_move module=tree_service status=ok node_id={} position={}",
            node_id,
            plan.position.as_str()
        );
        Ok(DropOutcome::Moved(node))
    }

    /// Applies a drop on the session's tree and refreshes its snapshot.
    pub fn apply_drop(
        &self,
        session: &mut EditorSession,
        item: &DragItem,
        target: &DropTarget,
    ) -> Result<DropOutcome, TreeServiceError> {
        let tree_id = session.require_tree()?;
        let outcome = match item {
            DragItem::Palette { node_type } => {
                self.drop_palette(tree_id, session.store(), *node_type, target)?
            }
            DragItem::Existing { id, .. } => {
                self.drop_existing(tree_id, session.store(), *id, target)?
            }
        };
        self.refresh_session(session)?;
        Ok(outcome)
    }

    /// Reloads the session snapshot from the repository.
    pub fn refresh_session(&self, session: &mut EditorSession) -> Result<(), TreeServiceError> {
        let tree_id = session.require_tree()?;
        session.replace_nodes(self.repo.list_nodes(tree_id)?);
        Ok(())
    }

    /// Turns one capability on or off, resetting its configuration.
    pub fn set_capability(
        &self,
        tree_id: TreeId,
        node_id: NodeId,
        capability: CapabilityKind,
        active: bool,
    ) -> Result<Node, TreeServiceError> {
        let patch = if active {
            activation_patch(node_id, capability)
        } else {
            deactivation_patch(capability)
        };
        let node = self.repo.update_node(tree_id, node_id, &patch)?;
        info!(
            "event=capability_toggle module=tree_service status=ok node_id={} capability={} active={}",
            node_id, capability, active
        );
        Ok(node)
    }

    /// Persists an edited condition set. Token references are recollected
    /// before saving.
    pub fn save_condition_set(
        &self,
        tree_id: TreeId,
        node_id: NodeId,
        condition_set: ConditionSet,
    ) -> Result<Node, TreeServiceError> {
        let store = self.load_store(tree_id)?;
        let node = store
            .get(node_id)
            .ok_or(TreeServiceError::NodeNotFound(node_id))?;
        if !node.has_capability(CapabilityKind::Condition) {
            return Err(TreeServiceError::CapabilityInactive {
                node_id,
                capability: CapabilityKind::Condition,
            });
        }

        let mut condition_set = condition_set;
        condition_set.refresh_tokens();
        let patch = NodePatch {
            condition_config: Some(ConditionConfig::Set(condition_set)),
            ..NodePatch::default()
        };
        self.repo
            .update_node(tree_id, node_id, &patch)
            .map_err(Into::into)
    }
}

fn rejected(source: &str, rejection: &PlacementRejection) -> TreeServiceError {
    debug!(
        "event=drop_rejected module=tree_service status=rejected source={} reason={}",
        source, rejection
    );
    TreeServiceError::PlacementRejected(rejection.clone())
}

fn normalize_label(value: String) -> Result<String, TreeServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TreeServiceError::InvalidLabel);
    }
    Ok(trimmed.to_string())
}
