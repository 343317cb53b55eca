//! Drag-and-drop placement validation and drop planning.
//!
//! # Responsibility
//! - Decide whether a dragged item may be dropped on a target.
//! - Resolve the effective parent implied by a drop position.
//! - Translate an accepted drop into the create/move payloads sent to the
//!   repository.
//!
//! # Invariants
//! - Validation never errors; rejection is a normal outcome.
//! - A node is never attached under itself or one of its descendants.
//! - `before`/`after` attach under the sibling's parent.
//! - Unknown targets resolve to the root.

use crate::hierarchy::rules::{can_nest, ParentKind};
use crate::hierarchy::store::NodeStore;
use crate::model::node::{NewNode, NodeId, NodeType};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Where a drag started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragSource {
    /// Fresh template from the palette.
    Palette,
    /// Node already in the tree.
    Node,
}

/// Item being dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum DragItem {
    Palette {
        #[serde(rename = "nodeType")]
        node_type: NodeType,
    },
    #[serde(rename = "node")]
    Existing {
        id: NodeId,
        #[serde(rename = "nodeType")]
        node_type: NodeType,
    },
}

impl DragItem {
    pub fn palette(node_type: NodeType) -> Self {
        Self::Palette { node_type }
    }

    pub fn existing(id: NodeId, node_type: NodeType) -> Self {
        Self::Existing { id, node_type }
    }

    pub fn source(&self) -> DragSource {
        match self {
            Self::Palette { .. } => DragSource::Palette,
            Self::Existing { .. } => DragSource::Node,
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Palette { node_type } | Self::Existing { node_type, .. } => *node_type,
        }
    }

    pub fn existing_id(&self) -> Option<NodeId> {
        match self {
            Self::Existing { id, .. } => Some(*id),
            Self::Palette { .. } => None,
        }
    }
}

/// Drop position relative to the target node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPosition {
    Before,
    After,
    Child,
}

impl DropPosition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
            Self::Child => "child",
        }
    }
}

/// Kind of drop zone. Parameter zones receive capability references and
/// never take structural drops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropZone {
    #[default]
    Structure,
    Parameter,
}

/// Drop target descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropTarget {
    /// `None` is the root / empty canvas.
    #[serde(default)]
    pub node_id: Option<NodeId>,
    pub position: DropPosition,
    pub accepts: Vec<DragSource>,
    #[serde(default)]
    pub zone: DropZone,
}

impl DropTarget {
    /// Structural target accepting palette and node drags.
    pub fn structure(node_id: Option<NodeId>, position: DropPosition) -> Self {
        Self {
            node_id,
            position,
            accepts: vec![DragSource::Palette, DragSource::Node],
            zone: DropZone::Structure,
        }
    }

    pub fn child_of(node_id: NodeId) -> Self {
        Self::structure(Some(node_id), DropPosition::Child)
    }

    pub fn before(node_id: NodeId) -> Self {
        Self::structure(Some(node_id), DropPosition::Before)
    }

    pub fn after(node_id: NodeId) -> Self {
        Self::structure(Some(node_id), DropPosition::After)
    }

    /// Empty canvas.
    pub fn root() -> Self {
        Self::structure(None, DropPosition::Child)
    }

    pub fn parameter(node_id: NodeId) -> Self {
        Self {
            node_id: Some(node_id),
            position: DropPosition::Child,
            accepts: vec![DragSource::Node],
            zone: DropZone::Parameter,
        }
    }
}

/// Reason a placement is refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum PlacementRejection {
    /// Target zone does not take structural drops.
    ZoneRejected,
    SourceNotAccepted { source: DragSource },
    SelfDrop,
    WouldCreateCycle {
        #[serde(rename = "nodeId")]
        node_id: NodeId,
        #[serde(rename = "parentId")]
        parent_id: NodeId,
    },
    HierarchyViolation { child: NodeType, parent: ParentKind },
    /// Dragged node id is not in the store.
    UnknownSource { id: NodeId },
}

impl Display for PlacementRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZoneRejected => write!(f, "drop zone does not accept structural drops"),
            Self::SourceNotAccepted { source } => {
                write!(f, "drop target does not accept {source:?} drags")
            }
            Self::SelfDrop => write!(f, "node cannot be dropped onto itself"),
            Self::WouldCreateCycle { node_id, parent_id } => write!(
                f,
                "move would create cycle: node {node_id} under parent {parent_id}"
            ),
            Self::HierarchyViolation { child, parent } => {
                write!(f, "{child} cannot be placed under {parent}")
            }
            Self::UnknownSource { id } => write!(f, "dragged node not found: {id}"),
        }
    }
}

/// Validation outcome with the resolved parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "camelCase")]
pub enum PlacementVerdict {
    Allowed {
        #[serde(rename = "parentId")]
        parent_id: Option<NodeId>,
    },
    Rejected {
        rejection: PlacementRejection,
    },
}

impl PlacementVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }

    pub fn rejection(&self) -> Option<&PlacementRejection> {
        match self {
            Self::Rejected { rejection } => Some(rejection),
            Self::Allowed { .. } => None,
        }
    }
}

impl From<PlacementRejection> for PlacementVerdict {
    fn from(rejection: PlacementRejection) -> Self {
        Self::Rejected { rejection }
    }
}

/// Parent a drop on `target` attaches to.
///
/// `child` uses the target itself, `before`/`after` use the target's parent.
/// Unknown targets and parents missing from the store resolve to the root.
pub fn effective_parent(target: &DropTarget, store: &NodeStore) -> Option<NodeId> {
    let target_node = target.node_id.and_then(|id| store.get(id))?;
    let parent = match target.position {
        DropPosition::Child => Some(target_node.id),
        DropPosition::Before | DropPosition::After => target_node.parent_id,
    };
    parent.filter(|id| store.contains(*id))
}

/// Full validation with the reason for a refusal.
pub fn explain(item: &DragItem, target: &DropTarget, store: &NodeStore) -> PlacementVerdict {
    if target.zone != DropZone::Structure {
        return PlacementRejection::ZoneRejected.into();
    }
    let source = item.source();
    if !target.accepts.contains(&source) {
        return PlacementRejection::SourceNotAccepted { source }.into();
    }

    if let Some(source_id) = item.existing_id() {
        if target.node_id == Some(source_id) {
            return PlacementRejection::SelfDrop.into();
        }
    }

    let parent_id = effective_parent(target, store);

    if let (Some(source_id), Some(parent)) = (item.existing_id(), parent_id) {
        if parent == source_id || store.is_descendant(source_id, parent) {
            return PlacementRejection::WouldCreateCycle {
                node_id: source_id,
                parent_id: parent,
            }
            .into();
        }
    }

    let parent_kind =
        ParentKind::from(parent_id.and_then(|id| store.get(id)).map(|node| node.kind));
    let child = item.node_type();
    if !can_nest(child, parent_kind) {
        return PlacementRejection::HierarchyViolation {
            child,
            parent: parent_kind,
        }
        .into();
    }

    PlacementVerdict::Allowed { parent_id }
}

/// Whether the drop is legal.
pub fn validate(item: &DragItem, target: &DropTarget, store: &NodeStore) -> bool {
    explain(item, target, store).is_allowed()
}

/// User-facing hint shown while hovering a target.
pub fn drop_feedback(item: &DragItem, target: &DropTarget, store: &NodeStore) -> String {
    let parent_id = match explain(item, target, store) {
        PlacementVerdict::Allowed { parent_id } => parent_id,
        PlacementVerdict::Rejected { rejection } => return format!("Cannot drop here: {rejection}"),
    };

    let subject = match item {
        DragItem::Palette { node_type } => format!("Create {}", node_type.label()),
        DragItem::Existing { id, node_type } => match store.get(*id) {
            Some(node) => format!("Move \"{}\"", node.label),
            None => format!("Move {}", node_type.label()),
        },
    };

    let label_of = |id: Option<NodeId>| {
        id.and_then(|id| store.get(id))
            .map(|node| format!("\"{}\"", node.label))
    };

    match (target.position, label_of(target.node_id)) {
        (DropPosition::Before, Some(sibling)) => format!("{subject} before {sibling}"),
        (DropPosition::After, Some(sibling)) => format!("{subject} after {sibling}"),
        _ => match label_of(parent_id) {
            Some(parent) => format!("{subject} inside {parent}"),
            None => format!("{subject} at the root"),
        },
    }
}

/// Relative move request understood by repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    /// Sibling for `before`/`after`, new parent for `child` (`None` = root).
    #[serde(default)]
    pub target_id: Option<NodeId>,
    pub position: DropPosition,
}

impl MoveRequest {
    pub fn child_of(parent_id: Option<NodeId>) -> Self {
        Self {
            target_id: parent_id,
            position: DropPosition::Child,
        }
    }

    pub fn before(sibling_id: NodeId) -> Self {
        Self {
            target_id: Some(sibling_id),
            position: DropPosition::Before,
        }
    }

    pub fn after(sibling_id: NodeId) -> Self {
        Self {
            target_id: Some(sibling_id),
            position: DropPosition::After,
        }
    }
}

/// Move payload for an accepted drop of an existing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePlan {
    pub node_id: NodeId,
    pub parent_id: Option<NodeId>,
    pub position: DropPosition,
    pub target_id: Option<NodeId>,
}

impl MovePlan {
    pub fn request(&self) -> MoveRequest {
        MoveRequest {
            target_id: self.target_id,
            position: self.position,
        }
    }
}

/// Translates a drop of existing node `source_id` into a move payload.
///
/// No order arithmetic happens here; repositories recompute sibling order.
/// Drops on unknown targets become "append at root".
pub fn plan_move(
    source_id: NodeId,
    target: &DropTarget,
    store: &NodeStore,
) -> Result<MovePlan, PlacementRejection> {
    let source = store
        .get(source_id)
        .ok_or(PlacementRejection::UnknownSource { id: source_id })?;
    let item = DragItem::existing(source_id, source.kind);

    let parent_id = match explain(&item, target, store) {
        PlacementVerdict::Allowed { parent_id } => parent_id,
        PlacementVerdict::Rejected { rejection } => return Err(rejection),
    };

    let known_target = target.node_id.filter(|id| store.contains(*id));
    let (position, target_id) = match (target.position, known_target) {
        (DropPosition::Child, _) | (_, None) => (DropPosition::Child, parent_id),
        (position, Some(sibling)) => (position, Some(sibling)),
    };

    Ok(MovePlan {
        node_id: source_id,
        parent_id,
        position,
        target_id,
    })
}

/// Create payload for an accepted palette drop, plus the follow-up move
/// that positions the new node next to a sibling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatePlan {
    pub new_node: NewNode,
    /// Present for `before`/`after` drops on a known sibling.
    pub reposition: Option<MoveRequest>,
}

/// Default label of a node created from the palette.
pub fn default_label(node_type: NodeType) -> String {
    match node_type {
        NodeType::LeafField => node_type.label().to_string(),
        other => format!("New {}", other.label()),
    }
}

/// Translates a palette drop into a create payload and optional reposition.
pub fn plan_create(
    node_type: NodeType,
    target: &DropTarget,
    store: &NodeStore,
) -> Result<CreatePlan, PlacementRejection> {
    let item = DragItem::palette(node_type);
    let parent_id = match explain(&item, target, store) {
        PlacementVerdict::Allowed { parent_id } => parent_id,
        PlacementVerdict::Rejected { rejection } => return Err(rejection),
    };

    let reposition = match (target.position, target.node_id.filter(|id| store.contains(*id))) {
        (DropPosition::Before, Some(sibling)) => Some(MoveRequest::before(sibling)),
        (DropPosition::After, Some(sibling)) => Some(MoveRequest::after(sibling)),
        _ => None,
    };

    Ok(CreatePlan {
        new_node: NewNode::new(node_type, default_label(node_type), parent_id),
        reposition,
    })
}
