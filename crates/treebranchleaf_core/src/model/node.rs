//! Form node domain model.
//!
//! # Responsibility
//! - Define the closed node taxonomy (branch, section, leaf kinds).
//! - Carry presentation metadata, capability flags and capability-scoped
//!   configuration blobs for one node.
//! - Describe create and partial-update payloads sent to a repository.
//!
//! # Invariants
//! - `parent_id == None` means the node sits at the tree root.
//! - Sibling sequence is `order ASC, created_at ASC, id ASC`.
//! - A capability flag that is off always pairs with an empty configuration.

use crate::capability::CapabilityKind;
use crate::condition::set::{ConditionConfig, ConditionSet};
use crate::model::now_epoch_ms;
use crate::model::tree::TreeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable node identifier.
pub type NodeId = Uuid;

/// Free-form capability configuration (formula, table, api, link).
pub type ConfigBlob = serde_json::Map<String, serde_json::Value>;

/// Closed set of node kinds. Governs legal nesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Structural container.
    Branch,
    /// Calculator grouping whose leaf children are display-only.
    Section,
    /// Selectable choice.
    LeafOption,
    /// Choice that also opens an input.
    LeafOptionField,
    /// Plain input field.
    LeafField,
}

impl NodeType {
    pub const ALL: [NodeType; 5] = [
        NodeType::Branch,
        NodeType::Section,
        NodeType::LeafOption,
        NodeType::LeafOptionField,
        NodeType::LeafField,
    ];

    /// Stable wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Branch => "branch",
            Self::Section => "section",
            Self::LeafOption => "leaf_option",
            Self::LeafOptionField => "leaf_option_field",
            Self::LeafField => "leaf_field",
        }
    }

    /// Parses one wire name. Unknown names yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value.trim())
    }

    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            Self::LeafOption | Self::LeafOptionField | Self::LeafField
        )
    }

    /// Palette label shown to editors.
    pub fn label(self) -> &'static str {
        match self {
            Self::Branch => "Branch",
            Self::Section => "Section",
            Self::LeafOption => "Option",
            Self::LeafOptionField => "Option + field",
            Self::LeafField => "Field",
        }
    }
}

impl Display for NodeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field kind refinement for leaf nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldSubType {
    Text,
    Number,
    #[serde(rename = "BOOL")]
    Boolean,
    Select,
    MultiSelect,
    Date,
    Image,
    File,
    Email,
    Tel,
    Textarea,
}

impl FieldSubType {
    pub const ALL: [FieldSubType; 11] = [
        FieldSubType::Text,
        FieldSubType::Number,
        FieldSubType::Boolean,
        FieldSubType::Select,
        FieldSubType::MultiSelect,
        FieldSubType::Date,
        FieldSubType::Image,
        FieldSubType::File,
        FieldSubType::Email,
        FieldSubType::Tel,
        FieldSubType::Textarea,
    ];

    /// Stable wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Number => "NUMBER",
            Self::Boolean => "BOOL",
            Self::Select => "SELECT",
            Self::MultiSelect => "MULTISELECT",
            Self::Date => "DATE",
            Self::Image => "IMAGE",
            Self::File => "FILE",
            Self::Email => "EMAIL",
            Self::Tel => "TEL",
            Self::Textarea => "TEXTAREA",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|sub_type| sub_type.as_str() == value.trim())
    }
}

/// Capability activation flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityFlags {
    #[serde(rename = "hasData", default)]
    pub has_data: bool,
    #[serde(rename = "hasFormula", default)]
    pub has_formula: bool,
    #[serde(rename = "hasCondition", default)]
    pub has_condition: bool,
    #[serde(rename = "hasTable", default)]
    pub has_table: bool,
    #[serde(rename = "hasAPI", default)]
    pub has_api: bool,
    #[serde(rename = "hasLink", default)]
    pub has_link: bool,
    #[serde(rename = "hasMarkers", default)]
    pub has_markers: bool,
}

impl CapabilityFlags {
    pub fn get(&self, capability: CapabilityKind) -> bool {
        match capability {
            CapabilityKind::Data => self.has_data,
            CapabilityKind::Formula => self.has_formula,
            CapabilityKind::Condition => self.has_condition,
            CapabilityKind::Table => self.has_table,
            CapabilityKind::Api => self.has_api,
            CapabilityKind::Link => self.has_link,
            CapabilityKind::Markers => self.has_markers,
        }
    }

    pub fn set(&mut self, capability: CapabilityKind, active: bool) {
        let slot = match capability {
            CapabilityKind::Data => &mut self.has_data,
            CapabilityKind::Formula => &mut self.has_formula,
            CapabilityKind::Condition => &mut self.has_condition,
            CapabilityKind::Table => &mut self.has_table,
            CapabilityKind::Api => &mut self.has_api,
            CapabilityKind::Link => &mut self.has_link,
            CapabilityKind::Markers => &mut self.has_markers,
        };
        *slot = active;
    }

    /// Active capabilities in table order.
    pub fn active(&self) -> Vec<CapabilityKind> {
        CapabilityKind::ALL
            .into_iter()
            .filter(|capability| self.get(*capability))
            .collect()
    }
}

/// Capability-scoped configuration blobs stored alongside a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    #[serde(default)]
    pub condition_config: ConditionConfig,
    #[serde(default)]
    pub formula_config: ConfigBlob,
    #[serde(default)]
    pub table_config: ConfigBlob,
    #[serde(default)]
    pub api_config: ConfigBlob,
    #[serde(default)]
    pub link_config: ConfigBlob,
    #[serde(default)]
    pub markers: Vec<String>,
}

/// Canonical flat node record. The hierarchical view is derived from
/// `parent_id` and is never authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub tree_id: TreeId,
    /// Serialized as `type` to match the repository schema.
    #[serde(rename = "type")]
    pub kind: NodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<FieldSubType>,
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    #[serde(default)]
    pub order: i64,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_visible: bool,
    #[serde(default)]
    pub is_required: bool,
    #[serde(flatten)]
    pub capabilities: CapabilityFlags,
    #[serde(flatten)]
    pub config: NodeConfig,
    /// Epoch ms.
    #[serde(default)]
    pub created_at: i64,
    /// Epoch ms.
    #[serde(default)]
    pub updated_at: i64,
}

fn default_true() -> bool {
    true
}

impl Node {
    /// Creates a root-level node with a generated id.
    pub fn new(tree_id: TreeId, kind: NodeType, label: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), tree_id, kind, label)
    }

    /// Creates a node with a caller-provided id.
    ///
    /// Used by import paths and fixtures where identity already exists.
    pub fn with_id(id: NodeId, tree_id: TreeId, kind: NodeType, label: impl Into<String>) -> Self {
        let now = now_epoch_ms();
        Self {
            id,
            tree_id,
            kind,
            sub_type: None,
            parent_id: None,
            order: 0,
            label: label.into(),
            description: None,
            is_visible: true,
            is_required: false,
            capabilities: CapabilityFlags::default(),
            config: NodeConfig::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder-style parent assignment.
    pub fn under(mut self, parent_id: NodeId, order: i64) -> Self {
        self.parent_id = Some(parent_id);
        self.order = order;
        self
    }

    /// Builder-style order assignment for root-level nodes.
    pub fn at_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn has_capability(&self, capability: CapabilityKind) -> bool {
        self.capabilities.get(capability)
    }

    /// Deterministic sibling sort key.
    pub fn sibling_key(&self) -> (i64, i64, NodeId) {
        (self.order, self.created_at, self.id)
    }

    /// Active condition set, when the condition capability holds one.
    pub fn condition_set(&self) -> Option<&ConditionSet> {
        self.config.condition_config.as_set()
    }

    pub fn condition_set_mut(&mut self) -> Option<&mut ConditionSet> {
        self.config.condition_config.as_set_mut()
    }
}

/// Create payload accepted by repositories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNode {
    #[serde(rename = "type")]
    pub kind: NodeType,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<FieldSubType>,
    /// Explicit order; repositories append as last child when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

impl NewNode {
    pub fn new(kind: NodeType, label: impl Into<String>, parent_id: Option<NodeId>) -> Self {
        Self {
            kind,
            label: label.into(),
            parent_id,
            sub_type: None,
            order: None,
        }
    }

    pub fn with_sub_type(mut self, sub_type: FieldSubType) -> Self {
        self.sub_type = Some(sub_type);
        self
    }
}

/// Partial update payload. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<Option<FieldSubType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_required: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flags: BTreeMap<CapabilityKind, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_config: Option<ConditionConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula_config: Option<ConfigBlob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_config: Option<ConfigBlob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_config: Option<ConfigBlob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_config: Option<ConfigBlob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markers: Option<Vec<String>>,
}

impl NodePatch {
    pub fn label(value: impl Into<String>) -> Self {
        Self {
            label: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies every present field onto `node`. Timestamps are left to the
    /// caller.
    pub fn apply_to(&self, node: &mut Node) {
        if let Some(label) = &self.label {
            node.label = label.clone();
        }
        if let Some(description) = &self.description {
            node.description = description.clone();
        }
        if let Some(sub_type) = self.sub_type {
            node.sub_type = sub_type;
        }
        if let Some(is_visible) = self.is_visible {
            node.is_visible = is_visible;
        }
        if let Some(is_required) = self.is_required {
            node.is_required = is_required;
        }
        for (capability, active) in &self.flags {
            node.capabilities.set(*capability, *active);
        }
        if let Some(config) = &self.condition_config {
            node.config.condition_config = config.clone();
        }
        if let Some(config) = &self.formula_config {
            node.config.formula_config = config.clone();
        }
        if let Some(config) = &self.table_config {
            node.config.table_config = config.clone();
        }
        if let Some(config) = &self.api_config {
            node.config.api_config = config.clone();
        }
        if let Some(config) = &self.link_config {
            node.config.link_config = config.clone();
        }
        if let Some(markers) = &self.markers {
            node.config.markers = markers.clone();
        }
    }
}
