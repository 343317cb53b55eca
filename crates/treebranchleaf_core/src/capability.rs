//! Node capability table and toggle manager.
//!
//! # Responsibility
//! - Declare the closed set of optional node capabilities.
//! - Map each capability to its flag and its empty configuration shape.
//! - Build the patches that activate or deactivate one capability.
//!
//! # Invariants
//! - Toggling never removes the node, only capability-scoped configuration.
//! - Activation and deactivation both reset configuration to the empty shape,
//!   so `deactivate` followed by `activate` always yields an empty config.

use crate::condition::set::{ConditionConfig, ConditionSet};
use crate::model::node::{ConfigBlob, Node, NodeId, NodePatch};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Optional, independently toggleable node feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    Data,
    Formula,
    Condition,
    Table,
    Api,
    Link,
    Markers,
}

/// Capability key for the data capability.
pub const CAPABILITY_DATA: &str = "data";
/// Capability key for the formula capability.
pub const CAPABILITY_FORMULA: &str = "formula";
/// Capability key for the condition capability.
pub const CAPABILITY_CONDITION: &str = "condition";
/// Capability key for the table capability.
pub const CAPABILITY_TABLE: &str = "table";
/// Capability key for the api capability.
pub const CAPABILITY_API: &str = "api";
/// Capability key for the link capability.
pub const CAPABILITY_LINK: &str = "link";
/// Capability key for the markers capability.
pub const CAPABILITY_MARKERS: &str = "markers";

const SUPPORTED_CAPABILITY_STRINGS: &[&str] = &[
    CAPABILITY_DATA,
    CAPABILITY_FORMULA,
    CAPABILITY_CONDITION,
    CAPABILITY_TABLE,
    CAPABILITY_API,
    CAPABILITY_LINK,
    CAPABILITY_MARKERS,
];

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 7] = [
        CapabilityKind::Data,
        CapabilityKind::Formula,
        CapabilityKind::Condition,
        CapabilityKind::Table,
        CapabilityKind::Api,
        CapabilityKind::Link,
        CapabilityKind::Markers,
    ];

    /// Stable capability key.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Data => CAPABILITY_DATA,
            Self::Formula => CAPABILITY_FORMULA,
            Self::Condition => CAPABILITY_CONDITION,
            Self::Table => CAPABILITY_TABLE,
            Self::Api => CAPABILITY_API,
            Self::Link => CAPABILITY_LINK,
            Self::Markers => CAPABILITY_MARKERS,
        }
    }

    /// Name of the boolean flag persisted on the node.
    pub fn flag_name(self) -> &'static str {
        match self {
            Self::Data => "hasData",
            Self::Formula => "hasFormula",
            Self::Condition => "hasCondition",
            Self::Table => "hasTable",
            Self::Api => "hasAPI",
            Self::Link => "hasLink",
            Self::Markers => "hasMarkers",
        }
    }

    /// Name of the configuration field cleared on toggle, if the capability
    /// owns one.
    pub fn config_field(self) -> Option<&'static str> {
        match self {
            Self::Data => None,
            Self::Formula => Some("formulaConfig"),
            Self::Condition => Some("conditionConfig"),
            Self::Table => Some("tableConfig"),
            Self::Api => Some("apiConfig"),
            Self::Link => Some("linkConfig"),
            Self::Markers => Some("markers"),
        }
    }
}

impl Display for CapabilityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns supported capability keys.
pub fn supported_capability_strings() -> &'static [&'static str] {
    SUPPORTED_CAPABILITY_STRINGS
}

/// Parses one capability key.
pub fn parse_capability(value: &str) -> Result<CapabilityKind, CapabilityError> {
    let normalized = value.trim();
    if normalized.is_empty() {
        return Err(CapabilityError::EmptyCapability);
    }

    CapabilityKind::ALL
        .into_iter()
        .find(|capability| capability.as_str() == normalized)
        .ok_or_else(|| CapabilityError::UnsupportedCapability(normalized.to_string()))
}

/// Capability parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    EmptyCapability,
    UnsupportedCapability(String),
}

impl Display for CapabilityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCapability => write!(f, "capability key must not be empty"),
            Self::UnsupportedCapability(value) => {
                write!(f, "capability is unsupported: {value}")
            }
        }
    }
}

impl Error for CapabilityError {}

/// Patch that turns `capability` on for node `node_id` and resets its
/// configuration.
///
/// The condition capability starts with an empty branch list; every other
/// configured capability starts with its empty shape.
pub fn activation_patch(node_id: NodeId, capability: CapabilityKind) -> NodePatch {
    let mut patch = reset_patch(capability, true);
    if capability == CapabilityKind::Condition {
        patch.condition_config = Some(ConditionConfig::Set(ConditionSet::empty(node_id)));
    }
    patch
}

/// Patch that turns `capability` off and clears its configuration.
pub fn deactivation_patch(capability: CapabilityKind) -> NodePatch {
    reset_patch(capability, false)
}

fn reset_patch(capability: CapabilityKind, active: bool) -> NodePatch {
    let mut patch = NodePatch::default();
    patch.flags.insert(capability, active);
    match capability {
        CapabilityKind::Data => {}
        CapabilityKind::Formula => patch.formula_config = Some(ConfigBlob::new()),
        CapabilityKind::Condition => patch.condition_config = Some(ConditionConfig::cleared()),
        CapabilityKind::Table => patch.table_config = Some(ConfigBlob::new()),
        CapabilityKind::Api => patch.api_config = Some(ConfigBlob::new()),
        CapabilityKind::Link => patch.link_config = Some(ConfigBlob::new()),
        CapabilityKind::Markers => patch.markers = Some(Vec::new()),
    }
    patch
}

/// Activates `capability` on an in-memory node.
pub fn activate(node: &mut Node, capability: CapabilityKind) {
    activation_patch(node.id, capability).apply_to(node);
}

/// Deactivates `capability` on an in-memory node.
pub fn deactivate(node: &mut Node, capability: CapabilityKind) {
    deactivation_patch(capability).apply_to(node);
}

/// Whether the node's configuration for `capability` is in its empty shape.
///
/// An activated condition capability with no branches, no fallback and no
/// tokens counts as empty.
pub fn is_config_empty(node: &Node, capability: CapabilityKind) -> bool {
    let config = &node.config;
    match capability {
        CapabilityKind::Data => true,
        CapabilityKind::Formula => config.formula_config.is_empty(),
        CapabilityKind::Condition => match config.condition_config.as_set() {
            None => true,
            Some(set) => set.branches.is_empty() && set.fallback.is_none() && set.tokens.is_empty(),
        },
        CapabilityKind::Table => config.table_config.is_empty(),
        CapabilityKind::Api => config.api_config.is_empty(),
        CapabilityKind::Link => config.link_config.is_empty(),
        CapabilityKind::Markers => config.markers.is_empty(),
    }
}
