//! Condition sets: ordered branches of `when -> actions` plus an optional
//! fallback branch.
//!
//! # Invariants
//! - A cleared configuration serializes as `{}`; an activated one always has
//!   a `branches` array, possibly empty.
//! - Branch and action ids are unique within a set.
//! - `tokens` mirrors the references used by branch expressions after
//!   `refresh_tokens`.

use crate::condition::expr::{ensure_group_opt, Expr, ExprEditError};
use crate::model::node::NodeId;
use crate::model::tree::TreeId;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// How branches are selected at evaluation time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvalMode {
    /// First matching branch wins.
    #[default]
    FirstMatch,
    /// Every matching branch runs.
    All,
    /// Matching branches contribute to a collected result.
    Collect,
}

/// Effect of a branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Show {
        #[serde(rename = "nodeIds")]
        node_ids: Vec<NodeId>,
    },
    Hide {
        #[serde(rename = "nodeIds")]
        node_ids: Vec<NodeId>,
    },
    GotoNode {
        #[serde(rename = "targetId")]
        target_id: NodeId,
    },
    GotoTree {
        #[serde(rename = "targetId")]
        target_id: TreeId,
    },
    SetVar {
        key: String,
        value: serde_json::Value,
    },
    EvalFormula {
        #[serde(rename = "formulaId", default, skip_serializing_if = "Option::is_none")]
        formula_id: Option<String>,
    },
    AppendSection {
        #[serde(rename = "targetId", default, skip_serializing_if = "Option::is_none")]
        target_id: Option<NodeId>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    #[serde(flatten)]
    pub kind: ActionKind,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
        }
    }

    fn referenced_node_ids(&self, out: &mut Vec<NodeId>) {
        match &self.kind {
            ActionKind::Show { node_ids } | ActionKind::Hide { node_ids } => {
                out.extend(node_ids.iter().copied())
            }
            ActionKind::GotoNode { target_id } => out.push(*target_id),
            ActionKind::AppendSection {
                target_id: Some(target_id),
            } => out.push(*target_id),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionBranch {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Expr>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl ConditionBranch {
    pub fn new(label: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            label,
            when: None,
            actions: Vec::new(),
        }
    }

    /// Root group of `when`, normalizing a missing or bare expression first.
    pub fn when_group_mut(&mut self) -> &mut Expr {
        let normalized = ensure_group_opt(self.when.take());
        self.when.insert(normalized)
    }

    /// Appends an action and returns its id.
    pub fn add_action(&mut self, kind: ActionKind) -> String {
        let action = Action::new(kind);
        let id = action.id.clone();
        self.actions.push(action);
        id
    }

    pub fn remove_action(&mut self, action_id: &str) -> Result<Action, ExprEditError> {
        let index = self
            .actions
            .iter()
            .position(|action| action.id == action_id)
            .ok_or_else(|| ExprEditError::ActionNotFound(action_id.to_string()))?;
        Ok(self.actions.remove(index))
    }
}

/// Condition configuration of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSet {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub mode: EvalMode,
    #[serde(default)]
    pub tokens: Vec<String>,
    pub branches: Vec<ConditionBranch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<ConditionBranch>,
}

impl ConditionSet {
    /// Fresh set for `node_id`: id `cond_<nodeId>`, no branches.
    pub fn empty(node_id: NodeId) -> Self {
        Self {
            id: format!("cond_{node_id}"),
            mode: EvalMode::FirstMatch,
            tokens: Vec::new(),
            branches: Vec::new(),
            fallback: None,
        }
    }

    pub fn set_mode(&mut self, mode: EvalMode) {
        self.mode = mode;
    }

    /// Appends a branch with an empty AND group and returns its id.
    pub fn add_branch(&mut self, label: Option<String>) -> String {
        let mut branch = ConditionBranch::new(label);
        branch.when = Some(Expr::group());
        let id = branch.id.clone();
        self.branches.push(branch);
        id
    }

    pub fn branch(&self, branch_id: &str) -> Option<&ConditionBranch> {
        self.branches
            .iter()
            .chain(self.fallback.iter())
            .find(|branch| branch.id == branch_id)
    }

    /// Looks up a regular branch or the fallback by id.
    pub fn branch_mut(&mut self, branch_id: &str) -> Result<&mut ConditionBranch, ExprEditError> {
        self.branches
            .iter_mut()
            .chain(self.fallback.iter_mut())
            .find(|branch| branch.id == branch_id)
            .ok_or_else(|| ExprEditError::BranchNotFound(branch_id.to_string()))
    }

    pub fn remove_branch(&mut self, branch_id: &str) -> Result<ConditionBranch, ExprEditError> {
        let index = self
            .branches
            .iter()
            .position(|branch| branch.id == branch_id)
            .ok_or_else(|| ExprEditError::BranchNotFound(branch_id.to_string()))?;
        Ok(self.branches.remove(index))
    }

    /// Moves the branch at `from` so it ends up at index `to`.
    pub fn move_branch(&mut self, from: usize, to: usize) -> Result<(), ExprEditError> {
        let len = self.branches.len();
        for index in [from, to] {
            if index >= len {
                return Err(ExprEditError::IndexOutOfRange { index, len });
            }
        }
        let branch = self.branches.remove(from);
        self.branches.insert(to, branch);
        Ok(())
    }

    /// Replaces the ELSE branch. The fallback never carries an expression.
    pub fn set_fallback(&mut self, fallback: Option<ConditionBranch>) {
        self.fallback = fallback.map(|mut branch| {
            branch.when = None;
            branch
        });
    }

    /// Fallback branch, created empty when missing.
    pub fn ensure_fallback(&mut self) -> &mut ConditionBranch {
        self.fallback
            .get_or_insert_with(|| ConditionBranch::new(Some("ELSE".to_string())))
    }

    /// Distinct tokens referenced by branch expressions, in branch order.
    pub fn collect_tokens(&self) -> Vec<String> {
        let mut tokens = Vec::new();
        for branch in &self.branches {
            if let Some(when) = &branch.when {
                when.collect_tokens(&mut tokens);
            }
        }
        tokens
    }

    /// Recomputes `tokens` from the current expressions.
    pub fn refresh_tokens(&mut self) {
        self.tokens = self.collect_tokens();
    }

    /// Nodes referenced by operands and actions, deduplicated.
    pub fn referenced_node_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        for branch in self.branches.iter().chain(self.fallback.iter()) {
            if let Some(when) = &branch.when {
                ids.extend(when_operand_node_ids(when));
            }
            for action in &branch.actions {
                action.referenced_node_ids(&mut ids);
            }
        }
        let mut seen = std::collections::HashSet::new();
        ids.retain(|id| seen.insert(*id));
        ids
    }
}

fn when_operand_node_ids(expr: &Expr) -> Vec<NodeId> {
    match expr {
        Expr::Group { children, .. } => children.iter().flat_map(when_operand_node_ids).collect(),
        Expr::Binary { left, right, .. } => [left, right]
            .into_iter()
            .flatten()
            .filter_map(|operand| operand.referenced_node_id())
            .collect(),
        Expr::Not { child, .. } => when_operand_node_ids(child),
    }
}

/// Serialized shape of a cleared condition configuration: `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClearedConfig {}

/// Condition configuration as persisted on a node.
///
/// Only the empty object reads as cleared. Any other object must parse as a
/// full set; its parse error is returned as is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConditionConfig {
    Set(ConditionSet),
    Cleared(ClearedConfig),
}

impl<'de> Deserialize<'de> for ConditionConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::Object(map) if map.is_empty() => Ok(Self::cleared()),
            serde_json::Value::Object(map) => {
                ConditionSet::deserialize(serde_json::Value::Object(map))
                    .map(Self::Set)
                    .map_err(D::Error::custom)
            }
            other => Err(D::Error::custom(format!(
                "condition config must be an object, got `{other}`"
            ))),
        }
    }
}

impl Default for ConditionConfig {
    fn default() -> Self {
        Self::cleared()
    }
}

impl ConditionConfig {
    pub fn cleared() -> Self {
        Self::Cleared(ClearedConfig {})
    }

    pub fn is_cleared(&self) -> bool {
        matches!(self, Self::Cleared(_))
    }

    pub fn as_set(&self) -> Option<&ConditionSet> {
        match self {
            Self::Set(set) => Some(set),
            Self::Cleared(_) => None,
        }
    }

    pub fn as_set_mut(&mut self) -> Option<&mut ConditionSet> {
        match self {
            Self::Set(set) => Some(set),
            Self::Cleared(_) => None,
        }
    }
}
