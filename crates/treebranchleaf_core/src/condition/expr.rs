//! Boolean expression tree used by condition branches.
//!
//! # Responsibility
//! - Model AND/OR groups, negation and binary comparisons between operands.
//! - Provide path-addressed editing (add clause, add group, remove child,
//!   change combinator or operator) for nested groups.
//!
//! # Invariants
//! - Expressions are modeled, never evaluated here.
//! - Incomplete clauses (missing or unresolved operands) are valid
//!   intermediate states.
//! - Removing a child never prunes the groups around it, even when they
//!   become empty.
//! - Unary operators never carry a right operand.

use crate::condition::token::classify_token;
use crate::model::node::NodeId;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Child indices from the root expression down to one sub-expression.
///
/// The empty path addresses the root. A `Not` exposes its operand as index 0.
pub type ExprPath = [usize];

/// Group combinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

impl Combinator {
    pub fn toggled(self) -> Self {
        match self {
            Self::And => Self::Or,
            Self::Or => Self::And,
        }
    }
}

/// Comparison operator of a binary clause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    #[default]
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "startsWith")]
    StartsWith,
    #[serde(rename = "endsWith")]
    EndsWith,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "notIn")]
    NotIn,
    #[serde(rename = "isEmpty")]
    IsEmpty,
    #[serde(rename = "isNotEmpty")]
    IsNotEmpty,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 13] = [
        BinaryOp::Eq,
        BinaryOp::Ne,
        BinaryOp::Gt,
        BinaryOp::Gte,
        BinaryOp::Lt,
        BinaryOp::Lte,
        BinaryOp::Contains,
        BinaryOp::StartsWith,
        BinaryOp::EndsWith,
        BinaryOp::In,
        BinaryOp::NotIn,
        BinaryOp::IsEmpty,
        BinaryOp::IsNotEmpty,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Contains => "contains",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::In => "in",
            Self::NotIn => "notIn",
            Self::IsEmpty => "isEmpty",
            Self::IsNotEmpty => "isNotEmpty",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == value.trim())
    }

    /// Unary operators only inspect the left operand.
    pub fn is_unary(self) -> bool {
        matches!(self, Self::IsEmpty | Self::IsNotEmpty)
    }
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operand of a binary clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ValueRef {
    /// Current value of a field node.
    NodeValue {
        #[serde(rename = "nodeId")]
        node_id: String,
    },
    /// Selected option of a choice node, optionally one specific option.
    NodeOption {
        #[serde(rename = "nodeId")]
        node_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        option: Option<String>,
    },
    Variable {
        key: String,
    },
    Marker {
        tag: String,
    },
    Const {
        value: serde_json::Value,
    },
}

impl ValueRef {
    /// Builds an operand from raw editor input.
    pub fn from_token(token: &str) -> Self {
        classify_token(token)
    }

    /// Token form of a reference. Constants have none.
    pub fn to_token(&self) -> Option<String> {
        match self {
            Self::NodeValue { node_id } => Some(format!("@value.{node_id}")),
            Self::NodeOption {
                node_id,
                option: Some(option),
            } => Some(format!("@select.{node_id}.{option}")),
            Self::NodeOption {
                node_id,
                option: None,
            } => Some(format!("@select.{node_id}")),
            Self::Variable { key } => Some(format!("@{key}")),
            Self::Marker { tag } => Some(format!("#{tag}")),
            Self::Const { .. } => None,
        }
    }

    /// Whether the operand names something. Empty ids, keys and tags left
    /// behind by partial tokens such as `@value.` or `#` do not.
    pub fn is_resolved(&self) -> bool {
        match self {
            Self::NodeValue { node_id } | Self::NodeOption { node_id, .. } => {
                !node_id.trim().is_empty()
            }
            Self::Variable { key } => !key.trim().is_empty(),
            Self::Marker { tag } => !tag.trim().is_empty(),
            Self::Const { .. } => true,
        }
    }

    /// Node referenced by this operand, when it names one with a valid id.
    pub fn referenced_node_id(&self) -> Option<NodeId> {
        match self {
            Self::NodeValue { node_id } | Self::NodeOption { node_id, .. } => {
                Uuid::parse_str(node_id).ok()
            }
            _ => None,
        }
    }
}

/// Boolean expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Expr {
    Group {
        id: String,
        #[serde(rename = "bool")]
        combinator: Combinator,
        #[serde(default)]
        children: Vec<Expr>,
    },
    Binary {
        id: String,
        op: BinaryOp,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        left: Option<ValueRef>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        right: Option<ValueRef>,
    },
    Not {
        id: String,
        child: Box<Expr>,
    },
}

/// Which operand of a clause to edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSide {
    Left,
    Right,
}

fn new_expr_id() -> String {
    Uuid::new_v4().to_string()
}

impl Expr {
    /// Empty AND group.
    pub fn group() -> Self {
        Self::Group {
            id: new_expr_id(),
            combinator: Combinator::And,
            children: Vec::new(),
        }
    }

    /// Clause `left == right` with no operands yet.
    pub fn empty_clause() -> Self {
        Self::Binary {
            id: new_expr_id(),
            op: BinaryOp::Eq,
            left: None,
            right: None,
        }
    }

    pub fn clause(op: BinaryOp, left: ValueRef, right: Option<ValueRef>) -> Self {
        Self::Binary {
            id: new_expr_id(),
            op,
            left: Some(left),
            right: if op.is_unary() { None } else { right },
        }
    }

    pub fn negate(child: Expr) -> Self {
        Self::Not {
            id: new_expr_id(),
            child: Box::new(child),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Group { id, .. } | Self::Binary { id, .. } | Self::Not { id, .. } => id,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group { .. })
    }

    /// Whether every clause has the resolved operands its operator needs.
    ///
    /// Groups are complete when all their children are; an empty group is
    /// complete.
    pub fn is_complete(&self) -> bool {
        match self {
            Self::Group { children, .. } => children.iter().all(Expr::is_complete),
            Self::Binary {
                op, left, right, ..
            } => is_resolved(left) && (op.is_unary() || is_resolved(right)),
            Self::Not { child, .. } => child.is_complete(),
        }
    }

    /// Distinct non-constant operand tokens, in depth-first order.
    pub fn referenced_tokens(&self) -> Vec<String> {
        let mut tokens = Vec::new();
        self.collect_tokens(&mut tokens);
        tokens
    }

    pub(crate) fn collect_tokens(&self, tokens: &mut Vec<String>) {
        match self {
            Self::Group { children, .. } => {
                for child in children {
                    child.collect_tokens(tokens);
                }
            }
            Self::Binary { left, right, .. } => {
                for operand in [left, right].into_iter().flatten() {
                    if let Some(token) = operand.to_token() {
                        if !tokens.contains(&token) {
                            tokens.push(token);
                        }
                    }
                }
            }
            Self::Not { child, .. } => child.collect_tokens(tokens),
        }
    }

    /// Borrows the sub-expression at `path`.
    pub fn expr_at(&self, path: &ExprPath) -> Result<&Expr, ExprEditError> {
        let mut current = self;
        for (depth, index) in path.iter().enumerate() {
            current = match current {
                Self::Group { children, .. } => children.get(*index),
                Self::Not { child, .. } if *index == 0 => Some(child.as_ref()),
                _ => None,
            }
            .ok_or_else(|| ExprEditError::PathNotFound(path[..=depth].to_vec()))?;
        }
        Ok(current)
    }

    /// Mutably borrows the sub-expression at `path`.
    pub fn expr_at_mut(&mut self, path: &ExprPath) -> Result<&mut Expr, ExprEditError> {
        let mut current = self;
        for (depth, index) in path.iter().enumerate() {
            current = match current {
                Self::Group { children, .. } => children.get_mut(*index),
                Self::Not { child, .. } if *index == 0 => Some(child.as_mut()),
                _ => None,
            }
            .ok_or_else(|| ExprEditError::PathNotFound(path[..=depth].to_vec()))?;
        }
        Ok(current)
    }

    fn group_children_mut(&mut self, path: &ExprPath) -> Result<&mut Vec<Expr>, ExprEditError> {
        match self.expr_at_mut(path)? {
            Self::Group { children, .. } => Ok(children),
            _ => Err(ExprEditError::NotAGroup(path.to_vec())),
        }
    }

    /// Path of the nearest group enclosing `path` (itself when it is a group).
    pub fn nearest_group_path(&self, path: &ExprPath) -> Result<Vec<usize>, ExprEditError> {
        self.expr_at(path)?;
        let mut depth = path.len();
        loop {
            if self.expr_at(&path[..depth])?.is_group() {
                return Ok(path[..depth].to_vec());
            }
            if depth == 0 {
                return Err(ExprEditError::NotAGroup(path.to_vec()));
            }
            depth -= 1;
        }
    }

    /// Appends an empty `==` clause to the nearest group enclosing `path`.
    /// Returns the new clause id.
    pub fn add_clause(&mut self, path: &ExprPath) -> Result<String, ExprEditError> {
        self.append_child(path, Expr::empty_clause())
    }

    /// Appends an empty AND group to the nearest group enclosing `path`.
    /// Returns the new group id.
    pub fn add_group(&mut self, path: &ExprPath) -> Result<String, ExprEditError> {
        self.append_child(path, Expr::group())
    }

    fn append_child(&mut self, path: &ExprPath, child: Expr) -> Result<String, ExprEditError> {
        let group_path = self.nearest_group_path(path)?;
        let id = child.id().to_string();
        self.group_children_mut(&group_path)?.push(child);
        Ok(id)
    }

    /// Removes child `index` of the group at `group_path` and returns it.
    pub fn remove_child(
        &mut self,
        group_path: &ExprPath,
        index: usize,
    ) -> Result<Expr, ExprEditError> {
        let children = self.group_children_mut(group_path)?;
        if index >= children.len() {
            return Err(ExprEditError::IndexOutOfRange {
                index,
                len: children.len(),
            });
        }
        Ok(children.remove(index))
    }

    pub fn set_combinator(
        &mut self,
        group_path: &ExprPath,
        value: Combinator,
    ) -> Result<(), ExprEditError> {
        match self.expr_at_mut(group_path)? {
            Self::Group { combinator, .. } => {
                *combinator = value;
                Ok(())
            }
            _ => Err(ExprEditError::NotAGroup(group_path.to_vec())),
        }
    }

    /// Flips AND/OR and returns the new combinator.
    pub fn toggle_combinator(
        &mut self,
        group_path: &ExprPath,
    ) -> Result<Combinator, ExprEditError> {
        match self.expr_at_mut(group_path)? {
            Self::Group { combinator, .. } => {
                *combinator = combinator.toggled();
                Ok(*combinator)
            }
            _ => Err(ExprEditError::NotAGroup(group_path.to_vec())),
        }
    }

    /// Changes the operator of a clause. Switching to a unary operator drops
    /// the right operand.
    pub fn set_operator(
        &mut self,
        clause_path: &ExprPath,
        value: BinaryOp,
    ) -> Result<(), ExprEditError> {
        match self.expr_at_mut(clause_path)? {
            Self::Binary { op, right, .. } => {
                *op = value;
                if value.is_unary() {
                    *right = None;
                }
                Ok(())
            }
            _ => Err(ExprEditError::NotAClause(clause_path.to_vec())),
        }
    }

    /// Sets or clears one operand of a clause.
    pub fn set_operand(
        &mut self,
        clause_path: &ExprPath,
        side: OperandSide,
        value: Option<ValueRef>,
    ) -> Result<(), ExprEditError> {
        match self.expr_at_mut(clause_path)? {
            Self::Binary {
                op, left, right, ..
            } => {
                match side {
                    OperandSide::Left => *left = value,
                    OperandSide::Right if op.is_unary() && value.is_some() => {
                        return Err(ExprEditError::UnaryOperand(*op));
                    }
                    OperandSide::Right => *right = value,
                }
                Ok(())
            }
            _ => Err(ExprEditError::NotAClause(clause_path.to_vec())),
        }
    }
}

/// Normalizes an expression into a group: groups are kept as-is, anything
/// else is wrapped into a singleton AND group.
pub fn ensure_group(expr: Expr) -> Expr {
    if expr.is_group() {
        return expr;
    }
    Expr::Group {
        id: new_expr_id(),
        combinator: Combinator::And,
        children: vec![expr],
    }
}

/// Like [`ensure_group`], with a missing expression becoming an empty AND
/// group.
pub fn ensure_group_opt(expr: Option<Expr>) -> Expr {
    expr.map_or_else(Expr::group, ensure_group)
}

/// Expression editing errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprEditError {
    /// No sub-expression at this path (prefix up to the failing step).
    PathNotFound(Vec<usize>),
    NotAGroup(Vec<usize>),
    NotAClause(Vec<usize>),
    IndexOutOfRange { index: usize, len: usize },
    /// Right operand given to a unary operator.
    UnaryOperand(BinaryOp),
    BranchNotFound(String),
    ActionNotFound(String),
}

impl Display for ExprEditError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PathNotFound(path) => write!(f, "no expression at path {path:?}"),
            Self::NotAGroup(path) => write!(f, "expression at path {path:?} is not a group"),
            Self::NotAClause(path) => write!(f, "expression at path {path:?} is not a clause"),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "index {index} out of range for {len} children")
            }
            Self::UnaryOperand(op) => write!(f, "operator {op} takes no right operand"),
            Self::BranchNotFound(id) => write!(f, "condition branch not found: {id}"),
            Self::ActionNotFound(id) => write!(f, "condition action not found: {id}"),
        }
    }
}

impl Error for ExprEditError {}

fn is_resolved(operand: &Option<ValueRef>) -> bool {
    operand.as_ref().is_some_and(ValueRef::is_resolved)
}
