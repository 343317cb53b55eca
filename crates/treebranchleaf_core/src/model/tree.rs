//! Tree (form) record model.
//!
//! A tree is a named collection of nodes sharing one root scope, owned by one
//! organization (tenant).

use crate::model::now_epoch_ms;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable tree identifier.
pub type TreeId = Uuid;

/// Tenant scope identifier.
pub type OrganizationId = Uuid;

/// Publication lifecycle of one tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl TreeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

impl Display for TreeStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tree {
    pub id: TreeId,
    pub organization_id: OrganizationId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TreeStatus,
    /// Epoch ms.
    #[serde(default)]
    pub created_at: i64,
    /// Epoch ms.
    #[serde(default)]
    pub updated_at: i64,
}

impl Tree {
    /// Creates a draft tree with a generated id.
    pub fn new(organization_id: OrganizationId, name: impl Into<String>) -> Self {
        let now = now_epoch_ms();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            name: name.into(),
            description: None,
            status: TreeStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Create payload for trees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTree {
    pub organization_id: OrganizationId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Partial update payload for trees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TreeStatus>,
}

impl TreePatch {
    pub fn apply_to(&self, tree: &mut Tree) {
        if let Some(name) = &self.name {
            tree.name = name.clone();
        }
        if let Some(description) = &self.description {
            tree.description = description.clone();
        }
        if let Some(status) = self.status {
            tree.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Tree, TreePatch, TreeStatus};
    use uuid::Uuid;

    #[test]
    fn parses_all_statuses() {
        for status in [TreeStatus::Draft, TreeStatus::Published, TreeStatus::Archived] {
            assert_eq!(TreeStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TreeStatus::parse("deleted"), None);
    }

    #[test]
    fn new_tree_starts_as_draft() {
        let tree = Tree::new(Uuid::new_v4(), "Quote form");
        assert_eq!(tree.status, TreeStatus::Draft);
        assert_eq!(tree.name, "Quote form");
    }

    #[test]
    fn patch_updates_present_fields() {
        let mut tree = Tree::new(Uuid::new_v4(), "Old");
        TreePatch {
            status: Some(TreeStatus::Published),
            ..TreePatch::default()
        }
        .apply_to(&mut tree);
        assert_eq!(tree.name, "Old");
        assert_eq!(tree.status, TreeStatus::Published);
    }
}
