//! SQLite node repository.
//!
//! # Responsibility
//! - Persist trees and nodes, including capability flags and configuration
//!   blobs (stored as JSON text).
//! - Recompute sibling order on move inside one immediate transaction.
//!
//! # Invariants
//! - Node listing is deterministic: `parent_uuid, sort_order, created_at, uuid`.
//! - Every node query is scoped by `tree_uuid`.
//! - Requires a connection opened through `db::open_db*`.

use crate::db::migrations::latest_version;
use crate::hierarchy::placement::MoveRequest;
use crate::hierarchy::reorder::apply_move;
use crate::model::node::{
    CapabilityFlags, FieldSubType, NewNode, Node, NodeConfig, NodeId, NodePatch, NodeType,
};
use crate::model::now_epoch_ms;
use crate::model::tree::{NewTree, OrganizationId, Tree, TreeId, TreePatch, TreeStatus};
use crate::repo::{NodeRepository, RepoError, RepoResult};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

const TREE_COLUMNS: &str =
    "uuid, organization_uuid, name, description, status, created_at, updated_at";

const NODE_COLUMNS: &str = "uuid, tree_uuid, parent_uuid, type, sub_type, label, description,
    sort_order, is_visible, is_required,
    has_data, has_formula, has_condition, has_table, has_api, has_link, has_markers,
    condition_config, formula_config, table_config, api_config, link_config, markers,
    created_at, updated_at";

/// SQLite-backed node repository.
pub struct SqliteNodeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNodeRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl NodeRepository for SqliteNodeRepository<'_> {
    fn list_trees(&self, organization_id: OrganizationId) -> RepoResult<Vec<Tree>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {TREE_COLUMNS}
             FROM trees
             WHERE organization_uuid = ?1
             ORDER BY created_at ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([organization_id.to_string()])?;
        let mut trees = Vec::new();
        while let Some(row) = rows.next()? {
            trees.push(parse_tree_row(row)?);
        }
        Ok(trees)
    }

    fn create_tree(&self, new_tree: &NewTree) -> RepoResult<Tree> {
        let mut tree = Tree::new(new_tree.organization_id, new_tree.name.clone());
        tree.description = new_tree.description.clone();
        self.conn.execute(
            "INSERT INTO trees (
                uuid,
                organization_uuid,
                name,
                description,
                status,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                tree.id.to_string(),
                tree.organization_id.to_string(),
                tree.name,
                tree.description,
                tree.status.as_str(),
                tree.created_at,
                tree.updated_at,
            ],
        )?;
        load_required_tree(self.conn, tree.id)
    }

    fn update_tree(&self, tree_id: TreeId, patch: &TreePatch) -> RepoResult<Tree> {
        let mut tree = load_required_tree(self.conn, tree_id)?;
        patch.apply_to(&mut tree);
        self.conn.execute(
            "UPDATE trees
             SET name = ?2,
                 description = ?3,
                 status = ?4,
                 updated_at = ?5
             WHERE uuid = ?1;",
            params![
                tree_id.to_string(),
                tree.name,
                tree.description,
                tree.status.as_str(),
                now_epoch_ms(),
            ],
        )?;
        load_required_tree(self.conn, tree_id)
    }

    fn delete_tree(&self, tree_id: TreeId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM nodes WHERE tree_uuid = ?1;", [tree_id.to_string()])?;
        let changed = tx.execute("DELETE FROM trees WHERE uuid = ?1;", [tree_id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::TreeNotFound(tree_id));
        }
        tx.commit()?;
        Ok(())
    }

    fn list_nodes(&self, tree_id: TreeId) -> RepoResult<Vec<Node>> {
        ensure_tree_exists(self.conn, tree_id)?;
        load_tree_nodes(self.conn, tree_id)
    }

    fn create_node(&self, tree_id: TreeId, new_node: &NewNode) -> RepoResult<Node> {
        ensure_tree_exists(self.conn, tree_id)?;
        if let Some(parent_id) = new_node.parent_id {
            if !node_exists(self.conn, tree_id, parent_id)? {
                return Err(RepoError::ParentNotFound(parent_id));
            }
        }

        let mut node = Node::new(tree_id, new_node.kind, new_node.label.clone());
        node.parent_id = new_node.parent_id;
        node.sub_type = new_node.sub_type;
        node.order = match new_node.order {
            Some(order) => order,
            None => next_sort_order(self.conn, tree_id, new_node.parent_id)?,
        };

        insert_node(self.conn, &node)?;
        debug!(
            "event=node_create module=repo status=ok node_id={} parent_id={:?} order={}",
            node.id, node.parent_id, node.order
        );
        load_required_node(self.conn, tree_id, node.id)
    }

    fn update_node(&self, tree_id: TreeId, node_id: NodeId, patch: &NodePatch) -> RepoResult<Node> {
        let mut node = load_required_node(self.conn, tree_id, node_id)?;
        patch.apply_to(&mut node);
        node.updated_at = now_epoch_ms();

        let flags = node.capabilities;
        let config = &node.config;
        self.conn.execute(
            "UPDATE nodes
             SET sub_type = ?3,
                 label = ?4,
                 description = ?5,
                 is_visible = ?6,
                 is_required = ?7,
                 has_data = ?8,
                 has_formula = ?9,
                 has_condition = ?10,
                 has_table = ?11,
                 has_api = ?12,
                 has_link = ?13,
                 has_markers = ?14,
                 condition_config = ?15,
                 formula_config = ?16,
                 table_config = ?17,
                 api_config = ?18,
                 link_config = ?19,
                 markers = ?20,
                 updated_at = ?21
             WHERE uuid = ?1
               AND tree_uuid = ?2;",
            params![
                node_id.to_string(),
                tree_id.to_string(),
                node.sub_type.map(FieldSubType::as_str),
                node.label,
                node.description,
                node.is_visible,
                node.is_required,
                flags.has_data,
                flags.has_formula,
                flags.has_condition,
                flags.has_table,
                flags.has_api,
                flags.has_link,
                flags.has_markers,
                to_json(&config.condition_config, "condition_config")?,
                to_json(&config.formula_config, "formula_config")?,
                to_json(&config.table_config, "table_config")?,
                to_json(&config.api_config, "api_config")?,
                to_json(&config.link_config, "link_config")?,
                to_json(&config.markers, "markers")?,
                node.updated_at,
            ],
        )?;
        load_required_node(self.conn, tree_id, node_id)
    }

    fn move_node(
        &self,
        tree_id: TreeId,
        node_id: NodeId,
        request: &MoveRequest,
    ) -> RepoResult<Node> {
        ensure_tree_exists(self.conn, tree_id)?;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let before = load_tree_nodes(&tx, tree_id)?;
        let mut after = before.clone();
        apply_move(&mut after, node_id, request, now_epoch_ms())?;

        for (old, new) in before.iter().zip(after.iter()) {
            if old.parent_id == new.parent_id && old.order == new.order {
                continue;
            }
            tx.execute(
                "UPDATE nodes
                 SET parent_uuid = ?3,
                     sort_order = ?4,
                     updated_at = ?5
                 WHERE uuid = ?1
                   AND tree_uuid = ?2;",
                params![
                    new.id.to_string(),
                    tree_id.to_string(),
                    new.parent_id.map(|value| value.to_string()),
                    new.order,
                    new.updated_at,
                ],
            )?;
        }

        tx.commit()?;
        load_required_node(self.conn, tree_id, node_id)
    }

    fn delete_node(&self, tree_id: TreeId, node_id: NodeId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "WITH RECURSIVE subtree(uuid) AS (
                SELECT uuid
                FROM nodes
                WHERE uuid = ?1
                  AND tree_uuid = ?2
                UNION
                SELECT child.uuid
                FROM nodes child
                INNER JOIN subtree parent ON child.parent_uuid = parent.uuid
            )
            DELETE FROM nodes
            WHERE uuid IN (SELECT uuid FROM subtree);",
            params![node_id.to_string(), tree_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NodeNotFound(node_id));
        }
        Ok(())
    }
}

fn insert_node(conn: &Connection, node: &Node) -> RepoResult<()> {
    let flags = node.capabilities;
    let config = &node.config;
    conn.execute(
        &format!(
            "INSERT INTO nodes ({NODE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                     ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25);"
        ),
        params![
            node.id.to_string(),
            node.tree_id.to_string(),
            node.parent_id.map(|value| value.to_string()),
            node.kind.as_str(),
            node.sub_type.map(FieldSubType::as_str),
            node.label,
            node.description,
            node.order,
            node.is_visible,
            node.is_required,
            flags.has_data,
            flags.has_formula,
            flags.has_condition,
            flags.has_table,
            flags.has_api,
            flags.has_link,
            flags.has_markers,
            to_json(&config.condition_config, "condition_config")?,
            to_json(&config.formula_config, "formula_config")?,
            to_json(&config.table_config, "table_config")?,
            to_json(&config.api_config, "api_config")?,
            to_json(&config.link_config, "link_config")?,
            to_json(&config.markers, "markers")?,
            node.created_at,
            node.updated_at,
        ],
    )?;
    Ok(())
}

fn load_tree_nodes(conn: &Connection, tree_id: TreeId) -> RepoResult<Vec<Node>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NODE_COLUMNS}
         FROM nodes
         WHERE tree_uuid = ?1
         ORDER BY parent_uuid ASC, sort_order ASC, created_at ASC, uuid ASC;"
    ))?;
    let mut rows = stmt.query([tree_id.to_string()])?;
    let mut nodes = Vec::new();
    while let Some(row) = rows.next()? {
        nodes.push(parse_node_row(row)?);
    }
    Ok(nodes)
}

fn load_required_node(conn: &Connection, tree_id: TreeId, node_id: NodeId) -> RepoResult<Node> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {NODE_COLUMNS}
         FROM nodes
         WHERE uuid = ?1
           AND tree_uuid = ?2;"
    ))?;
    let mut rows = stmt.query([node_id.to_string(), tree_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return parse_node_row(row);
    }
    Err(RepoError::NodeNotFound(node_id))
}

fn load_required_tree(conn: &Connection, tree_id: TreeId) -> RepoResult<Tree> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TREE_COLUMNS}
         FROM trees
         WHERE uuid = ?1;"
    ))?;
    let mut rows = stmt.query([tree_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return parse_tree_row(row);
    }
    Err(RepoError::TreeNotFound(tree_id))
}

fn ensure_tree_exists(conn: &Connection, tree_id: TreeId) -> RepoResult<()> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM trees WHERE uuid = ?1;",
            [tree_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(RepoError::TreeNotFound(tree_id)),
    }
}

fn node_exists(conn: &Connection, tree_id: TreeId, node_id: NodeId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM nodes
            WHERE uuid = ?1
              AND tree_uuid = ?2
        );",
        params![node_id.to_string(), tree_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn next_sort_order(
    conn: &Connection,
    tree_id: TreeId,
    parent_id: Option<NodeId>,
) -> RepoResult<i64> {
    let next = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1
         FROM nodes
         WHERE tree_uuid = ?1
           AND parent_uuid IS ?2;",
        params![tree_id.to_string(), parent_id.map(|value| value.to_string())],
        |row| row.get(0),
    )?;
    Ok(next)
}

fn parse_tree_row(row: &Row<'_>) -> RepoResult<Tree> {
    let id_text: String = row.get("uuid")?;
    let organization_text: String = row.get("organization_uuid")?;
    let status_text: String = row.get("status")?;
    let status = TreeStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid tree status `{status_text}` in trees.status"))
    })?;

    Ok(Tree {
        id: parse_uuid(&id_text, "trees.uuid")?,
        organization_id: parse_uuid(&organization_text, "trees.organization_uuid")?,
        name: row.get("name")?,
        description: row.get("description")?,
        status,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_node_row(row: &Row<'_>) -> RepoResult<Node> {
    let id_text: String = row.get("uuid")?;
    let tree_text: String = row.get("tree_uuid")?;
    let parent_id = row
        .get::<_, Option<String>>("parent_uuid")?
        .map(|value| parse_uuid(&value, "nodes.parent_uuid"))
        .transpose()?;

    let kind_text: String = row.get("type")?;
    let kind = NodeType::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid node type `{kind_text}` in nodes.type"))
    })?;
    let sub_type = row
        .get::<_, Option<String>>("sub_type")?
        .map(|value| {
            FieldSubType::parse(&value).ok_or_else(|| {
                RepoError::InvalidData(format!("invalid sub type `{value}` in nodes.sub_type"))
            })
        })
        .transpose()?;

    let capabilities = CapabilityFlags {
        has_data: parse_flag(row, "has_data")?,
        has_formula: parse_flag(row, "has_formula")?,
        has_condition: parse_flag(row, "has_condition")?,
        has_table: parse_flag(row, "has_table")?,
        has_api: parse_flag(row, "has_api")?,
        has_link: parse_flag(row, "has_link")?,
        has_markers: parse_flag(row, "has_markers")?,
    };
    let config = NodeConfig {
        condition_config: parse_json(row, "condition_config")?,
        formula_config: parse_json(row, "formula_config")?,
        table_config: parse_json(row, "table_config")?,
        api_config: parse_json(row, "api_config")?,
        link_config: parse_json(row, "link_config")?,
        markers: parse_json(row, "markers")?,
    };

    Ok(Node {
        id: parse_uuid(&id_text, "nodes.uuid")?,
        tree_id: parse_uuid(&tree_text, "nodes.tree_uuid")?,
        kind,
        sub_type,
        parent_id,
        order: row.get("sort_order")?,
        label: row.get("label")?,
        description: row.get("description")?,
        is_visible: parse_flag(row, "is_visible")?,
        is_required: parse_flag(row, "is_required")?,
        capabilities,
        config,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_flag(row: &Row<'_>, column: &'static str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in nodes.{column}"
        ))),
    }
}

fn parse_json<T: DeserializeOwned>(row: &Row<'_>, column: &'static str) -> RepoResult<T> {
    let text: String = row.get(column)?;
    serde_json::from_str(&text)
        .map_err(|err| RepoError::InvalidData(format!("invalid json in nodes.{column}: {err}")))
}

fn to_json<T: Serialize>(value: &T, column: &'static str) -> RepoResult<String> {
    serde_json::to_string(value)
        .map_err(|err| RepoError::InvalidData(format!("cannot encode nodes.{column}: {err}")))
}

fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["trees", "nodes"] {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
