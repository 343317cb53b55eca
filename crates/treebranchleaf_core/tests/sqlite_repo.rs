use treebranchleaf_core::capability::activation_patch;
use treebranchleaf_core::condition::expr::{BinaryOp, Expr, ValueRef};
use treebranchleaf_core::db::{open_db, open_db_in_memory};
use treebranchleaf_core::hierarchy::placement::{DropTarget, MoveRequest};
use treebranchleaf_core::{
    CapabilityKind, ConditionConfig, FieldSubType, NewNode, NewTree, NodePatch, NodeRepository,
    NodeType, RepoError, SqliteNodeRepository, TreeId, TreePatch, TreeService, TreeServiceError,
    TreeStatus,
};
use uuid::Uuid;

fn new_tree(repo: &SqliteNodeRepository<'_>) -> TreeId {
    repo.create_tree(&NewTree {
        organization_id: Uuid::new_v4(),
        name: "Roofing quote".to_string(),
        description: Some("draft".to_string()),
    })
    .unwrap()
    .id
}

#[test]
fn tree_crud_round_trip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNodeRepository::try_new(&conn).unwrap();
    let organization_id = Uuid::new_v4();
    let tree = repo
        .create_tree(&NewTree {
            organization_id,
            name: "Form".to_string(),
            description: None,
        })
        .unwrap();

    let updated = repo
        .update_tree(
            tree.id,
            &TreePatch {
                status: Some(TreeStatus::Published),
                ..TreePatch::default()
            },
        )
        .unwrap();
    assert_eq!(updated.status, TreeStatus::Published);
    assert_eq!(repo.list_trees(organization_id).unwrap(), vec![updated]);

    repo.delete_tree(tree.id).unwrap();
    assert!(repo.list_trees(organization_id).unwrap().is_empty());
    assert!(matches!(
        repo.list_nodes(tree.id),
        Err(RepoError::TreeNotFound(id)) if id == tree.id
    ));
}

#[test]
fn node_config_survives_persistence() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNodeRepository::try_new(&conn).unwrap();
    let tree = new_tree(&repo);
    let branch = repo
        .create_node(tree, &NewNode::new(NodeType::Branch, "Roof", None))
        .unwrap();
    let field = repo
        .create_node(
            tree,
            &NewNode::new(NodeType::LeafField, "Area", Some(branch.id))
                .with_sub_type(FieldSubType::Number),
        )
        .unwrap();

    let mut patch = activation_patch(field.id, CapabilityKind::Condition);
    if let Some(ConditionConfig::Set(set)) = patch.condition_config.as_mut() {
        let branch_id = set.add_branch(Some("Large roof".to_string()));
        let when = set.branch_mut(&branch_id).unwrap().when_group_mut();
        if let Expr::Group { children, .. } = when {
            children.push(Expr::clause(
                BinaryOp::Gt,
                ValueRef::NodeValue {
                    node_id: field.id.to_string(),
                },
                Some(ValueRef::Const {
                    value: serde_json::json!(120),
                }),
            ));
        }
        set.refresh_tokens();
    }
    patch.markers = Some(vec!["roof".to_string()]);
    let updated = repo.update_node(tree, field.id, &patch).unwrap();

    let listed = repo.list_nodes(tree).unwrap();
    let reloaded = listed.iter().find(|node| node.id == field.id).unwrap();
    assert_eq!(reloaded, &updated);
    assert_eq!(reloaded.sub_type, Some(FieldSubType::Number));
    assert!(reloaded.capabilities.has_condition);
    let set = reloaded.condition_set().unwrap();
    assert_eq!(set.id, format!("cond_{}", field.id));
    assert_eq!(set.tokens, vec![format!("@value.{}", field.id)]);
    assert_eq!(set.referenced_node_ids(), vec![field.id]);
}

#[test]
fn corrupt_condition_config_surfaces_as_invalid_data() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNodeRepository::try_new(&conn).unwrap();
    let tree = new_tree(&repo);
    let branch = repo
        .create_node(tree, &NewNode::new(NodeType::Branch, "Roof", None))
        .unwrap();
    repo.update_node(
        tree,
        branch.id,
        &activation_patch(branch.id, CapabilityKind::Condition),
    )
    .unwrap();

    let corrupt = serde_json::json!({
        "id": format!("cond_{}", branch.id),
        "branches": [{
            "id": "b1",
            "when": {"type": "binary", "id": "c1", "op": "bogus"},
            "actions": []
        }]
    });
    conn.execute(
        "UPDATE nodes SET condition_config = ?1 WHERE uuid = ?2",
        rusqlite::params![corrupt.to_string(), branch.id.to_string()],
    )
    .unwrap();

    let err = repo.list_nodes(tree).unwrap_err();
    assert!(
        matches!(&err, RepoError::InvalidData(message) if message.contains("condition_config")),
        "{err}"
    );
}

#[test]
fn move_renumbers_both_sibling_lists() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNodeRepository::try_new(&conn).unwrap();
    let tree = new_tree(&repo);
    let left = repo
        .create_node(tree, &NewNode::new(NodeType::Branch, "Left", None))
        .unwrap();
    let right = repo
        .create_node(tree, &NewNode::new(NodeType::Branch, "Right", None))
        .unwrap();
    let mut leaves = Vec::new();
    for label in ["a", "b", "c"] {
        leaves.push(
            repo.create_node(tree, &NewNode::new(NodeType::LeafOption, label, Some(left.id)))
                .unwrap(),
        );
    }
    let x = repo
        .create_node(tree, &NewNode::new(NodeType::LeafOption, "x", Some(right.id)))
        .unwrap();

    let moved = repo
        .move_node(tree, leaves[1].id, &MoveRequest::before(x.id))
        .unwrap();
    assert_eq!(moved.parent_id, Some(right.id));
    assert_eq!(moved.order, 0);

    let nodes = repo.list_nodes(tree).unwrap();
    let sequence = |parent| {
        nodes
            .iter()
            .filter(|node| node.parent_id == Some(parent))
            .map(|node| (node.label.clone(), node.order))
            .collect::<Vec<_>>()
    };
    assert_eq!(
        sequence(left.id),
        vec![("a".to_string(), 0), ("c".to_string(), 1)]
    );
    assert_eq!(
        sequence(right.id),
        vec![("b".to_string(), 0), ("x".to_string(), 1)]
    );
}

#[test]
fn move_into_own_subtree_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNodeRepository::try_new(&conn).unwrap();
    let tree = new_tree(&repo);
    let outer = repo
        .create_node(tree, &NewNode::new(NodeType::Branch, "Outer", None))
        .unwrap();
    let inner = repo
        .create_node(tree, &NewNode::new(NodeType::Branch, "Inner", Some(outer.id)))
        .unwrap();

    let err = repo
        .move_node(tree, outer.id, &MoveRequest::child_of(Some(inner.id)))
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidMove(_)));
    let reloaded = repo.list_nodes(tree).unwrap();
    assert!(reloaded
        .iter()
        .all(|node| node.id != outer.id || node.parent_id.is_none()));
}

#[test]
fn delete_node_cascades_to_subtree() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNodeRepository::try_new(&conn).unwrap();
    let tree = new_tree(&repo);
    let root = repo
        .create_node(tree, &NewNode::new(NodeType::Branch, "Root", None))
        .unwrap();
    let section = repo
        .create_node(tree, &NewNode::new(NodeType::Section, "Totals", Some(root.id)))
        .unwrap();
    repo.create_node(tree, &NewNode::new(NodeType::LeafField, "Sum", Some(section.id)))
        .unwrap();

    repo.delete_node(tree, section.id).unwrap();
    let remaining = repo.list_nodes(tree).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, root.id);
    assert!(matches!(
        repo.delete_node(tree, section.id),
        Err(RepoError::NodeNotFound(_))
    ));
}

#[test]
fn service_over_file_database_persists_drops() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forms.db");

    let tree_id = {
        let conn = open_db(&path).unwrap();
        let service = TreeService::new(SqliteNodeRepository::try_new(&conn).unwrap());
        let tree = service.create_tree(Uuid::new_v4(), "  Quote ", None).unwrap();
        assert_eq!(tree.name, "Quote");
        let branch = service
            .create_node(tree.id, NewNode::new(NodeType::Branch, "Main", None))
            .unwrap();
        let store = service.load_store(tree.id).unwrap();
        service
            .drop_palette(tree.id, &store, NodeType::LeafField, &DropTarget::child_of(branch.id))
            .unwrap();
        assert!(matches!(
            service.rename_node(tree.id, branch.id, "   "),
            Err(TreeServiceError::InvalidLabel)
        ));
        service
            .update_node(tree.id, branch.id, NodePatch::label(" Main branch "))
            .unwrap();
        tree.id
    };

    let conn = open_db(&path).unwrap();
    let repo = SqliteNodeRepository::try_new(&conn).unwrap();
    let nodes = repo.list_nodes(tree_id).unwrap();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].label, "Main branch");
    assert_eq!(nodes[1].label, "Field");
    assert_eq!(nodes[1].parent_id, Some(nodes[0].id));
}
