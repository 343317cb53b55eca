use treebranchleaf_core::capability::{
    activate, deactivate, deactivation_patch, is_config_empty, parse_capability,
    supported_capability_strings, CapabilityError,
};
use treebranchleaf_core::condition::expr::{BinaryOp, Expr, ValueRef};
use treebranchleaf_core::{
    CapabilityKind, MemoryNodeRepository, NewNode, Node, NodeType, TreeService, TreeServiceError,
};
use uuid::Uuid;

#[test]
fn condition_activation_cycle_resets_config() {
    let mut node = Node::new(Uuid::new_v4(), NodeType::LeafOption, "Pitched");
    assert!(!node.capabilities.has_condition);

    activate(&mut node, CapabilityKind::Condition);
    assert!(node.capabilities.has_condition);
    let value = serde_json::to_value(&node.config.condition_config).unwrap();
    assert_eq!(value["branches"], serde_json::json!([]));

    let set = node.condition_set_mut().unwrap();
    let branch_id = set.add_branch(None);
    let when = set.branch_mut(&branch_id).unwrap().when_group_mut();
    when.add_clause(&[]).unwrap();
    assert_eq!(node.condition_set().unwrap().branches.len(), 1);

    deactivate(&mut node, CapabilityKind::Condition);
    assert!(!node.capabilities.has_condition);
    assert!(node.config.condition_config.is_cleared());
    assert_eq!(
        serde_json::to_value(&node.config.condition_config).unwrap(),
        serde_json::json!({})
    );
}

#[test]
fn every_capability_maps_to_its_flag_name() {
    let mut node = Node::new(Uuid::new_v4(), NodeType::Branch, "Roof");
    for capability in CapabilityKind::ALL {
        activate(&mut node, capability);
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value[capability.flag_name()], true, "{capability}");
        assert!(is_config_empty(&node, capability));
    }
    assert_eq!(node.capabilities.active(), CapabilityKind::ALL.to_vec());
}

#[test]
fn deactivation_patch_only_touches_its_capability() {
    let mut node = Node::new(Uuid::new_v4(), NodeType::LeafField, "Width");
    activate(&mut node, CapabilityKind::Markers);
    activate(&mut node, CapabilityKind::Formula);
    node.config.markers.push("metric".to_string());
    node.config
        .formula_config
        .insert("expression".to_string(), serde_json::json!("@value.a * 2"));

    deactivation_patch(CapabilityKind::Markers).apply_to(&mut node);
    assert!(node.config.markers.is_empty());
    assert!(node.capabilities.has_formula);
    assert!(!node.config.formula_config.is_empty());
}

#[test]
fn parses_capability_strings() {
    for value in supported_capability_strings() {
        assert_eq!(parse_capability(value).unwrap().as_str(), *value);
    }
    assert_eq!(parse_capability(" api ").unwrap(), CapabilityKind::Api);
    assert_eq!(parse_capability("  "), Err(CapabilityError::EmptyCapability));
    assert_eq!(
        parse_capability("repeater"),
        Err(CapabilityError::UnsupportedCapability("repeater".to_string()))
    );
}

#[test]
fn service_toggles_capabilities_and_saves_conditions() {
    let service = TreeService::new(MemoryNodeRepository::new());
    let tree = service.create_tree(Uuid::new_v4(), "Form", None).unwrap();
    let branch = service
        .create_node(tree.id, NewNode::new(NodeType::Branch, "Main", None))
        .unwrap();

    let mut set = treebranchleaf_core::ConditionSet::empty(branch.id);
    let branch_id = set.add_branch(Some("Has width".to_string()));
    set.branch_mut(&branch_id)
        .unwrap()
        .when_group_mut()
        .add_clause(&[])
        .unwrap();
    if let Some(Expr::Group { children, .. }) = set.branches[0].when.as_mut() {
        children.push(Expr::clause(
            BinaryOp::IsNotEmpty,
            ValueRef::Variable {
                key: "width".to_string(),
            },
            None,
        ));
    }

    let err = service
        .save_condition_set(tree.id, branch.id, set.clone())
        .unwrap_err();
    assert!(matches!(
        err,
        TreeServiceError::CapabilityInactive {
            capability: CapabilityKind::Condition,
            ..
        }
    ));

    let toggled = service
        .set_capability(tree.id, branch.id, CapabilityKind::Condition, true)
        .unwrap();
    assert!(toggled.capabilities.has_condition);

    let saved = service.save_condition_set(tree.id, branch.id, set).unwrap();
    assert_eq!(saved.condition_set().unwrap().tokens, vec!["@width".to_string()]);

    let off = service
        .set_capability(tree.id, branch.id, CapabilityKind::Condition, false)
        .unwrap();
    assert!(!off.capabilities.has_condition);
    assert!(off.config.condition_config.is_cleared());
}
