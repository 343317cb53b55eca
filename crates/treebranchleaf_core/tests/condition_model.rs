use serde_json::json;
use treebranchleaf_core::condition::expr::{
    ensure_group_opt, BinaryOp, Combinator, Expr, ExprEditError, OperandSide, ValueRef,
};
use treebranchleaf_core::condition::set::{ActionKind, ConditionConfig, ConditionSet, EvalMode};
use treebranchleaf_core::condition::token::{classify_token, scan_tokens};
use uuid::Uuid;

#[test]
fn builds_nested_expression_by_path() {
    let mut root = ensure_group_opt(None);
    root.add_clause(&[]).unwrap();
    root.add_group(&[]).unwrap();
    root.add_clause(&[1]).unwrap();
    root.add_clause(&[1, 0]).unwrap();

    root.toggle_combinator(&[1]).unwrap();
    root.set_operand(&[0], OperandSide::Left, Some(classify_token("@width")))
        .unwrap();
    root.set_operand(&[0], OperandSide::Right, Some(classify_token("12.5")))
        .unwrap();

    match root.expr_at(&[1]).unwrap() {
        Expr::Group {
            combinator,
            children,
            ..
        } => {
            assert_eq!(*combinator, Combinator::Or);
            assert_eq!(children.len(), 2);
        }
        other => panic!("expected group, got {other:?}"),
    }
    assert!(!root.is_complete());
    assert_eq!(root.referenced_tokens(), vec!["@width".to_string()]);

    let removed = root.remove_child(&[1], 0).unwrap();
    assert!(!removed.is_group());
    root.remove_child(&[1], 0).unwrap();
    assert!(root.expr_at(&[1]).unwrap().is_group());
}

#[test]
fn editing_errors_name_the_failing_path() {
    let mut root = Expr::group();
    root.add_clause(&[]).unwrap();

    assert_eq!(
        root.remove_child(&[], 4),
        Err(ExprEditError::IndexOutOfRange { index: 4, len: 1 })
    );
    assert_eq!(
        root.toggle_combinator(&[0]),
        Err(ExprEditError::NotAGroup(vec![0]))
    );
    assert_eq!(
        root.expr_at(&[3, 1]).map(|_| ()),
        Err(ExprEditError::PathNotFound(vec![3]))
    );

    root.set_operator(&[0], BinaryOp::IsEmpty).unwrap();
    assert_eq!(
        root.set_operand(
            &[0],
            OperandSide::Right,
            Some(ValueRef::Const { value: json!(1) })
        ),
        Err(ExprEditError::UnaryOperand(BinaryOp::IsEmpty))
    );
}

#[test]
fn expression_wire_shape() {
    let node_id = Uuid::new_v4();
    let mut root = Expr::group();
    if let Expr::Group { children, .. } = &mut root {
        children.push(Expr::clause(
            BinaryOp::In,
            classify_token(&format!("@select.{node_id}.red")),
            Some(ValueRef::Const {
                value: json!(["red", "blue"]),
            }),
        ));
    }

    let value = serde_json::to_value(&root).unwrap();
    assert_eq!(value["type"], "group");
    assert_eq!(value["bool"], "AND");
    let clause = &value["children"][0];
    assert_eq!(clause["type"], "binary");
    assert_eq!(clause["op"], "in");
    assert_eq!(clause["left"]["kind"], "nodeOption");
    assert_eq!(clause["left"]["nodeId"], node_id.to_string());
    assert_eq!(clause["left"]["option"], "red");

    let back: Expr = serde_json::from_value(value).unwrap();
    assert_eq!(back, root);
}

#[test]
fn classifies_tokens_by_prefix() {
    assert_eq!(
        classify_token("@value.abc"),
        ValueRef::NodeValue {
            node_id: "abc".to_string()
        }
    );
    assert_eq!(
        classify_token("@select.abc"),
        ValueRef::NodeOption {
            node_id: "abc".to_string(),
            option: None
        }
    );
    assert_eq!(
        classify_token("#premium"),
        ValueRef::Marker {
            tag: "premium".to_string()
        }
    );
    assert_eq!(
        classify_token("true"),
        ValueRef::Const { value: json!(true) }
    );
    assert_eq!(
        classify_token("slate"),
        ValueRef::Const {
            value: json!("slate")
        }
    );
}

#[test]
fn scans_tokens_from_free_text() {
    let text = "Show when @value.n1 is set and #vip, or @discount. Again @value.n1";
    assert_eq!(
        scan_tokens(text),
        vec![
            "@value.n1".to_string(),
            "#vip".to_string(),
            "@discount".to_string()
        ]
    );
    assert!(scan_tokens("no references here").is_empty());
}

#[test]
fn condition_set_editing_and_serialization() {
    let node_id = Uuid::new_v4();
    let target = Uuid::new_v4();
    let mut set = ConditionSet::empty(node_id);
    set.set_mode(EvalMode::All);

    let first = set.add_branch(Some("Flat roof".to_string()));
    let second = set.add_branch(None);
    set.move_branch(1, 0).unwrap();
    assert_eq!(set.branches[0].id, second);

    let action_id = set
        .branch_mut(&first)
        .unwrap()
        .add_action(ActionKind::Show {
            node_ids: vec![target],
        });
    set.ensure_fallback().add_action(ActionKind::GotoNode { target_id: target });
    assert_eq!(set.referenced_node_ids(), vec![target]);

    let removed = set.branch_mut(&first).unwrap().remove_action(&action_id).unwrap();
    assert_eq!(removed.id, action_id);
    assert!(matches!(
        set.remove_branch("missing"),
        Err(ExprEditError::BranchNotFound(_))
    ));

    let value = serde_json::to_value(ConditionConfig::Set(set.clone())).unwrap();
    assert_eq!(value["id"], format!("cond_{node_id}"));
    assert_eq!(value["mode"], "all");
    assert_eq!(value["fallback"]["label"], "ELSE");
    assert_eq!(value["fallback"]["actions"][0]["type"], "GOTO_NODE");

    let back: ConditionConfig = serde_json::from_value(value).unwrap();
    assert_eq!(back.as_set(), Some(&set));
    let cleared: ConditionConfig = serde_json::from_value(json!({})).unwrap();
    assert!(cleared.is_cleared());
}
