//! Integration tests for the resource graph.

use proptest::prelude::*;
use serde_json::json;

use strata_graph::{
    properties_from_json, GraphError, OverridePatch, Properties, PropertyValue, Stack, StackBuilder,
};

fn table_and_function() -> (Stack, String, String) {
    let mut builder = StackBuilder::new("ExampleStack");
    let table = builder.declare("KeyValueTable", "Table", Properties::new());
    let function = builder.declare(
        "Function",
        "Fn",
        properties_from_json(json!({
            "Environment": { "TABLE_NAME": table.get_att("Name") }
        })),
    );
    let ids = (table.logical_id().to_string(), function.logical_id().to_string());
    (builder.build(), ids.0, ids.1)
}

#[test]
fn test_table_emitted_before_function() {
    let (stack, table, function) = table_and_function();

    let doc = stack.emit().unwrap();

    assert!(doc.position(&table).unwrap() < doc.position(&function).unwrap());
    let emitted = doc.resource(&function).unwrap();
    assert_eq!(
        emitted.properties["Environment"].to_json(),
        json!({ "TABLE_NAME": { "Fn::GetAtt": [table, "Name"] } })
    );
}

#[test]
fn test_override_adds_environment_to_node_without_one() {
    let mut builder = StackBuilder::new("ExampleStack");
    builder
        .declare_with_id("Function", "Fn", properties_from_json(json!({ "Handler": "index.handler" })))
        .unwrap();
    let mut stack = builder.build();

    stack
        .apply_override(&OverridePatch::new(
            "Fn",
            ["Properties", "Environment", "STAGE"],
            "qa",
        ))
        .unwrap();

    let template = stack.emit().unwrap().to_template();
    assert_eq!(
        template["Resources"]["Fn"]["Properties"]["Environment"],
        json!({ "STAGE": "qa" })
    );
}

#[test]
fn test_reference_and_depends_on_cycle() {
    let mut builder = StackBuilder::new("Cyclic");
    builder
        .declare_with_id("T", "A", properties_from_json(json!({ "Target": { "Fn::GetAtt": ["B", "Arn"] } })))
        .unwrap();
    let b = builder.declare_with_id("T", "B", Properties::new()).unwrap();
    builder.add_dependency(&b, "A").unwrap();

    let err = builder.build().emit().unwrap_err();
    let members = err.cycle_members();
    assert!(members.contains(&"A".to_string()));
    assert!(members.contains(&"B".to_string()));
}

#[test]
fn test_override_can_break_a_cycle() {
    let mut builder = StackBuilder::new("Cyclic");
    builder
        .declare_with_id("T", "A", properties_from_json(json!({ "Target": { "Ref": "B" } })))
        .unwrap();
    builder
        .declare_with_id("T", "B", properties_from_json(json!({ "Target": { "Ref": "A" } })))
        .unwrap();
    let mut stack = builder.build();
    assert!(matches!(stack.emit(), Err(GraphError::CyclicDependency { .. })));

    stack
        .apply_override(&OverridePatch::property("B", ["Target"], "arn:aws:static"))
        .unwrap();

    assert_eq!(stack.emit().unwrap().order(), vec!["B", "A"]);
}

#[test]
fn test_override_reference_creates_ordering() {
    let mut builder = StackBuilder::new("Late");
    builder.declare_with_id("T", "Consumer", Properties::new()).unwrap();
    builder.declare_with_id("T", "Producer", Properties::new()).unwrap();
    let mut stack = builder.build();

    stack
        .apply_override(&OverridePatch::property(
            "Consumer",
            ["Source"],
            PropertyValue::get_att("Producer", "Arn"),
        ))
        .unwrap();

    assert_eq!(stack.emit().unwrap().order(), vec!["Producer", "Consumer"]);
}

#[test]
fn test_override_file_syntax_reference() {
    let patches: Vec<OverridePatch> = serde_yaml::from_str(
        r#"
- target: Consumer
  path: [Properties, Source]
  value: { "Fn::GetAtt": [Producer, Arn] }
"#,
    )
    .unwrap();

    assert_eq!(patches[0].value, PropertyValue::get_att("Producer", "Arn"));
}

#[test]
fn test_repeated_emission_is_byte_identical() {
    let (stack, _, _) = table_and_function();
    let (again, _, _) = table_and_function();

    assert_eq!(
        stack.emit().unwrap().to_json().unwrap(),
        again.emit().unwrap().to_json().unwrap()
    );
}

fn layered_stack(ranks: &[usize], edges: &[(usize, usize, bool)]) -> Stack {
    let mut builder = StackBuilder::new("Prop");
    let mut handles = Vec::new();
    for &rank in ranks {
        let mut props = Properties::new();
        for (i, &(from, to, as_reference)) in edges.iter().enumerate() {
            if from == rank && to < rank && as_reference {
                props.insert(format!("Ref{i}"), PropertyValue::reference(format!("N{to}")));
            }
        }
        handles.push((rank, builder.declare_with_id("T", &format!("N{rank}"), props).unwrap()));
    }
    for (rank, handle) in &handles {
        for &(from, to, as_reference) in edges {
            if from == *rank && to < *rank && !as_reference {
                builder.add_dependency(handle, &format!("N{to}")).unwrap();
            }
        }
    }
    builder.build()
}

fn ranks_and_edges() -> impl Strategy<Value = (Vec<usize>, Vec<(usize, usize, bool)>)> {
    (1..12usize).prop_flat_map(|n| {
        (
            Just((0..n).collect::<Vec<_>>()).prop_shuffle(),
            proptest::collection::vec((0..n, 0..n, any::<bool>()), 0..30),
        )
    })
}

proptest! {
    #[test]
    fn prop_dependencies_precede_dependents((ranks, edges) in ranks_and_edges()) {
        let stack = layered_stack(&ranks, &edges);
        let doc = stack.emit().unwrap();

        prop_assert_eq!(doc.resources.len(), ranks.len());
        for node in stack.nodes() {
            let at = doc.position(&node.logical_id).unwrap();
            for dependency in node.edges() {
                prop_assert!(doc.position(dependency).unwrap() < at);
            }
        }
    }

    #[test]
    fn prop_emission_is_deterministic((ranks, edges) in ranks_and_edges()) {
        let first = layered_stack(&ranks, &edges).emit().unwrap().to_json().unwrap();
        let second = layered_stack(&ranks, &edges).emit().unwrap().to_json().unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_last_override_wins(first in "[a-z]{1,8}", second in "[a-z]{1,8}") {
        let mut builder = StackBuilder::new("Prop");
        builder.declare_with_id("T", "Node", Properties::new()).unwrap();
        let mut stack = builder.build();

        stack.apply_override(&OverridePatch::property("Node", ["A", "B"], first.as_str())).unwrap();
        stack.apply_override(&OverridePatch::property("Node", ["A", "B"], second.as_str())).unwrap();

        let value = stack.node("Node").unwrap().properties["A"].pointer(&["B"]).cloned();
        prop_assert_eq!(value, Some(PropertyValue::string(second)));
    }

    #[test]
    fn prop_unknown_target_never_mutates(
        target in "[A-Z][a-z]{2,8}",
        path in proptest::collection::vec(
            prop_oneof![Just("Properties".to_string()), Just("Type".to_string()), "[A-Za-z]{1,6}"],
            0..4,
        ),
    ) {
        let (mut stack, _, _) = table_and_function();
        prop_assume!(!stack.contains(&target));
        let before = stack.clone();

        let result = stack.apply_override(&OverridePatch::new(target.as_str(), path, 1u32));

        prop_assert_eq!(result, Err(GraphError::UnknownTarget(target.clone())));
        prop_assert_eq!(stack, before);
    }
}
