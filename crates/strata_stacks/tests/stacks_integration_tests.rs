//! Integration tests for the stack library.

use std::fs;

use serde_json::json;
use tempfile::tempdir;

use strata_graph::{Emitter, GraphError, OverridePatch, TemplateFormat};
use strata_stacks::{
    aws_schemas, synthesize, synthesize_with_overrides, OverrideFile, StackConfig, StacksError,
};

#[test]
fn test_serverless_from_yaml_with_overrides() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("serverless.yaml");
    fs::write(
        &config_path,
        r#"
kind: serverless
stack_name: ServerlessStack-v2
ddb_table_name: v2-DynamoDBTable
ddb_partition_key: v2ItemId
lambda_handler: override-lambda-function.lambda_handler
lambda_env_variables:
  DYNAMODB_TABLE_NAME: v2-DynamoDBTable
  PARTITION_KEY: v2ItemId
"#,
    )
    .unwrap();

    let config = StackConfig::from_file(&config_path).unwrap();
    let stack = synthesize(&config).unwrap();
    let function = stack.find_by_type("AWS::Lambda::Function")[0].logical_id.clone();

    let overrides_path = dir.path().join("overrides.yaml");
    fs::write(
        &overrides_path,
        format!(
            r#"
- target: {function}
  path: Properties.Environment.Variables.STAGE
  value: qa
- target: {function}
  path: [Properties, MemorySize]
  value: 512
"#
        ),
    )
    .unwrap();
    let patches = OverrideFile::from_file(&overrides_path).unwrap().patches;
    let stack = synthesize_with_overrides(&config, &patches).unwrap();

    let template = stack.emit().unwrap().to_template();
    let props = &template["Resources"][&function]["Properties"];
    assert_eq!(
        props["Environment"]["Variables"],
        json!({
            "DYNAMODB_TABLE_NAME": "v2-DynamoDBTable",
            "PARTITION_KEY": "v2ItemId",
            "STAGE": "qa"
        })
    );
    assert_eq!(props["MemorySize"], json!(512));
    assert_eq!(props["Handler"], json!("override-lambda-function.lambda_handler"));
}

#[test]
fn test_traditional_from_toml() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("traditional.toml");
    fs::write(
        &path,
        r#"
kind = "traditional"
instance_type = "t3.small"
asg_max_size = 4
asg_desired_size = 2
"#,
    )
    .unwrap();

    let config = StackConfig::from_file(&path).unwrap();
    let stack = synthesize(&config).unwrap();
    let asg = stack.find_by_type("AWS::AutoScaling::AutoScalingGroup")[0];

    assert_eq!(asg.property("MaxSize").and_then(|v| v.as_str()), Some("4"));
    assert_eq!(asg.property("DesiredCapacity").and_then(|v| v.as_str()), Some("2"));
}

#[test]
fn test_traditional_without_instance_type_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("traditional.yaml");
    fs::write(&path, "kind: traditional\n").unwrap();

    assert!(matches!(
        StackConfig::from_file(&path),
        Err(StacksError::InvalidConfig(_))
    ));
}

#[test]
fn test_override_on_unknown_target_fails() {
    let config = StackConfig::Serverless(Default::default());
    let patch = OverridePatch::property("NoSuchResource", ["Name"], "x");

    let err = synthesize_with_overrides(&config, &[patch]).unwrap_err();
    assert!(matches!(
        err,
        StacksError::Graph(GraphError::UnknownTarget(ref target)) if target == "NoSuchResource"
    ));
}

#[test]
fn test_both_stacks_pass_schema_validation() {
    let emitter = Emitter::new().with_schemas(aws_schemas().unwrap());
    for config in [
        StackConfig::Serverless(Default::default()),
        StackConfig::Traditional(strata_stacks::TraditionalConfig::new("t3.micro")),
    ] {
        let stack = synthesize(&config).unwrap();
        let doc = emitter.emit(&stack).unwrap();
        assert_eq!(doc.resources.len(), stack.len());
    }
}

#[test]
fn test_override_removing_required_property_fails_strict_emission() {
    let config = StackConfig::Serverless(Default::default());
    let stack = synthesize(&config).unwrap();
    let method = stack.find_by_type("AWS::ApiGateway::Method")[0].logical_id.clone();
    let mut stack = stack;
    stack
        .apply_override(&OverridePatch::new(method.as_str(), ["Properties"], json!({})))
        .unwrap();

    let err = Emitter::new()
        .with_schemas(aws_schemas().unwrap())
        .emit(&stack)
        .unwrap_err();
    assert!(matches!(err, GraphError::SchemaViolation { logical_id, .. } if logical_id == method));
}

#[test]
fn test_rendered_yaml_is_stable() {
    let config = StackConfig::Traditional(strata_stacks::TraditionalConfig::new("t3.micro"));
    let first = synthesize(&config).unwrap().emit().unwrap().render(TemplateFormat::Yaml).unwrap();
    let second = synthesize(&config).unwrap().emit().unwrap().render(TemplateFormat::Yaml).unwrap();
    assert_eq!(first, second);
}
