//! Serverless stack: REST API in front of a function backed by a table.

use serde_json::json;
use strata_graph::{properties_from_json, Output, PropertyValue, RemovalPolicy, Stack, StackBuilder};
use tracing::info;

use crate::common::{account_root_key_policy, allow, assume_role_policy, policy_document};
use crate::config::ServerlessConfig;
use crate::error::StacksResult;

const DESCRIPTION: &str = "API Gateway REST API backed by a Lambda function and an encrypted DynamoDB table";

const LAMBDA_MANAGED_POLICY: &str = "arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";
const APIGATEWAY_LOGS_POLICY: &str =
    "arn:aws:iam::aws:policy/service-role/AmazonAPIGatewayPushToCloudWatchLogs";

const ACCESS_LOG_FORMAT: &str = concat!(
    "{\"requestId\":\"$context.requestId\",\"ip\":\"$context.identity.sourceIp\",",
    "\"requestTime\":\"$context.requestTime\",\"httpMethod\":\"$context.httpMethod\",",
    "\"resourcePath\":\"$context.resourcePath\",\"status\":\"$context.status\",",
    "\"responseLength\":\"$context.responseLength\"}"
);

const TABLE_ACTIONS: &[&str] = &[
    "dynamodb:BatchGetItem",
    "dynamodb:BatchWriteItem",
    "dynamodb:ConditionCheckItem",
    "dynamodb:DeleteItem",
    "dynamodb:DescribeTable",
    "dynamodb:GetItem",
    "dynamodb:GetRecords",
    "dynamodb:GetShardIterator",
    "dynamodb:PutItem",
    "dynamodb:Query",
    "dynamodb:Scan",
    "dynamodb:UpdateItem",
];

const KEY_ACTIONS: &[&str] = &[
    "kms:Decrypt",
    "kms:DescribeKey",
    "kms:Encrypt",
    "kms:GenerateDataKey*",
    "kms:ReEncrypt*",
];

/// Declare the serverless stack described by `config`.
pub fn build_serverless_stack(config: &ServerlessConfig) -> StacksResult<Stack> {
    config.validate()?;
    let mut builder = StackBuilder::new(&config.stack_name).with_description(DESCRIPTION);

    let key = builder.declare(
        "AWS::KMS::Key",
        "DynamoDbKey",
        properties_from_json(json!({
            "EnableKeyRotation": true,
            "KeyPolicy": account_root_key_policy(),
        })),
    );
    builder.apply_removal_policy(&key, RemovalPolicy::Destroy)?;

    builder.declare(
        "AWS::KMS::Alias",
        "DynamoDbKeyAlias",
        properties_from_json(json!({
            "AliasName": format!("alias/{}-{}", config.stack_name.to_lowercase(), config.ddb_table_name),
            "TargetKeyId": key.get_att("Arn"),
        })),
    );

    let log_group = builder.declare(
        "AWS::Logs::LogGroup",
        "ApiAccessLogs",
        properties_from_json(json!({ "RetentionInDays": 731 })),
    );
    builder.apply_removal_policy(&log_group, RemovalPolicy::Destroy)?;

    let table = builder.declare(
        "AWS::DynamoDB::Table",
        "DynamoDbTable",
        properties_from_json(json!({
            "TableName": config.ddb_table_name,
            "AttributeDefinitions": [{ "AttributeName": config.ddb_partition_key, "AttributeType": "S" }],
            "KeySchema": [{ "AttributeName": config.ddb_partition_key, "KeyType": "HASH" }],
            "ProvisionedThroughput": { "ReadCapacityUnits": 5, "WriteCapacityUnits": 5 },
            "PointInTimeRecoverySpecification": { "PointInTimeRecoveryEnabled": true },
            "SSESpecification": {
                "KMSMasterKeyId": key.get_att("Arn"),
                "SSEEnabled": true,
                "SSEType": "KMS"
            }
        })),
    );
    builder.apply_removal_policy(&table, RemovalPolicy::Destroy)?;

    let role = builder.declare(
        "AWS::IAM::Role",
        "LambdaServiceRole",
        properties_from_json(json!({
            "AssumeRolePolicyDocument": assume_role_policy("lambda.amazonaws.com"),
            "ManagedPolicyArns": [LAMBDA_MANAGED_POLICY],
        })),
    );

    let policy = builder.declare(
        "AWS::IAM::Policy",
        "LambdaServiceRoleDefaultPolicy",
        properties_from_json(json!({
            "PolicyName": "LambdaServiceRoleDefaultPolicy",
            "PolicyDocument": policy_document(vec![
                allow(TABLE_ACTIONS, table.get_att("Arn")),
                allow(KEY_ACTIONS, key.get_att("Arn")),
            ]),
            "Roles": [role.ref_value()],
        })),
    );

    let variables = match &config.lambda_env_variables {
        Some(variables) => json!(variables),
        None => json!({
            "TABLE_NAME": table.ref_value(),
            "PRIMARY_KEY": config.ddb_partition_key,
        }),
    };
    let function = builder.declare(
        "AWS::Lambda::Function",
        "LambdaFunction",
        properties_from_json(json!({
            "Code": { "S3Bucket": config.lambda_code_bucket, "S3Key": config.lambda_code_key },
            "Role": role.get_att("Arn"),
            "Environment": { "Variables": variables },
            "Handler": config.lambda_handler,
            "Runtime": config.lambda_runtime,
        })),
    );
    builder.add_dependency(&function, policy.logical_id())?;
    builder.add_dependency(&function, role.logical_id())?;

    let api = builder.declare(
        "AWS::ApiGateway::RestApi",
        "RestApi",
        properties_from_json(json!({
            "Name": config.rest_api_name,
            "EndpointConfiguration": { "Types": ["REGIONAL"] },
        })),
    );

    let cloudwatch_role = builder.declare(
        "AWS::IAM::Role",
        "RestApiCloudWatchRole",
        properties_from_json(json!({
            "AssumeRolePolicyDocument": assume_role_policy("apigateway.amazonaws.com"),
            "ManagedPolicyArns": [APIGATEWAY_LOGS_POLICY],
        })),
    );
    builder.apply_removal_policy(&cloudwatch_role, RemovalPolicy::Retain)?;

    let account = builder.declare(
        "AWS::ApiGateway::Account",
        "RestApiAccount",
        properties_from_json(json!({ "CloudWatchRoleArn": cloudwatch_role.get_att("Arn") })),
    );
    builder.add_dependency(&account, api.logical_id())?;
    builder.apply_removal_policy(&account, RemovalPolicy::Retain)?;

    let resource = builder.declare(
        "AWS::ApiGateway::Resource",
        &format!("RestApi{}", config.api_path),
        properties_from_json(json!({
            "ParentId": api.get_att("RootResourceId"),
            "PathPart": config.api_path,
            "RestApiId": api.ref_value(),
        })),
    );

    let method = builder.declare(
        "AWS::ApiGateway::Method",
        &format!("RestApi{}GET", config.api_path),
        properties_from_json(json!({
            "HttpMethod": "GET",
            "ResourceId": resource.ref_value(),
            "RestApiId": api.ref_value(),
            "AuthorizationType": "NONE",
            "Integration": {
                "IntegrationHttpMethod": "POST",
                "Type": "AWS_PROXY",
                "Uri": PropertyValue::join("", [
                    PropertyValue::string("arn:"),
                    PropertyValue::partition(),
                    PropertyValue::string(":apigateway:"),
                    PropertyValue::region(),
                    PropertyValue::string(":lambda:path/2015-03-31/functions/"),
                    function.get_att("Arn"),
                    PropertyValue::string("/invocations"),
                ]),
            },
        })),
    );

    let deployment = builder.declare(
        "AWS::ApiGateway::Deployment",
        "RestApiDeployment",
        properties_from_json(json!({
            "RestApiId": api.ref_value(),
            "Description": "Automatically created by strata",
        })),
    );
    builder.add_dependency(&deployment, method.logical_id())?;
    builder.add_dependency(&deployment, resource.logical_id())?;

    let stage = builder.declare(
        "AWS::ApiGateway::Stage",
        &format!("RestApiDeploymentStage{}", config.stage_name),
        properties_from_json(json!({
            "RestApiId": api.ref_value(),
            "DeploymentId": deployment.ref_value(),
            "StageName": config.stage_name,
            "AccessLogSetting": {
                "DestinationArn": log_group.get_att("Arn"),
                "Format": ACCESS_LOG_FORMAT,
            },
        })),
    );
    builder.add_dependency(&stage, account.logical_id())?;

    builder.declare(
        "AWS::Lambda::Permission",
        &format!("RestApi{}GETPermission", config.api_path),
        properties_from_json(json!({
            "Action": "lambda:InvokeFunction",
            "FunctionName": function.get_att("Arn"),
            "Principal": "apigateway.amazonaws.com",
            "SourceArn": PropertyValue::join("", [
                PropertyValue::string("arn:"),
                PropertyValue::partition(),
                PropertyValue::string(":execute-api:"),
                PropertyValue::region(),
                PropertyValue::string(":"),
                PropertyValue::account_id(),
                PropertyValue::string(":"),
                api.ref_value(),
                PropertyValue::string("/"),
                stage.ref_value(),
                PropertyValue::string(format!("/GET/{}", config.api_path)),
            ]),
        })),
    );

    builder.add_output(
        "Api",
        Output::new(PropertyValue::join("", [
            PropertyValue::string("https://"),
            api.ref_value(),
            PropertyValue::string(".execute-api."),
            PropertyValue::region(),
            PropertyValue::string(".amazonaws.com/"),
            stage.ref_value(),
            PropertyValue::string(format!("/{}", config.api_path)),
        ]))
        .description("Invoke URL of the REST API"),
    )?;

    let stack = builder.build();
    info!("Declared serverless stack {} ({} resources)", stack.name(), stack.len());
    Ok(stack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn template(config: &ServerlessConfig) -> Value {
        build_serverless_stack(config).unwrap().emit().unwrap().to_template()
    }

    fn id_of<'a>(stack: &'a Stack, resource_type: &str) -> &'a str {
        &stack.find_by_type(resource_type)[0].logical_id
    }

    #[test]
    fn test_declares_expected_resources() {
        let stack = build_serverless_stack(&ServerlessConfig::default()).unwrap();

        for resource_type in [
            "AWS::KMS::Key",
            "AWS::KMS::Alias",
            "AWS::Logs::LogGroup",
            "AWS::DynamoDB::Table",
            "AWS::IAM::Policy",
            "AWS::Lambda::Function",
            "AWS::ApiGateway::RestApi",
            "AWS::ApiGateway::Account",
            "AWS::ApiGateway::Resource",
            "AWS::ApiGateway::Method",
            "AWS::ApiGateway::Deployment",
            "AWS::ApiGateway::Stage",
            "AWS::Lambda::Permission",
        ] {
            assert_eq!(stack.find_by_type(resource_type).len(), 1, "{}", resource_type);
        }
        assert_eq!(stack.find_by_type("AWS::IAM::Role").len(), 2);
        assert!(stack.output("Api").is_some());
    }

    #[test]
    fn test_table_precedes_function() {
        let stack = build_serverless_stack(&ServerlessConfig::default()).unwrap();
        let doc = stack.emit().unwrap();

        let table = id_of(&stack, "AWS::DynamoDB::Table");
        let function = id_of(&stack, "AWS::Lambda::Function");
        let stage = id_of(&stack, "AWS::ApiGateway::Stage");
        let permission = id_of(&stack, "AWS::Lambda::Permission");
        assert!(doc.position(table).unwrap() < doc.position(function).unwrap());
        assert!(doc.position(stage).unwrap() < doc.position(permission).unwrap());
    }

    #[test]
    fn test_default_environment_references_table() {
        let config = ServerlessConfig::default();
        let stack = build_serverless_stack(&config).unwrap();
        let table = id_of(&stack, "AWS::DynamoDB::Table").to_string();
        let function = id_of(&stack, "AWS::Lambda::Function").to_string();

        let template = template(&config);
        assert_eq!(
            template["Resources"][&function]["Properties"]["Environment"]["Variables"],
            json!({ "TABLE_NAME": { "Ref": table }, "PRIMARY_KEY": "itemId" })
        );
    }

    #[test]
    fn test_custom_environment_replaces_defaults() {
        let config = ServerlessConfig::default().with_env_variable("MODE", "test");
        let stack = build_serverless_stack(&config).unwrap();
        let function = id_of(&stack, "AWS::Lambda::Function").to_string();

        let template = template(&config);
        assert_eq!(
            template["Resources"][&function]["Properties"]["Environment"]["Variables"],
            json!({ "MODE": "test" })
        );
    }

    #[test]
    fn test_environment_may_reference_stack_resources() {
        let defaults = build_serverless_stack(&ServerlessConfig::default()).unwrap();
        let table = id_of(&defaults, "AWS::DynamoDB::Table").to_string();
        let config = ServerlessConfig::default()
            .with_env_variable("MODE", "test")
            .with_env_variable("TABLE_ARN", PropertyValue::get_att(table.as_str(), "Arn"));
        let stack = build_serverless_stack(&config).unwrap();
        let function = id_of(&stack, "AWS::Lambda::Function").to_string();

        assert!(stack.node(&function).unwrap().edges().contains(table.as_str()));
        let template = template(&config);
        assert_eq!(
            template["Resources"][&function]["Properties"]["Environment"]["Variables"],
            json!({ "MODE": "test", "TABLE_ARN": { "Fn::GetAtt": [table, "Arn"] } })
        );
    }

    #[test]
    fn test_configured_stage_is_used() {
        let mut config = ServerlessConfig::default();
        config.stage_name = "qa".to_string();
        let stack = build_serverless_stack(&config).unwrap();
        let stage = id_of(&stack, "AWS::ApiGateway::Stage").to_string();

        let template = template(&config);
        assert_eq!(template["Resources"][&stage]["Properties"]["StageName"], json!("qa"));
    }

    #[test]
    fn test_ids_stable_across_builds() {
        let first = build_serverless_stack(&ServerlessConfig::default()).unwrap();
        let second = build_serverless_stack(&ServerlessConfig::default()).unwrap();
        assert_eq!(first.ids(), second.ids());
    }

    #[test]
    fn test_invalid_api_path_rejected() {
        let config = ServerlessConfig::default().with_api("rest-api", "a/b");
        assert!(build_serverless_stack(&config).is_err());
    }
}
