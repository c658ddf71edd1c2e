//! Required-property schemas for every resource type the stacks emit.

use strata_graph::{GraphResult, ResourceSchema, SchemaRegistry};

const REQUIRED: &[(&str, &[&str])] = &[
    ("AWS::KMS::Key", &["KeyPolicy"]),
    ("AWS::KMS::Alias", &["AliasName", "TargetKeyId"]),
    ("AWS::Logs::LogGroup", &[]),
    ("AWS::DynamoDB::Table", &["KeySchema"]),
    ("AWS::IAM::Role", &["AssumeRolePolicyDocument"]),
    ("AWS::IAM::Policy", &["PolicyDocument", "PolicyName"]),
    ("AWS::IAM::InstanceProfile", &["Roles"]),
    ("AWS::Lambda::Function", &["Code", "Role"]),
    ("AWS::Lambda::Permission", &["Action", "FunctionName", "Principal"]),
    ("AWS::ApiGateway::RestApi", &[]),
    ("AWS::ApiGateway::Account", &[]),
    ("AWS::ApiGateway::Resource", &["ParentId", "PathPart", "RestApiId"]),
    ("AWS::ApiGateway::Method", &["HttpMethod", "ResourceId", "RestApiId"]),
    ("AWS::ApiGateway::Deployment", &["RestApiId"]),
    ("AWS::ApiGateway::Stage", &["RestApiId"]),
    ("AWS::EC2::VPC", &[]),
    ("AWS::EC2::FlowLog", &["ResourceId", "ResourceType"]),
    ("AWS::EC2::InternetGateway", &[]),
    ("AWS::EC2::VPCGatewayAttachment", &["VpcId"]),
    ("AWS::EC2::Subnet", &["VpcId"]),
    ("AWS::EC2::RouteTable", &["VpcId"]),
    ("AWS::EC2::SubnetRouteTableAssociation", &["RouteTableId", "SubnetId"]),
    ("AWS::EC2::Route", &["RouteTableId"]),
    ("AWS::EC2::EIP", &[]),
    ("AWS::EC2::NatGateway", &["SubnetId"]),
    ("AWS::EC2::SecurityGroup", &["GroupDescription"]),
    ("AWS::ElasticLoadBalancingV2::LoadBalancer", &[]),
    ("AWS::ElasticLoadBalancingV2::TargetGroup", &[]),
    ("AWS::ElasticLoadBalancingV2::Listener", &["DefaultActions", "LoadBalancerArn"]),
    (
        "AWS::ElasticLoadBalancingV2::ListenerRule",
        &["Actions", "Conditions", "ListenerArn", "Priority"],
    ),
    ("AWS::SecretsManager::Secret", &[]),
    ("AWS::SecretsManager::SecretTargetAttachment", &["SecretId", "TargetId", "TargetType"]),
    ("AWS::RDS::DBSubnetGroup", &["DBSubnetGroupDescription", "SubnetIds"]),
    ("AWS::RDS::DBCluster", &["Engine"]),
    ("AWS::RDS::DBInstance", &["DBInstanceClass"]),
    ("AWS::AutoScaling::LaunchConfiguration", &["ImageId", "InstanceType"]),
    ("AWS::AutoScaling::AutoScalingGroup", &["MaxSize", "MinSize"]),
];

/// A registry covering every resource type of the serverless and traditional stacks.
pub fn aws_schemas() -> GraphResult<SchemaRegistry> {
    let mut registry = SchemaRegistry::new();
    for (resource_type, required) in REQUIRED {
        registry.register(ResourceSchema::requiring(*resource_type, required)?);
    }
    Ok(registry)
}
