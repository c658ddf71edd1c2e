//! Traditional three-tier stack: load balancer, autoscaled instances and an
//! Aurora cluster inside a dedicated VPC.
//!
//! The VPC is spread over `max_azs` availability zones with one public
//! (load balancer), one private (application) and one isolated (database)
//! subnet in each. Subnet CIDRs are carved from the VPC block with
//! `Fn::Cidr`, so the address plan is resolved at deploy time.

use std::fs;

use serde_json::{json, Value};
use strata_graph::{
    properties_from_json, Output, Properties, PropertyValue, RemovalPolicy, ResourceHandle, Stack,
    StackBuilder,
};
use tracing::{debug, info};

use crate::common::{account_root_key_policy, allow, assume_role_policy, name_tag, policy_document};
use crate::config::TraditionalConfig;
use crate::error::{StacksError, StacksResult};

const DESCRIPTION: &str = "Load balanced autoscaling group backed by an encrypted Aurora cluster";

/// Latest Amazon Linux image, resolved from the public SSM parameter at deploy time.
pub const DEFAULT_IMAGE_ID: &str =
    "{{resolve:ssm:/aws/service/ami-amazon-linux-latest/amzn-ami-hvm-x86_64-gp2}}";

/// User data used when no script is configured. `Fn::Sub` fills in the
/// database endpoint and secret name.
pub const DEFAULT_USERDATA: &str = r#"#!/bin/bash -xe
yum update -y
yum install -y httpd jq mysql
REGION=$(curl -s http://169.254.169.254/latest/meta-data/placement/region)
SECRET=$(aws secretsmanager get-secret-value --region $REGION --secret-id ${__SECRETNAME__} --query SecretString --output text)
DB_USER=$(echo $SECRET | jq -r .username)
DB_PASSWORD=$(echo $SECRET | jq -r .password)
cat > /etc/app.env <<EOF
DB_HOST=${__RDS_HOST__}
DB_USER=$DB_USER
DB_PASSWORD=$DB_PASSWORD
EOF
mkdir -p /var/www/html/elb
echo "OK" > /var/www/html/elb/index.html
echo "<h1>Hello from $(hostname -f)</h1>" > /var/www/html/index.html
systemctl enable httpd
systemctl start httpd
"#;

const LISTENER_PORT: u32 = 80;
const LISTENER_PROTOCOL: &str = "HTTP";
const MATCHER_HTTP_CODE: &str = "200-299";
const DATABASE_PORT: u32 = 3306;
const SECRET_EXCLUDED_CHARACTERS: &str = "\"@/\\";

const FLOW_LOG_ACTIONS: &[&str] = &[
    "logs:CreateLogStream",
    "logs:PutLogEvents",
    "logs:DescribeLogStreams",
];

const INSTANCE_ACTIONS: &[&str] = &[
    "secretsmanager:GetSecretValue",
    "kms:Decrypt",
    "kms:Encrypt",
    "kms:ReEncrypt*",
    "kms:GenerateDataKey*",
];

/// Subnet tiers, in the order their CIDR blocks are allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Public,
    Private,
    Isolated,
}

impl Tier {
    const ALL: [Tier; 3] = [Tier::Public, Tier::Private, Tier::Isolated];

    fn hint(&self) -> &'static str {
        match self {
            Tier::Public => "VPCLoadBalancerSubnet",
            Tier::Private => "VPCApplicationSubnet",
            Tier::Isolated => "VPCDatabaseSubnet",
        }
    }

    fn offset(&self) -> u32 {
        match self {
            Tier::Public => 0,
            Tier::Private => 1,
            Tier::Isolated => 2,
        }
    }
}

struct Network {
    vpc: ResourceHandle,
    public: Vec<ResourceHandle>,
    private: Vec<ResourceHandle>,
    isolated: Vec<ResourceHandle>,
    /// Public default routes; the load balancer waits for them.
    public_routes: Vec<ResourceHandle>,
}

impl Network {
    fn refs(subnets: &[ResourceHandle]) -> Vec<PropertyValue> {
        subnets.iter().map(ResourceHandle::ref_value).collect()
    }
}

/// Declare the traditional stack described by `config`.
pub fn build_traditional_stack(config: &TraditionalConfig) -> StacksResult<Stack> {
    config.validate()?;
    let subnet_count = config.subnet_count()?;
    let cidr_bits = subnet_cidr_bits(&config.vpc_cidr, subnet_count)?;
    let userdata = load_userdata(config)?;

    let mut builder = StackBuilder::new(&config.stack_name).with_description(DESCRIPTION);

    let key = builder.declare(
        "AWS::KMS::Key",
        "TraditionalStackKmsKey",
        properties_from_json(json!({
            "EnableKeyRotation": true,
            "KeyPolicy": account_root_key_policy(),
        })),
    );
    builder.apply_removal_policy(&key, RemovalPolicy::Destroy)?;
    builder.declare(
        "AWS::KMS::Alias",
        "TraditionalStackKmsKeyAlias",
        properties_from_json(json!({
            "AliasName": "alias/TraditionalStackKmsKey",
            "TargetKeyId": key.get_att("Arn"),
        })),
    );

    let network = add_network(&mut builder, config, subnet_count, cidr_bits)?;
    let [alb_sg, ec2_sg, rds_sg] = add_security_groups(&mut builder, &network);

    let load_balancer = builder.declare(
        "AWS::ElasticLoadBalancingV2::LoadBalancer",
        "LoadBalancer",
        properties_from_json(json!({
            "Scheme": config.lb_scheme,
            "SecurityGroups": [alb_sg.get_att("GroupId")],
            "Subnets": Network::refs(&network.public),
            "Type": "application",
        })),
    );
    for route in &network.public_routes {
        builder.add_dependency(&load_balancer, route.logical_id())?;
    }

    let target_group = builder.declare(
        "AWS::ElasticLoadBalancingV2::TargetGroup",
        "LBDefaultTargetGroup",
        properties_from_json(json!({
            "HealthCheckPath": config.elb_health_check_path,
            "Matcher": { "HttpCode": MATCHER_HTTP_CODE },
            "Port": LISTENER_PORT,
            "Protocol": LISTENER_PROTOCOL,
            "VpcId": network.vpc.ref_value(),
        })),
    );

    let secret = builder.declare(
        "AWS::SecretsManager::Secret",
        "TemplatedRDSSecret",
        properties_from_json(json!({
            "Name": config.rds_secret_name,
            "KmsKeyId": key.get_att("Arn"),
            "GenerateSecretString": {
                "SecretStringTemplate": json!({ "username": config.rds_username }).to_string(),
                "GenerateStringKey": config.rds_password_key,
                "PasswordLength": config.rds_password_length,
                "ExcludeCharacters": SECRET_EXCLUDED_CHARACTERS,
            },
        })),
    );
    builder.apply_removal_policy(&secret, RemovalPolicy::Destroy)?;

    let cluster = add_database(&mut builder, config, &network, &key, &secret, &rds_sg)?;

    let role = builder.declare(
        "AWS::IAM::Role",
        "EC2IAMRole",
        properties_from_json(json!({
            "AssumeRolePolicyDocument": assume_role_policy("ec2.amazonaws.com"),
        })),
    );
    let role_policy = builder.declare(
        "AWS::IAM::Policy",
        "EC2IAMRoleDefaultPolicy",
        properties_from_json(json!({
            "PolicyName": "EC2IAMRoleDefaultPolicy",
            "PolicyDocument": policy_document(vec![allow(
                INSTANCE_ACTIONS,
                PropertyValue::list([secret.ref_value(), key.get_att("Arn")]),
            )]),
            "Roles": [role.ref_value()],
        })),
    );
    let profile = builder.declare(
        "AWS::IAM::InstanceProfile",
        "InstanceProfile",
        properties_from_json(json!({ "Roles": [role.ref_value()] })),
    );

    let mut variables = Properties::new();
    variables.insert("__RDS_HOST__".to_string(), cluster.get_att("Endpoint.Address"));
    variables.insert(
        "__SECRETNAME__".to_string(),
        PropertyValue::string(&config.rds_secret_name),
    );
    for (name, value) in &config.userdata_variables {
        variables.insert(name.clone(), PropertyValue::string(value));
    }

    let launch_config = builder.declare(
        "AWS::AutoScaling::LaunchConfiguration",
        "LaunchConfig",
        properties_from_json(json!({
            "ImageId": config.image_id.as_deref().unwrap_or(DEFAULT_IMAGE_ID),
            "InstanceType": config.instance_type,
            "IamInstanceProfile": profile.get_att("Arn"),
            "SecurityGroups": [ec2_sg.get_att("GroupId")],
            "UserData": PropertyValue::base64(PropertyValue::sub(userdata, variables)),
        })),
    );
    builder.add_dependency(&launch_config, network.vpc.logical_id())?;
    builder.add_dependency(&launch_config, role_policy.logical_id())?;

    builder.declare(
        "AWS::AutoScaling::AutoScalingGroup",
        "AutoScalingGroup",
        properties_from_json(json!({
            "MinSize": config.asg_min_size.to_string(),
            "MaxSize": config.asg_max_size.to_string(),
            "DesiredCapacity": config.asg_desired_size.to_string(),
            "LaunchConfigurationName": launch_config.ref_value(),
            "VPCZoneIdentifier": Network::refs(&network.private),
            "TargetGroupARNs": [target_group.ref_value()],
        })),
    );

    let listener = builder.declare(
        "AWS::ElasticLoadBalancingV2::Listener",
        "HTTPDefaultListener",
        properties_from_json(json!({
            "DefaultActions": [forward_to(&target_group)],
            "LoadBalancerArn": load_balancer.ref_value(),
            "Port": LISTENER_PORT,
            "Protocol": LISTENER_PROTOCOL,
        })),
    );

    builder.declare(
        "AWS::ElasticLoadBalancingV2::ListenerRule",
        "LBDefaultListenerRule",
        properties_from_json(json!({
            "ListenerArn": listener.ref_value(),
            "Priority": 1,
            "Actions": [forward_to(&target_group)],
            "Conditions": [{ "Field": "path-pattern", "Values": ["*"] }],
        })),
    );

    builder.add_output(
        "ApiOutput",
        Output::new(PropertyValue::join(
            "",
            [PropertyValue::string("http://"), load_balancer.get_att("DNSName")],
        ))
        .description("Load balancer URL"),
    )?;

    let stack = builder.build();
    info!("Declared traditional stack {} ({} resources)", stack.name(), stack.len());
    Ok(stack)
}

fn forward_to(target_group: &ResourceHandle) -> Value {
    json!({ "TargetGroupArn": target_group.ref_value(), "Type": "forward" })
}

fn load_userdata(config: &TraditionalConfig) -> StacksResult<String> {
    match &config.userdata {
        Some(path) => {
            debug!("Reading user data from {:?}", path);
            fs::read_to_string(path).map_err(|e| {
                StacksError::InvalidConfig(format!("cannot read userdata {:?}: {}", path, e))
            })
        }
        None => Ok(DEFAULT_USERDATA.to_string()),
    }
}

/// Host bits per subnet when `count` equal subnets are carved from `vpc_cidr`.
pub fn subnet_cidr_bits(vpc_cidr: &str, count: u32) -> StacksResult<u32> {
    let prefix = vpc_cidr
        .split_once('/')
        .and_then(|(_, prefix)| prefix.parse::<u32>().ok())
        .filter(|prefix| *prefix <= 32)
        .ok_or_else(|| StacksError::InvalidConfig(format!("vpc_cidr '{}' is not a CIDR block", vpc_cidr)))?;

    let split_bits = count.max(1).next_power_of_two().trailing_zeros();
    let host_bits = 32u32.saturating_sub(prefix + split_bits).min(8);
    // Smallest subnet a VPC accepts is /28.
    if host_bits < 4 {
        return Err(StacksError::InvalidConfig(format!(
            "vpc_cidr '{}' is too small for {} subnets",
            vpc_cidr, count
        )));
    }
    Ok(host_bits)
}

fn add_network(
    builder: &mut StackBuilder,
    config: &TraditionalConfig,
    subnet_count: u32,
    cidr_bits: u32,
) -> StacksResult<Network> {

    let log_group = builder.declare(
        "AWS::Logs::LogGroup",
        "VPCFlowLogs",
        properties_from_json(json!({ "RetentionInDays": 731 })),
    );
    builder.apply_removal_policy(&log_group, RemovalPolicy::Destroy)?;

    let flow_role = builder.declare(
        "AWS::IAM::Role",
        "VpcFlowLogRole",
        properties_from_json(json!({
            "AssumeRolePolicyDocument": assume_role_policy("vpc-flow-logs.amazonaws.com"),
        })),
    );
    builder.declare(
        "AWS::IAM::Policy",
        "VpcFlowLogRoleDefaultPolicy",
        properties_from_json(json!({
            "PolicyName": "VpcFlowLogRoleDefaultPolicy",
            "PolicyDocument": policy_document(vec![
                allow(FLOW_LOG_ACTIONS, log_group.get_att("Arn")),
                allow(&["iam:PassRole"], flow_role.get_att("Arn")),
            ]),
            "Roles": [flow_role.ref_value()],
        })),
    );

    let vpc = builder.declare(
        "AWS::EC2::VPC",
        "VPC",
        properties_from_json(json!({
            "CidrBlock": config.vpc_cidr,
            "EnableDnsHostnames": true,
            "EnableDnsSupport": true,
            "InstanceTenancy": "default",
            "Tags": name_tag(&format!("{}/VPC", config.stack_name)),
        })),
    );

    builder.declare(
        "AWS::EC2::FlowLog",
        "VPCFlowLog",
        properties_from_json(json!({
            "ResourceId": vpc.ref_value(),
            "ResourceType": "VPC",
            "TrafficType": "ALL",
            "DeliverLogsPermissionArn": flow_role.get_att("Arn"),
            "LogDestinationType": "cloud-watch-logs",
            "LogGroupName": log_group.ref_value(),
        })),
    );

    let gateway = builder.declare(
        "AWS::EC2::InternetGateway",
        "VPCIGW",
        properties_from_json(json!({ "Tags": name_tag(&format!("{}/VPC", config.stack_name)) })),
    );
    let attachment = builder.declare(
        "AWS::EC2::VPCGatewayAttachment",
        "VPCGatewayAttachment",
        properties_from_json(json!({
            "VpcId": vpc.ref_value(),
            "InternetGatewayId": gateway.ref_value(),
        })),
    );

    let mut network = Network {
        vpc,
        public: Vec::new(),
        private: Vec::new(),
        isolated: Vec::new(),
        public_routes: Vec::new(),
    };
    let mut nat_gateways = Vec::new();

    for tier in Tier::ALL {
        for az in 0..config.max_azs {
            let index = tier.offset() * config.max_azs + az;
            let hint = format!("{}{}", tier.hint(), az + 1);
            let subnet = builder.declare(
                "AWS::EC2::Subnet",
                &hint,
                properties_from_json(json!({
                    "VpcId": network.vpc.ref_value(),
                    "AvailabilityZone": PropertyValue::select(az, PropertyValue::get_azs()),
                    "CidrBlock": PropertyValue::select(
                        index,
                        PropertyValue::cidr(network.vpc.get_att("CidrBlock"), subnet_count, cidr_bits),
                    ),
                    "MapPublicIpOnLaunch": false,
                    "Tags": name_tag(&format!("{}/{}", config.stack_name, hint)),
                })),
            );

            let route_table = builder.declare(
                "AWS::EC2::RouteTable",
                &format!("{}RouteTable", hint),
                properties_from_json(json!({
                    "VpcId": network.vpc.ref_value(),
                    "Tags": name_tag(&format!("{}/{}", config.stack_name, hint)),
                })),
            );
            builder.declare(
                "AWS::EC2::SubnetRouteTableAssociation",
                &format!("{}RouteTableAssociation", hint),
                properties_from_json(json!({
                    "RouteTableId": route_table.ref_value(),
                    "SubnetId": subnet.ref_value(),
                })),
            );

            match tier {
                Tier::Public => {
                    let route = builder.declare(
                        "AWS::EC2::Route",
                        &format!("{}DefaultRoute", hint),
                        properties_from_json(json!({
                            "RouteTableId": route_table.ref_value(),
                            "DestinationCidrBlock": "0.0.0.0/0",
                            "GatewayId": gateway.ref_value(),
                        })),
                    );
                    builder.add_dependency(&route, attachment.logical_id())?;

                    let eip = builder.declare(
                        "AWS::EC2::EIP",
                        &format!("{}EIP", hint),
                        properties_from_json(json!({ "Domain": "vpc" })),
                    );
                    let nat = builder.declare(
                        "AWS::EC2::NatGateway",
                        &format!("{}NATGateway", hint),
                        properties_from_json(json!({
                            "SubnetId": subnet.ref_value(),
                            "AllocationId": eip.get_att("AllocationId"),
                        })),
                    );
                    nat_gateways.push(nat);
                    network.public_routes.push(route);
                    network.public.push(subnet);
                }
                Tier::Private => {
                    let nat = &nat_gateways[az as usize];
                    builder.declare(
                        "AWS::EC2::Route",
                        &format!("{}DefaultRoute", hint),
                        properties_from_json(json!({
                            "RouteTableId": route_table.ref_value(),
                            "DestinationCidrBlock": "0.0.0.0/0",
                            "NatGatewayId": nat.ref_value(),
                        })),
                    );
                    network.private.push(subnet);
                }
                Tier::Isolated => network.isolated.push(subnet),
            }
        }
    }

    debug!(
        "Declared VPC with {} subnets over {} availability zones",
        subnet_count, config.max_azs
    );
    Ok(network)
}

fn cidr_rule(peer: PropertyValue, port: Option<u32>, description: &str) -> Value {
    let (from, to) = port.map_or((0, 65535), |p| (p, p));
    json!({
        "CidrIp": peer,
        "IpProtocol": "tcp",
        "FromPort": from,
        "ToPort": to,
        "Description": description,
    })
}

fn cidr_of(subnet: &ResourceHandle) -> PropertyValue {
    subnet.get_att("CidrBlock")
}

/// Load balancer, instance and database security groups, in that order.
fn add_security_groups(builder: &mut StackBuilder, network: &Network) -> [ResourceHandle; 3] {
    let any = || PropertyValue::string("0.0.0.0/0");

    let mut alb_egress: Vec<Value> = network
        .private
        .iter()
        .map(|s| cidr_rule(cidr_of(s), Some(80), "to application subnet:80"))
        .collect();
    alb_egress.push(cidr_rule(any(), Some(443), "to 0.0.0.0/0:443"));
    let alb = builder.declare(
        "AWS::EC2::SecurityGroup",
        "ALBSecurityGroup",
        properties_from_json(json!({
            "GroupDescription": "Load balancer security group",
            "VpcId": network.vpc.ref_value(),
            "SecurityGroupIngress": [
                cidr_rule(any(), Some(80), "from 0.0.0.0/0:80"),
                cidr_rule(any(), Some(443), "from 0.0.0.0/0:443"),
            ],
            "SecurityGroupEgress": alb_egress,
        })),
    );

    let ec2_ingress: Vec<Value> = network
        .public
        .iter()
        .map(|s| cidr_rule(cidr_of(s), Some(80), "from load balancer subnet:80"))
        .collect();
    let mut ec2_egress: Vec<Value> = network
        .isolated
        .iter()
        .map(|s| cidr_rule(cidr_of(s), Some(DATABASE_PORT), "to database subnet:3306"))
        .collect();
    ec2_egress.push(cidr_rule(any(), Some(443), "to 0.0.0.0/0:443"));
    let ec2 = builder.declare(
        "AWS::EC2::SecurityGroup",
        "EC2SecurityGroup",
        properties_from_json(json!({
            "GroupDescription": "Application instance security group",
            "VpcId": network.vpc.ref_value(),
            "SecurityGroupIngress": ec2_ingress,
            "SecurityGroupEgress": ec2_egress,
        })),
    );

    let rds_ingress: Vec<Value> = network
        .private
        .iter()
        .map(|s| cidr_rule(cidr_of(s), Some(DATABASE_PORT), "from application subnet:3306"))
        .collect();
    let rds_egress: Vec<Value> = network
        .private
        .iter()
        .map(|s| cidr_rule(cidr_of(s), None, "to application subnet:all tcp"))
        .collect();
    let rds = builder.declare(
        "AWS::EC2::SecurityGroup",
        "RDSSecurityGroup",
        properties_from_json(json!({
            "GroupDescription": "Database security group",
            "VpcId": network.vpc.ref_value(),
            "SecurityGroupIngress": rds_ingress,
            "SecurityGroupEgress": rds_egress,
        })),
    );

    [alb, ec2, rds]
}

fn secret_field(secret: &ResourceHandle, field: &str) -> PropertyValue {
    PropertyValue::join(
        "",
        [
            PropertyValue::string("{{resolve:secretsmanager:"),
            secret.ref_value(),
            PropertyValue::string(format!(":SecretString:{}::}}}}", field)),
        ],
    )
}

fn add_database(
    builder: &mut StackBuilder,
    config: &TraditionalConfig,
    network: &Network,
    key: &ResourceHandle,
    secret: &ResourceHandle,
    security_group: &ResourceHandle,
) -> StacksResult<ResourceHandle> {
    let subnet_group = builder.declare(
        "AWS::RDS::DBSubnetGroup",
        "RDSDBClusterSubnets",
        properties_from_json(json!({
            "DBSubnetGroupDescription": "Isolated subnets for the database cluster",
            "SubnetIds": Network::refs(&network.isolated),
        })),
    );

    let cluster = builder.declare(
        "AWS::RDS::DBCluster",
        "RDSDBCluster",
        properties_from_json(json!({
            "Engine": config.rds_engine,
            "EngineVersion": config.rds_engine_version,
            "DBSubnetGroupName": subnet_group.ref_value(),
            "VpcSecurityGroupIds": [security_group.get_att("GroupId")],
            "StorageEncrypted": true,
            "KmsKeyId": key.get_att("Arn"),
            "BackupRetentionPeriod": config.rds_backup_retention_days,
            "MasterUsername": secret_field(secret, "username"),
            "MasterUserPassword": secret_field(secret, &config.rds_password_key),
        })),
    );
    builder.apply_removal_policy(&cluster, RemovalPolicy::Snapshot)?;

    for n in 1..=config.rds_instances {
        let instance = builder.declare(
            "AWS::RDS::DBInstance",
            &format!("RDSDBClusterInstance{}", n),
            properties_from_json(json!({
                "DBClusterIdentifier": cluster.ref_value(),
                "DBInstanceClass": config.rds_instance_type,
                "DBSubnetGroupName": subnet_group.ref_value(),
                "Engine": config.rds_engine,
                "PubliclyAccessible": false,
            })),
        );
        builder.apply_removal_policy(&instance, RemovalPolicy::Snapshot)?;
    }

    builder.declare(
        "AWS::SecretsManager::SecretTargetAttachment",
        "TemplatedRDSSecretAttachment",
        properties_from_json(json!({
            "SecretId": secret.ref_value(),
            "TargetId": cluster.ref_value(),
            "TargetType": "AWS::RDS::DBCluster",
        })),
    );

    Ok(cluster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn stack() -> Stack {
        build_traditional_stack(&TraditionalConfig::new("t3.micro")).unwrap()
    }

    fn only<'a>(stack: &'a Stack, resource_type: &str) -> &'a str {
        let nodes = stack.find_by_type(resource_type);
        assert_eq!(nodes.len(), 1, "{}", resource_type);
        &nodes[0].logical_id
    }

    #[test]
    fn test_subnets_per_tier_and_az() {
        let stack = stack();
        assert_eq!(stack.find_by_type("AWS::EC2::Subnet").len(), 6);
        assert_eq!(stack.find_by_type("AWS::EC2::NatGateway").len(), 2);
        assert_eq!(stack.find_by_type("AWS::RDS::DBInstance").len(), 2);
        assert_eq!(stack.ids_with_hint("VPCDatabaseSubnet2").len(), 1);
    }

    #[test]
    fn test_three_azs() {
        let config = TraditionalConfig::new("t3.micro").with_max_azs(3);
        let stack = build_traditional_stack(&config).unwrap();
        assert_eq!(stack.find_by_type("AWS::EC2::Subnet").len(), 9);
    }

    #[test]
    fn test_emission_order() {
        let stack = stack();
        let doc = stack.emit().unwrap();
        let at = |resource_type: &str| doc.position(only(&stack, resource_type)).unwrap();

        assert!(at("AWS::EC2::VPC") < at("AWS::AutoScaling::LaunchConfiguration"));
        assert!(at("AWS::RDS::DBCluster") < at("AWS::AutoScaling::LaunchConfiguration"));
        assert!(at("AWS::AutoScaling::LaunchConfiguration") < at("AWS::AutoScaling::AutoScalingGroup"));
        assert!(at("AWS::ElasticLoadBalancingV2::Listener") < at("AWS::ElasticLoadBalancingV2::ListenerRule"));

        let attachment = doc.position(only(&stack, "AWS::EC2::VPCGatewayAttachment")).unwrap();
        let routes = stack.ids_with_hint("VPCLoadBalancerSubnet1DefaultRoute");
        assert_eq!(routes.len(), 1);
        assert!(attachment < doc.position(routes[0]).unwrap());
    }

    #[test]
    fn test_launch_configuration_userdata() {
        let stack = stack();
        let template = stack.emit().unwrap().to_template();
        let launch = only(&stack, "AWS::AutoScaling::LaunchConfiguration");
        let cluster = only(&stack, "AWS::RDS::DBCluster");

        let props = &template["Resources"][launch]["Properties"];
        assert_eq!(props["ImageId"], json!(DEFAULT_IMAGE_ID));
        assert_eq!(
            props["UserData"]["Fn::Base64"]["Fn::Sub"][1]["__RDS_HOST__"],
            json!({ "Fn::GetAtt": [cluster, "Endpoint.Address"] })
        );
        assert_eq!(
            props["UserData"]["Fn::Base64"]["Fn::Sub"][1]["__SECRETNAME__"],
            json!("RDSDBSecret")
        );
        let vpc = only(&stack, "AWS::EC2::VPC");
        assert!(template["Resources"][launch]["DependsOn"]
            .as_array()
            .unwrap()
            .contains(&json!(vpc)));
    }

    #[test]
    fn test_custom_userdata_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "#!/bin/bash\necho ${{GREETING}}").unwrap();
        let mut config = TraditionalConfig::new("t3.micro").with_userdata(file.path());
        config
            .userdata_variables
            .insert("GREETING".to_string(), "hello".to_string());

        let stack = build_traditional_stack(&config).unwrap();
        let template = stack.emit().unwrap().to_template();
        let launch = only(&stack, "AWS::AutoScaling::LaunchConfiguration");
        let sub = &template["Resources"][launch]["Properties"]["UserData"]["Fn::Base64"]["Fn::Sub"];
        assert_eq!(sub[0], json!("#!/bin/bash\necho ${GREETING}\n"));
        assert_eq!(sub[1]["GREETING"], json!("hello"));
    }

    #[test]
    fn test_missing_userdata_file() {
        let config = TraditionalConfig::new("t3.micro").with_userdata("/nonexistent/userdata.sh");
        assert!(matches!(
            build_traditional_stack(&config),
            Err(StacksError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_cluster_credentials_from_secret() {
        let stack = stack();
        let template = stack.emit().unwrap().to_template();
        let cluster = only(&stack, "AWS::RDS::DBCluster");
        let secret = only(&stack, "AWS::SecretsManager::Secret");

        assert_eq!(
            template["Resources"][cluster]["Properties"]["MasterUsername"],
            json!({ "Fn::Join": ["", [
                "{{resolve:secretsmanager:",
                { "Ref": secret },
                ":SecretString:username::}}"
            ]] })
        );
        assert_eq!(template["Resources"][cluster]["DeletionPolicy"], json!("Snapshot"));
    }

    #[test]
    fn test_output_uses_load_balancer_dns() {
        let stack = stack();
        let lb = only(&stack, "AWS::ElasticLoadBalancingV2::LoadBalancer");
        let template = stack.emit().unwrap().to_template();
        assert_eq!(
            template["Outputs"]["ApiOutput"]["Value"],
            json!({ "Fn::Join": ["", ["http://", { "Fn::GetAtt": [lb, "DNSName"] }]] })
        );
    }

    #[test]
    fn test_oversized_max_azs_rejected() {
        let config = TraditionalConfig::new("t3.micro").with_max_azs(1_431_655_766);
        assert!(matches!(
            build_traditional_stack(&config),
            Err(StacksError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_subnet_cidr_bits() {
        assert_eq!(subnet_cidr_bits("10.0.0.0/16", 6).unwrap(), 8);
        assert_eq!(subnet_cidr_bits("10.0.0.0/24", 6).unwrap(), 5);
        assert!(subnet_cidr_bits("10.0.0.0/27", 6).is_err());
        assert!(subnet_cidr_bits("10.0.0.0", 6).is_err());
    }
}
