//! Stack configuration and override files.
//!
//! Each stack takes one configuration struct whose fields all have
//! documented defaults, except the traditional stack's `instance_type`.
//! Configuration files may be YAML, TOML or JSON and select the stack
//! with a `kind` field:
//!
//! ```yaml
//! kind: serverless
//! rest_api_name: orders-api
//! ddb_table_name: orders
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strata_graph::{OverridePatch, PropertyValue};
use tracing::debug;

use crate::error::{StacksError, StacksResult};

/// Options of the serverless stack (API gateway + function + table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerlessConfig {
    /// Stack name, also the seed of every generated logical id.
    pub stack_name: String,
    pub rest_api_name: String,
    /// Path part of the single API resource.
    pub api_path: String,
    pub stage_name: String,
    pub ddb_table_name: String,
    pub ddb_partition_key: String,
    pub lambda_handler: String,
    pub lambda_runtime: String,
    /// Bucket holding the function's code bundle.
    pub lambda_code_bucket: String,
    pub lambda_code_key: String,
    /// Replaces the default `TABLE_NAME`/`PRIMARY_KEY` environment when set.
    /// Values may be intrinsics such as `{ Ref: <logical id> }`.
    pub lambda_env_variables: Option<IndexMap<String, PropertyValue>>,
}

impl Default for ServerlessConfig {
    fn default() -> Self {
        Self {
            stack_name: "ServerlessStack".to_string(),
            rest_api_name: "rest-api".to_string(),
            api_path: "mock".to_string(),
            stage_name: "prod".to_string(),
            ddb_table_name: "dynamodb-table".to_string(),
            ddb_partition_key: "itemId".to_string(),
            lambda_handler: "lambda-function.handler".to_string(),
            lambda_runtime: "nodejs16.x".to_string(),
            lambda_code_bucket: "strata-assets".to_string(),
            lambda_code_key: "serverless/lambda.zip".to_string(),
            lambda_env_variables: None,
        }
    }
}

impl ServerlessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stack_name(mut self, name: impl Into<String>) -> Self {
        self.stack_name = name.into();
        self
    }

    pub fn with_table(mut self, name: impl Into<String>, partition_key: impl Into<String>) -> Self {
        self.ddb_table_name = name.into();
        self.ddb_partition_key = partition_key.into();
        self
    }

    pub fn with_handler(mut self, handler: impl Into<String>, runtime: impl Into<String>) -> Self {
        self.lambda_handler = handler.into();
        self.lambda_runtime = runtime.into();
        self
    }

    pub fn with_api(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.rest_api_name = name.into();
        self.api_path = path.into();
        self
    }

    pub fn with_env_variable(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.lambda_env_variables
            .get_or_insert_with(IndexMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn validate(&self) -> StacksResult<()> {
        require_non_empty("stack_name", &self.stack_name)?;
        require_non_empty("ddb_table_name", &self.ddb_table_name)?;
        require_non_empty("ddb_partition_key", &self.ddb_partition_key)?;
        require_non_empty("stage_name", &self.stage_name)?;
        if self.api_path.is_empty() || self.api_path.contains('/') {
            return Err(StacksError::InvalidConfig(format!(
                "api_path must be a single non-empty path part, got '{}'",
                self.api_path
            )));
        }
        Ok(())
    }
}

/// Upper bound on `max_azs`; no region offers more zones.
pub const MAX_AZS: u32 = 6;
const SUBNET_TIERS: u32 = 3;
/// Largest count `Fn::Cidr` accepts.
const MAX_CIDR_COUNT: u32 = 256;

/// Options of the traditional stack (VPC + load balancer + autoscaling + database cluster).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraditionalConfig {
    pub stack_name: String,
    /// EC2 instance type of the application tier. Required.
    pub instance_type: String,
    pub vpc_cidr: String,
    /// Availability zones to spread subnets over.
    pub max_azs: u32,
    pub lb_scheme: String,
    pub elb_health_check_path: String,
    /// AMI id; the latest Amazon Linux image is resolved when unset.
    pub image_id: Option<String>,
    pub asg_min_size: u32,
    pub asg_max_size: u32,
    pub asg_desired_size: u32,
    /// Path to a user data script; a built-in script is used when unset.
    pub userdata: Option<PathBuf>,
    /// Extra `Fn::Sub` variables for the user data script.
    pub userdata_variables: IndexMap<String, String>,
    pub rds_instance_type: String,
    pub rds_engine: String,
    pub rds_engine_version: String,
    pub rds_instances: u32,
    pub rds_secret_name: String,
    pub rds_username: String,
    pub rds_password_key: String,
    pub rds_password_length: u32,
    pub rds_backup_retention_days: u32,
}

impl Default for TraditionalConfig {
    fn default() -> Self {
        Self {
            stack_name: "TraditionalStack".to_string(),
            instance_type: String::new(),
            vpc_cidr: "10.0.0.0/16".to_string(),
            max_azs: 2,
            lb_scheme: "internet-facing".to_string(),
            elb_health_check_path: "/elb".to_string(),
            image_id: None,
            asg_min_size: 1,
            asg_max_size: 1,
            asg_desired_size: 1,
            userdata: None,
            userdata_variables: IndexMap::new(),
            rds_instance_type: "db.t2.small".to_string(),
            rds_engine: "aurora-mysql".to_string(),
            rds_engine_version: "5.7.mysql_aurora.2.08.1".to_string(),
            rds_instances: 2,
            rds_secret_name: "RDSDBSecret".to_string(),
            rds_username: "root".to_string(),
            rds_password_key: "password".to_string(),
            rds_password_length: 16,
            rds_backup_retention_days: 7,
        }
    }
}

impl TraditionalConfig {
    pub fn new(instance_type: impl Into<String>) -> Self {
        Self {
            instance_type: instance_type.into(),
            ..Self::default()
        }
    }

    pub fn with_stack_name(mut self, name: impl Into<String>) -> Self {
        self.stack_name = name.into();
        self
    }

    pub fn with_vpc_cidr(mut self, cidr: impl Into<String>) -> Self {
        self.vpc_cidr = cidr.into();
        self
    }

    pub fn with_max_azs(mut self, max_azs: u32) -> Self {
        self.max_azs = max_azs;
        self
    }

    pub fn with_capacity(mut self, min: u32, desired: u32, max: u32) -> Self {
        self.asg_min_size = min;
        self.asg_desired_size = desired;
        self.asg_max_size = max;
        self
    }

    pub fn with_userdata(mut self, path: impl Into<PathBuf>) -> Self {
        self.userdata = Some(path.into());
        self
    }

    pub fn validate(&self) -> StacksResult<()> {
        require_non_empty("stack_name", &self.stack_name)?;
        require_non_empty("instance_type", &self.instance_type)?;
        require_non_empty("vpc_cidr", &self.vpc_cidr)?;
        if !(1..=MAX_AZS).contains(&self.max_azs) {
            return Err(StacksError::InvalidConfig(format!(
                "max_azs must be between 1 and {}, got {}",
                MAX_AZS, self.max_azs
            )));
        }
        if self.rds_instances == 0 {
            return Err(StacksError::InvalidConfig("rds_instances must be at least 1".to_string()));
        }
        if !(self.asg_min_size <= self.asg_desired_size && self.asg_desired_size <= self.asg_max_size) {
            return Err(StacksError::InvalidConfig(format!(
                "autoscaling sizes must satisfy min <= desired <= max, got {} / {} / {}",
                self.asg_min_size, self.asg_desired_size, self.asg_max_size
            )));
        }
        Ok(())
    }
}

impl TraditionalConfig {
    /// One public, one private and one isolated subnet per availability zone.
    pub fn subnet_count(&self) -> StacksResult<u32> {
        self.max_azs
            .checked_mul(SUBNET_TIERS)
            .filter(|count| *count <= MAX_CIDR_COUNT)
            .ok_or_else(|| {
                StacksError::InvalidConfig(format!("max_azs {} needs too many subnets", self.max_azs))
            })
    }
}

fn require_non_empty(field: &str, value: &str) -> StacksResult<()> {
    if value.trim().is_empty() {
        Err(StacksError::InvalidConfig(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

/// Configuration of any stack this library builds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StackConfig {
    Serverless(ServerlessConfig),
    Traditional(TraditionalConfig),
}

impl StackConfig {
    /// Load configuration from a YAML, TOML or JSON file.
    pub fn from_file(path: &Path) -> StacksResult<Self> {
        let config: StackConfig = read_document(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> StacksResult<()> {
        match self {
            StackConfig::Serverless(config) => config.validate(),
            StackConfig::Traditional(config) => config.validate(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StackConfig::Serverless(_) => "serverless",
            StackConfig::Traditional(_) => "traditional",
        }
    }

    pub fn stack_name(&self) -> &str {
        match self {
            StackConfig::Serverless(config) => &config.stack_name,
            StackConfig::Traditional(config) => &config.stack_name,
        }
    }
}

/// A list of override patches stored in a file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverrideFile {
    pub patches: Vec<OverridePatch>,
}

impl OverrideFile {
    /// Load patches from a YAML or JSON file.
    pub fn from_file(path: &Path) -> StacksResult<Self> {
        let file: OverrideFile = read_document(path)?;
        debug!("Loaded {} overrides from {:?}", file.patches.len(), path);
        Ok(file)
    }

    /// Load and concatenate several files, keeping file order.
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> StacksResult<Vec<OverridePatch>> {
        let mut patches = Vec::new();
        for path in paths {
            patches.extend(Self::from_file(path.as_ref())?.patches);
        }
        Ok(patches)
    }

    /// Save patches as YAML.
    pub fn to_file(&self, path: &Path) -> StacksResult<()> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

fn read_document<T: DeserializeOwned>(path: &Path) -> StacksResult<T> {
    let content = fs::read_to_string(path)?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "yaml" | "yml" => Ok(serde_yaml::from_str(&content)?),
        "toml" => Ok(toml::from_str(&content)?),
        "json" => Ok(serde_json::from_str(&content)?),
        other => Err(StacksError::UnsupportedFormat(format!(
            "{:?} (extension '{}')",
            path, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_serverless_defaults() {
        let config = ServerlessConfig::default();
        assert_eq!(config.rest_api_name, "rest-api");
        assert_eq!(config.api_path, "mock");
        assert_eq!(config.ddb_partition_key, "itemId");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_traditional_requires_instance_type() {
        assert!(TraditionalConfig::default().validate().is_err());
        assert!(TraditionalConfig::new("t3.micro").validate().is_ok());
    }

    #[test]
    fn test_traditional_capacity_order() {
        let config = TraditionalConfig::new("t3.micro").with_capacity(2, 1, 3);
        assert!(matches!(config.validate(), Err(StacksError::InvalidConfig(_))));
    }

    #[test]
    fn test_max_azs_bounds() {
        for max_azs in [0, MAX_AZS + 1, 1_431_655_766] {
            let config = TraditionalConfig::new("t3.micro").with_max_azs(max_azs);
            assert!(matches!(config.validate(), Err(StacksError::InvalidConfig(_))));
        }

        let widest = TraditionalConfig::new("t3.micro").with_max_azs(MAX_AZS);
        assert!(widest.validate().is_ok());
        assert_eq!(widest.subnet_count().unwrap(), 18);

        let overflowing = TraditionalConfig::new("t3.micro").with_max_azs(1_431_655_766);
        assert!(matches!(overflowing.subnet_count(), Err(StacksError::InvalidConfig(_))));
    }

    #[test]
    fn test_yaml_config_with_partial_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stack.yaml");
        fs::write(&path, "kind: serverless\nddb_table_name: orders\n").unwrap();

        let config = StackConfig::from_file(&path).unwrap();
        match config {
            StackConfig::Serverless(config) => {
                assert_eq!(config.ddb_table_name, "orders");
                assert_eq!(config.stage_name, "prod");
            }
            other => panic!("unexpected config: {other:?}"),
        }
    }

    #[test]
    fn test_env_variables_accept_intrinsics() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stack.yaml");
        fs::write(
            &path,
            "kind: serverless\nlambda_env_variables:\n  MODE: test\n  BUCKET:\n    Ref: AssetsBucket\n",
        )
        .unwrap();

        let StackConfig::Serverless(config) = StackConfig::from_file(&path).unwrap() else {
            panic!("expected a serverless config");
        };
        let variables = config.lambda_env_variables.unwrap();
        assert_eq!(variables["MODE"], PropertyValue::from("test"));
        assert_eq!(variables["BUCKET"], PropertyValue::reference("AssetsBucket"));
    }

    #[test]
    fn test_toml_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stack.toml");
        fs::write(&path, "kind = \"traditional\"\ninstance_type = \"t3.small\"\nmax_azs = 3\n").unwrap();

        let config = StackConfig::from_file(&path).unwrap();
        assert_eq!(config.kind(), "traditional");
        match config {
            StackConfig::Traditional(config) => {
                assert_eq!(config.instance_type, "t3.small");
                assert_eq!(config.max_azs, 3);
            }
            other => panic!("unexpected config: {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stack.ini");
        fs::write(&path, "kind=serverless").unwrap();

        assert!(matches!(
            StackConfig::from_file(&path),
            Err(StacksError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_override_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("overrides.yaml");
        let file = OverrideFile {
            patches: vec![OverridePatch::property("Fn", ["Environment", "STAGE"], "qa")],
        };

        file.to_file(&path).unwrap();
        let loaded = OverrideFile::from_file(&path).unwrap();
        assert_eq!(loaded, file);
    }
}
