//! Optional schema validation of resource properties.
//!
//! Overrides are never validated when applied. A [`SchemaRegistry`] can be
//! handed to the [`Emitter`](crate::Emitter) or run over a stack to check
//! property bags against per-type JSON Schemas before anything is rendered.

use std::collections::HashMap;

use jsonschema::JSONSchema;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{GraphError, GraphResult};
use crate::node::ResourceNode;
use crate::stack::Stack;
use crate::value::PropertyValue;

/// Validation report with details.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// A compiled schema for one resource type.
pub struct ResourceSchema {
    resource_type: String,
    compiled: JSONSchema,
}

impl ResourceSchema {
    /// Compile `schema` for `resource_type`.
    pub fn new(resource_type: impl Into<String>, schema: &Value) -> GraphResult<Self> {
        let resource_type = resource_type.into();
        let compiled = JSONSchema::compile(schema).map_err(|e| GraphError::InvalidSchema {
            resource_type: resource_type.clone(),
            message: e.to_string(),
        })?;
        Ok(Self {
            resource_type,
            compiled,
        })
    }

    /// A schema that only demands the given properties be present.
    pub fn requiring(resource_type: impl Into<String>, required: &[&str]) -> GraphResult<Self> {
        let mut schema = serde_json::json!({ "type": "object" });
        if !required.is_empty() {
            schema["required"] = serde_json::json!(required);
        }
        Self::new(resource_type, &schema)
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Violations of this schema by `node`'s properties, empty when valid.
    pub fn violations(&self, node: &ResourceNode) -> Vec<String> {
        let instance = PropertyValue::Map(node.properties.clone()).to_json();
        let messages = match self.compiled.validate(&instance) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{}: {}", path, e)
                    }
                })
                .collect(),
        };
        messages
    }
}

/// Schemas keyed by resource type.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, ResourceSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    /// Register a schema. A schema already registered for the same type is replaced.
    pub fn register(&mut self, schema: ResourceSchema) {
        debug!("Registering schema for {}", schema.resource_type);
        self.schemas.insert(schema.resource_type.clone(), schema);
    }

    pub fn get(&self, resource_type: &str) -> Option<&ResourceSchema> {
        self.schemas.get(resource_type)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Fail with [`GraphError::SchemaViolation`] if `node` breaks its type's schema.
    /// Types without a schema pass.
    pub fn check_node(&self, node: &ResourceNode) -> GraphResult<()> {
        let Some(schema) = self.get(&node.resource_type) else {
            return Ok(());
        };
        let messages = schema.violations(node);
        if messages.is_empty() {
            Ok(())
        } else {
            Err(GraphError::SchemaViolation {
                logical_id: node.logical_id.clone(),
                resource_type: node.resource_type.clone(),
                messages,
            })
        }
    }

    /// Check every node of `stack`, collecting all problems.
    pub fn validate_stack(&self, stack: &Stack) -> ValidationReport {
        let mut report = ValidationReport::new();
        for node in stack.nodes() {
            match self.get(&node.resource_type) {
                Some(schema) => {
                    for message in schema.violations(node) {
                        report.add_error(format!("{} ({}): {}", node.logical_id, node.resource_type, message));
                    }
                }
                None => {
                    warn!("No schema registered for {}", node.resource_type);
                    report.add_warning(format!(
                        "{}: no schema registered for {}",
                        node.logical_id, node.resource_type
                    ));
                }
            }
        }
        report
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("schemas", &self.schemas.keys().collect::<Vec<_>>())
            .finish()
    }
}
