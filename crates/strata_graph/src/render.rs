//! CloudFormation rendering of emitted documents.

use serde_json::{Map, Value};

use crate::emitter::SerializedDocument;
use crate::error::{GraphError, GraphResult};

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Output format of a rendered template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemplateFormat {
    #[default]
    Json,
    Yaml,
}

impl TemplateFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateFormat::Json => "json",
            TemplateFormat::Yaml => "yaml",
        }
    }
}

impl std::str::FromStr for TemplateFormat {
    type Err = GraphError;

    fn from_str(s: &str) -> GraphResult<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(TemplateFormat::Json),
            "yaml" | "yml" => Ok(TemplateFormat::Yaml),
            _ => Err(GraphError::UnknownFormat(s.to_string())),
        }
    }
}

impl std::fmt::Display for TemplateFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl SerializedDocument {
    /// The template as a JSON value, resources in emission order.
    pub fn to_template(&self) -> Value {
        let mut template = Map::new();
        template.insert(
            "AWSTemplateFormatVersion".to_string(),
            Value::String(TEMPLATE_FORMAT_VERSION.to_string()),
        );
        if let Some(description) = &self.description {
            template.insert("Description".to_string(), Value::String(description.clone()));
        }

        let mut resources = Map::new();
        for resource in &self.resources {
            let mut entry = Map::new();
            entry.insert("Type".to_string(), Value::String(resource.resource_type.clone()));
            if !resource.properties.is_empty() {
                let properties = resource
                    .properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                entry.insert("Properties".to_string(), Value::Object(properties));
            }
            if !resource.depends_on.is_empty() {
                entry.insert(
                    "DependsOn".to_string(),
                    Value::Array(resource.depends_on.iter().cloned().map(Value::String).collect()),
                );
            }
            for (name, value) in &resource.attributes {
                entry.insert(name.clone(), value.to_json());
            }
            resources.insert(resource.logical_id.clone(), Value::Object(entry));
        }
        template.insert("Resources".to_string(), Value::Object(resources));

        if !self.outputs.is_empty() {
            let mut outputs = Map::new();
            for (name, output) in &self.outputs {
                let mut entry = Map::new();
                if let Some(description) = &output.description {
                    entry.insert("Description".to_string(), Value::String(description.clone()));
                }
                entry.insert("Value".to_string(), output.value.to_json());
                if let Some(export_name) = &output.export_name {
                    entry.insert(
                        "Export".to_string(),
                        serde_json::json!({ "Name": export_name }),
                    );
                }
                outputs.insert(name.clone(), Value::Object(entry));
            }
            template.insert("Outputs".to_string(), Value::Object(outputs));
        }

        Value::Object(template)
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json(&self) -> GraphResult<String> {
        let mut rendered = serde_json::to_string_pretty(&self.to_template())?;
        rendered.push('\n');
        Ok(rendered)
    }

    pub fn to_yaml(&self) -> GraphResult<String> {
        Ok(serde_yaml::to_string(&self.to_template())?)
    }

    pub fn render(&self, format: TemplateFormat) -> GraphResult<String> {
        match format {
            TemplateFormat::Json => self.to_json(),
            TemplateFormat::Yaml => self.to_yaml(),
        }
    }
}

/// Parse a rendered template back into JSON, for tooling that inspects output.
pub fn parse_template(rendered: &str, format: TemplateFormat) -> GraphResult<Value> {
    match format {
        TemplateFormat::Json => Ok(serde_json::from_str(rendered)?),
        TemplateFormat::Yaml => serde_yaml::from_str(rendered).map_err(GraphError::from),
    }
}
