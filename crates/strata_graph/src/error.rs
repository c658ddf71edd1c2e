//! Error types for the resource graph.

use thiserror::Error;

/// Result type alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors raised while declaring, overriding or emitting a stack.
///
/// None of these are transient: the caller either fixes the declaration
/// or propagates the failure to whatever invoked synthesis.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Duplicate logical id: {0}")]
    DuplicateLogicalId(String),

    #[error("Invalid logical id '{0}': only ASCII letters and digits are allowed")]
    InvalidLogicalId(String),

    #[error("Unknown target: no resource with logical id '{0}'")]
    UnknownTarget(String),

    #[error("Invalid override path {path:?} on '{target}': {reason}")]
    InvalidOverridePath {
        target: String,
        path: Vec<String>,
        reason: String,
    },

    #[error("Cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Unresolved reference from '{source_id}' to missing resource '{target}'")]
    UnresolvedReference { source_id: String, target: String },

    #[error("Unresolved output '{output}': missing resource '{target}'")]
    UnresolvedOutput { output: String, target: String },

    #[error("Duplicate output: {0}")]
    DuplicateOutput(String),

    #[error("Schema violation on '{logical_id}' ({resource_type}): {}", messages.join("; "))]
    SchemaViolation {
        logical_id: String,
        resource_type: String,
        messages: Vec<String>,
    },

    #[error("Invalid schema for {resource_type}: {message}")]
    InvalidSchema {
        resource_type: String,
        message: String,
    },

    #[error("Unknown template format '{0}': expected json or yaml")]
    UnknownFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GraphError {
    /// Logical ids named by a cycle error, empty for every other kind.
    pub fn cycle_members(&self) -> &[String] {
        match self {
            GraphError::CyclicDependency { cycle } => cycle,
            _ => &[],
        }
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for GraphError {
    fn from(err: serde_yaml::Error) -> Self {
        GraphError::Serialization(err.to_string())
    }
}
