//! Error types for the stack library.

use thiserror::Error;

/// Result type alias for stack operations.
pub type StacksResult<T> = Result<T, StacksError>;

/// Errors that can occur while loading configuration or building stacks.
#[derive(Error, Debug)]
pub enum StacksError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Graph error: {0}")]
    Graph(#[from] strata_graph::GraphError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
