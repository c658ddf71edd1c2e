//! # strata_stacks
//!
//! Reusable stack definitions built on [`strata_graph`].
//!
//! - **Serverless**: REST API, Lambda function and an encrypted DynamoDB table
//! - **Traditional**: VPC, load balancer, autoscaling group and an Aurora cluster
//!
//! Every resource of a built stack can still be patched with
//! [`strata_graph::OverridePatch`] before emission, using the logical ids
//! printed by `strata list`.

pub mod config;
pub mod error;
pub mod schemas;
pub mod serverless;
pub mod traditional;

mod common;

pub use config::{OverrideFile, ServerlessConfig, StackConfig, TraditionalConfig};
pub use error::{StacksError, StacksResult};
pub use schemas::aws_schemas;
pub use serverless::build_serverless_stack;
pub use traditional::build_traditional_stack;

use strata_graph::{OverridePatch, Stack};
use tracing::info;

/// Build the stack selected by `config`.
pub fn synthesize(config: &StackConfig) -> StacksResult<Stack> {
    info!("Synthesizing {} stack {}", config.kind(), config.stack_name());
    match config {
        StackConfig::Serverless(config) => build_serverless_stack(config),
        StackConfig::Traditional(config) => build_traditional_stack(config),
    }
}

/// Build the stack selected by `config`, then apply `patches` in order.
pub fn synthesize_with_overrides(config: &StackConfig, patches: &[OverridePatch]) -> StacksResult<Stack> {
    let mut stack = synthesize(config)?;
    strata_graph::apply_overrides(&mut stack, patches)?;
    Ok(stack)
}
