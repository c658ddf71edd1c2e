//! CLI command definitions.
//!
//! Every command starts from a stack configuration file plus optional
//! override files; see [`StackArgs`].

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use strata_graph::Stack;
use strata_stacks::{OverrideFile, StackConfig};

pub mod graph;
pub mod list;
pub mod synth;
pub mod validate;

/// strata - declarative infrastructure stacks with overridable resource graphs
#[derive(Parser)]
#[command(name = "strata")]
#[command(version, about = "strata - declarative infrastructure stacks with overridable resource graphs")]
#[command(long_about = r#"
strata builds CloudFormation templates from reusable stack definitions.
Any resource property can be patched with override files before the
template is emitted in dependency order.

COMMANDS:
  synth     → Build, override and render a template
  graph     → Show the emission order and each resource's dependencies
  list      → List logical ids and types (targets for overrides)
  validate  → Check every resource against the bundled schemas

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments or configuration
  3 - Validation failure
  5 - Graph error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render the stack as a CloudFormation template
    Synth(synth::SynthArgs),

    /// Print the emission order with dependency edges
    Graph(graph::GraphArgs),

    /// List logical ids and resource types
    List(list::ListArgs),

    /// Validate resources against the bundled schemas
    Validate(validate::ValidateArgs),
}

/// Stack selection shared by all commands.
#[derive(Args, Debug, Clone)]
pub struct StackArgs {
    /// Stack configuration file (YAML, TOML or JSON)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Override file (YAML or JSON list of patches); may be repeated
    #[arg(short = 'o', long = "override")]
    pub overrides: Vec<PathBuf>,
}

impl StackArgs {
    /// Build the configured stack and apply every override file in order.
    pub fn load_stack(&self) -> Result<Stack> {
        let config = StackConfig::from_file(&self.config)
            .with_context(|| format!("Failed to load configuration {:?}", self.config))?;
        let mut stack = strata_stacks::synthesize(&config)?;

        let patches = OverrideFile::from_files(&self.overrides).context("Failed to load overrides")?;
        if !patches.is_empty() {
            info!("Applying {} overrides", patches.len());
            strata_graph::apply_overrides(&mut stack, &patches)?;
        }
        Ok(stack)
    }
}
