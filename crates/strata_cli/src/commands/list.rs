//! List command - Print logical ids for writing overrides.

use anyhow::Result;
use clap::Args;

use super::StackArgs;

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Only list resources of this type, e.g. AWS::Lambda::Function
    #[arg(short = 't', long = "type")]
    pub resource_type: Option<String>,
}

pub fn execute(args: ListArgs) -> Result<()> {
    let stack = args.stack.load_stack()?;

    let width = stack.ids().iter().map(|id| id.len()).max().unwrap_or(0);
    for node in stack.nodes() {
        if args
            .resource_type
            .as_deref()
            .is_some_and(|t| t != node.resource_type)
        {
            continue;
        }
        println!("{:<width$}  {}", node.logical_id, node.resource_type, width = width);
    }

    for name in stack.outputs().keys() {
        println!("{:<width$}  Output", name, width = width);
    }

    Ok(())
}
