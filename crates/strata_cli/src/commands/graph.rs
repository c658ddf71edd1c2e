//! Graph command - Show emission order and dependencies.

use anyhow::{Context, Result};
use clap::Args;

use super::StackArgs;

#[derive(Args)]
pub struct GraphArgs {
    #[command(flatten)]
    pub stack: StackArgs,
}

pub fn execute(args: GraphArgs) -> Result<()> {
    let stack = args.stack.load_stack()?;
    let document = stack
        .emit()
        .with_context(|| format!("Failed to order stack {}", stack.name()))?;

    println!("📦 {} ({} resources)", stack.name(), document.resources.len());
    for (index, resource) in document.resources.iter().enumerate() {
        println!("{:>4}. {} ({})", index + 1, resource.logical_id, resource.resource_type);
        if let Some(node) = stack.node(&resource.logical_id) {
            for dependency in node.edges() {
                let explicit = node.depends_on.contains(dependency);
                println!(
                    "        └─ {}{}",
                    dependency,
                    if explicit { " (dependsOn)" } else { "" }
                );
            }
        }
    }

    Ok(())
}
