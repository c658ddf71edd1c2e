//! Validate command - Check a stack against the bundled schemas.

use anyhow::{bail, Result};
use clap::Args;
use tracing::info;

use strata_stacks::aws_schemas;

use super::StackArgs;

#[derive(Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Skip the dependency ordering check
    #[arg(long)]
    pub skip_graph: bool,
}

pub fn execute(args: ValidateArgs) -> Result<()> {
    let stack = args.stack.load_stack()?;
    info!("Validating stack: {}", stack.name());

    println!("📋 Validating resource properties...");
    let report = aws_schemas()?.validate_stack(&stack);
    if report.valid {
        println!("   ✅ Schema validation passed");
    } else {
        println!("   ❌ Schema validation failed:");
        for error in &report.errors {
            println!("      - {}", error);
        }
    }
    for warning in &report.warnings {
        println!("   ⚠️  {}", warning);
    }

    if !args.skip_graph {
        println!("🔗 Checking dependency graph...");
        let document = stack.emit()?;
        println!("   ✅ {} resources can be emitted in order", document.resources.len());
    }

    println!();
    if !report.valid {
        bail!("Validation failed with {} errors", report.errors.len());
    }
    println!("✅ All validations passed!");

    Ok(())
}
