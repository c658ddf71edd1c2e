//! Synth command - Render a stack as a template.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use strata_graph::{Emitter, TemplateFormat};
use strata_stacks::aws_schemas;

use super::StackArgs;

#[derive(Args)]
pub struct SynthArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Template format (json or yaml)
    #[arg(short, long, default_value = "json")]
    pub format: String,

    /// Write the template to this file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Check every resource against the bundled schemas while emitting
    #[arg(long)]
    pub strict: bool,
}

pub fn execute(args: SynthArgs) -> Result<()> {
    let format: TemplateFormat = args
        .format
        .parse()
        .with_context(|| format!("Invalid argument --format '{}'", args.format))?;

    let stack = args.stack.load_stack()?;

    let emitter = if args.strict {
        Emitter::new().with_schemas(aws_schemas()?)
    } else {
        Emitter::new()
    };
    let document = emitter
        .emit(&stack)
        .with_context(|| format!("Failed to emit stack {}", stack.name()))?;
    let rendered = document.render(format)?;

    match &args.output {
        Some(path) => {
            fs::write(path, &rendered).with_context(|| format!("Failed to write {:?}", path))?;
            info!("Wrote {} template for {} to {:?}", format, stack.name(), path);
        }
        None => print!("{}", rendered),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn args(dir: &std::path::Path, format: &str) -> SynthArgs {
        let config = dir.join("stack.toml");
        fs::write(&config, "kind = \"serverless\"\nstage_name = \"qa\"\n").unwrap();
        SynthArgs {
            stack: StackArgs {
                config,
                overrides: Vec::new(),
            },
            format: format.to_string(),
            output: Some(dir.join("template.out")),
            strict: true,
        }
    }

    #[test]
    fn test_synth_writes_yaml() {
        let dir = tempdir().unwrap();
        execute(args(dir.path(), "yaml")).unwrap();

        let rendered = fs::read_to_string(dir.path().join("template.out")).unwrap();
        let template = strata_graph::parse_template(&rendered, TemplateFormat::Yaml).unwrap();
        assert_eq!(template["AWSTemplateFormatVersion"], "2010-09-09");
        assert!(rendered.contains("StageName: qa"));
    }

    #[test]
    fn test_synth_rejects_unknown_format() {
        let dir = tempdir().unwrap();
        let err = execute(args(dir.path(), "xml")).unwrap_err();
        assert!(err.to_string().contains("Invalid argument"));
        assert!(format!("{:#}", err).contains("expected json or yaml"));
    }
}
