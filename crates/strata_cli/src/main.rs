//! strata CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments or configuration
//! - 3: Validation failure
//! - 5: Graph error (cycles, unresolved references, bad overrides)

use std::process::ExitCode;

use clap::Parser;
use strata_graph::GraphError;
use strata_stacks::StacksError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const GRAPH_ERROR: u8 = 5;
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Synth(args) => commands::synth::execute(args),
        Commands::Graph(args) => commands::graph::execute(args),
        Commands::List(args) => commands::list::execute(args),
        Commands::Validate(args) => commands::validate::execute(args),
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Logs go to stderr so rendered templates on stdout stay clean.
fn init_logging(verbose: bool, quiet: bool) {
    let default = if verbose {
        "strata=debug,warn"
    } else if quiet {
        "warn"
    } else {
        "strata=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A subscriber installed earlier (e.g. by a test harness) stays in place.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

fn categorize_graph_error(e: &GraphError) -> u8 {
    match e {
        GraphError::SchemaViolation { .. } => ExitCodes::VALIDATION_FAILURE,
        GraphError::UnknownFormat(_) => ExitCodes::INVALID_ARGS,
        _ => ExitCodes::GRAPH_ERROR,
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(graph) = cause.downcast_ref::<GraphError>() {
            return categorize_graph_error(graph);
        }
        if let Some(stacks) = cause.downcast_ref::<StacksError>() {
            return match stacks {
                StacksError::Graph(graph) => categorize_graph_error(graph),
                StacksError::Io(_) => ExitCodes::GENERAL_ERROR,
                _ => ExitCodes::INVALID_ARGS,
            };
        }
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("validation") {
        ExitCodes::VALIDATION_FAILURE
    } else if msg.contains("argument") || msg.contains("not found") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}
