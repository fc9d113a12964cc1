//! cftemplate CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Template compile errors

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands, CompileFailed};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const COMPILE_ERRORS: u8 = 3;
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    // RUST_LOG wins over the verbosity flags. Logs go to stderr so that
    // compiled templates can be piped from stdout.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,cftemplate={level},cft_build={level},cft_compiler={level}"
        ))
    });
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    let result = match cli.command {
        Commands::Compile(args) => commands::compile::execute(args),
        Commands::Check(args) => commands::check::execute(args),
        Commands::Build(args) => commands::build::execute(args),
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

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if e.downcast_ref::<CompileFailed>().is_some() {
        return ExitCodes::COMPILE_ERRORS;
    }

    if let Some(err) = e.downcast_ref::<cft_compiler::CompilerError>() {
        return match err {
            cft_compiler::CompilerError::UnsupportedSource(_) => ExitCodes::INVALID_ARGS,
            _ => ExitCodes::GENERAL_ERROR,
        };
    }

    match e.downcast_ref::<cft_build::BuildError>() {
        Some(cft_build::BuildError::ConfigNotFound(_))
        | Some(cft_build::BuildError::InvalidConfig(_))
        | Some(cft_build::BuildError::InvalidPattern { .. }) => ExitCodes::INVALID_ARGS,
        _ => ExitCodes::GENERAL_ERROR,
    }
}
