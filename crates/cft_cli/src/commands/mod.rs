//! CLI command definitions.

use std::collections::HashMap;

use clap::{Parser, Subcommand};
use serde_json::Value;
use thiserror::Error;

use cft_compiler::{CompileIssueLevel, CompileResult};

pub mod build;
pub mod check;
pub mod compile;

/// cftemplate - CloudFormation template compiler
#[derive(Parser)]
#[command(name = "cftemplate")]
#[command(version, about = "Validate and compile CloudFormation templates")]
#[command(long_about = r#"
cftemplate validates CloudFormation templates written in JSON or YAML and
writes the compiled, normalized JSON template.

COMMANDS:
  compile  → Compile one template to a file or stdout
  check    → Validate templates without writing output
  build    → Compile every out-of-date template in a directory

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Template compile errors
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a single template
    Compile(compile::CompileArgs),

    /// Validate templates without writing output
    Check(check::CheckArgs),

    /// Compile all out-of-date templates of a project
    Build(build::BuildArgs),
}

/// Raised when at least one template has error issues.
#[derive(Error, Debug)]
#[error("{errors} errors compiling CloudFormation templates")]
pub struct CompileFailed {
    pub errors: usize,
}

/// Parse a `NAME=VALUE` parameter override.
pub fn parse_parameter(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, found '{}'", arg)),
    }
}

pub fn parameter_map(parameters: Vec<(String, String)>) -> HashMap<String, Value> {
    parameters
        .into_iter()
        .map(|(name, value)| (name, Value::String(value)))
        .collect()
}

/// Print issues to stderr, one per line.
pub fn print_issues(result: &CompileResult) {
    for issue in result.issues() {
        let marker = match issue.level() {
            CompileIssueLevel::Error => "❌",
            CompileIssueLevel::Warn => "⚠️ ",
            CompileIssueLevel::Info => "ℹ️ ",
        };
        eprintln!("   {} {}", marker, issue);
    }
}
