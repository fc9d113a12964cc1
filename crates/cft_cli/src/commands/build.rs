//! Build command - Compile all out-of-date templates of a project.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use cft_build::{BuildConfig, BuildRunner};

use super::{parse_parameter, CompileFailed};

#[derive(Args)]
pub struct BuildArgs {
    /// Build configuration file (defaults to ./cftemplate.yaml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding template sources
    #[arg(long)]
    input_dir: Option<PathBuf>,

    /// Directory receiving compiled templates
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Parameter default override, NAME=VALUE (repeatable)
    #[arg(short = 'p', long = "parameter", value_parser = parse_parameter)]
    parameters: Vec<(String, String)>,

    /// Recompile templates even when their output is up to date
    #[arg(long)]
    force: bool,
}

pub fn execute(args: BuildArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => BuildConfig::load(path)?,
        None => {
            let current_dir = std::env::current_dir().context("Failed to read current directory")?;
            BuildConfig::load_or_default(current_dir)?
        }
    };

    if let Some(dir) = args.input_dir {
        config = config.with_input_dir(dir);
    }
    if let Some(dir) = args.output_dir {
        config = config.with_output_dir(dir);
    }
    for (name, value) in args.parameters {
        config = config.with_parameter(name, value);
    }

    let summary = BuildRunner::new(config).with_force(args.force).run()?;

    if !summary.is_success() {
        return Err(CompileFailed {
            errors: summary.failures,
        }
        .into());
    }

    eprintln!(
        "✅ {} compiled, {} up to date",
        summary.compiled, summary.skipped
    );
    Ok(())
}
