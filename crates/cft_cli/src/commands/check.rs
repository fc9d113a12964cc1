//! Check command - Validate templates without writing output.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use cft_compiler::{CompileOptions, TemplateCompiler};

use super::{parameter_map, parse_parameter, print_issues, CompileFailed};

#[derive(Args)]
pub struct CheckArgs {
    /// Template sources to validate
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Parameter default override, NAME=VALUE (repeatable)
    #[arg(short = 'p', long = "parameter", value_parser = parse_parameter)]
    parameters: Vec<(String, String)>,
}

pub fn execute(args: CheckArgs) -> Result<()> {
    let options = CompileOptions {
        parameters: parameter_map(args.parameters),
        ..CompileOptions::default()
    };
    let compiler = TemplateCompiler::new(options);

    let mut errors = 0;
    for input in &args.inputs {
        eprintln!("📋 Checking {}...", input.display());

        let compilation = compiler.compile_file(input)?;
        print_issues(&compilation.result);

        if compilation.is_success() {
            eprintln!("   ✅ Valid");
        } else {
            errors += compilation.result.error_count();
        }
    }

    if errors > 0 {
        return Err(CompileFailed { errors }.into());
    }

    eprintln!("\n✅ {} template(s) valid", args.inputs.len());
    Ok(())
}
