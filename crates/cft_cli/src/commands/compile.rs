//! Compile command - Compile a single template.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use cft_compiler::{CompileOptions, TemplateCompiler};

use super::{parameter_map, parse_parameter, print_issues, CompileFailed};

#[derive(Args)]
pub struct CompileArgs {
    /// Template source (.json, .yaml or .yml)
    input: PathBuf,

    /// Output file; the compiled template is printed to stdout if omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Parameter default override, NAME=VALUE (repeatable)
    #[arg(short = 'p', long = "parameter", value_parser = parse_parameter)]
    parameters: Vec<(String, String)>,
}

pub fn execute(args: CompileArgs) -> Result<()> {
    info!("Compiling template: {}", args.input.display());

    let options = CompileOptions {
        parameters: parameter_map(args.parameters),
        ..CompileOptions::default()
    };
    let compiler = TemplateCompiler::new(options);

    let compilation = match &args.output {
        Some(output) => compiler.compile_to_file(&args.input, output)?,
        None => compiler.compile_file(&args.input)?,
    };

    print_issues(&compilation.result);

    let Some(template) = &compilation.template else {
        return Err(CompileFailed {
            errors: compilation.result.error_count(),
        }
        .into());
    };

    match &args.output {
        Some(output) => eprintln!("✅ Compiled {} to {}", args.input.display(), output.display()),
        None => {
            let text = serde_json::to_string_pretty(template).context("Failed to render template")?;
            println!("{}", text);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_compile_writes_output() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("stack.yaml");
        let output = dir.path().join("out").join("stack.json");
        fs::write(
            &input,
            "AWSTemplateFormatVersion: '2010-09-09'\nParameters:\n  Env:\n    Type: String\nResources:\n  Queue:\n    Type: AWS::SQS::Queue\n",
        )
        .unwrap();

        execute(CompileArgs {
            input,
            output: Some(output.clone()),
            parameters: vec![("Env".to_string(), "prod".to_string())],
        })
        .unwrap();

        let compiled: serde_json::Value = serde_json::from_str(&fs::read_to_string(output).unwrap()).unwrap();
        assert_eq!(compiled["Parameters"]["Env"]["Default"], "prod");
    }

    #[test]
    fn test_compile_errors_are_compile_failed() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("stack.json");
        fs::write(&input, r#"{"AWSTemplateFormatVersion": "2010-09-09"}"#).unwrap();

        let err = execute(CompileArgs {
            input,
            output: None,
            parameters: Vec::new(),
        })
        .unwrap_err();

        assert_eq!(err.downcast_ref::<CompileFailed>().unwrap().errors, 1);
    }
}
