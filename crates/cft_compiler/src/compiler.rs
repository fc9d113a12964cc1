//! Compiler façade: reads a template source, runs the section compilers and
//! decides whether the compiled template may be emitted.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::builder::{ScriptFrontEnd, TemplateBuilder};
use crate::diagnostics::{CompileIssue, CompileIssueLevel, CompileIssueLocation, CompileResult, Diagnostics};
use crate::error::{CompilerError, CompilerResult};
use crate::node::{value_kind, NodeCompiler, NodePath};
use crate::registry::PropertiesRegistry;
use crate::template::TemplateNode;

/// Options for one compiler instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Parameter default overrides; null values are ignored.
    pub parameters: HashMap<String, Value>,
    /// Reserved for compiler behavior flags.
    pub options: HashMap<String, Value>,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

/// Structured template source formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Json,
    Yaml,
}

impl SourceFormat {
    /// Format implied by the file extension, if it is a structured one.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(SourceFormat::Json),
            "yaml" | "yml" => Some(SourceFormat::Yaml),
            _ => None,
        }
    }

    pub fn parse(&self, text: &str) -> CompilerResult<Value> {
        match self {
            SourceFormat::Json => Ok(serde_json::from_str(text)?),
            SourceFormat::Yaml => Ok(serde_yaml::from_str(text)?),
        }
    }
}

/// Outcome of compiling one source.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub result: CompileResult,
    /// The compiled template, present only when it may be emitted.
    pub template: Option<Value>,
}

impl Compilation {
    pub fn is_success(&self) -> bool {
        self.template.is_some()
    }
}

/// Validating template compiler.
///
/// The compiler holds only read-only configuration, so one instance can
/// compile any number of templates, including concurrently.
#[derive(Debug, Clone, Default)]
pub struct TemplateCompiler {
    options: CompileOptions,
    registry: PropertiesRegistry,
}

impl TemplateCompiler {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            registry: PropertiesRegistry::new(),
        }
    }

    pub fn with_registry(mut self, registry: PropertiesRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn registry(&self) -> &PropertiesRegistry {
        &self.registry
    }

    /// Compile a template tree, recording issues in `diagnostics`.
    ///
    /// The compiled tree is returned whenever the root compiled, even if
    /// errors were recorded.
    pub fn compile_template(&self, template: &Value, diagnostics: &mut Diagnostics) -> Option<Value> {
        let compiler = TemplateNode {
            registry: &self.registry,
        };
        compiler
            .compile(NodePath::root(), template, diagnostics)
            .map(Value::Object)
    }

    /// Set the `Default` of each overridden parameter present in `template`.
    pub fn apply_overrides(&self, template: &mut Value) {
        let Some(parameters) = template.get_mut("Parameters").and_then(Value::as_object_mut) else {
            return;
        };

        for (name, value) in &self.options.parameters {
            if value.is_null() {
                continue;
            }
            if let Some(parameter) = parameters.get_mut(name).and_then(Value::as_object_mut) {
                debug!("Overriding default of parameter {}", name);
                parameter.insert("Default".into(), value.clone());
            }
        }
    }

    /// Compile an already parsed template tree.
    pub fn compile_value(&self, source: impl AsRef<Path>, template: Value) -> Compilation {
        let source = source.as_ref();
        let files = vec![source.display().to_string()];
        self.compile_tree(source, files, template, Diagnostics::new())
    }

    /// Compile JSON or YAML template text.
    pub fn compile_str(&self, source: impl AsRef<Path>, text: &str, format: SourceFormat) -> Compilation {
        let source = source.as_ref();
        debug!("Parsing {:?} template {}", format, source.display());

        match format.parse(text) {
            Ok(template) => self.compile_value(source, template),
            Err(err) => {
                let issue = CompileIssue::error(err.to_string()).with_location(parse_location(source, &err));
                finish(source, vec![source.display().to_string()], None, vec![issue])
            }
        }
    }

    /// Compile a JSON or YAML template file.
    ///
    /// A source that cannot be read is reported as a single error issue;
    /// only an unsupported extension is returned as `Err`.
    pub fn compile_file(&self, path: impl AsRef<Path>) -> CompilerResult<Compilation> {
        let path = path.as_ref();
        let format =
            SourceFormat::from_path(path).ok_or_else(|| CompilerError::UnsupportedSource(path.to_path_buf()))?;

        match read_source(path) {
            Ok(text) => Ok(self.compile_str(path, &text, format)),
            Err(err) => Ok(unreadable(path, err)),
        }
    }

    /// Compile a template file and write the result to `output` on success.
    ///
    /// Any previous `output` is removed first, so a failed compile never
    /// leaves a stale template behind.
    pub fn compile_to_file(&self, input: impl AsRef<Path>, output: impl AsRef<Path>) -> CompilerResult<Compilation> {
        let output = output.as_ref();
        prepare_output(output)?;
        let compilation = self.compile_file(input)?;
        write_output(&compilation, output)?;
        Ok(compilation)
    }

    /// Evaluate a template script with `front_end` and compile what it declared.
    pub fn compile_script(&self, front_end: &dyn ScriptFrontEnd, path: impl AsRef<Path>) -> CompilerResult<Compilation> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(unreadable(path, CompilerError::NotFound(path.to_path_buf())));
        }

        debug!("Evaluating template script {}", path.display());
        let mut builder = TemplateBuilder::new(path);

        match front_end.evaluate(path, &self.options.parameters, &mut builder) {
            Ok(()) => Ok(self.compile_builder(builder)),
            Err(CompilerError::ScriptFailed { message, location }) => {
                builder.report_failure(message, location.as_deref());
                let (_, issues, files) = builder.into_parts();
                Ok(finish(path, files, None, issues))
            }
            Err(err) => Err(err),
        }
    }

    /// Like [`compile_script`](Self::compile_script), writing the result to `output` on success.
    pub fn compile_script_to_file(
        &self,
        front_end: &dyn ScriptFrontEnd,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> CompilerResult<Compilation> {
        let output = output.as_ref();
        prepare_output(output)?;
        let compilation = self.compile_script(front_end, input)?;
        write_output(&compilation, output)?;
        Ok(compilation)
    }

    /// Compile the template assembled by a script front end.
    pub fn compile_builder(&self, builder: TemplateBuilder) -> Compilation {
        let source = builder.source().to_path_buf();
        let (template, issues, files) = builder.into_parts();

        let mut diagnostics = Diagnostics::new();
        diagnostics.extend(issues);
        self.compile_tree(&source, files, template, diagnostics)
    }

    fn compile_tree(&self, source: &Path, files: Vec<String>, mut template: Value, mut diagnostics: Diagnostics) -> Compilation {
        debug!("Compiling template {}", source.display());

        if !template.is_object() {
            diagnostics.push(
                CompileIssue::error(format!("Template must be a mapping, found {}", value_kind(&template)))
                    .with_location(CompileIssueLocation::new(source)),
            );
            return finish(source, files, None, diagnostics.into_issues());
        }

        self.apply_overrides(&mut template);
        let compiled = self.compile_template(&template, &mut diagnostics);
        finish(source, files, compiled, diagnostics.into_issues())
    }
}

/// Assemble the result; issues without a location are placed in `source`.
fn finish(source: &Path, files: Vec<String>, compiled: Option<Value>, issues: Vec<CompileIssue>) -> Compilation {
    let issues: Vec<CompileIssue> = issues
        .into_iter()
        .map(|issue| match issue.location() {
            Some(_) => issue,
            None => issue.with_location(CompileIssueLocation::new(source)),
        })
        .collect();

    let result = CompileResult::new(files, issues);
    let template = compiled.filter(|_| !result.has_errors());

    info!(
        "Compiled {}: {} error(s), {} warning(s)",
        source.display(),
        result.error_count(),
        result.issues_at(CompileIssueLevel::Warn).len()
    );

    Compilation { result, template }
}

fn read_source(path: &Path) -> CompilerResult<String> {
    if !path.exists() {
        return Err(CompilerError::NotFound(path.to_path_buf()));
    }
    Ok(fs::read_to_string(path)?)
}

/// Result for a source that could not be read at all.
fn unreadable(path: &Path, err: CompilerError) -> Compilation {
    let issue = CompileIssue::error(err.to_string()).with_location(CompileIssueLocation::new(path));
    finish(path, vec![path.display().to_string()], None, vec![issue])
}

fn parse_location(source: &Path, err: &CompilerError) -> CompileIssueLocation {
    let line = match err {
        CompilerError::Json(err) => Some(err.line()),
        CompilerError::Yaml(err) => err.location().map(|location| location.line()),
        _ => None,
    };

    match line.and_then(|line| u32::try_from(line).ok()).filter(|line| *line > 0) {
        Some(line) => CompileIssueLocation::with_line(source, line),
        None => CompileIssueLocation::new(source),
    }
}

fn prepare_output(output: &Path) -> CompilerResult<()> {
    if output.exists() {
        debug!("Removing stale output {}", output.display());
        fs::remove_file(output)?;
    } else if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn write_output(compilation: &Compilation, output: &Path) -> CompilerResult<()> {
    if let Some(template) = &compilation.template {
        let mut text = serde_json::to_string_pretty(template)?;
        text.push('\n');
        fs::write(output, text)?;
        debug!("Wrote compiled template to {}", output.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_format_from_path() {
        assert_eq!(SourceFormat::from_path(Path::new("a.json")), Some(SourceFormat::Json));
        assert_eq!(SourceFormat::from_path(Path::new("a.YML")), Some(SourceFormat::Yaml));
        assert_eq!(SourceFormat::from_path(Path::new("a.yaml")), Some(SourceFormat::Yaml));
        assert_eq!(SourceFormat::from_path(Path::new("a.rb")), None);
        assert_eq!(SourceFormat::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: CompileOptions = serde_yaml::from_str("parameters:\n  Size: 10\n").unwrap();
        assert_eq!(options.parameters["Size"], json!(10));
        assert!(options.options.is_empty());
    }

    #[test]
    fn test_overrides_only_touch_existing_parameters() {
        let compiler = TemplateCompiler::new(
            CompileOptions::new()
                .with_parameter("Size", "large")
                .with_parameter("Missing", "x")
                .with_parameter("Nothing", Value::Null),
        );
        let mut template = json!({
            "Parameters": {
                "Size": {"Type": "String", "Default": "small"},
                "Nothing": {"Type": "String", "Default": "kept"}
            }
        });
        compiler.apply_overrides(&mut template);

        assert_eq!(template["Parameters"]["Size"]["Default"], json!("large"));
        assert_eq!(template["Parameters"]["Nothing"]["Default"], json!("kept"));
        assert!(template["Parameters"].get("Missing").is_none());
    }

    #[test]
    fn test_parse_error_has_line() {
        let compiler = TemplateCompiler::default();
        let compilation = compiler.compile_str("broken.json", "{\n  \"a\": 1,\n  oops\n}", SourceFormat::Json);

        assert!(!compilation.is_success());
        let issues = compilation.result.issues();
        assert_eq!(issues.len(), 1);
        let location = issues[0].location().unwrap();
        assert_eq!(location.file(), Path::new("broken.json"));
        assert_eq!(location.line(), 3);
    }

    #[test]
    fn test_non_mapping_root() {
        let compiler = TemplateCompiler::default();
        let compilation = compiler.compile_value("list.json", json!(["a"]));

        assert!(compilation.template.is_none());
        assert_eq!(compilation.result.issues().len(), 1);
        assert_eq!(
            compilation.result.issues()[0].to_string(),
            "ERROR list.json: Template must be a mapping, found sequence"
        );
    }

    #[test]
    fn test_issues_located_in_source() {
        let compiler = TemplateCompiler::default();
        let compilation = compiler.compile_value("stack.json", json!({"AWSTemplateFormatVersion": "2010-09-09"}));

        assert_eq!(compilation.result.files(), ["stack.json".to_string()]);
        assert_eq!(
            compilation.result.issues()[0].to_string(),
            "ERROR stack.json: At least one resource definition is required."
        );
    }
}
