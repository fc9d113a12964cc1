//! Boundary between script front ends and the compiler.
//!
//! A script front end evaluates an author-facing template program and
//! reports what it declares into a [`TemplateSink`]. [`TemplateBuilder`] is
//! the sink used by the compiler: it assembles the same generic tree that
//! structured input produces, plus the issues the script reported.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::diagnostics::{CompileIssue, CompileIssueLevel, CompileIssueLocation};
use crate::error::CompilerResult;

/// Receives template entities and diagnostics from a script front end.
///
/// `caller` is an optional `file[:line]` token naming the script statement
/// responsible for the call.
pub trait TemplateSink {
    fn set_version(&mut self, caller: Option<&str>, version: &str, description: Option<&str>);

    fn add_parameter(&mut self, caller: Option<&str>, name: &str, value: &Value);

    fn add_mapping(&mut self, caller: Option<&str>, name: &str, value: &Value);

    fn add_output(&mut self, caller: Option<&str>, name: &str, value: &Value);

    fn add_resource(&mut self, caller: Option<&str>, name: &str, value: &Value);

    fn error(&mut self, caller: Option<&str>, message: &str);

    fn warn(&mut self, caller: Option<&str>, message: &str);

    fn info(&mut self, caller: Option<&str>, message: &str);
}

/// Evaluates template scripts of some language.
pub trait ScriptFrontEnd {
    /// File extensions handled, without the leading dot.
    fn extensions(&self) -> &[&str];

    /// Run the script at `path`, reporting into `sink`.
    ///
    /// A script that fails to run returns
    /// [`CompilerError::ScriptFailed`](crate::error::CompilerError::ScriptFailed)
    /// carrying the failure location when known.
    fn evaluate(
        &self,
        path: &Path,
        parameters: &HashMap<String, Value>,
        sink: &mut dyn TemplateSink,
    ) -> CompilerResult<()>;

    fn handles(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| {
                self.extensions()
                    .iter()
                    .any(|handled| handled.eq_ignore_ascii_case(ext))
            })
    }
}

/// Append-only [`TemplateSink`] that builds a generic template tree.
#[derive(Debug, Clone)]
pub struct TemplateBuilder {
    source: PathBuf,
    version: Option<String>,
    description: Option<String>,
    parameters: Map<String, Value>,
    mappings: Map<String, Value>,
    outputs: Map<String, Value>,
    resources: Map<String, Value>,
    issues: Vec<CompileIssue>,
    files: BTreeSet<String>,
}

impl TemplateBuilder {
    /// Builder for the script at `source`.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let mut files = BTreeSet::new();
        files.insert(source.display().to_string());

        Self {
            source,
            version: None,
            description: None,
            parameters: Map::new(),
            mappings: Map::new(),
            outputs: Map::new(),
            resources: Map::new(),
            issues: Vec::new(),
            files,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn issues(&self) -> &[CompileIssue] {
        &self.issues
    }

    /// Files named by the script, including the script itself.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(String::as_str)
    }

    /// Record an issue against the statement named by `caller`.
    pub fn report(&mut self, level: CompileIssueLevel, caller: Option<&str>, message: impl Into<String>) {
        let mut issue = CompileIssue::new(level, message);
        if let Some(location) = self.locate(caller) {
            issue = issue.with_location(location);
        }
        self.issues.push(issue);
    }

    /// Record the failure of the script as a whole.
    pub fn report_failure(&mut self, message: impl Into<String>, location: Option<&str>) {
        let location = self
            .locate(location)
            .unwrap_or_else(|| CompileIssueLocation::new(&self.source));
        self.issues
            .push(CompileIssue::error(message).with_location(location));
    }

    fn locate(&mut self, caller: Option<&str>) -> Option<CompileIssueLocation> {
        let location: CompileIssueLocation = caller?.parse().ok()?;
        self.files.insert(location.file().display().to_string());
        Some(location)
    }

    fn add_entity(&mut self, section: Section, caller: Option<&str>, name: &str, value: &Value) {
        let entities = match section {
            Section::Parameter => &mut self.parameters,
            Section::Mapping => &mut self.mappings,
            Section::Output => &mut self.outputs,
            Section::Resource => &mut self.resources,
        };

        if entities.contains_key(name) {
            let message = format!("Duplicate {} name: {}", section.as_str(), name);
            self.report(CompileIssueLevel::Error, caller, message);
        } else {
            entities.insert(name.to_string(), value.clone());
        }
    }

    /// The assembled template tree and the issues reported while building it.
    pub fn into_parts(self) -> (Value, Vec<CompileIssue>, Vec<String>) {
        let mut template = Map::new();

        if let Some(version) = self.version {
            template.insert("AWSTemplateFormatVersion".into(), Value::String(version));
        }
        if let Some(description) = self.description {
            template.insert("Description".into(), Value::String(description));
        }

        let sections = [
            ("Parameters", self.parameters),
            ("Mappings", self.mappings),
            ("Resources", self.resources),
            ("Outputs", self.outputs),
        ];
        for (key, section) in sections {
            if !section.is_empty() {
                template.insert(key.into(), Value::Object(section));
            }
        }

        (Value::Object(template), self.issues, self.files.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy)]
enum Section {
    Parameter,
    Mapping,
    Output,
    Resource,
}

impl Section {
    fn as_str(self) -> &'static str {
        match self {
            Section::Parameter => "parameter",
            Section::Mapping => "mapping",
            Section::Output => "output",
            Section::Resource => "resource",
        }
    }
}

impl TemplateSink for TemplateBuilder {
    fn set_version(&mut self, caller: Option<&str>, version: &str, description: Option<&str>) {
        self.locate(caller);
        self.version = Some(version.to_string());
        self.description = description.map(str::to_string);
    }

    fn add_parameter(&mut self, caller: Option<&str>, name: &str, value: &Value) {
        self.add_entity(Section::Parameter, caller, name, value);
    }

    fn add_mapping(&mut self, caller: Option<&str>, name: &str, value: &Value) {
        self.add_entity(Section::Mapping, caller, name, value);
    }

    fn add_output(&mut self, caller: Option<&str>, name: &str, value: &Value) {
        self.add_entity(Section::Output, caller, name, value);
    }

    fn add_resource(&mut self, caller: Option<&str>, name: &str, value: &Value) {
        self.add_entity(Section::Resource, caller, name, value);
    }

    fn error(&mut self, caller: Option<&str>, message: &str) {
        self.report(CompileIssueLevel::Error, caller, message);
    }

    fn warn(&mut self, caller: Option<&str>, message: &str) {
        self.report(CompileIssueLevel::Warn, caller, message);
    }

    fn info(&mut self, caller: Option<&str>, message: &str) {
        self.report(CompileIssueLevel::Info, caller, message);
    }
}
