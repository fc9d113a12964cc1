//! Compile issues, their severities and locations, and compile results.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CompilerError;

/// Severity of a compile issue.
///
/// Levels compare by [`value`](Self::value): a higher value is more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompileIssueLevel {
    Error,
    Warn,
    Info,
}

impl CompileIssueLevel {
    /// Priority value used for ordering levels.
    pub const fn value(self) -> u32 {
        match self {
            CompileIssueLevel::Error => 300_000,
            CompileIssueLevel::Warn => 200_000,
            CompileIssueLevel::Info => 100_000,
        }
    }

    /// All levels, most severe first.
    pub fn all() -> [CompileIssueLevel; 3] {
        [
            CompileIssueLevel::Error,
            CompileIssueLevel::Warn,
            CompileIssueLevel::Info,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompileIssueLevel::Error => "ERROR",
            CompileIssueLevel::Warn => "WARN",
            CompileIssueLevel::Info => "INFO",
        }
    }
}

impl PartialOrd for CompileIssueLevel {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CompileIssueLevel {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value().cmp(&other.value())
    }
}

impl fmt::Display for CompileIssueLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Source location of a compile issue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompileIssueLocation {
    file: PathBuf,
    line: i64,
}

impl CompileIssueLocation {
    /// Location covering a whole file.
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            line: -1,
        }
    }

    /// Location of a single line in a file.
    pub fn with_line(file: impl Into<PathBuf>, line: u32) -> Self {
        Self {
            file: file.into(),
            line: i64::from(line),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Line number, or -1 when the location covers the whole file.
    pub fn line(&self) -> i64 {
        self.line
    }

    pub fn has_line(&self) -> bool {
        self.line >= 0
    }
}

impl fmt::Display for CompileIssueLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_line() {
            write!(f, "{}:{}", self.file.display(), self.line)
        } else {
            write!(f, "{}", self.file.display())
        }
    }
}

impl FromStr for CompileIssueLocation {
    type Err = CompilerError;

    /// Parse a `file[:line]` token as reported by script front ends.
    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let token = token.trim();
        if token.is_empty() {
            return Err(CompilerError::InvalidLocation(token.to_string()));
        }

        // Only a numeric suffix is a line; "C:\templates\a.rb" stays a file.
        if let Some((file, line)) = token.rsplit_once(':') {
            if !file.is_empty() {
                if let Ok(line) = line.parse::<u32>() {
                    return Ok(Self::with_line(file, line));
                }
            }
        }

        Ok(Self::new(token))
    }
}

/// An issue found while compiling a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileIssue {
    level: CompileIssueLevel,
    message: String,
    location: Option<CompileIssueLocation>,
}

impl CompileIssue {
    pub fn new(level: CompileIssueLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            location: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(CompileIssueLevel::Error, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(CompileIssueLevel::Warn, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(CompileIssueLevel::Info, message)
    }

    pub fn with_location(mut self, location: CompileIssueLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn level(&self) -> CompileIssueLevel {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> Option<&CompileIssueLocation> {
        self.location.as_ref()
    }
}

impl fmt::Display for CompileIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} {}: {}", self.level, location, self.message),
            None => write!(f, "{} {}", self.level, self.message),
        }
    }
}

/// Append-only issue list owned by a single compilation.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    issues: Vec<CompileIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self { issues: Vec::new() }
    }

    pub fn push(&mut self, issue: CompileIssue) {
        self.issues.push(issue);
    }

    pub fn extend(&mut self, issues: impl IntoIterator<Item = CompileIssue>) {
        self.issues.extend(issues);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(CompileIssue::error(message));
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(CompileIssue::warn(message));
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(CompileIssue::info(message));
    }

    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.level() == CompileIssueLevel::Error)
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[CompileIssue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<CompileIssue> {
        self.issues
    }
}

/// Immutable outcome of one compilation unit.
#[derive(Debug, Clone)]
pub struct CompileResult {
    files: Vec<String>,
    issues: Vec<CompileIssue>,
    by_level: HashMap<CompileIssueLevel, Vec<CompileIssue>>,
}

impl CompileResult {
    /// Build a result for a compilation unit made of `files`.
    pub fn new<F, S>(files: F, issues: Vec<CompileIssue>) -> Self
    where
        F: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut by_level: HashMap<CompileIssueLevel, Vec<CompileIssue>> = HashMap::new();
        for issue in &issues {
            by_level.entry(issue.level()).or_default().push(issue.clone());
        }

        Self {
            files: files.into_iter().map(Into::into).collect(),
            issues,
            by_level,
        }
    }

    /// Build a result for a single source file.
    pub fn for_file(file: impl AsRef<Path>, issues: Vec<CompileIssue>) -> Self {
        Self::new([file.as_ref().display().to_string()], issues)
    }

    /// Files that made up the compilation unit.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// All issues in the order they were recorded.
    pub fn issues(&self) -> &[CompileIssue] {
        &self.issues
    }

    /// Issues recorded at exactly `level`.
    pub fn issues_at(&self, level: CompileIssueLevel) -> &[CompileIssue] {
        self.by_level.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Issues at `level` or any more severe level, in recorded order.
    pub fn issues_at_least(
        &self,
        level: CompileIssueLevel,
    ) -> impl Iterator<Item = &CompileIssue> + '_ {
        self.issues.iter().filter(move |issue| issue.level() >= level)
    }

    pub fn error_count(&self) -> usize {
        self.issues_at(CompileIssueLevel::Error).len()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// True when nothing blocks emitting the compiled template.
    pub fn is_success(&self) -> bool {
        !self.has_errors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(CompileIssueLevel::Error > CompileIssueLevel::Warn);
        assert!(CompileIssueLevel::Warn > CompileIssueLevel::Info);
        assert_eq!(CompileIssueLevel::Error.value(), 300_000);

        let mut levels = vec![
            CompileIssueLevel::Info,
            CompileIssueLevel::Error,
            CompileIssueLevel::Warn,
        ];
        levels.sort();
        assert_eq!(
            levels,
            vec![
                CompileIssueLevel::Info,
                CompileIssueLevel::Warn,
                CompileIssueLevel::Error
            ]
        );
    }

    #[test]
    fn test_location_display() {
        assert_eq!(CompileIssueLocation::new("a.json").to_string(), "a.json");
        assert_eq!(
            CompileIssueLocation::with_line("a.rb", 12).to_string(),
            "a.rb:12"
        );
        assert_eq!(CompileIssueLocation::new("a.json").line(), -1);
    }

    #[test]
    fn test_location_parse() {
        let location: CompileIssueLocation = "templates/app.rb:42".parse().unwrap();
        assert_eq!(location.file(), Path::new("templates/app.rb"));
        assert_eq!(location.line(), 42);

        let location: CompileIssueLocation = "templates/app.rb".parse().unwrap();
        assert!(!location.has_line());

        let location: CompileIssueLocation = "C:\\templates\\app.rb".parse().unwrap();
        assert_eq!(location.file(), Path::new("C:\\templates\\app.rb"));
        assert!(!location.has_line());

        assert!("".parse::<CompileIssueLocation>().is_err());
    }

    #[test]
    fn test_issue_display() {
        let issue = CompileIssue::error("Something broke")
            .with_location(CompileIssueLocation::with_line("stack.json", 3));
        assert_eq!(issue.to_string(), "ERROR stack.json:3: Something broke");
        assert_eq!(CompileIssue::warn("Careful").to_string(), "WARN Careful");
    }

    #[test]
    fn test_result_partitions_by_level() {
        let result = CompileResult::for_file(
            "stack.json",
            vec![
                CompileIssue::error("e1"),
                CompileIssue::warn("w1"),
                CompileIssue::error("e2"),
                CompileIssue::info("i1"),
            ],
        );

        assert_eq!(result.files(), ["stack.json".to_string()]);
        assert_eq!(result.issues().len(), 4);
        assert_eq!(result.error_count(), 2);
        assert_eq!(result.issues_at(CompileIssueLevel::Warn).len(), 1);
        assert_eq!(result.issues_at(CompileIssueLevel::Info)[0].message(), "i1");
        assert_eq!(result.issues_at_least(CompileIssueLevel::Warn).count(), 3);
        assert!(!result.is_success());
    }

    #[test]
    fn test_warnings_do_not_fail() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.warn("w");
        diagnostics.info("i");
        assert!(!diagnostics.has_errors());

        let result = CompileResult::new(Vec::<String>::new(), diagnostics.into_issues());
        assert!(result.is_success());
        assert!(result.issues_at(CompileIssueLevel::Error).is_empty());
    }
}
