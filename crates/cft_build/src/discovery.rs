//! Template source discovery and staleness detection.

use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::BuildConfig;
use crate::error::{BuildError, BuildResult};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// How a template source is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Json,
    Yaml,
    /// Evaluated by a script front end.
    Script,
}

/// File name filter built from include and exclude globs.
#[derive(Debug, Clone)]
pub struct GlobFilter {
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

impl GlobFilter {
    pub fn new(includes: &[String], excludes: &[String]) -> BuildResult<Self> {
        Ok(Self {
            includes: compile_patterns(includes)?,
            excludes: compile_patterns(excludes)?,
        })
    }

    /// True if `name` matches an include glob and no exclude glob, ignoring case.
    pub fn matches(&self, name: &str) -> bool {
        let matches_any = |patterns: &[Pattern]| {
            patterns
                .iter()
                .any(|pattern| pattern.matches_with(name, MATCH_OPTIONS))
        };
        matches_any(&self.includes) && !matches_any(&self.excludes)
    }
}

fn compile_patterns(patterns: &[String]) -> BuildResult<Vec<Pattern>> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|e| BuildError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}

/// One source to compile and where its output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildJob {
    pub source: PathBuf,
    pub target: PathBuf,
    pub kind: SourceKind,
}

impl BuildJob {
    /// True if the target is missing or older than the source.
    pub fn is_stale(&self) -> bool {
        let modified = |path: &Path| fs::metadata(path).and_then(|m| m.modified()).ok();

        match (modified(&self.source), modified(&self.target)) {
            (Some(source), Some(target)) => source > target,
            _ => true,
        }
    }
}

/// Find the template sources in `config.input_dir`.
///
/// Files whose extension is neither structured nor one of
/// `script_extensions` are skipped with a warning. A missing input
/// directory yields no jobs.
pub fn discover(config: &BuildConfig, script_extensions: &[&str]) -> BuildResult<Vec<BuildJob>> {
    let mut jobs = Vec::new();

    if !config.input_dir.is_dir() {
        return Ok(jobs);
    }

    let filter = GlobFilter::new(&config.includes, &config.excludes)?;

    for entry in WalkDir::new(&config.input_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy();
        if !filter.matches(&name) {
            continue;
        }

        let Some(kind) = source_kind(path, script_extensions) else {
            warn!("Unknown template type: {}", path.display());
            continue;
        };

        debug!("Found template source {}", path.display());
        jobs.push(BuildJob {
            source: path.to_path_buf(),
            target: config.output_dir.join(target_name(&name)),
            kind,
        });
    }

    Ok(jobs)
}

fn source_kind(path: &Path, script_extensions: &[&str]) -> Option<SourceKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "json" => Some(SourceKind::Json),
        "yaml" | "yml" => Some(SourceKind::Yaml),
        other if script_extensions.iter().any(|s| s.eq_ignore_ascii_case(other)) => Some(SourceKind::Script),
        _ => None,
    }
}

/// Output file name: the source name with its extension replaced by `.json`.
fn target_name(name: &str) -> String {
    match name.rfind('.') {
        None => format!("{}.json", name),
        Some(0) => ".json".to_string(),
        Some(dot) => format!("{}.json", &name[..dot]),
    }
}
