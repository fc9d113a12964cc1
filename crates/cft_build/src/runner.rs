//! Batch compilation of discovered templates.

use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use cft_compiler::{
    CompileIssueLevel, CompileResult, Compilation, PropertiesRegistry, ScriptFrontEnd, TemplateCompiler,
};

use crate::config::BuildConfig;
use crate::discovery::{discover, BuildJob, SourceKind};
use crate::error::{BuildError, BuildResult};

/// Result of compiling one source.
#[derive(Debug, Clone)]
pub struct TemplateReport {
    pub source: PathBuf,
    pub target: PathBuf,
    pub result: CompileResult,
}

/// Outcome of a build.
#[derive(Debug, Clone, Default)]
pub struct BuildSummary {
    /// Sources compiled in this run.
    pub compiled: usize,
    /// Sources skipped because their output was up to date.
    pub skipped: usize,
    /// Error issues across all compiled sources.
    pub failures: usize,
    pub results: Vec<TemplateReport>,
}

impl BuildSummary {
    pub fn is_success(&self) -> bool {
        self.failures == 0
    }
}

/// Compiles every stale template source of a [`BuildConfig`].
pub struct BuildRunner {
    config: BuildConfig,
    compiler: TemplateCompiler,
    front_end: Option<Box<dyn ScriptFrontEnd>>,
    force: bool,
}

impl BuildRunner {
    pub fn new(config: BuildConfig) -> Self {
        let compiler = TemplateCompiler::new(config.compile_options());
        Self {
            config,
            compiler,
            front_end: None,
            force: false,
        }
    }

    /// Compile script sources with `front_end`.
    pub fn with_front_end(mut self, front_end: Box<dyn ScriptFrontEnd>) -> Self {
        self.front_end = Some(front_end);
        self
    }

    pub fn with_registry(mut self, registry: PropertiesRegistry) -> Self {
        self.compiler = self.compiler.with_registry(registry);
        self
    }

    /// Recompile sources even when their output is up to date.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Discover, compile and report.
    pub fn run(&self) -> BuildResult<BuildSummary> {
        let input_dir = &self.config.input_dir;
        let mut summary = BuildSummary::default();

        if !input_dir.is_dir() {
            info!("No templates found in {}", input_dir.display());
            return Ok(summary);
        }

        let script_extensions = self
            .front_end
            .as_ref()
            .map(|front_end| front_end.extensions())
            .unwrap_or(&[]);

        let mut jobs = Vec::new();
        for job in discover(&self.config, script_extensions)? {
            if self.force || job.is_stale() {
                jobs.push(job);
            } else {
                debug!(
                    "Skipping compile; output is newer than source. {} => {}",
                    job.source.display(),
                    job.target.display()
                );
                summary.skipped += 1;
            }
        }

        if jobs.is_empty() {
            info!("No templates to compile in {}", input_dir.display());
            return Ok(summary);
        }

        info!(
            "Compiling {} templates to {}",
            jobs.len(),
            self.config.output_dir.display()
        );

        for job in jobs {
            info!("Compiling {} to {}", job.source.display(), job.target.display());

            let compilation = self.compile(&job).map_err(|source| BuildError::Compile {
                path: job.source.clone(),
                source,
            })?;

            summary.compiled += 1;
            summary.failures += report_issues(&compilation.result);
            summary.results.push(TemplateReport {
                source: job.source,
                target: job.target,
                result: compilation.result,
            });
        }

        if summary.failures > 0 {
            error!("{} errors compiling templates", summary.failures);
        }

        Ok(summary)
    }

    fn compile(&self, job: &BuildJob) -> cft_compiler::CompilerResult<Compilation> {
        match (job.kind, &self.front_end) {
            (SourceKind::Script, Some(front_end)) => {
                self.compiler
                    .compile_script_to_file(front_end.as_ref(), &job.source, &job.target)
            }
            (SourceKind::Script, None) => Err(cft_compiler::CompilerError::UnsupportedSource(job.source.clone())),
            _ => self.compiler.compile_to_file(&job.source, &job.target),
        }
    }
}

/// Log every issue at its severity; returns the number of errors.
pub fn report_issues(result: &CompileResult) -> usize {
    let mut failures = 0;

    for issue in result.issues() {
        let message = match issue.location() {
            Some(location) => format!("{}: {}", location, issue.message()),
            None => issue.message().to_string(),
        };

        match issue.level() {
            CompileIssueLevel::Error => {
                failures += 1;
                error!("{}", message);
            }
            CompileIssueLevel::Warn => warn!("{}", message),
            CompileIssueLevel::Info => info!("{}", message),
        }
    }

    failures
}
