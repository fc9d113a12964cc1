//! # cft_build
//!
//! Incremental batch compilation of a directory of templates.
//!
//! A build reads a [`BuildConfig`], selects the sources in its input
//! directory with case-insensitive include and exclude globs, and compiles
//! each source whose output is missing or older than the source. Outputs
//! are named after the source with a `.json` extension.
//!
//! ```no_run
//! use cft_build::{BuildConfig, BuildRunner};
//!
//! let config = BuildConfig::load_or_default(".")?;
//! let summary = BuildRunner::new(config).run()?;
//! if !summary.is_success() {
//!     eprintln!("{} errors compiling templates", summary.failures);
//! }
//! # Ok::<(), cft_build::BuildError>(())
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod runner;

pub use config::{BuildConfig, CONFIG_FILE};
pub use discovery::{discover, BuildJob, GlobFilter, SourceKind};
pub use error::{BuildError, BuildResult};
pub use runner::{report_issues, BuildRunner, BuildSummary, TemplateReport};
