//! Error types for template builds.

use std::path::PathBuf;
use thiserror::Error;

use cft_compiler::CompilerError;

/// Result type alias for build operations.
pub type BuildResult<T> = Result<T, BuildError>;

/// Errors that stop a build.
///
/// Problems inside templates are not build errors; they are reported as
/// compile issues and counted as failures in the build summary.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid file pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Error compiling {}: {source}", .path.display())]
    Compile {
        path: PathBuf,
        #[source]
        source: CompilerError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
