//! Error types for the compiler module.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for compiler operations.
pub type CompilerResult<T> = Result<T, CompilerError>;

/// Errors that abort a whole compilation or its surrounding I/O.
///
/// Problems inside a template are never reported through this type; they
/// become [`CompileIssue`](crate::diagnostics::CompileIssue)s instead.
#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("Template source not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unsupported template source type: {}", .0.display())]
    UnsupportedSource(PathBuf),

    #[error("Invalid issue location: {0}")]
    InvalidLocation(String),

    #[error("Script evaluation failed: {message}")]
    ScriptFailed {
        message: String,
        location: Option<String>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Failure local to a single template node.
///
/// The node-compiler framework turns these into an `Internal compiler error`
/// diagnostic scoped to the failing node and discards that node's output.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("{field} must be {expected}, found {found}")]
    UnexpectedShape {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Result type alias for node-level compilation.
pub type NodeResult<T> = Result<T, NodeError>;
