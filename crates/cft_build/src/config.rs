//! Build configuration.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use cft_compiler::CompileOptions;

use crate::discovery::GlobFilter;
use crate::error::{BuildError, BuildResult};

/// Default configuration file name.
pub const CONFIG_FILE: &str = "cftemplate.yaml";

/// Settings for a template build, usually read from [`CONFIG_FILE`].
///
/// ```yaml
/// input_dir: src/main/cftemplates
/// output_dir: target/cftemplates
/// includes: ["*.json", "*.yaml"]
/// excludes: ["draft-*"]
/// parameters:
///   Environment: staging
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Directory holding template sources; not searched recursively.
    pub input_dir: PathBuf,
    /// Directory receiving compiled templates.
    pub output_dir: PathBuf,
    /// File name globs selecting sources.
    pub includes: Vec<String>,
    /// File name globs removing sources selected by `includes`.
    pub excludes: Vec<String>,
    /// Parameter default overrides applied to every template.
    pub parameters: HashMap<String, Value>,
    /// Compiler behavior flags.
    pub options: HashMap<String, Value>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("src/main/cftemplates"),
            output_dir: PathBuf::from("target/cftemplates"),
            includes: default_includes(),
            excludes: Vec::new(),
            parameters: HashMap::new(),
            options: HashMap::new(),
        }
    }
}

fn default_includes() -> Vec<String> {
    ["*.json", "*.yaml", "*.yml"].iter().map(|s| s.to_string()).collect()
}

impl BuildConfig {
    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> BuildResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BuildError::ConfigNotFound(path.to_path_buf()));
        }

        debug!("Loading build configuration from {:?}", path);
        let content = fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;

        // Relative directories are relative to the configuration file.
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(config.relative_to(base))
    }

    /// Load `CONFIG_FILE` from `dir` if present, otherwise use defaults.
    pub fn load_or_default(dir: impl AsRef<Path>) -> BuildResult<Self> {
        let path = dir.as_ref().join(CONFIG_FILE);
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default().relative_to(dir.as_ref()))
        }
    }

    pub fn from_yaml(content: &str) -> BuildResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every include and exclude pattern is a valid glob.
    pub fn validate(&self) -> BuildResult<()> {
        if self.includes.is_empty() {
            return Err(BuildError::InvalidConfig(
                "at least one include pattern is required".to_string(),
            ));
        }
        GlobFilter::new(&self.includes, &self.excludes).map(|_| ())
    }

    fn relative_to(mut self, base: &Path) -> Self {
        if self.input_dir.is_relative() {
            self.input_dir = base.join(&self.input_dir);
        }
        if self.output_dir.is_relative() {
            self.output_dir = base.join(&self.output_dir);
        }
        self
    }

    pub fn with_input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.input_dir = dir.into();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Compiler options carried by this configuration.
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            parameters: self.parameters.clone(),
            options: self.options.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = BuildConfig::default();
        assert_eq!(config.includes, vec!["*.json", "*.yaml", "*.yml"]);
        assert!(config.excludes.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_partial() {
        let config = BuildConfig::from_yaml(
            "input_dir: templates\nexcludes: [\"draft-*\"]\nparameters:\n  Env: prod\n",
        )
        .unwrap();

        assert_eq!(config.input_dir, PathBuf::from("templates"));
        assert_eq!(config.output_dir, PathBuf::from("target/cftemplates"));
        assert_eq!(config.includes.len(), 3);
        assert_eq!(config.excludes, vec!["draft-*"]);
        assert_eq!(config.compile_options().parameters["Env"], json!("prod"));
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        let err = BuildConfig::from_yaml("includes: [\"[json\"]\n").unwrap_err();
        assert!(matches!(err, BuildError::InvalidPattern { .. }));

        let err = BuildConfig::from_yaml("includes: []\n").unwrap_err();
        assert!(matches!(err, BuildError::InvalidConfig(_)));
    }
}
