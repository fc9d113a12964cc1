//! # cft_compiler
//!
//! Validating compiler for CloudFormation-style infrastructure templates.
//!
//! A template is read into a generic tree, validated section by section and
//! normalized into a canonical document. Every problem found becomes a
//! [`CompileIssue`] with a severity and, where known, a source location. The
//! compiled template is only emitted when no error was recorded.
//!
//! # Architecture
//!
//! - **Diagnostics**: issues, severities, locations and compile results
//! - **Node framework**: the [`NodeCompiler`] trait and shared validators
//! - **Sections**: template, parameters, mappings, resources and outputs
//! - **Checks**: name collisions and `DependsOn` cycles across sections
//! - **Façade**: [`TemplateCompiler`], reading sources and gating output
//! - **Builder**: [`TemplateSink`] for script front ends
//!
//! # Example
//!
//! ```rust,no_run
//! use cft_compiler::{CompileOptions, TemplateCompiler};
//!
//! let compiler = TemplateCompiler::new(CompileOptions::new().with_parameter("Env", "prod"));
//! let compilation = compiler.compile_to_file("stack.json", "target/stack.json").unwrap();
//!
//! for issue in compilation.result.issues() {
//!     eprintln!("{}", issue);
//! }
//! ```

pub mod builder;
pub mod checks;
pub mod compiler;
pub mod diagnostics;
pub mod error;
pub mod mappings;
pub mod node;
pub mod output;
pub mod parameter;
pub mod registry;
pub mod resource;
pub mod template;

pub use builder::{ScriptFrontEnd, TemplateBuilder, TemplateSink};
pub use compiler::{Compilation, CompileOptions, SourceFormat, TemplateCompiler};
pub use diagnostics::{CompileIssue, CompileIssueLevel, CompileIssueLocation, CompileResult, Diagnostics};
pub use error::{CompilerError, CompilerResult, NodeError, NodeResult};
pub use node::{NodeCompiler, NodeContext, NodePath, Numeric, TemplateValue};
pub use parameter::ParameterType;
pub use registry::{PropertiesRegistry, PropertiesValidator};
pub use resource::DeletionPolicy;
pub use template::{MAX_OUTPUTS, MAX_PARAMETERS, TEMPLATE_VERSION};
