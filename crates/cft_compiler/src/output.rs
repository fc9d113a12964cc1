//! Outputs section compilers.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::error::NodeResult;
use crate::node::{copy_of, NodeCompiler, NodeContext, NodePath};

/// Keys accepted in an output declaration.
pub const OUTPUT_KEYS: &[&str] = &["Value", "Description"];

/// Compiles the `Outputs` section.
pub struct OutputsNode;

impl NodeCompiler for OutputsNode {
    fn name(&self, _path: &NodePath<'_>) -> String {
        "Outputs".to_string()
    }

    fn compile_node(&self, ctx: &mut NodeContext<'_, '_>) -> NodeResult<Option<Map<String, Value>>> {
        let mut compiled = Map::new();
        let mut names = HashSet::new();

        for (name, declaration) in ctx.node() {
            if !names.insert(name.to_lowercase()) {
                ctx.error(format!("Duplicate Output: {}", name));
                continue;
            }

            ctx.validate_logical_name("output name", name);

            if let Some(output) = ctx.compile_child(&OutputNode, name, declaration) {
                compiled.insert(name.clone(), Value::Object(output));
            }
        }

        Ok(Some(compiled))
    }
}

/// Compiles a single output declaration.
pub struct OutputNode;

impl NodeCompiler for OutputNode {
    fn name(&self, path: &NodePath<'_>) -> String {
        match path.last_name() {
            "" => "Output".to_string(),
            name => format!("Output {}", name),
        }
    }

    fn allowed_keys(&self) -> Option<&[&'static str]> {
        Some(OUTPUT_KEYS)
    }

    fn compile_node(&self, ctx: &mut NodeContext<'_, '_>) -> NodeResult<Option<Map<String, Value>>> {
        let mut output = Map::new();

        if let Some(description) = ctx.non_empty_text("Description")? {
            let entity = ctx.name().to_string();
            ctx.validate_description(&entity, &description);
            output.insert("Description".into(), Value::String(description));
        }

        match ctx.get("Value") {
            Some(value) => {
                output.insert("Value".into(), copy_of(value));
            }
            None => {
                let name = ctx.path().last_name().to_string();
                ctx.error(format!("Value is required for output {}.", name));
            }
        }

        Ok(Some(output))
    }
}
