//! Mappings section compilers.
//!
//! A mapping is a three level structure `name -> key -> attribute -> value`
//! where each value is a scalar or a sequence of scalars. Values are
//! normalized to strings; empty levels are dropped from the output.

use serde_json::{Map, Value};

use crate::error::{NodeError, NodeResult};
use crate::node::{to_text, value_kind, NodeCompiler, NodeContext, NodePath};

/// Compiles the `Mappings` section.
pub struct MappingsNode;

impl NodeCompiler for MappingsNode {
    fn name(&self, _path: &NodePath<'_>) -> String {
        "Mappings".to_string()
    }

    fn compile_node(&self, ctx: &mut NodeContext<'_, '_>) -> NodeResult<Option<Map<String, Value>>> {
        let mut compiled = Map::new();

        for (name, mapping) in ctx.node() {
            ctx.validate_logical_name("mapping name", name);

            if let Some(mapping) = ctx.compile_child(&MappingNode, name, mapping) {
                if !mapping.is_empty() {
                    compiled.insert(name.clone(), Value::Object(mapping));
                }
            }
        }

        Ok(Some(compiled))
    }
}

/// Compiles one named mapping.
pub struct MappingNode;

impl NodeCompiler for MappingNode {
    fn name(&self, path: &NodePath<'_>) -> String {
        match path.last_name() {
            "" => "Mapping".to_string(),
            name => format!("Mapping {}", name),
        }
    }

    fn compile_node(&self, ctx: &mut NodeContext<'_, '_>) -> NodeResult<Option<Map<String, Value>>> {
        let mut mapping = Map::new();

        for (key, attributes) in ctx.node() {
            let attributes = match attributes {
                Value::Null => continue,
                Value::Object(attributes) => attributes,
                other => {
                    return Err(NodeError::UnexpectedShape {
                        field: format!("{} in {}", key, ctx.name()),
                        expected: "a mapping",
                        found: value_kind(other),
                    })
                }
            };

            let mut entries = Map::new();
            for (attribute, value) in attributes {
                match value {
                    Value::Null => {}
                    Value::Array(items) => {
                        if !items.is_empty() {
                            let items = items.iter().map(|item| Value::String(to_text(item))).collect();
                            entries.insert(attribute.clone(), Value::Array(items));
                        }
                    }
                    Value::Object(_) => {
                        return Err(NodeError::UnexpectedShape {
                            field: format!("{} {} in {}", key, attribute, ctx.name()),
                            expected: "a scalar or a sequence",
                            found: "mapping",
                        })
                    }
                    scalar => {
                        entries.insert(attribute.clone(), Value::String(to_text(scalar)));
                    }
                }
            }

            if !entries.is_empty() {
                mapping.insert(key.clone(), Value::Object(entries));
            }
        }

        Ok(Some(mapping))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use serde_json::json;

    fn compile_mappings(mappings: Value) -> (Option<Map<String, Value>>, Vec<String>) {
        let mut diagnostics = Diagnostics::new();
        let template = json!({});
        let compiled = MappingsNode.compile(
            NodePath::root().append("Mappings", &template),
            &mappings,
            &mut diagnostics,
        );
        let messages = diagnostics
            .issues()
            .iter()
            .map(|issue| issue.message().to_string())
            .collect();
        (compiled, messages)
    }

    #[test]
    fn test_leaves_are_stringified() {
        let (compiled, messages) = compile_mappings(json!({
            "RegionMap": {
                "us-east-1": {"AMI": "ami-123", "Size": 8, "Zones": ["a", 2, true]},
                "eu-west-1": {"AMI": "ami-456", "Size": 16.5, "Zones": []}
            }
        }));

        assert!(messages.is_empty(), "{:?}", messages);
        assert_eq!(
            Value::Object(compiled.unwrap()),
            json!({
                "RegionMap": {
                    "us-east-1": {"AMI": "ami-123", "Size": "8", "Zones": ["a", "2", "true"]},
                    "eu-west-1": {"AMI": "ami-456", "Size": "16.5"}
                }
            })
        );
    }

    #[test]
    fn test_empty_levels_dropped() {
        let (compiled, messages) = compile_mappings(json!({
            "Empty": {},
            "Hollow": {"key": {}},
            "Nulls": {"key": {"attr": null}, "other": null}
        }));

        assert!(messages.is_empty());
        assert!(compiled.unwrap().is_empty());
    }

    #[test]
    fn test_inner_keys_are_not_logical_names() {
        let (_, messages) = compile_mappings(json!({
            "Bad-Name": {"us-east-1": {"AMI": "x"}}
        }));
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Bad-Name is not a valid mapping name."));
    }

    #[test]
    fn test_malformed_mapping_is_scoped() {
        let (compiled, messages) = compile_mappings(json!({
            "Broken": {"key": "not-a-map"},
            "Fine": {"key": {"attr": "v"}}
        }));

        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0],
            "Internal compiler error in Mapping Broken: key in Mapping Broken must be a mapping, found string"
        );
        let compiled = compiled.unwrap();
        assert!(!compiled.contains_key("Broken"));
        assert_eq!(compiled["Fine"], json!({"key": {"attr": "v"}}));
    }
}
