//! Resource section compilers.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{NodeError, NodeResult};
use crate::node::{copy_of, value_kind, NodeCompiler, NodeContext, NodePath};
use crate::registry::{PropertiesNode, PropertiesRegistry};

/// Keys accepted in a resource declaration.
pub const RESOURCE_KEYS: &[&str] = &["Type", "Properties", "DeletionPolicy", "DependsOn", "Metadata"];

static EMPTY_PROPERTIES: Lazy<Value> = Lazy::new(|| Value::Object(Map::new()));

/// What happens to a resource when its stack is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeletionPolicy {
    Delete,
    Retain,
    Snapshot,
}

impl DeletionPolicy {
    pub const NAMES: [&'static str; 3] = ["Delete", "Retain", "Snapshot"];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionPolicy::Delete => "Delete",
            DeletionPolicy::Retain => "Retain",
            DeletionPolicy::Snapshot => "Snapshot",
        }
    }
}

impl FromStr for DeletionPolicy {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Delete" => Ok(DeletionPolicy::Delete),
            "Retain" => Ok(DeletionPolicy::Retain),
            "Snapshot" => Ok(DeletionPolicy::Snapshot),
            other => Err(NodeError::Invalid(format!("Unknown deletion policy: {}", other))),
        }
    }
}

impl fmt::Display for DeletionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compiles the `Resources` section.
pub struct ResourcesNode<'r> {
    pub registry: &'r PropertiesRegistry,
}

impl NodeCompiler for ResourcesNode<'_> {
    fn name(&self, _path: &NodePath<'_>) -> String {
        "Resources".to_string()
    }

    fn compile_node(&self, ctx: &mut NodeContext<'_, '_>) -> NodeResult<Option<Map<String, Value>>> {
        let resource_compiler = ResourceNode {
            registry: self.registry,
        };
        let mut compiled = Map::new();
        let mut names = HashSet::new();

        for (name, declaration) in ctx.node() {
            // Names are claimed before compiling, so a broken first entry still shadows later ones.
            if !names.insert(name.to_lowercase()) {
                ctx.error(format!("Duplicate resource: {}", name));
                continue;
            }

            ctx.validate_logical_name("resource name", name);

            if declaration.is_null() {
                ctx.error(format!("Type is required for resource {}", name));
                continue;
            }

            if let Some(resource) = ctx.compile_child(&resource_compiler, name, declaration) {
                compiled.insert(name.clone(), Value::Object(resource));
            }
        }

        Ok(Some(compiled))
    }
}

/// Compiles a single resource declaration.
pub struct ResourceNode<'r> {
    pub registry: &'r PropertiesRegistry,
}

impl NodeCompiler for ResourceNode<'_> {
    fn name(&self, path: &NodePath<'_>) -> String {
        match path.last_name() {
            "" => "Resource".to_string(),
            name => format!("Resource {}", name),
        }
    }

    fn allowed_keys(&self) -> Option<&[&'static str]> {
        Some(RESOURCE_KEYS)
    }

    fn compile_node(&self, ctx: &mut NodeContext<'_, '_>) -> NodeResult<Option<Map<String, Value>>> {
        let name = ctx.path().last_name().to_string();

        let Some(resource_type) = ctx.non_empty_text("Type")? else {
            ctx.error(format!("Type is required for resource {}", name));
            return Ok(None);
        };

        let mut resource = Map::new();
        resource.insert("Type".into(), Value::String(resource_type.clone()));

        let properties = ctx.get("Properties").unwrap_or(&*EMPTY_PROPERTIES);
        if !properties.is_object() {
            return Err(NodeError::UnexpectedShape {
                field: format!("Properties in {}", ctx.name()),
                expected: "a mapping",
                found: value_kind(properties),
            });
        }

        let compiled_properties = match self.registry.get(&resource_type) {
            Some(validator) => {
                let node = PropertiesNode {
                    validator: validator.as_ref(),
                };
                ctx.compile_child(&node, "Properties", properties)
                    .map(Value::Object)
                    .unwrap_or_else(|| Value::Object(Map::new()))
            }
            None => copy_of(properties),
        };
        resource.insert("Properties".into(), compiled_properties);

        if let Some(metadata) = ctx.get("Metadata") {
            resource.insert("Metadata".into(), copy_of(metadata));
        }

        if let Some(depends_on) = ctx.non_empty_text("DependsOn")? {
            if ctx.validate_logical_name(&format!("DependsOn for resource {}", name), &depends_on) {
                resource.insert("DependsOn".into(), Value::String(depends_on));
            }
        }

        if let Some(policy) = ctx.non_empty_text("DeletionPolicy")? {
            match policy.parse::<DeletionPolicy>() {
                Ok(parsed) => debug!("Resource {} uses deletion policy {}", name, parsed),
                Err(err) => {
                    debug!("Resource {}: {}", name, err);
                    let message = format!(
                        "Unexpected deletion policy in resource {}. Allowed values: {}.",
                        name,
                        DeletionPolicy::NAMES.join(", ")
                    );
                    ctx.error_with_nearest(&policy, &DeletionPolicy::NAMES, message);
                }
            }
            resource.insert("DeletionPolicy".into(), Value::String(policy));
        }

        Ok(Some(resource))
    }
}
