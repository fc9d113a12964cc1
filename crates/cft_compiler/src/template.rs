//! Root template compiler.

use serde_json::{Map, Value};

use crate::checks::{check_depends_on, check_name_collisions};
use crate::error::NodeResult;
use crate::mappings::MappingsNode;
use crate::node::{NodeCompiler, NodeContext, NodePath};
use crate::output::OutputsNode;
use crate::parameter::ParametersNode;
use crate::registry::PropertiesRegistry;
use crate::resource::ResourcesNode;

/// The only supported `AWSTemplateFormatVersion`.
pub const TEMPLATE_VERSION: &str = "2010-09-09";

/// Most parameters a template may declare.
pub const MAX_PARAMETERS: usize = 32;

/// Most outputs a template may declare.
pub const MAX_OUTPUTS: usize = 32;

/// Top-level keys accepted in a template.
pub const TEMPLATE_KEYS: &[&str] = &[
    "AWSTemplateFormatVersion",
    "Description",
    "Parameters",
    "Mappings",
    "Resources",
    "Outputs",
];

/// Compiles a whole template.
pub struct TemplateNode<'r> {
    pub registry: &'r PropertiesRegistry,
}

impl NodeCompiler for TemplateNode<'_> {
    fn name(&self, _path: &NodePath<'_>) -> String {
        "Template".to_string()
    }

    fn allowed_keys(&self) -> Option<&[&'static str]> {
        Some(TEMPLATE_KEYS)
    }

    fn compile_node(&self, ctx: &mut NodeContext<'_, '_>) -> NodeResult<Option<Map<String, Value>>> {
        match ctx.text("AWSTemplateFormatVersion")? {
            None => {
                ctx.error(format!(
                    "AWSTemplateFormatVersion is required. Valid versions: {}",
                    TEMPLATE_VERSION
                ));
                return Ok(None);
            }
            Some(version) if version != TEMPLATE_VERSION => {
                ctx.error(format!(
                    "Unknown template version: {}. Supported template versions: {}",
                    version, TEMPLATE_VERSION
                ));
                return Ok(None);
            }
            Some(_) => {}
        }

        let mut template = Map::new();
        template.insert(
            "AWSTemplateFormatVersion".into(),
            Value::String(TEMPLATE_VERSION.to_string()),
        );

        if let Some(description) = ctx.non_empty_text("Description")? {
            ctx.validate_description("Template", &description);
            template.insert("Description".into(), Value::String(description));
        }

        let parameters = compile_section(ctx, &ParametersNode, "Parameters");
        if let Some(parameters) = &parameters {
            if parameters.len() > MAX_PARAMETERS {
                ctx.error(format!(
                    "There are {} parameters defined. This exceeds the limit of {} parameters.",
                    parameters.len(),
                    MAX_PARAMETERS
                ));
            }
        }

        let mappings = compile_section(ctx, &MappingsNode, "Mappings");

        let resources_compiler = ResourcesNode {
            registry: self.registry,
        };
        let resources = if is_empty_section(ctx.get("Resources")) {
            ctx.error("At least one resource definition is required.");
            None
        } else {
            compile_section(ctx, &resources_compiler, "Resources")
        };

        let outputs = compile_section(ctx, &OutputsNode, "Outputs");
        if let Some(outputs) = &outputs {
            if outputs.len() > MAX_OUTPUTS {
                ctx.error(format!(
                    "There are {} outputs defined. This exceeds the limit of {} outputs.",
                    outputs.len(),
                    MAX_OUTPUTS
                ));
            }
        }

        if let Some(resources) = &resources {
            if let Some(parameters) = &parameters {
                check_name_collisions(parameters, resources, ctx.diagnostics());
            }
            check_depends_on(resources, ctx.diagnostics());
        }

        let sections = [
            ("Parameters", parameters),
            ("Mappings", mappings),
            ("Resources", resources),
            ("Outputs", outputs),
        ];
        for (key, section) in sections {
            if let Some(section) = section {
                template.insert(key.into(), Value::Object(section));
            }
        }

        Ok(Some(template))
    }
}

fn is_empty_section(section: Option<&Value>) -> bool {
    match section {
        None => true,
        Some(Value::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

/// Compile a top-level section; `None` when it is absent or compiles to nothing.
fn compile_section<C: NodeCompiler>(
    ctx: &mut NodeContext<'_, '_>,
    compiler: &C,
    key: &str,
) -> Option<Map<String, Value>> {
    let section = ctx.get(key);
    if is_empty_section(section) {
        return None;
    }

    let compiled = ctx.compile_child(compiler, key, section?)?;
    (!compiled.is_empty()).then_some(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use serde_json::json;

    fn compile_template(template: Value) -> (Option<Map<String, Value>>, Vec<String>) {
        let registry = PropertiesRegistry::new();
        let mut diagnostics = Diagnostics::new();
        let compiled = TemplateNode {
            registry: &registry,
        }
        .compile(NodePath::root(), &template, &mut diagnostics);
        let messages = diagnostics
            .issues()
            .iter()
            .map(|issue| issue.message().to_string())
            .collect();
        (compiled, messages)
    }

    #[test]
    fn test_version_required() {
        let (compiled, messages) = compile_template(json!({"Resources": {"A": {"Type": "T"}}}));
        assert!(compiled.is_none());
        assert_eq!(messages, vec!["AWSTemplateFormatVersion is required. Valid versions: 2010-09-09"]);

        let (compiled, messages) = compile_template(json!({
            "AWSTemplateFormatVersion": "2011-01-01",
            "Resources": {"A": {"Type": "T"}}
        }));
        assert!(compiled.is_none());
        assert_eq!(
            messages,
            vec!["Unknown template version: 2011-01-01. Supported template versions: 2010-09-09"]
        );
    }

    #[test]
    fn test_resources_required() {
        for template in [
            json!({"AWSTemplateFormatVersion": "2010-09-09"}),
            json!({"AWSTemplateFormatVersion": "2010-09-09", "Resources": {}}),
        ] {
            let (compiled, messages) = compile_template(template);
            assert_eq!(messages, vec!["At least one resource definition is required."]);
            assert_eq!(
                Value::Object(compiled.unwrap()),
                json!({"AWSTemplateFormatVersion": "2010-09-09"})
            );
        }
    }

    #[test]
    fn test_section_order_and_omission() {
        let (compiled, messages) = compile_template(json!({
            "Outputs": {"Name": {"Value": {"Ref": "Bucket"}}},
            "Resources": {"Bucket": {"Type": "AWS::S3::Bucket"}},
            "Mappings": {},
            "Parameters": {},
            "Description": "Storage",
            "AWSTemplateFormatVersion": "2010-09-09"
        }));

        assert!(messages.is_empty(), "{:?}", messages);
        let compiled = compiled.unwrap();
        let keys: Vec<&str> = compiled.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["AWSTemplateFormatVersion", "Description", "Resources", "Outputs"]);
    }

    #[test]
    fn test_unknown_top_level_key() {
        let (_, messages) = compile_template(json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Resource": {"Bucket": {"Type": "AWS::S3::Bucket"}}
        }));

        assert_eq!(messages.len(), 2);
        assert!(messages[0].starts_with("Unexpected key in template: Resource."));
        assert!(messages[0].ends_with("Perhaps you meant Resources?"));
        assert_eq!(messages[1], "At least one resource definition is required.");
    }

    #[test]
    fn test_output_limit() {
        let outputs: Map<String, Value> = (0..33)
            .map(|i| (format!("Out{}", i), json!({"Value": "v"})))
            .collect();
        let (compiled, messages) = compile_template(json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Resources": {"Bucket": {"Type": "AWS::S3::Bucket"}},
            "Outputs": outputs
        }));

        assert_eq!(
            messages,
            vec!["There are 33 outputs defined. This exceeds the limit of 32 outputs."]
        );
        assert_eq!(compiled.unwrap()["Outputs"].as_object().unwrap().len(), 33);
    }

    #[test]
    fn test_cross_section_checks_run() {
        let (_, messages) = compile_template(json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Parameters": {"Bucket": {"Type": "String"}},
            "Resources": {
                "Bucket": {"Type": "AWS::S3::Bucket", "DependsOn": "Queue"},
                "Queue": {"Type": "AWS::SQS::Queue", "DependsOn": "Bucket"}
            }
        }));

        assert_eq!(
            messages,
            vec![
                "A parameter and a resource both have name Bucket. All parameters and resources must have unique names.",
                "Circular DependsOn dependency chain with resource Bucket",
            ]
        );
    }

    #[test]
    fn test_broken_section_is_scoped() {
        let (compiled, messages) = compile_template(json!({
            "AWSTemplateFormatVersion": "2010-09-09",
            "Mappings": ["not", "a", "mapping"],
            "Resources": {"Bucket": {"Type": "AWS::S3::Bucket"}}
        }));

        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Internal compiler error in Mappings:"));
        assert!(compiled.unwrap().contains_key("Resources"));
    }
}
