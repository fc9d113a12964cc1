//! Registry of type-specific resource properties validators.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::NodeResult;
use crate::node::{NodeCompiler, NodeContext, NodePath};

/// Validates the `Properties` of one resource type.
///
/// Implementations receive the properties mapping through a [`NodeContext`]
/// and return the normalized properties, or `None` to drop them.
pub trait PropertiesValidator: Send + Sync {
    /// Resource type handled, e.g. `AWS::S3::Bucket`.
    fn resource_type(&self) -> &str;

    /// Property keys permitted for the type, or `None` to accept any key.
    fn allowed_keys(&self) -> Option<&[&'static str]> {
        None
    }

    /// Validate the properties node.
    fn validate(&self, ctx: &mut NodeContext<'_, '_>) -> NodeResult<Option<Map<String, Value>>>;
}

/// Maps resource type names to their properties validators.
///
/// Resource types without a registered validator have their properties
/// copied through unvalidated.
#[derive(Default, Clone)]
pub struct PropertiesRegistry {
    validators: HashMap<String, Arc<dyn PropertiesValidator>>,
}

impl PropertiesRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            validators: HashMap::new(),
        }
    }

    /// Register a validator under its `resource_type()`.
    ///
    /// A validator already registered for the same type is replaced.
    pub fn register(&mut self, validator: Arc<dyn PropertiesValidator>) {
        let resource_type = validator.resource_type().to_string();
        debug!("Registering properties validator: {}", resource_type);
        self.validators.insert(resource_type, validator);
    }

    pub fn get(&self, resource_type: &str) -> Option<Arc<dyn PropertiesValidator>> {
        self.validators.get(resource_type).cloned()
    }

    pub fn contains(&self, resource_type: &str) -> bool {
        self.validators.contains_key(resource_type)
    }

    /// Registered resource type names.
    pub fn names(&self) -> Vec<&str> {
        self.validators.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub fn unregister(&mut self, resource_type: &str) -> Option<Arc<dyn PropertiesValidator>> {
        debug!("Unregistering properties validator: {}", resource_type);
        self.validators.remove(resource_type)
    }
}

impl std::fmt::Debug for PropertiesRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertiesRegistry")
            .field("validators", &self.validators.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Runs a [`PropertiesValidator`] as the compiler of a `Properties` node.
pub(crate) struct PropertiesNode<'v> {
    pub validator: &'v dyn PropertiesValidator,
}

impl NodeCompiler for PropertiesNode<'_> {
    fn name(&self, path: &NodePath<'_>) -> String {
        match path.name_from_end(1) {
            Some(resource) if !resource.is_empty() => format!("Resource {} Properties", resource),
            _ => "Resource Properties".to_string(),
        }
    }

    fn allowed_keys(&self) -> Option<&[&'static str]> {
        self.validator.allowed_keys()
    }

    fn compile_node(&self, ctx: &mut NodeContext<'_, '_>) -> NodeResult<Option<Map<String, Value>>> {
        self.validator.validate(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BucketValidator;

    impl PropertiesValidator for BucketValidator {
        fn resource_type(&self) -> &str {
            "AWS::S3::Bucket"
        }

        fn validate(&self, ctx: &mut NodeContext<'_, '_>) -> NodeResult<Option<Map<String, Value>>> {
            Ok(Some(ctx.node().clone()))
        }
    }

    #[test]
    fn test_registry_register() {
        let mut registry = PropertiesRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(BucketValidator));

        assert_eq!(registry.len(), 1);
        assert!(registry.contains("AWS::S3::Bucket"));
        assert_eq!(registry.names(), vec!["AWS::S3::Bucket"]);
    }

    #[test]
    fn test_registry_get_and_unregister() {
        let mut registry = PropertiesRegistry::new();
        registry.register(Arc::new(BucketValidator));

        let validator = registry.get("AWS::S3::Bucket").unwrap();
        assert_eq!(validator.resource_type(), "AWS::S3::Bucket");
        assert!(registry.get("AWS::EC2::Instance").is_none());

        assert!(registry.unregister("AWS::S3::Bucket").is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_properties_node_name() {
        let validator = BucketValidator;
        let node = PropertiesNode {
            validator: &validator,
        };
        let root = serde_json::json!({});
        let path = NodePath::root()
            .append("Resources", &root)
            .append("Logs", &root)
            .append("Properties", &root);
        assert_eq!(node.name(&path), "Resource Logs Properties");
        assert_eq!(node.name(&NodePath::root()), "Resource Properties");
    }
}
