//! Checks that span more than one template section.
//!
//! These run on the compiled sections, after every section compiler has
//! finished, so they only see entries that survived compilation.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::diagnostics::Diagnostics;

/// Report every resource whose name equals a parameter name, ignoring case.
pub fn check_name_collisions(
    parameters: &Map<String, Value>,
    resources: &Map<String, Value>,
    diagnostics: &mut Diagnostics,
) {
    let parameter_names: HashSet<String> = parameters.keys().map(|name| name.to_lowercase()).collect();

    for name in resources.keys() {
        if parameter_names.contains(&name.to_lowercase()) {
            diagnostics.error(format!(
                "A parameter and a resource both have name {}. All parameters and resources must have unique names.",
                name
            ));
        }
    }
}

/// Report missing `DependsOn` targets and dependency cycles.
///
/// A cycle is reported once, against the resource whose walk found it.
pub fn check_depends_on(resources: &Map<String, Value>, diagnostics: &mut Diagnostics) {
    let mut checked = HashSet::new();

    for name in resources.keys() {
        if checked.contains(name.as_str()) {
            continue;
        }

        let mut ancestors = Vec::new();
        if walk_depends_on(resources, name, &mut ancestors, &mut checked, diagnostics) {
            diagnostics.error(format!("Circular DependsOn dependency chain with resource {}", name));
        }
    }
}

/// Follow the `DependsOn` edge of `name`; true if it leads back onto `ancestors`.
fn walk_depends_on<'r>(
    resources: &'r Map<String, Value>,
    name: &'r str,
    ancestors: &mut Vec<&'r str>,
    checked: &mut HashSet<&'r str>,
    diagnostics: &mut Diagnostics,
) -> bool {
    checked.insert(name);

    let Some(target) = depends_on(resources, name) else {
        return false;
    };

    let Some((target, _)) = resources.get_key_value(target) else {
        diagnostics.error(format!(
            "DependsOn for resource {} targets resource {}, which does not exist.",
            name, target
        ));
        return false;
    };

    ancestors.push(name);
    let circular = if target == name || ancestors.contains(&target.as_str()) {
        true
    } else if checked.contains(target.as_str()) {
        false
    } else {
        walk_depends_on(resources, target, ancestors, checked, diagnostics)
    };
    ancestors.pop();

    circular
}

fn depends_on<'r>(resources: &'r Map<String, Value>, name: &str) -> Option<&'r str> {
    resources.get(name)?.get("DependsOn")?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resources(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected a mapping"),
        }
    }

    fn messages(diagnostics: &Diagnostics) -> Vec<&str> {
        diagnostics.issues().iter().map(|issue| issue.message()).collect()
    }

    #[test]
    fn test_two_resource_cycle() {
        let resources = resources(json!({
            "A": {"Type": "T", "DependsOn": "B"},
            "B": {"Type": "T", "DependsOn": "A"}
        }));
        let mut diagnostics = Diagnostics::new();
        check_depends_on(&resources, &mut diagnostics);
        assert_eq!(messages(&diagnostics), vec!["Circular DependsOn dependency chain with resource A"]);
    }

    #[test]
    fn test_acyclic_in_any_order() {
        let forward = resources(json!({
            "A": {"Type": "T", "DependsOn": "B"},
            "B": {"Type": "T"}
        }));
        let backward = resources(json!({
            "B": {"Type": "T"},
            "A": {"Type": "T", "DependsOn": "B"}
        }));

        for resources in [forward, backward] {
            let mut diagnostics = Diagnostics::new();
            check_depends_on(&resources, &mut diagnostics);
            assert!(diagnostics.is_empty());
        }
    }

    #[test]
    fn test_long_chain_and_self_cycle() {
        let chain = resources(json!({
            "C": {"Type": "T", "DependsOn": "A"},
            "B": {"Type": "T", "DependsOn": "C"},
            "A": {"Type": "T", "DependsOn": "B"},
            "D": {"Type": "T", "DependsOn": "A"}
        }));
        let mut diagnostics = Diagnostics::new();
        check_depends_on(&chain, &mut diagnostics);
        assert_eq!(messages(&diagnostics), vec!["Circular DependsOn dependency chain with resource C"]);

        let selfish = resources(json!({"A": {"Type": "T", "DependsOn": "A"}}));
        let mut diagnostics = Diagnostics::new();
        check_depends_on(&selfish, &mut diagnostics);
        assert_eq!(messages(&diagnostics), vec!["Circular DependsOn dependency chain with resource A"]);
    }

    #[test]
    fn test_missing_target() {
        let resources = resources(json!({
            "A": {"Type": "T", "DependsOn": "Ghost"},
            "B": {"Type": "T", "DependsOn": "A"}
        }));
        let mut diagnostics = Diagnostics::new();
        check_depends_on(&resources, &mut diagnostics);
        assert_eq!(
            messages(&diagnostics),
            vec!["DependsOn for resource A targets resource Ghost, which does not exist."]
        );
    }

    #[test]
    fn test_name_collisions() {
        let parameters = resources(json!({"Bucket": {"Type": "String"}, "Size": {"Type": "Number"}}));
        let compiled = resources(json!({"BUCKET": {"Type": "T"}, "Queue": {"Type": "T"}}));
        let mut diagnostics = Diagnostics::new();
        check_name_collisions(&parameters, &compiled, &mut diagnostics);
        assert_eq!(
            messages(&diagnostics),
            vec!["A parameter and a resource both have name BUCKET. All parameters and resources must have unique names."]
        );
    }
}
