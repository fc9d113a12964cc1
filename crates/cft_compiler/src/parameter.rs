//! Parameter section compilers.

use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{NodeError, NodeResult};
use crate::node::{scalar_text, to_text, value_kind, NodeCompiler, NodeContext, NodePath, TemplateValue};

/// Keys accepted in a parameter declaration.
pub const PARAMETER_KEYS: &[&str] = &[
    "Type",
    "Default",
    "NoEcho",
    "AllowedValues",
    "AllowedPattern",
    "MaxLength",
    "MinLength",
    "MaxValue",
    "MinValue",
    "Description",
    "ConstraintDescription",
];

/// Supported parameter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterType {
    String,
    Number,
    CommaDelimitedList,
}

impl ParameterType {
    /// Type names in declaration order.
    pub const NAMES: [&'static str; 3] = ["String", "Number", "CommaDelimitedList"];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterType::String => "String",
            ParameterType::Number => "Number",
            ParameterType::CommaDelimitedList => "CommaDelimitedList",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "String" => Some(ParameterType::String),
            "Number" => Some(ParameterType::Number),
            "CommaDelimitedList" => Some(ParameterType::CommaDelimitedList),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compiles the `Parameters` section entry by entry.
pub struct ParametersNode;

impl NodeCompiler for ParametersNode {
    fn name(&self, _path: &NodePath<'_>) -> String {
        "Parameters".to_string()
    }

    fn compile_node(&self, ctx: &mut NodeContext<'_, '_>) -> NodeResult<Option<Map<String, Value>>> {
        let mut compiled = Map::new();
        let mut names = HashSet::new();

        for (name, declaration) in ctx.node() {
            let folded = name.to_lowercase();
            if names.contains(&folded) {
                ctx.error(format!("Duplicate parameter name: {}", name));
                continue;
            }

            ctx.validate_logical_name("parameter name", name);

            // Only parameters that compiled claim their name.
            if let Some(parameter) = ctx.compile_child(&ParameterNode, name, declaration) {
                names.insert(folded);
                compiled.insert(name.clone(), Value::Object(parameter));
            }
        }

        Ok(Some(compiled))
    }
}

/// Compiles a single parameter declaration.
pub struct ParameterNode;

impl NodeCompiler for ParameterNode {
    fn name(&self, path: &NodePath<'_>) -> String {
        match path.last_name() {
            "" => "Parameter".to_string(),
            name => format!("Parameter {}", name),
        }
    }

    fn allowed_keys(&self) -> Option<&[&'static str]> {
        Some(PARAMETER_KEYS)
    }

    fn compile_node(&self, ctx: &mut NodeContext<'_, '_>) -> NodeResult<Option<Map<String, Value>>> {
        let name = ctx.path().last_name().to_string();

        let Some(type_name) = ctx.non_empty_text("Type")? else {
            ctx.error(format!("Type is missing for parameter {}.", name));
            return Ok(None);
        };

        let Some(kind) = ParameterType::from_name(&type_name) else {
            let message = format!(
                "Unexpected type {} for parameter {}. Possible parameter types: {}.",
                type_name,
                name,
                ParameterType::NAMES.join(", ")
            );
            ctx.error_with_nearest(&type_name, &ParameterType::NAMES, message);
            return Ok(None);
        };

        let mut parameter = Map::new();
        parameter.insert("Type".into(), Value::String(kind.as_str().to_string()));

        if let Some(description) = ctx.non_empty_text("Description")? {
            let entity = ctx.name().to_string();
            ctx.validate_description(&entity, &description);
            parameter.insert("Description".into(), Value::String(description));
        }

        let default = compile_default(ctx, &name, kind, &mut parameter)?;

        if let Some(constraint) = ctx.non_empty_text("ConstraintDescription")? {
            let entity = format!("{} constraint", ctx.name());
            ctx.validate_description(&entity, &constraint);
            parameter.insert("ConstraintDescription".into(), Value::String(constraint));
        }

        compile_length_constraint(ctx, &name, kind, default.as_ref(), &mut parameter)?;
        compile_range_constraint(ctx, &name, kind, default.as_ref(), &mut parameter)?;
        compile_allowed_values(ctx, &name, kind, default.as_ref(), &mut parameter);
        compile_allowed_pattern(ctx, &name, kind, default.as_ref(), &mut parameter)?;
        compile_no_echo(ctx, &name, &mut parameter);

        Ok(Some(parameter))
    }
}

fn compile_default(
    ctx: &mut NodeContext<'_, '_>,
    name: &str,
    kind: ParameterType,
    parameter: &mut Map<String, Value>,
) -> NodeResult<Option<TemplateValue>> {
    let Some(raw) = ctx.get("Default") else {
        return Ok(None);
    };

    let default = match kind {
        ParameterType::Number => {
            let text = scalar_or_shape_error(raw, name)?;
            Some(ctx.validate_number(&format!("Default for parameter {}", name), &text))
        }
        ParameterType::CommaDelimitedList => {
            let elements: Vec<String> = match raw {
                Value::Array(items) => items.iter().map(to_text).collect(),
                other => split_list(&to_text(other)),
            };

            let mut list = Vec::with_capacity(elements.len());
            for (index, element) in elements.iter().enumerate() {
                let element = element.trim();
                if element.contains(',') {
                    ctx.error(format!(
                        "Element {} with value '{}' of Default for parameter {} contains a comma. Commas are the list delimiter and there is no way to escape a comma.",
                        index, element, name
                    ));
                }
                list.push(element.to_string());
            }

            (!list.is_empty()).then(|| TemplateValue::text(list.join(", ")))
        }
        ParameterType::String => Some(TemplateValue::text(scalar_or_shape_error(raw, name)?)),
    };

    if let Some(default) = &default {
        parameter.insert("Default".into(), Value::String(default.as_str().to_string()));
    }

    Ok(default)
}

fn scalar_or_shape_error(value: &Value, name: &str) -> NodeResult<String> {
    scalar_text(value).ok_or_else(|| NodeError::UnexpectedShape {
        field: format!("Default for parameter {}", name),
        expected: "a scalar value",
        found: value_kind(value),
    })
}

/// Split on commas, dropping trailing empty elements.
fn split_list(text: &str) -> Vec<String> {
    if !text.contains(',') {
        return vec![text.to_string()];
    }

    let mut elements: Vec<String> = text.split(',').map(str::to_string).collect();
    while elements.last().map_or(false, |last| last.is_empty()) {
        elements.pop();
    }
    elements
}

fn compile_length_constraint(
    ctx: &mut NodeContext<'_, '_>,
    name: &str,
    kind: ParameterType,
    default: Option<&TemplateValue>,
    parameter: &mut Map<String, Value>,
) -> NodeResult<()> {
    if kind != ParameterType::String {
        for key in ["MinLength", "MaxLength"] {
            if ctx.contains_key(key) {
                ctx.error(format!(
                    "Parameter {} is type {}, but has a {} specified. MinLength and MaxLength are only valid for String parameters.",
                    name, kind, key
                ));
                break;
            }
        }
        return Ok(());
    }

    let mut valid = true;

    let mut min_length = 0;
    let mut min_length_text = String::new();
    if let Some(text) = ctx.text("MinLength")? {
        match ctx.validate_integer(&format!("MinLength in parameter {}", name), &text) {
            Some(value) => min_length = value,
            None => valid = false,
        }
        min_length_text = text.clone();
        parameter.insert("MinLength".into(), Value::String(text));
    }

    let mut max_length = usize::MAX;
    if let Some(text) = ctx.text("MaxLength")? {
        match ctx.validate_integer(&format!("MaxLength in parameter {}", name), &text) {
            Some(value) => {
                max_length = value;
                if valid && max_length < min_length {
                    ctx.error(format!(
                        "MaxLength of {} exceeds MinLength of {} in parameter {}",
                        text, min_length_text, name
                    ));
                }
            }
            None => valid = false,
        }
        parameter.insert("MaxLength".into(), Value::String(text));
    }

    if let (true, Some(default)) = (valid, default) {
        let length = default.as_str().chars().count();
        if length < min_length {
            ctx.error(format!(
                "Default value for parameter {} is {} characters, which is less than the MinLength constraint of {}.",
                name, length, min_length
            ));
        } else if length > max_length {
            ctx.error(format!(
                "Default value for parameter {} is {} characters, which is greater than the MaxLength constraint of {}.",
                name, length, max_length
            ));
        }
    }

    Ok(())
}

fn compile_range_constraint(
    ctx: &mut NodeContext<'_, '_>,
    name: &str,
    kind: ParameterType,
    default: Option<&TemplateValue>,
    parameter: &mut Map<String, Value>,
) -> NodeResult<()> {
    if kind != ParameterType::Number {
        for key in ["MinValue", "MaxValue"] {
            if ctx.contains_key(key) {
                ctx.error(format!(
                    "Parameter {} is type {}, but has a {} specified. MinValue and MaxValue are only valid for Number parameters.",
                    name, kind, key
                ));
                break;
            }
        }
        return Ok(());
    }

    let mut min_value = None;
    if let Some(text) = ctx.text("MinValue")? {
        min_value = Some(ctx.validate_number(&format!("MinValue in parameter {}", name), &text));
        parameter.insert("MinValue".into(), Value::String(text));
    }

    let mut max_value = None;
    if let Some(text) = ctx.text("MaxValue")? {
        let max = ctx.validate_number(&format!("MaxValue in parameter {}", name), &text);
        if let (Some(min), Some(max_n)) = (min_value.as_ref().and_then(TemplateValue::numeric), max.numeric()) {
            if min.as_f64() > max_n.as_f64() {
                let min_text = min_value.as_ref().map(TemplateValue::to_string).unwrap_or_default();
                ctx.error(format!(
                    "MaxValue of {} exceeds MinValue of {} in parameter {}",
                    max, min_text, name
                ));
            }
        }
        max_value = Some(max);
        parameter.insert("MaxValue".into(), Value::String(text));
    }

    let Some(default_n) = default.and_then(TemplateValue::numeric) else {
        return Ok(());
    };
    let default_text = default.map(TemplateValue::to_string).unwrap_or_default();

    if let Some(min) = min_value.as_ref().filter(|min| {
        min.numeric().map_or(false, |n| n.as_f64() > default_n.as_f64())
    }) {
        ctx.error(format!(
            "Default value for parameter {} is {}, which is less than the MinValue constraint of {}.",
            name, default_text, min
        ));
    } else if let Some(max) = max_value.as_ref().filter(|max| {
        max.numeric().map_or(false, |n| n.as_f64() < default_n.as_f64())
    }) {
        ctx.error(format!(
            "Default value for parameter {} is {}, which is greater than the MaxValue constraint of {}.",
            name, default_text, max
        ));
    }

    Ok(())
}

fn compile_allowed_values(
    ctx: &mut NodeContext<'_, '_>,
    name: &str,
    kind: ParameterType,
    default: Option<&TemplateValue>,
    parameter: &mut Map<String, Value>,
) {
    let Some(raw) = ctx.get("AllowedValues") else {
        return;
    };

    if kind == ParameterType::CommaDelimitedList {
        ctx.error(format!(
            "Parameter {} is type {}, but has a AllowedValues specified. AllowedValues are only valid for String or Number parameters.",
            name, kind
        ));
        return;
    }

    let allowed: Vec<String> = match raw {
        Value::Array(items) => items.iter().map(to_text).collect(),
        other => vec![to_text(other)],
    };

    let mut default_found = default.is_none();
    for value in &allowed {
        if let Some(default) = default {
            default_found = default_found || value == default.as_str();
        }
        if kind == ParameterType::Number {
            ctx.validate_number(&format!("AllowedValues in parameter {}", name), value);
        }
    }

    if let (false, Some(default)) = (default_found, default) {
        ctx.error(format!(
            "Parameter {} Default value {} does not exist in AllowedValues constraint. Allowed values: {}",
            name,
            default,
            allowed.join(", ")
        ));
    }

    parameter.insert(
        "AllowedValues".into(),
        Value::Array(allowed.into_iter().map(Value::String).collect()),
    );
}

/// Patterns use `regex` syntax, so lookaround and backreferences are
/// reported as invalid patterns.
fn compile_allowed_pattern(
    ctx: &mut NodeContext<'_, '_>,
    name: &str,
    kind: ParameterType,
    default: Option<&TemplateValue>,
    parameter: &mut Map<String, Value>,
) -> NodeResult<()> {
    if kind != ParameterType::String {
        if ctx.contains_key("AllowedPattern") {
            ctx.error(format!(
                "Parameter {} is type {}, but has an AllowedPattern specified. AllowedPattern is only valid for String parameters.",
                name, kind
            ));
        }
        return Ok(());
    }

    let Some(pattern) = ctx.non_empty_text("AllowedPattern")? else {
        return Ok(());
    };

    // The default must match the whole pattern, not just a substring.
    let compiled = Regex::new(&pattern).and_then(|_| Regex::new(&format!("^(?:{})$", pattern)));
    match compiled {
        Ok(regex) => {
            if let Some(default) = default.filter(|d| !regex.is_match(d.as_str())) {
                ctx.error(format!(
                    "Parameter {} Default value {} does not match AllowedPattern constraint.",
                    name, default
                ));
            }
        }
        Err(err) => {
            ctx.error(format!(
                "{} is not a valid AllowedPattern for parameter {}. Value must be a regex. Error: {}",
                pattern, name, err
            ));
        }
    }

    parameter.insert("AllowedPattern".into(), Value::String(pattern));
    Ok(())
}

fn compile_no_echo(ctx: &mut NodeContext<'_, '_>, name: &str, parameter: &mut Map<String, Value>) {
    let Some(raw) = ctx.get("NoEcho") else {
        return;
    };

    let enabled = match raw {
        Value::Bool(flag) => *flag,
        other => {
            let text = to_text(other);
            if text.trim().is_empty() {
                ctx.warn(format!(
                    "No value provided for NoEcho in parameter {}. Assuming false.",
                    name
                ));
                false
            } else if text.eq_ignore_ascii_case("true") {
                true
            } else {
                if !text.eq_ignore_ascii_case("false") {
                    ctx.warn(format!(
                        "Unexpected value {} for NoEcho in parameter {}. Assuming false.",
                        text, name
                    ));
                }
                false
            }
        }
    };

    if enabled {
        parameter.insert("NoEcho".into(), Value::String("TRUE".to_string()));
    }
}
