//! Generic node-compiler framework.
//!
//! A [`NodeCompiler`] validates one mapping node of the template tree and
//! produces its normalized form. All per-call state (the node, its path from
//! the template root and the issue list) lives in a [`NodeContext`] built for
//! that call, so compiler values themselves are stateless and can be shared
//! between concurrent compilations.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::diagnostics::Diagnostics;
use crate::error::{NodeError, NodeResult};

/// Longest description accepted anywhere in a template.
pub const MAX_DESCRIPTION_LENGTH: usize = 4000;

/// Largest edit distance for which a "Perhaps you meant" hint is offered.
pub const SUGGESTION_THRESHOLD: usize = 6;

static LOGICAL_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("logical name pattern is valid"));
static INTEGER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+$").expect("integer pattern is valid"));
static NUMBER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+\-]?)([0-9]+)(\.[0-9]+)?$").expect("number pattern is valid")
});

/// One step of the descent from the template root.
#[derive(Debug, Clone)]
pub struct PathEntry<'a> {
    pub name: String,
    /// The node the named entry was found in.
    pub node: &'a Value,
}

/// Immutable path from the template root to the node being compiled.
#[derive(Debug, Clone, Default)]
pub struct NodePath<'a> {
    entries: Vec<PathEntry<'a>>,
}

impl<'a> NodePath<'a> {
    pub fn root() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// A new path extended by one entry; `self` is left untouched.
    pub fn append(&self, name: impl Into<String>, node: &'a Value) -> NodePath<'a> {
        let mut entries = self.entries.clone();
        entries.push(PathEntry {
            name: name.into(),
            node,
        });
        NodePath { entries }
    }

    /// Name of the last entry, or "" at the root.
    pub fn last_name(&self) -> &str {
        self.name_from_end(0).unwrap_or("")
    }

    /// Name `offset` entries before the last one.
    pub fn name_from_end(&self, offset: usize) -> Option<&str> {
        self.entries
            .len()
            .checked_sub(offset + 1)
            .and_then(|index| self.entries.get(index))
            .map(|entry| entry.name.as_str())
    }

    pub fn entries(&self) -> &[PathEntry<'a>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for NodePath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.entries.iter().map(|e| e.name.as_str()).collect();
        write!(f, "{}", names.join(" "))
    }
}

/// Numeric value parsed from template text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Integer(i64),
    Float(f64),
}

impl Numeric {
    pub fn as_f64(self) -> f64 {
        match self {
            Numeric::Integer(value) => value as f64,
            Numeric::Float(value) => value,
        }
    }
}

/// Template text together with its numeric reading, when it has one.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateValue {
    text: String,
    numeric: Option<Numeric>,
}

impl TemplateValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            text: value.into(),
            numeric: None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn numeric(&self) -> Option<Numeric> {
        self.numeric
    }
}

impl fmt::Display for TemplateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// Compiler for one kind of template node.
pub trait NodeCompiler {
    /// Context name used in messages, e.g. `Parameter InstanceType`.
    fn name(&self, path: &NodePath<'_>) -> String;

    /// Keys permitted in the node, or `None` to accept any key.
    fn allowed_keys(&self) -> Option<&[&'static str]> {
        None
    }

    /// Produce the normalized node, or `None` to drop it.
    fn compile_node(&self, ctx: &mut NodeContext<'_, '_>) -> NodeResult<Option<Map<String, Value>>>;

    /// Validate `node` found at `path`, recording issues in `diagnostics`.
    ///
    /// Any [`NodeError`] raised while compiling becomes a single internal
    /// compiler error for this node; sibling nodes are unaffected.
    fn compile<'a>(
        &self,
        path: NodePath<'a>,
        node: &'a Value,
        diagnostics: &mut Diagnostics,
    ) -> Option<Map<String, Value>> {
        if node.is_null() {
            return None;
        }

        let name = self.name(&path);
        let Some(map) = node.as_object() else {
            let err = NodeError::UnexpectedShape {
                field: name.clone(),
                expected: "a mapping",
                found: value_kind(node),
            };
            diagnostics.error(format!("Internal compiler error in {}: {}", name, err));
            return None;
        };

        let mut ctx = NodeContext {
            name,
            path,
            value: node,
            node: map,
            diagnostics,
        };

        if let Some(allowed) = self.allowed_keys() {
            ctx.validate_keys(allowed);
        }

        match self.compile_node(&mut ctx) {
            Ok(compiled) => compiled,
            Err(err) => {
                let message = format!("Internal compiler error in {}: {}", ctx.name, err);
                ctx.error(message);
                None
            }
        }
    }
}

/// Per-call state of a single node compilation.
pub struct NodeContext<'a, 'd> {
    name: String,
    path: NodePath<'a>,
    value: &'a Value,
    node: &'a Map<String, Value>,
    diagnostics: &'d mut Diagnostics,
}

impl<'a, 'd> NodeContext<'a, 'd> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &NodePath<'a> {
        &self.path
    }

    pub fn node(&self) -> &'a Map<String, Value> {
        self.node
    }

    pub fn diagnostics(&mut self) -> &mut Diagnostics {
        &mut *self.diagnostics
    }

    /// Path of the child `name` of this node.
    pub fn child_path(&self, name: impl Into<String>) -> NodePath<'a> {
        self.path.append(name, self.value)
    }

    /// Compile the child `name` of this node with `compiler`.
    pub fn compile_child<C>(
        &mut self,
        compiler: &C,
        name: &str,
        child: &'a Value,
    ) -> Option<Map<String, Value>>
    where
        C: NodeCompiler + ?Sized,
    {
        let path = self.child_path(name);
        compiler.compile(path, child, &mut *self.diagnostics)
    }

    /// Value under `key`; an explicit null counts as absent.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.node.get(key).filter(|value| !value.is_null())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.node.contains_key(key)
    }

    /// Scalar under `key` rendered as text.
    pub fn text(&self, key: &str) -> NodeResult<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => scalar_text(value).map(Some).ok_or_else(|| NodeError::UnexpectedShape {
                field: format!("{} in {}", key, self.name),
                expected: "a scalar value",
                found: value_kind(value),
            }),
        }
    }

    /// Non-empty scalar text under `key`.
    pub fn non_empty_text(&self, key: &str) -> NodeResult<Option<String>> {
        Ok(self.text(key)?.filter(|text| !text.is_empty()))
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.diagnostics.error(message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.diagnostics.warn(message);
    }

    /// Record an error, appending the nearest candidate to `value` if any.
    pub fn error_with_nearest(&mut self, value: &str, candidates: &[&str], message: impl Into<String>) {
        let mut message = message.into();
        if let Some(nearest) = find_nearest(value, candidates.iter().copied()) {
            message.push_str(&format!(" Perhaps you meant {}?", nearest));
        }
        self.error(message);
    }

    fn validate_keys(&mut self, allowed: &[&'static str]) {
        let kind = self.name.to_lowercase();
        let keys: Vec<&'a String> = self.node.keys().collect();

        for key in keys {
            if !allowed.contains(&key.as_str()) {
                let message = format!(
                    "Unexpected key in {kind}: {key}. Valid keys for {kind}: {}.",
                    allowed.join(", ")
                );
                self.error_with_nearest(key, allowed, message);
            }
        }
    }

    /// Check a description length; `entity` names what is described.
    pub fn validate_description(&mut self, entity: &str, value: &str) -> bool {
        let length = value.chars().count();
        if length > MAX_DESCRIPTION_LENGTH {
            self.error(format!(
                "{} description is {} characters, which exceeds the max description length of {} characters.",
                entity, length, MAX_DESCRIPTION_LENGTH
            ));
            return false;
        }
        true
    }

    /// Check a logical name; `kind` is a lowercase noun such as "resource name".
    pub fn validate_logical_name(&mut self, kind: &str, value: &str) -> bool {
        if value.trim().is_empty() {
            self.error(format!(
                "A {} can not be blank. Only alphanumeric characters are allowed (A-Z, a-z, 0-9).",
                kind
            ));
            return false;
        }

        if !LOGICAL_NAME_PATTERN.is_match(value) {
            self.error(format!(
                "{} is not a valid {}. Only alphanumeric characters are allowed (A-Z, a-z, 0-9).",
                value, kind
            ));
            return false;
        }

        true
    }

    /// Parse a non-negative integer; `None` after recording an error.
    pub fn validate_integer(&mut self, field: &str, value: &str) -> Option<usize> {
        let parsed = if INTEGER_PATTERN.is_match(value) {
            value.parse::<i32>().ok().map(|n| n as usize)
        } else {
            None
        };

        if parsed.is_none() {
            self.error(format!(
                "{} is not a valid value for {}. The value must be a positive integer.",
                value, field
            ));
        }

        parsed
    }

    /// Parse an integer or float; the text is kept even when parsing fails.
    pub fn validate_number(&mut self, field: &str, value: &str) -> TemplateValue {
        let numeric = parse_number(value);

        if numeric.is_none() {
            self.error(format!(
                "{} is not a valid value for {}. The value must be an integer or float.",
                value, field
            ));
        }

        TemplateValue {
            text: value.to_string(),
            numeric,
        }
    }
}

/// Parse text in the template number syntax.
pub fn parse_number(value: &str) -> Option<Numeric> {
    let captures = NUMBER_PATTERN.captures(value)?;

    if captures.get(3).is_none() {
        value.parse::<i64>().ok().map(Numeric::Integer)
    } else {
        value
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Numeric::Float)
    }
}

/// Text form of a scalar; `None` for sequences and mappings.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Text form of any value; sequences and mappings render as compact JSON.
pub fn to_text(value: &Value) -> String {
    scalar_text(value).unwrap_or_else(|| value.to_string())
}

/// Deep copy of a tree with every scalar leaf turned into a string.
pub fn copy_of(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, entry)| (key.clone(), copy_of(entry)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(copy_of).collect()),
        scalar => Value::String(scalar_text(scalar).unwrap_or_default()),
    }
}

pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// Closest candidate within [`SUGGESTION_THRESHOLD`] edits; ties keep the first.
pub fn find_nearest<'c>(value: &str, candidates: impl IntoIterator<Item = &'c str>) -> Option<&'c str> {
    let mut nearest = None;
    let mut best = usize::MAX;

    for candidate in candidates {
        if let Some(distance) = levenshtein_within(value, candidate, SUGGESTION_THRESHOLD) {
            if distance < best {
                nearest = Some(candidate);
                best = distance;
            }
        }
    }

    nearest
}

/// Edit distance between `a` and `b`, or `None` if it exceeds `threshold`.
pub fn levenshtein_within(a: &str, b: &str, threshold: usize) -> Option<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.len().abs_diff(b.len()) > threshold {
        return None;
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        let mut row_min = current[0];

        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
            row_min = row_min.min(current[j + 1]);
        }

        // Every later row is at least this row's minimum.
        if row_min > threshold {
            return None;
        }
        std::mem::swap(&mut previous, &mut current);
    }

    let distance = previous[b.len()];
    (distance <= threshold).then_some(distance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct KeyedNode;

    impl NodeCompiler for KeyedNode {
        fn name(&self, path: &NodePath<'_>) -> String {
            format!("Widget {}", path.last_name())
        }

        fn allowed_keys(&self) -> Option<&[&'static str]> {
            Some(&["Type", "Properties"])
        }

        fn compile_node(&self, ctx: &mut NodeContext<'_, '_>) -> NodeResult<Option<Map<String, Value>>> {
            let mut out = Map::new();
            if let Some(kind) = ctx.text("Type")? {
                out.insert("Type".into(), Value::String(kind));
            }
            Ok(Some(out))
        }
    }

    fn compile(node: &Value) -> (Option<Map<String, Value>>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let root = json!({});
        let path = NodePath::root().append("W1", &root);
        let out = KeyedNode.compile(path, node, &mut diagnostics);
        (out, diagnostics)
    }

    #[test]
    fn test_unknown_key_with_suggestion() {
        let (out, diagnostics) = compile(&json!({"Typo": "x", "Type": "A"}));
        assert!(out.is_some());
        assert_eq!(diagnostics.len(), 1);
        let message = diagnostics.issues()[0].message();
        assert!(message.starts_with("Unexpected key in widget w1: Typo."));
        assert!(message.ends_with("Perhaps you meant Type?"));
    }

    #[test]
    fn test_unknown_key_without_suggestion() {
        let (_, diagnostics) = compile(&json!({"SomethingCompletelyDifferent": 1}));
        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics.issues()[0].message().contains("Perhaps"));
    }

    #[test]
    fn test_non_mapping_is_internal_error() {
        let (out, diagnostics) = compile(&json!(["not", "a", "map"]));
        assert!(out.is_none());
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics.issues()[0]
            .message()
            .starts_with("Internal compiler error in Widget W1"));
    }

    #[test]
    fn test_node_error_discards_node() {
        let (out, diagnostics) = compile(&json!({"Type": {"nested": true}}));
        assert!(out.is_none());
        assert!(diagnostics.has_errors());
        assert!(diagnostics.issues()[0].message().contains("Type in Widget W1"));
    }

    #[test]
    fn test_null_node_is_skipped() {
        let (out, diagnostics) = compile(&Value::Null);
        assert!(out.is_none());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_path_names() {
        let root = json!({});
        let path = NodePath::root()
            .append("Resources", &root)
            .append("Bucket", &root)
            .append("Properties", &root);
        assert_eq!(path.last_name(), "Properties");
        assert_eq!(path.name_from_end(1), Some("Bucket"));
        assert_eq!(path.name_from_end(3), None);
        assert_eq!(path.to_string(), "Resources Bucket Properties");
        assert_eq!(NodePath::root().last_name(), "");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("10"), Some(Numeric::Integer(10)));
        assert_eq!(parse_number("-3"), Some(Numeric::Integer(-3)));
        assert_eq!(parse_number("+7"), Some(Numeric::Integer(7)));
        assert_eq!(parse_number("10.5"), Some(Numeric::Float(10.5)));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("1."), None);
        assert_eq!(parse_number(".5"), None);
        assert_eq!(parse_number("1e5"), None);
    }

    #[test]
    fn test_validate_helpers() {
        let mut diagnostics = Diagnostics::new();
        let value = json!({});
        let map = Map::new();
        let mut ctx = NodeContext {
            name: "Parameter P".into(),
            path: NodePath::root(),
            value: &value,
            node: &map,
            diagnostics: &mut diagnostics,
        };

        assert_eq!(ctx.validate_integer("MinLength", "12"), Some(12));
        assert_eq!(ctx.validate_integer("MinLength", "-1"), None);
        assert_eq!(ctx.validate_integer("MinLength", "1.0"), None);

        let number = ctx.validate_number("Default for parameter P", "abc");
        assert_eq!(number.numeric(), None);
        assert_eq!(number.as_str(), "abc");

        assert!(ctx.validate_logical_name("resource name", "Bucket1"));
        assert!(!ctx.validate_logical_name("resource name", "my-bucket"));
        assert!(!ctx.validate_logical_name("resource name", "  "));

        assert!(ctx.validate_description("Template", &"x".repeat(MAX_DESCRIPTION_LENGTH)));
        assert!(!ctx.validate_description("Template", &"x".repeat(MAX_DESCRIPTION_LENGTH + 1)));

        let messages: Vec<&str> = diagnostics.issues().iter().map(|i| i.message()).collect();
        assert_eq!(messages.len(), 6);
        assert_eq!(
            messages[0],
            "-1 is not a valid value for MinLength. The value must be a positive integer."
        );
        assert_eq!(
            messages[2],
            "abc is not a valid value for Default for parameter P. The value must be an integer or float."
        );
        assert!(messages[3].starts_with("my-bucket is not a valid resource name."));
        assert!(messages[4].starts_with("A resource name can not be blank."));
        assert!(messages[5].starts_with("Template description is 4001 characters"));
    }

    #[test]
    fn test_copy_of_stringifies_scalars() {
        let copied = copy_of(&json!({"a": 1, "b": [true, 2.5, "x"], "c": {"d": null}}));
        assert_eq!(copied, json!({"a": "1", "b": ["true", "2.5", "x"], "c": {"d": ""}}));
    }

    #[test]
    fn test_levenshtein_within() {
        assert_eq!(levenshtein_within("kitten", "sitting", 6), Some(3));
        assert_eq!(levenshtein_within("", "abc", 6), Some(3));
        assert_eq!(levenshtein_within("Type", "Type", 6), Some(0));
        assert_eq!(levenshtein_within("a", "abcdefghij", 6), None);
        assert_eq!(levenshtein_within("abcdefgh", "stuvwxyz", 6), None);
    }

    #[test]
    fn test_find_nearest_prefers_first_on_tie() {
        assert_eq!(find_nearest("Strin", ["String", "Number"]), Some("String"));
        assert_eq!(find_nearest("ab", ["ac", "ad"]), Some("ac"));
        assert_eq!(find_nearest("Completely unrelated text", ["Delete"]), None);
    }
}
