//! Placeholder handling for template bodies
//!
//! Substitution is a single left-to-right pass over the body: substituted
//! values are never re-scanned, so the output does not depend on the order in
//! which keys were filled.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value;

use crate::document::{FilledValues, Template, VariableDefinition};

lazy_static! {
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder pattern is valid");
    static ref KEY: Regex = Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("key pattern is valid");
}

/// Whether `key` can appear inside a `{{key}}` placeholder
pub fn is_valid_key(key: &str) -> bool {
    KEY.is_match(key)
}

/// Distinct placeholder keys in order of first appearance
pub fn placeholders(body: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(body) {
        let key = &caps[1];
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
    }
    keys
}

/// String form of a filled value; `None` for null (treated as unfilled)
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Required variables with no filled value, in template order
pub fn missing_variables<'a>(
    template: &'a Template,
    values: &FilledValues,
) -> Vec<&'a VariableDefinition> {
    template
        .variables
        .iter()
        .filter(|v| v.required)
        .filter(|v| values.get(&v.key).and_then(value_text).is_none())
        .collect()
}

/// Replace every `{{key}}` that has a filled value; leave the rest verbatim
pub fn render_body(body: &str, values: &FilledValues) -> String {
    PLACEHOLDER
        .replace_all(body, |caps: &Captures| {
            values
                .get(&caps[1])
                .and_then(value_text)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
