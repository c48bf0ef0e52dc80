//! Merge rules: defaults, override order, conflict handling.
//!
//! Precedence (lowest to highest): the target's current value, the persisted
//! document, environment overrides. Layering happens on a JSON tree so the
//! declared keys of the target survive exactly as serde spells them.

use crate::error::ConfigError;
use serde::Serialize;
use serde_json::{Map, Number, Value};

/// Serialize the target's current value into the default layer.
pub fn defaults_tree<T: Serialize>(defaults: &T) -> Result<Value, ConfigError> {
    Ok(serde_json::to_value(defaults)?)
}

/// Deep-merge a document onto the base tree. Tables merge key by key, anything
/// else replaces. Document keys match declared keys case-insensitively because
/// the file parsers fold keys to lowercase; an exact match wins.
pub fn merge_document(base: &mut Value, document: Value) {
    match (base, document) {
        (Value::Object(base), Value::Object(document)) => {
            for (key, value) in document {
                let declared = declared_key(base, &key).unwrap_or(key);
                match base.get_mut(&declared) {
                    Some(slot) => merge_document(slot, value),
                    None => {
                        base.insert(declared, value);
                    }
                }
            }
        }
        (base, document) => *base = document,
    }
}

fn declared_key(map: &Map<String, Value>, key: &str) -> Option<String> {
    if map.contains_key(key) {
        return Some(key.to_string());
    }
    map.keys().find(|declared| declared.eq_ignore_ascii_case(key)).cloned()
}

/// Replace the leaf at `path`. Missing intermediate tables leave the tree as is.
pub fn set_leaf(tree: &mut Value, path: &[String], value: Value) {
    let mut node = tree;
    for key in path {
        node = match node.get_mut(key.as_str()) {
            Some(child) => child,
            None => return,
        };
    }
    *node = value;
}

/// Environment prefix for an application name: upper-cased, `-` and `.` become `_`.
pub fn env_prefix(app_name: &str) -> String {
    normalize(app_name)
}

/// Environment variable for a dotted key path, e.g. `PUPPY_THING_STUFF` for
/// prefix `PUPPY` and key `thing.stuff`.
pub fn env_key(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        normalize(path)
    } else {
        format!("{}_{}", prefix, normalize(path))
    }
}

fn normalize(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '.' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Flatten a merged tree into `(key path, leaf)` pairs. Empty tables have no
/// leaves; arrays, including empty ones, are leaves.
pub fn leaves(tree: &Value) -> Vec<(Vec<String>, Value)> {
    let mut out = Vec::new();
    collect_leaves(&mut Vec::new(), tree, &mut out);
    out
}

fn collect_leaves(path: &mut Vec<String>, value: &Value, out: &mut Vec<(Vec<String>, Value)>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                path.push(key.clone());
                collect_leaves(path, child, out);
                path.pop();
            }
        }
        leaf if !path.is_empty() => out.push((path.clone(), leaf.clone())),
        _ => {}
    }
}

/// Coerce a raw environment string to the type of the leaf it overrides.
/// Array items are split on commas and typed like the leaf's first element.
pub fn env_value(var: &str, raw: &str, leaf: &Value) -> Result<Value, ConfigError> {
    let invalid = |expected: &'static str| ConfigError::InvalidEnvironmentValue {
        var: var.to_string(),
        value: raw.to_string(),
        expected,
    };

    let value = match leaf {
        Value::Bool(_) => Value::Bool(parse_bool(raw).ok_or_else(|| invalid("a boolean"))?),
        Value::Number(n) if n.is_f64() => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| invalid("a number"))?,
        Value::Number(_) => {
            let raw = raw.trim();
            raw.parse::<i64>()
                .map(Value::from)
                .or_else(|_| raw.parse::<u64>().map(Value::from))
                .map_err(|_| invalid("an integer"))?
        }
        Value::Array(items) => {
            let item = items.first().cloned().unwrap_or(Value::Null);
            raw.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| env_value(var, part, &item))
                .collect::<Result<Vec<_>, _>>()?
                .into()
        }
        Value::String(_) | Value::Null | Value::Object(_) => Value::String(raw.to_string()),
    };
    Ok(value)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
