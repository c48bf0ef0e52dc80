//! Merge rules: layering order, environment keys and value coercion.

pub mod merge_policy;
