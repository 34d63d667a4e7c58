//! Deep merge of partial configuration trees.
//!
//! Later layers win field by field. Objects merge recursively; scalars and
//! arrays are replaced wholesale. A key that is absent, or present with a
//! `null` value, never overwrites what an earlier layer set.

use serde_json::{Map, Value};

/// A configuration tree: the object form of a JSON value.
pub type ConfigTree = Map<String, Value>;

/// Merge `layers` left to right into a fresh tree. Inputs are not modified.
#[must_use]
pub fn deep_merge(layers: &[&ConfigTree]) -> ConfigTree {
    let mut merged = ConfigTree::new();
    for layer in layers {
        merge_into(&mut merged, layer);
    }
    merged
}

/// Merge `source` into `target` in place.
pub fn merge_into(target: &mut ConfigTree, source: &ConfigTree) {
    for (key, value) in source {
        match value {
            Value::Null => {}
            Value::Object(child) => {
                let slot = target
                    .entry(key.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !slot.is_object() {
                    *slot = Value::Object(Map::new());
                }
                if let Value::Object(existing) = slot {
                    merge_into(existing, child);
                }
            }
            other => {
                target.insert(key.clone(), other.clone());
            }
        }
    }
}

/// View a value as a tree, treating anything that is not an object as empty.
#[must_use]
pub fn as_tree(value: Option<&Value>) -> Option<&ConfigTree> {
    value.and_then(Value::as_object)
}

/// JavaScript-style truthiness, used for flags like `ui` and `open` that
/// configs commonly set to non-boolean values.
#[must_use]
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}
