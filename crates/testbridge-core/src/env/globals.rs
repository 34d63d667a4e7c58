use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Named runtime bindings that tests may reassign.
///
/// Populated from bare-identifier `define` entries that were demoted from
/// static replacements.
#[derive(Debug, Default)]
pub struct GlobalBindings {
    values: Mutex<BTreeMap<String, Value>>,
}

impl GlobalBindings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.lock().insert(name.into(), value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.lock().get(name).cloned()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of every binding, ordered by name.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Value>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bindings_can_be_reassigned() {
        let globals = GlobalBindings::new();
        assert!(globals.is_empty());

        globals.set("__APP_VERSION__", json!("1.0.0"));
        globals.set("__APP_VERSION__", json!("2.0.0"));
        assert_eq!(globals.get("__APP_VERSION__"), Some(json!("2.0.0")));
        assert_eq!(globals.snapshot().len(), 1);
    }
}
