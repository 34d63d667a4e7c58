//! The development host as seen from the test runner: its resolved config and
//! the server handle it passes to `configure_server`.

pub mod config_file;

pub use config_file::{find_config_file, load_config, CONFIG_FILES};

use crate::config::{as_tree, ConfigTree};
use crate::error::HostError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Mode-derived flags from the host's resolved config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEnvFlags {
    #[serde(rename = "PROD", default)]
    pub prod: bool,
    #[serde(rename = "DEV", default)]
    pub dev: bool,
}

/// The parts of the host's final config the test runner reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostResolvedConfig {
    pub mode: String,
    /// Public base path, e.g. `/`.
    pub base: String,
    #[serde(default)]
    pub env: HostEnvFlags,
    /// The host's `test` sub-tree. Only final at this point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<Value>,
}

impl HostResolvedConfig {
    /// Resolve a merged user config the way a dev host does: `mode` defaults
    /// to `development`, `base` to `/`, and `PROD` is set only for
    /// `production`.
    #[must_use]
    pub fn resolve(tree: &ConfigTree) -> Self {
        let mode = tree
            .get("mode")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or("development")
            .to_string();
        let base = tree
            .get("base")
            .and_then(Value::as_str)
            .filter(|b| !b.is_empty())
            .unwrap_or("/")
            .to_string();
        let prod = mode == "production";

        Self {
            mode,
            base,
            env: HostEnvFlags { prod, dev: !prod },
            test: as_tree(tree.get("test")).map(|t| Value::Object(t.clone())),
        }
    }
}

/// Handle to the running host server.
#[async_trait]
pub trait HostServer: Send + Sync + fmt::Debug {
    /// Identifier of this server instance; changes across restarts.
    fn id(&self) -> &str;

    /// Stop the host's filesystem watcher.
    async fn close_watcher(&self) -> std::result::Result<(), HostError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_defaults() {
        let resolved = HostResolvedConfig::resolve(&ConfigTree::new());
        assert_eq!(resolved.mode, "development");
        assert_eq!(resolved.base, "/");
        assert!(resolved.env.dev);
        assert!(!resolved.env.prod);
        assert!(resolved.test.is_none());
    }

    #[test]
    fn test_resolve_production() {
        let tree = json!({ "mode": "production", "base": "/app/", "test": { "watch": false } });
        let resolved = HostResolvedConfig::resolve(tree.as_object().unwrap());
        assert!(resolved.env.prod);
        assert!(!resolved.env.dev);
        assert_eq!(resolved.base, "/app/");
        assert_eq!(resolved.test, Some(json!({ "watch": false })));
    }
}
