//! The two config generations built while the host resolves its config.
//!
//! The host's `test` sub-tree is only final after its own resolution, so the
//! caller's config is merged twice:
//!
//! 1. **Preliminary**, in the `config` hook: `user` over whatever `test`
//!    sub-tree the host has so far. Only good for computing server options.
//! 2. **Final**, in `config_resolved`: `defaults`, then the host's final
//!    `test` sub-tree, then `user` again so the caller always wins.
//!
//! The two results are separate types; only [`FinalConfig`] exposes the
//! fields the test runner consumes.

use super::api::{resolve_api_config, resolve_open_target, ApiConfig};
use super::merge::{as_tree, deep_merge, is_truthy, ConfigTree};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Snapshot from the first merge pass.
#[derive(Debug, Clone)]
pub struct PreliminaryConfig {
    tree: ConfigTree,
    api: Option<ApiConfig>,
    open: Option<String>,
}

impl PreliminaryConfig {
    fn new(tree: ConfigTree) -> Self {
        let api = resolve_api_config(&tree);
        let open = resolve_open_target(&tree);
        Self { tree, api, open }
    }

    /// API endpoint the host should expose through its server options.
    #[must_use]
    pub fn api(&self) -> Option<&ApiConfig> {
        self.api.as_ref()
    }

    /// Browser path to open on startup.
    #[must_use]
    pub fn open_target(&self) -> Option<&str> {
        self.open.as_deref()
    }

    #[must_use]
    pub fn tree(&self) -> &ConfigTree {
        &self.tree
    }
}

/// Authoritative config, installed into the test context on attach.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalConfig {
    tree: ConfigTree,
    api: Option<ApiConfig>,
    open: Option<String>,
    generation: u64,
}

impl FinalConfig {
    fn new(tree: ConfigTree, generation: u64) -> Self {
        let api = resolve_api_config(&tree);
        let open = resolve_open_target(&tree);
        Self {
            tree,
            api,
            open,
            generation,
        }
    }

    /// Sequence number of this snapshot, starting at 1.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn api(&self) -> Option<&ApiConfig> {
        self.api.as_ref()
    }

    #[must_use]
    pub fn open_target(&self) -> Option<&str> {
        self.open.as_deref()
    }

    /// Whether the runner keeps watching after the first run.
    #[must_use]
    pub fn watch(&self) -> bool {
        is_truthy(self.tree.get("watch"))
    }

    /// Whether this is a single run.
    #[must_use]
    pub fn run(&self) -> bool {
        is_truthy(self.tree.get("run"))
    }

    #[must_use]
    pub fn ui(&self) -> bool {
        is_truthy(self.tree.get("ui"))
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.tree.get(key)
    }

    #[must_use]
    pub fn tree(&self) -> &ConfigTree {
        &self.tree
    }

    /// The merged tree with the resolved `api` written back in.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut tree = self.tree.clone();
        match &self.api {
            Some(api) => {
                tree.insert(
                    "api".to_string(),
                    serde_json::to_value(api).unwrap_or(Value::Null),
                );
            }
            None => {
                tree.remove("api");
            }
        }
        Value::Object(tree)
    }
}

/// Two-stage merge workflow around the caller's original config.
///
/// The caller's config is kept untouched; every pass starts from it again.
#[derive(Debug)]
pub struct ConfigStages {
    user: ConfigTree,
    generation: AtomicU64,
    latest: Mutex<Option<Arc<FinalConfig>>>,
}

impl ConfigStages {
    #[must_use]
    pub fn new(user: ConfigTree) -> Self {
        Self {
            user,
            generation: AtomicU64::new(0),
            latest: Mutex::new(None),
        }
    }

    /// The caller's config as received.
    #[must_use]
    pub fn user(&self) -> &ConfigTree {
        &self.user
    }

    /// First pass: caller config over the host's provisional `test` sub-tree.
    ///
    /// The sub-tree may be missing or not an object; it is then ignored.
    #[must_use]
    pub fn apply_preliminary(&self, host_test: Option<&Value>) -> PreliminaryConfig {
        let empty = ConfigTree::new();
        let host_test = as_tree(host_test).unwrap_or(&empty);
        let tree = deep_merge(&[&self.user, host_test]);
        debug!(keys = tree.len(), "preliminary test config merged");
        PreliminaryConfig::new(tree)
    }

    /// Second pass: `defaults`, then the host's final `test` sub-tree, then the
    /// caller's config. Stores and returns a new generation.
    ///
    /// A host sub-tree with `watch: false` implies `run: true`.
    pub fn apply_final(&self, defaults: &ConfigTree, host_test: Option<&Value>) -> Arc<FinalConfig> {
        let mut host_test = as_tree(host_test).cloned().unwrap_or_default();
        if host_test.get("watch") == Some(&Value::Bool(false)) {
            host_test.insert("run".to_string(), Value::Bool(true));
        }

        let tree = deep_merge(&[defaults, &host_test, &self.user]);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let config = Arc::new(FinalConfig::new(tree, generation));
        debug!(
            generation,
            watch = config.watch(),
            api = config.api().is_some(),
            "final test config merged"
        );

        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&config));
        config
    }

    /// The most recent final generation, if `apply_final` has run.
    #[must_use]
    pub fn latest_final(&self) -> Option<Arc<FinalConfig>> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
