//! Library defaults, the lowest-precedence layer of the final merge.

use super::merge::ConfigTree;
use crate::env::EnvStore;
use serde_json::{json, Value};

/// Test file globs picked up when `include` is not configured.
pub const DEFAULT_INCLUDE: &[&str] = &["**/*.{test,spec}.{js,mjs,cjs,ts,mts,cts,jsx,tsx}"];

/// Paths never collected as tests unless `exclude` is overridden.
pub const DEFAULT_EXCLUDE: &[&str] = &[
    "**/node_modules/**",
    "**/dist/**",
    "**/cypress/**",
    "**/.{idea,git,cache,output,temp}/**",
];

/// Build the default config layer.
///
/// `watch` and `allowOnly` are off when the environment reports a CI run.
#[must_use]
pub fn config_defaults(env: &dyn EnvStore) -> ConfigTree {
    let interactive = env.get("CI").map_or(true, |ci| ci.is_empty());

    let defaults = json!({
        "allowOnly": interactive,
        "watch": interactive,
        "globals": false,
        "environment": "node",
        "threads": true,
        "isolate": true,
        "clearMocks": false,
        "mockReset": false,
        "restoreMocks": false,
        "update": false,
        "include": DEFAULT_INCLUDE,
        "exclude": DEFAULT_EXCLUDE,
        "testTimeout": 5000,
        "hookTimeout": 10000,
        "reporters": ["default"],
    });

    match defaults {
        Value::Object(tree) => tree,
        _ => ConfigTree::new(),
    }
}
