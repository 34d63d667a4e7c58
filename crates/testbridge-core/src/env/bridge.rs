//! Demotes `define` replacements to runtime-mutable bindings.
//!
//! Static replacement is fast but cannot be reassigned at runtime. Entries a
//! test may want to change are moved out of the host's `define` table:
//!
//! - `import.meta.env.KEY` becomes the process variable `KEY`;
//! - a bare identifier such as `__APP_VERSION__` becomes a global binding;
//! - any other dotted key stays a static replacement.
//!
//! Values that are strings are decoded as JSON first. A string that does not
//! decode (for example `"process.env.VAR"`) refers to another runtime symbol
//! and the entry is left alone.

use super::globals::GlobalBindings;
use super::store::EnvStore;
use crate::host::HostResolvedConfig;
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

/// Prefix of per-module environment references.
pub const MODULE_ENV_PREFIX: &str = "import.meta.env.";

/// The host's static replacement table.
pub type DefineTable = Map<String, Value>;

/// A `define` value after decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum DefineValue {
    /// A literal value.
    Literal(Value),
    /// Source text naming another runtime symbol.
    Reference(String),
}

/// Decode a raw `define` value.
///
/// Strings are parsed as JSON; non-strings are already literals.
#[must_use]
pub fn classify(raw: &Value) -> DefineValue {
    match raw {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(value) => DefineValue::Literal(value),
            Err(_) => DefineValue::Reference(text.clone()),
        },
        other => DefineValue::Literal(other.clone()),
    }
}

/// Where a literal `define` entry ends up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefineTarget {
    /// A process environment variable with this name.
    ProcessEnv(String),
    /// A global binding with this name.
    Global(String),
    /// Stays in the static replacement table.
    Static,
}

/// Decide the target for a `define` key.
#[must_use]
pub fn define_target(key: &str) -> DefineTarget {
    if let Some(env_key) = key.strip_prefix(MODULE_ENV_PREFIX) {
        if is_valid_env_key(env_key) {
            return DefineTarget::ProcessEnv(env_key.to_string());
        }
        return DefineTarget::Static;
    }
    if !key.contains('.') && !key.is_empty() {
        return DefineTarget::Global(key.to_string());
    }
    DefineTarget::Static
}

/// Names of the entries moved out of the `define` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeReport {
    /// Keys written to the environment store.
    pub env: Vec<String>,
    /// Names installed as global bindings.
    pub globals: Vec<String>,
    /// `define` keys skipped because their value is a runtime reference.
    pub references: Vec<String>,
}

/// Move literal `define` entries into `env` or `globals`, removing them from
/// `define`. Returns what was moved.
pub fn bridge_defines(
    define: &mut DefineTable,
    env: &dyn EnvStore,
    globals: &GlobalBindings,
) -> BridgeReport {
    let mut report = BridgeReport::default();
    let keys: Vec<String> = define.keys().cloned().collect();

    for key in keys {
        let Some(raw) = define.get(&key) else {
            continue;
        };
        let value = match classify(raw) {
            DefineValue::Literal(value) => value,
            DefineValue::Reference(text) => {
                trace!(key = %key, reference = %text, "define value is a reference, skipping");
                report.references.push(key);
                continue;
            }
        };

        match define_target(&key) {
            DefineTarget::ProcessEnv(name) => {
                let text = env_string(&value);
                if text.contains('\0') {
                    continue;
                }
                env.set(&name, &text);
                define.remove(&key);
                report.env.push(name);
            }
            DefineTarget::Global(name) => {
                globals.set(name.clone(), value);
                define.remove(&key);
                report.globals.push(name);
            }
            DefineTarget::Static => {}
        }
    }

    if !report.env.is_empty() || !report.globals.is_empty() {
        debug!(
            env = ?report.env,
            globals = ?report.globals,
            "moved define entries to runtime bindings"
        );
    }
    report
}

/// Fill `BASE_URL`, `MODE`, `PROD` and `DEV` from the host's resolved values
/// when they are not set yet, and always set `SSR`.
///
/// Booleans become `"1"` or `""`. A variable that is already set, even to
/// `""` or `"0"`, is left as is. Values containing NUL are skipped.
pub fn backfill_standard_env(env: &dyn EnvStore, host: &HostResolvedConfig) {
    set_if_absent(env, "BASE_URL", &host.base);
    set_if_absent(env, "MODE", &host.mode);
    set_if_absent(env, "PROD", flag(host.env.prod));
    set_if_absent(env, "DEV", flag(host.env.dev));
    // Tests always run against the host's server-side module graph.
    env.set("SSR", flag(true));
}

/// Text form of a literal as stored in the environment.
///
/// Strings are stored verbatim, numbers and booleans by their display text,
/// `null` as `"null"`, arrays and objects as JSON.
#[must_use]
pub fn env_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn flag(on: bool) -> &'static str {
    if on {
        "1"
    } else {
        ""
    }
}

fn set_if_absent(env: &dyn EnvStore, key: &str, value: &str) {
    if env.is_set(key) {
        return;
    }
    if value.contains('\0') {
        warn!(key, "value contains a NUL byte, not exported");
        return;
    }
    env.set(key, value);
}

fn is_valid_env_key(key: &str) -> bool {
    !key.is_empty() && !key.contains('=') && !key.contains('\0')
}
