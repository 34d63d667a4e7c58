//! Derivation of the network API endpoint from a merged config tree.

use super::merge::{is_truthy, ConfigTree};
use serde::Serialize;
use serde_json::Value;

/// Port the API listens on when none is configured.
pub const DEFAULT_API_PORT: u16 = 51204;

/// Path the browser opens for the UI when `uiBase` is not set.
pub const DEFAULT_UI_BASE: &str = "/__vitest__/";

/// Where the API endpoint should listen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub strict_port: bool,
}

impl ApiConfig {
    fn on_port(port: u16) -> Self {
        Self {
            port,
            host: None,
            strict_port: false,
        }
    }
}

/// Resolve the API endpoint from `api` and `ui`.
///
/// - `ui` enabled without `api` listens on [`DEFAULT_API_PORT`].
/// - `api: true` listens on the default port, `api: <n>` on port `n`.
/// - An object `api` overlays `port`, `host` and `strictPort`.
///
/// Returns `None` when no API should run.
#[must_use]
pub fn resolve_api_config(tree: &ConfigTree) -> Option<ApiConfig> {
    let api_value = tree.get("api");

    let mut api = if is_truthy(tree.get("ui")) && !is_truthy(api_value) {
        Some(ApiConfig::on_port(DEFAULT_API_PORT))
    } else {
        match api_value {
            Some(Value::Bool(true)) => Some(ApiConfig::on_port(DEFAULT_API_PORT)),
            Some(number @ Value::Number(_)) => {
                Some(ApiConfig::on_port(port_from(number).unwrap_or(0)))
            }
            _ => None,
        }
    };

    if let Some(Value::Object(fields)) = api_value {
        let port = fields
            .get("port")
            .and_then(port_from)
            .filter(|p| *p != 0);
        let host = fields
            .get("host")
            .and_then(Value::as_str)
            .filter(|h| !h.is_empty())
            .map(str::to_string);
        let strict_port = is_truthy(fields.get("strictPort"));

        match api.as_mut() {
            Some(existing) => {
                if let Some(port) = port {
                    existing.port = port;
                }
                if strict_port {
                    existing.strict_port = true;
                }
                if host.is_some() {
                    existing.host = host;
                }
            }
            None => {
                api = Some(ApiConfig {
                    port: port.unwrap_or(0),
                    host,
                    strict_port,
                });
            }
        }
    }

    api.map(|mut api| {
        if api.port == 0 {
            api.port = DEFAULT_API_PORT;
        }
        api
    })
}

/// The path the host should open in a browser, if any.
///
/// Only set when both `ui` and `open` are enabled; falls back to
/// [`DEFAULT_UI_BASE`] when `uiBase` is absent.
#[must_use]
pub fn resolve_open_target(tree: &ConfigTree) -> Option<String> {
    if !(is_truthy(tree.get("ui")) && is_truthy(tree.get("open"))) {
        return None;
    }
    let base = tree
        .get("uiBase")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_UI_BASE);
    Some(base.to_string())
}

fn port_from(value: &Value) -> Option<u16> {
    value.as_u64().and_then(|p| u16::try_from(p).ok())
}
