//! Test-runner configuration: merging, defaults, API derivation and the two
//! config generations produced during host resolution.

mod api;
mod defaults;
mod generation;
mod merge;

pub use api::{resolve_api_config, resolve_open_target, ApiConfig, DEFAULT_API_PORT, DEFAULT_UI_BASE};
pub use defaults::config_defaults;
pub use generation::{ConfigStages, FinalConfig, PreliminaryConfig};
pub use merge::{as_tree, deep_merge, is_truthy, merge_into, ConfigTree};
