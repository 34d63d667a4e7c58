#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::return_self_not_must_use)]

//! Staged configuration resolution and dev-server lifecycle for a test runner
//! that attaches to a development host as a plugin.
//!
//! The host drives three hooks in order: `config`, `config_resolved` and
//! `configure_server`. [`TestRunnerPlugin`] merges the caller's configuration
//! with the host's `test` sub-tree at the first and second hook, bridges
//! static `define` replacements into runtime-mutable bindings, and hands the
//! final configuration to the shared [`TestContext`] when the server attaches.

pub mod config;
pub mod context;
pub mod env;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod orchestrator;
pub mod plugin;
pub mod version;

pub use config::{
    config_defaults, deep_merge, resolve_api_config, resolve_open_target, ApiConfig,
    ConfigStages, ConfigTree, FinalConfig, PreliminaryConfig, DEFAULT_API_PORT, DEFAULT_UI_BASE,
};
pub use context::{ServerEvent, TestContext, TestSession};
pub use env::{
    backfill_standard_env, bridge_defines, classify, BridgeReport, DefineTable, DefineValue,
    EnvStore, GlobalBindings, MemoryEnv, ProcessEnv,
};
pub use error::{ContextError, Error, HostError, Result, SetupError};
pub use host::{HostEnvFlags, HostResolvedConfig, HostServer};
pub use lifecycle::{ApiSetup, AttachOutcome, LifecycleController};
pub use orchestrator::TestRunnerPlugin;
pub use plugin::{
    compose_plugins, NodeModulesUiProvider, Plugin, PluginContainer, PluginEnforce, PluginError,
    UiProvider,
};
pub use version::VERSION;
