//! The test runner's host plugin.
//!
//! Hook order per host lifecycle: `config` → `config_resolved` →
//! `configure_server`; the last two repeat when the host restarts.
//!
//! - `config` builds the preliminary config, demotes `define` entries to
//!   runtime bindings, and returns the host overlay (mode, defines, server
//!   options).
//! - `config_resolved` builds the final config from the host's now-final
//!   `test` sub-tree and back-fills the standard env variables.
//! - `configure_server` hands the final config to the lifecycle controller.

use crate::config::{config_defaults, ConfigStages, ConfigTree, FinalConfig};
use crate::context::{TestContext, TestSession};
use crate::env::{backfill_standard_env, bridge_defines, EnvStore, GlobalBindings, ProcessEnv};
use crate::error::{Error, Result};
use crate::host::{HostResolvedConfig, HostServer};
use crate::lifecycle::{ApiSetup, LifecycleController};
use crate::plugin::{Plugin, PluginEnforce};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Mode used when neither the host config nor `NODE_ENV` sets one.
pub const DEFAULT_MODE: &str = "test";

/// `define` entries that keep `NODE_ENV` and `import.meta.env` resolving
/// through the process environment at runtime.
const RUNTIME_DEFINES: &[(&str, &str)] = &[
    ("process.env.NODE_ENV", "process.env.NODE_ENV"),
    ("global.process.env.NODE_ENV", "global.process.env.NODE_ENV"),
    ("globalThis.process.env.NODE_ENV", "globalThis.process.env.NODE_ENV"),
    ("import.meta.env", "process.env"),
];

/// Orchestrates config resolution and server attachment for the runner.
#[derive(Debug)]
pub struct TestRunnerPlugin {
    stages: ConfigStages,
    env: Arc<dyn EnvStore>,
    globals: Arc<GlobalBindings>,
    controller: LifecycleController,
}

impl TestRunnerPlugin {
    pub const NAME: &'static str = "vitest";

    /// Create a runner plugin for the caller's config, writing into `ctx`.
    ///
    /// Env writes go to the process environment unless replaced with
    /// [`TestRunnerPlugin::with_env`].
    #[must_use]
    pub fn new(user: ConfigTree, ctx: Arc<dyn TestContext>) -> Self {
        Self {
            stages: ConfigStages::new(user),
            env: Arc::new(ProcessEnv),
            globals: Arc::new(GlobalBindings::new()),
            controller: LifecycleController::new(ctx),
        }
    }

    /// Create a runner plugin with a fresh [`TestSession`] as its context.
    #[must_use]
    pub fn with_default_context(user: ConfigTree) -> Self {
        Self::new(user, Arc::new(TestSession::new()))
    }

    pub fn with_env(mut self, env: Arc<dyn EnvStore>) -> Self {
        self.env = env;
        self
    }

    pub fn with_api(mut self, api: Arc<dyn ApiSetup>) -> Self {
        self.controller = self.controller.with_api(api);
        self
    }

    /// The caller's config as received.
    #[must_use]
    pub fn user_config(&self) -> &ConfigTree {
        self.stages.user()
    }

    /// Bindings demoted from bare-identifier `define` entries.
    #[must_use]
    pub fn globals(&self) -> Arc<GlobalBindings> {
        Arc::clone(&self.globals)
    }

    /// The latest final config, once `config_resolved` has run.
    #[must_use]
    pub fn final_config(&self) -> Option<Arc<FinalConfig>> {
        self.stages.latest_final()
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.controller.is_attached()
    }

    /// Stop accepting server attachments.
    pub fn dispose(&self) {
        self.controller.dispose();
    }

    fn resolve_mode(&self, host_config: &ConfigTree) -> String {
        host_config
            .get("mode")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .or_else(|| self.env.get("NODE_ENV").filter(|m| !m.is_empty()))
            .unwrap_or_else(|| DEFAULT_MODE.to_string())
    }
}

#[async_trait]
impl Plugin for TestRunnerPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn enforce(&self) -> PluginEnforce {
        PluginEnforce::Pre
    }

    async fn config(&self, host_config: &mut ConfigTree) -> Result<Option<ConfigTree>> {
        let preliminary = self.stages.apply_preliminary(host_config.get("test"));

        if let Some(Value::Object(define)) = host_config.get_mut("define") {
            bridge_defines(define, self.env.as_ref(), &self.globals);
        }

        let mut server = Map::new();
        if let Some(api) = preliminary.api() {
            server.insert("port".to_string(), json!(api.port));
            if let Some(host) = &api.host {
                server.insert("host".to_string(), json!(host));
            }
            if api.strict_port {
                server.insert("strictPort".to_string(), json!(true));
            }
        }
        if let Some(open) = preliminary.open_target() {
            server.insert("open".to_string(), json!(open));
        }
        server.insert("preTransformRequests".to_string(), json!(false));

        let define: Map<String, Value> = RUNTIME_DEFINES
            .iter()
            .map(|(key, value)| ((*key).to_string(), json!(value)))
            .collect();

        let mode = self.resolve_mode(host_config);
        debug!(mode = %mode, api = preliminary.api().is_some(), "test runner config overlay");

        let overlay = json!({
            "mode": mode,
            "clearScreen": false,
            "resolve": { "mainFields": [] },
            "define": define,
            "server": server,
        });
        Ok(overlay.as_object().cloned())
    }

    async fn config_resolved(&self, config: &HostResolvedConfig) -> Result<()> {
        let defaults = config_defaults(self.env.as_ref());
        let final_config = self.stages.apply_final(&defaults, config.test.as_ref());
        backfill_standard_env(self.env.as_ref(), config);
        info!(
            generation = final_config.generation(),
            mode = %config.mode,
            watch = final_config.watch(),
            "test config resolved"
        );
        Ok(())
    }

    async fn configure_server(&self, server: Arc<dyn HostServer>) -> Result<()> {
        let config = self.stages.latest_final().ok_or(Error::ConfigNotResolved)?;
        let outcome = self.controller.attach(config, server).await?;
        debug!(?outcome, "server attached");
        Ok(())
    }
}
