//! Host plugin interface.
//!
//! A host drives three hooks on every plugin, in enforce order:
//!
//! - `config`: may mutate the raw user config and return an overlay that the
//!   host deep-merges into it;
//! - `config_resolved`: sees the host's final config (read-only);
//! - `configure_server`: receives the server handle. Runs again on restart.
//!
//! [`PluginContainer`] is the dispatcher a host uses to run those hooks.

mod builtin;
mod composer;
mod ui;

pub use builtin::{GlobalSetupPlugin, MocksPlugin};
pub use composer::compose_plugins;
pub use ui::{NodeModulesUiProvider, UiPlugin, UiProvider, UI_PACKAGE};

use crate::config::{deep_merge, ConfigTree};
use crate::error::Error;
use crate::host::{HostResolvedConfig, HostServer};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error as ThisError;

/// Result type for plugin hook dispatch.
pub type HookResult<T> = Result<T, PluginError>;

/// A hook failure, tagged with the plugin and hook that raised it.
#[derive(Debug, ThisError)]
#[error("[{plugin}] {hook}: {source}")]
pub struct PluginError {
    pub plugin: String,
    pub hook: &'static str,
    #[source]
    pub source: Error,
}

/// Plugin enforcement ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PluginEnforce {
    /// Runs before normal plugins.
    Pre,
    #[default]
    Normal,
    /// Runs after normal plugins.
    Post,
}

/// A host plugin. Every hook defaults to doing nothing.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn enforce(&self) -> PluginEnforce {
        PluginEnforce::Normal
    }

    /// Inspect or mutate the raw user config; return an overlay to merge in.
    async fn config(&self, _config: &mut ConfigTree) -> crate::Result<Option<ConfigTree>> {
        Ok(None)
    }

    /// Called once the host config is final.
    async fn config_resolved(&self, _config: &HostResolvedConfig) -> crate::Result<()> {
        Ok(())
    }

    /// Called with the server handle, on start and on every restart.
    async fn configure_server(&self, _server: Arc<dyn HostServer>) -> crate::Result<()> {
        Ok(())
    }
}

/// Ordered set of plugins with hook dispatch.
///
/// Plugins are sorted by `enforce()` (`Pre` → `Normal` → `Post`), keeping
/// insertion order within a level.
pub struct PluginContainer {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginContainer {
    #[must_use]
    pub fn new(mut plugins: Vec<Box<dyn Plugin>>) -> Self {
        plugins.sort_by_key(|p| p.enforce());
        Self { plugins }
    }

    /// Plugin names in dispatch order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Run `config` on every plugin, merging each returned overlay before the
    /// next plugin sees the config.
    pub async fn call_config(&self, mut config: ConfigTree) -> HookResult<ConfigTree> {
        for plugin in &self.plugins {
            let overlay = plugin
                .config(&mut config)
                .await
                .map_err(|e| hook_error(plugin.as_ref(), "config", e))?;
            if let Some(overlay) = overlay {
                config = deep_merge(&[&config, &overlay]);
            }
        }
        Ok(config)
    }

    pub async fn call_config_resolved(&self, config: &HostResolvedConfig) -> HookResult<()> {
        for plugin in &self.plugins {
            plugin
                .config_resolved(config)
                .await
                .map_err(|e| hook_error(plugin.as_ref(), "configResolved", e))?;
        }
        Ok(())
    }

    pub async fn call_configure_server(&self, server: Arc<dyn HostServer>) -> HookResult<()> {
        for plugin in &self.plugins {
            plugin
                .configure_server(Arc::clone(&server))
                .await
                .map_err(|e| hook_error(plugin.as_ref(), "configureServer", e))?;
        }
        Ok(())
    }
}

fn hook_error(plugin: &dyn Plugin, hook: &'static str, source: Error) -> PluginError {
    PluginError {
        plugin: plugin.name().to_string(),
        hook,
        source,
    }
}
