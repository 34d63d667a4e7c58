//! `testbridge resolve` command implementation.
//!
//! Acts as a minimal dev host: loads the project's config file, composes the
//! runner's plugins, and drives `config` → `configResolved` →
//! `configureServer` in-process (repeating the last two for each simulated
//! restart). Prints the final test config and the environment it produced.

use async_trait::async_trait;
use miette::{IntoDiagnostic, Result};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use testbridge_core::host::load_config;
use testbridge_core::{
    compose_plugins, ConfigTree, EnvStore, HostError, HostResolvedConfig, HostServer,
    NodeModulesUiProvider, PluginContainer, ProcessEnv, TestRunnerPlugin, TestSession,
};
use tracing::info;

/// Variables the runner back-fills from the host config.
const STANDARD_ENV: &[&str] = &["BASE_URL", "MODE", "PROD", "DEV", "SSR"];

/// Resolve command action.
#[derive(Debug, Clone)]
pub struct ResolveAction {
    /// Project root.
    pub root: PathBuf,
    /// Explicit config file path (overrides auto-discovery).
    pub config: Option<PathBuf>,
    pub mode: Option<String>,
    pub run: bool,
    pub watch: bool,
    pub ui: bool,
    pub open: bool,
    pub ui_base: Option<String>,
    pub api: Option<u16>,
    /// Number of simulated host restarts.
    pub restarts: u32,
    pub json: bool,
}

impl ResolveAction {
    /// The caller's config, built from command-line flags.
    fn user_config(&self) -> ConfigTree {
        let mut user = ConfigTree::new();
        if self.run {
            user.insert("run".to_string(), json!(true));
            user.insert("watch".to_string(), json!(false));
        }
        if self.watch {
            user.insert("watch".to_string(), json!(true));
        }
        if self.ui {
            user.insert("ui".to_string(), json!(true));
        }
        if self.open {
            user.insert("open".to_string(), json!(true));
        }
        if let Some(base) = &self.ui_base {
            user.insert("uiBase".to_string(), json!(base));
        }
        if let Some(port) = self.api {
            user.insert("api".to_string(), json!(port));
        }
        user
    }
}

/// Server handle for the in-process host. Holds no real watcher; closing it
/// only flips a flag that the report reads.
#[derive(Debug)]
struct InspectServer {
    id: String,
    watching: AtomicBool,
}

impl InspectServer {
    fn new(id: String) -> Self {
        Self {
            id,
            watching: AtomicBool::new(true),
        }
    }

    fn is_watching(&self) -> bool {
        self.watching.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostServer for InspectServer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn close_watcher(&self) -> std::result::Result<(), HostError> {
        info!(server = %self.id, "file watcher closed");
        self.watching.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Run the resolve command.
pub async fn run(action: ResolveAction) -> Result<()> {
    let loaded = load_config(&action.root, action.config.as_deref()).into_diagnostic()?;
    let (config_path, mut host_tree) = match loaded {
        Some((path, tree)) => {
            info!(path = %path.display(), "loaded config file");
            (Some(path), tree)
        }
        None => (None, ConfigTree::new()),
    };
    if let Some(mode) = &action.mode {
        host_tree.insert("mode".to_string(), json!(mode));
    }

    let session = Arc::new(TestSession::new());
    let runner = TestRunnerPlugin::new(action.user_config(), session.clone());
    let globals = runner.globals();

    let ui = NodeModulesUiProvider::new(&action.root);
    let plugins = compose_plugins(runner, &ui).await.into_diagnostic()?;
    let container = PluginContainer::new(plugins);

    let merged = container.call_config(host_tree).await.into_diagnostic()?;
    let resolved = HostResolvedConfig::resolve(&merged);

    let mut server = Arc::new(InspectServer::new("server-0".to_string()));
    for attempt in 0..=action.restarts {
        if attempt > 0 {
            server = Arc::new(InspectServer::new(format!("server-{attempt}")));
        }
        container
            .call_config_resolved(&resolved)
            .await
            .into_diagnostic()?;
        container
            .call_configure_server(server.clone())
            .await
            .into_diagnostic()?;
    }

    let config = session
        .config()
        .ok_or_else(|| miette::miette!("no test config was installed"))?;

    let env: serde_json::Map<String, Value> = STANDARD_ENV
        .iter()
        .map(|key| ((*key).to_string(), json!(ProcessEnv.get(key))))
        .collect();
    let events: Vec<&str> = session.events().iter().map(|e| e.as_str()).collect();

    if action.json {
        let report = json!({
            "configFile": config_path.as_ref().map(|p| p.display().to_string()),
            "plugins": container.names(),
            "host": {
                "mode": resolved.mode,
                "base": resolved.base,
                "define": merged.get("define").cloned().unwrap_or(Value::Null),
            },
            "config": config.to_value(),
            "generation": config.generation(),
            "openTarget": config.open_target(),
            "env": env,
            "globals": globals.snapshot(),
            "events": events,
            "watcherClosed": !server.is_watching(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&report).into_diagnostic()?
        );
        return Ok(());
    }

    match &config_path {
        Some(path) => println!("config:   {}", path.display()),
        None => println!("config:   (none)"),
    }
    println!("plugins:  {}", container.names().join(", "));
    println!("mode:     {}", resolved.mode);
    println!(
        "watch:    {}",
        if config.watch() { "on" } else { "off (run once)" }
    );
    match config.api() {
        Some(api) => println!(
            "api:      {}:{}",
            api.host.as_deref().unwrap_or("localhost"),
            api.port
        ),
        None => println!("api:      off"),
    }
    if let Some(open) = config.open_target() {
        println!("open:     {open}");
    }
    for (key, value) in &env {
        println!("env:      {key}={}", value.as_str().unwrap_or(""));
    }
    for (name, value) in globals.snapshot() {
        println!("global:   {name} = {value}");
    }
    if !events.is_empty() {
        println!("events:   {}", events.join(", "));
    }
    Ok(())
}
