use super::builtin::{GlobalSetupPlugin, MocksPlugin};
use super::ui::UiProvider;
use super::Plugin;
use crate::config::is_truthy;
use crate::error::Result;
use crate::orchestrator::TestRunnerPlugin;
use serde_json::Value;
use tracing::debug;

/// Assemble the host plugin list: the runner itself, mocks, global setup,
/// and the UI plugin when the caller's config enables `ui`.
///
/// A UI that cannot be loaded fails the whole composition with
/// [`crate::Error::Setup`]; nothing is returned for features that are off.
pub async fn compose_plugins(
    runner: TestRunnerPlugin,
    ui: &dyn UiProvider,
) -> Result<Vec<Box<dyn Plugin>>> {
    let user = runner.user_config();
    let ui_plugin = if is_truthy(user.get("ui")) {
        let base = user.get("uiBase").and_then(Value::as_str);
        Some(ui.try_load_ui(base).await?)
    } else {
        None
    };

    let mut plugins: Vec<Box<dyn Plugin>> = vec![
        Box::new(runner),
        Box::new(MocksPlugin::new()),
        Box::new(GlobalSetupPlugin::new()),
    ];
    plugins.extend(ui_plugin);

    debug!(
        plugins = ?plugins.iter().map(|p| p.name().to_string()).collect::<Vec<_>>(),
        "composed host plugins"
    );
    Ok(plugins)
}
