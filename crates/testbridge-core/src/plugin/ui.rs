//! Optional UI plugin, loaded only after its package is verified present.

use super::Plugin;
use crate::config::DEFAULT_UI_BASE;
use crate::error::SetupError;
use crate::host::HostServer;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// npm package that ships the UI bundle.
pub const UI_PACKAGE: &str = "@vitest/ui";

/// Capability to build the UI plugin.
#[async_trait]
pub trait UiProvider: Send + Sync {
    /// Verify the UI package and build its plugin, served under `ui_base`.
    async fn try_load_ui(&self, ui_base: Option<&str>) -> Result<Box<dyn Plugin>, SetupError>;
}

/// Plugin serving the UI bundle under `base`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiPlugin {
    base: String,
    version: String,
}

impl UiPlugin {
    pub const NAME: &'static str = "vitest:ui";

    #[must_use]
    pub fn new(base: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            version: version.into(),
        }
    }
}

#[async_trait]
impl Plugin for UiPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn configure_server(&self, server: Arc<dyn HostServer>) -> crate::Result<()> {
        info!(server = server.id(), base = %self.base, version = %self.version, "serving UI");
        Ok(())
    }
}

#[derive(Deserialize)]
struct PackageManifest {
    #[serde(default)]
    version: Option<String>,
}

/// Looks for the UI package in `node_modules`, walking up from a project root.
#[derive(Debug, Clone)]
pub struct NodeModulesUiProvider {
    root: PathBuf,
}

impl NodeModulesUiProvider {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// First `node_modules/@vitest/ui/package.json` at or above the root.
    #[must_use]
    pub fn find_manifest(&self) -> Option<PathBuf> {
        self.root
            .ancestors()
            .map(manifest_path)
            .find(|path| path.is_file())
    }
}

fn manifest_path(dir: &Path) -> PathBuf {
    dir.join("node_modules").join(UI_PACKAGE).join("package.json")
}

#[async_trait]
impl UiProvider for NodeModulesUiProvider {
    async fn try_load_ui(&self, ui_base: Option<&str>) -> Result<Box<dyn Plugin>, SetupError> {
        let manifest = self
            .find_manifest()
            .ok_or_else(|| SetupError::MissingPackage {
                name: UI_PACKAGE.to_string(),
                root: self.root.clone(),
            })?;

        let invalid = |message: String| SetupError::InvalidPackage {
            name: UI_PACKAGE.to_string(),
            path: manifest.clone(),
            message,
        };
        let text = tokio::fs::read_to_string(&manifest)
            .await
            .map_err(|e| invalid(e.to_string()))?;
        let parsed: PackageManifest =
            serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))?;
        let version = parsed
            .version
            .ok_or_else(|| invalid("package.json has no version".to_string()))?;

        let base = ui_base.unwrap_or(DEFAULT_UI_BASE);
        debug!(version = %version, base, "loaded UI plugin");
        Ok(Box::new(UiPlugin::new(base, version)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn install_ui(root: &Path, manifest: &str) {
        let dir = root.join("node_modules").join(UI_PACKAGE);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("package.json"), manifest).unwrap();
    }

    #[tokio::test]
    async fn test_missing_package_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = NodeModulesUiProvider::new(dir.path());

        let err = provider.try_load_ui(None).await.err().unwrap();

        assert!(matches!(err, SetupError::MissingPackage { ref name, .. } if name == UI_PACKAGE));
        assert!(err.to_string().contains("@vitest/ui"));
    }

    #[tokio::test]
    async fn test_found_in_ancestor_node_modules() {
        let dir = tempfile::tempdir().unwrap();
        install_ui(dir.path(), r#"{ "name": "@vitest/ui", "version": "0.2.0" }"#);
        let nested = dir.path().join("packages").join("app");
        std::fs::create_dir_all(&nested).unwrap();

        let provider = NodeModulesUiProvider::new(&nested);
        let plugin = provider.try_load_ui(Some("/ui/")).await.unwrap();

        assert_eq!(plugin.name(), UiPlugin::NAME);
        assert_eq!(
            provider.find_manifest(),
            Some(manifest_path(dir.path()))
        );
    }

    #[derive(Debug)]
    struct Server;

    #[async_trait]
    impl HostServer for Server {
        fn id(&self) -> &str {
            "dev"
        }

        async fn close_watcher(&self) -> Result<(), crate::error::HostError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_ui_plugin_accepts_every_server() {
        let plugin = UiPlugin::new("/ui/", "1.6.0");
        assert!(plugin.configure_server(Arc::new(Server)).await.is_ok());
        assert!(plugin.configure_server(Arc::new(Server)).await.is_ok());
        assert_eq!(plugin, UiPlugin::new("/ui/", "1.6.0"));
    }

    #[tokio::test]
    async fn test_unreadable_manifest_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        install_ui(dir.path(), "{ not json");

        let err = NodeModulesUiProvider::new(dir.path())
            .try_load_ui(None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SetupError::InvalidPackage { .. }));
    }
}
