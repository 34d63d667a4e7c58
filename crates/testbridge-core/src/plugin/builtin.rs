//! Descriptors for the runner's companion plugins.
//!
//! Their transforms and setup scripts live in the runner package; the
//! orchestrator only places them in the host's plugin list.

use super::{Plugin, PluginEnforce};

/// Module mock interception (`vi.mock` hoisting).
#[derive(Debug, Default)]
pub struct MocksPlugin;

impl MocksPlugin {
    pub const NAME: &'static str = "vitest:mocks";

    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Plugin for MocksPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn enforce(&self) -> PluginEnforce {
        PluginEnforce::Post
    }
}

/// Runs `globalSetup` scripts before the first test file.
#[derive(Debug, Default)]
pub struct GlobalSetupPlugin;

impl GlobalSetupPlugin {
    pub const NAME: &'static str = "vitest:global-setup";

    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Plugin for GlobalSetupPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }
}
