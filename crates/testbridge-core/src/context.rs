//! The shared test context downstream execution reads config and server from.

use crate::config::FinalConfig;
use crate::error::ContextError;
use crate::host::HostServer;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Lifecycle notifications sent to the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerEvent {
    /// The host server was replaced by a new instance.
    ServerRestart,
}

impl ServerEvent {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServerRestart => "onServerRestart",
        }
    }
}

impl fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Long-lived context owned by the caller and populated on server attach.
#[async_trait]
pub trait TestContext: Send + Sync {
    /// Install the final config and the server it was resolved for.
    async fn set_server(
        &self,
        config: Arc<FinalConfig>,
        server: Arc<dyn HostServer>,
    ) -> Result<(), ContextError>;

    /// Deliver a lifecycle event to reporters and caches.
    async fn report(&self, event: ServerEvent) -> Result<(), ContextError>;
}

#[derive(Default)]
struct SessionState {
    config: Option<Arc<FinalConfig>>,
    server: Option<Arc<dyn HostServer>>,
    events: Vec<ServerEvent>,
}

/// Default [`TestContext`]: validates and stores what it is given.
#[derive(Default)]
pub struct TestSession {
    state: Mutex<SessionState>,
}

impl fmt::Debug for TestSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("TestSession")
            .field("generation", &state.config.as_ref().map(|c| c.generation()))
            .field("server", &state.server.as_ref().map(|s| s.id().to_string()))
            .field("events", &state.events)
            .finish()
    }
}

impl TestSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The config installed by the last `set_server`.
    #[must_use]
    pub fn config(&self) -> Option<Arc<FinalConfig>> {
        self.lock().config.clone()
    }

    /// The server installed by the last `set_server`.
    #[must_use]
    pub fn server(&self) -> Option<Arc<dyn HostServer>> {
        self.lock().server.clone()
    }

    /// Events reported so far, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<ServerEvent> {
        self.lock().events.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TestContext for TestSession {
    async fn set_server(
        &self,
        config: Arc<FinalConfig>,
        server: Arc<dyn HostServer>,
    ) -> Result<(), ContextError> {
        validate(&config)?;
        debug!(server = server.id(), generation = config.generation(), "test context updated");

        let mut state = self.lock();
        state.config = Some(config);
        state.server = Some(server);
        Ok(())
    }

    async fn report(&self, event: ServerEvent) -> Result<(), ContextError> {
        debug!(%event, "server event");
        self.lock().events.push(event);
        Ok(())
    }
}

/// Reject configs the runner cannot start with.
fn validate(config: &FinalConfig) -> Result<(), ContextError> {
    for field in ["testTimeout", "hookTimeout"] {
        if let Some(value) = config.get(field) {
            if value.as_u64().is_none() {
                return Err(invalid(field, format!("expected a non-negative number, got {value}")));
            }
        }
    }

    for field in ["include", "exclude"] {
        match config.get(field) {
            None => {}
            Some(Value::Array(items)) if items.iter().all(Value::is_string) => {}
            Some(value) => {
                return Err(invalid(field, format!("expected a list of globs, got {value}")));
            }
        }
    }

    if let Some(value) = config.get("environment") {
        if !value.as_str().is_some_and(|s| !s.is_empty()) {
            return Err(invalid("environment", format!("expected a name, got {value}")));
        }
    }
    Ok(())
}

fn invalid(field: &str, message: String) -> ContextError {
    ContextError::InvalidConfig {
        field: field.to_string(),
        message,
    }
}
