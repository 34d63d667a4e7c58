use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for testbridge operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Config file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// `configure_server` ran before any `config_resolved` produced a final config.
    #[error("server attached before the test config was resolved")]
    ConfigNotResolved,

    #[error("test runner plugin has been disposed")]
    Disposed,

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Errors raised by a [`crate::TestContext`] while installing a server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// The final config has a field the context cannot run with.
    #[error("invalid test config field `{field}`: {message}")]
    InvalidConfig { field: String, message: String },

    #[error("test context rejected the request: {0}")]
    Rejected(String),
}

/// Errors that abort plugin composition before the host attaches anything.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("package `{name}` is required but was not found from {}; install it to enable this feature", .root.display())]
    MissingPackage { name: String, root: PathBuf },

    #[error("package `{name}` at {} is unusable: {message}", .path.display())]
    InvalidPackage {
        name: String,
        path: PathBuf,
        message: String,
    },
}

/// An error reported by a host-side collaborator (server, watcher, API server).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{component}: {message}")]
pub struct HostError {
    pub component: String,
    pub message: String,
}

impl HostError {
    #[must_use]
    pub fn new(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            message: message.into(),
        }
    }
}
