//! Server attachment state machine.
//!
//! ```text
//!   Unattached --attach--> Attached --attach (restart)--> Attached
//! ```
//!
//! Each attach installs the latest final config into the test context,
//! starts the API once per config generation when one is configured, and
//! closes the host's watcher in run mode. A re-attach first reports
//! [`ServerEvent::ServerRestart`] so consumers can drop state tied to the old
//! server.

use crate::config::FinalConfig;
use crate::context::{ServerEvent, TestContext};
use crate::error::{Error, HostError, Result};
use crate::host::HostServer;
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Starts the network API for a test context.
#[async_trait]
pub trait ApiSetup: Send + Sync {
    async fn setup(&self, ctx: Arc<dyn TestContext>) -> std::result::Result<(), HostError>;
}

/// What a single [`LifecycleController::attach`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttachOutcome {
    /// A restart notification was sent before attaching.
    pub restarted: bool,
    /// The API setup collaborator was invoked.
    pub api_started: bool,
    /// The host's watcher was closed.
    pub watcher_closed: bool,
}

/// Owns the "already attached once" flag and runs each attach.
pub struct LifecycleController {
    ctx: Arc<dyn TestContext>,
    api: Option<Arc<dyn ApiSetup>>,
    attached: AtomicBool,
    disposed: AtomicBool,
    /// Config generation the API was last started for.
    api_generation: Mutex<Option<u64>>,
}

impl fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleController")
            .field("attached", &self.is_attached())
            .field("disposed", &self.disposed.load(Ordering::SeqCst))
            .field("has_api", &self.api.is_some())
            .finish_non_exhaustive()
    }
}

impl LifecycleController {
    #[must_use]
    pub fn new(ctx: Arc<dyn TestContext>) -> Self {
        Self {
            ctx,
            api: None,
            attached: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            api_generation: Mutex::new(None),
        }
    }

    /// Set the collaborator that opens the API endpoint.
    pub fn with_api(mut self, api: Arc<dyn ApiSetup>) -> Self {
        self.api = Some(api);
        self
    }

    /// Whether a server has been attached at least once.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    /// Refuse further attaches. The attached flag is left as is.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    /// Attach `server` with `config`.
    ///
    /// Errors from the context, the API collaborator and the watcher are
    /// returned unchanged; a failed context install leaves the controller in
    /// its previous state.
    pub async fn attach(
        &self,
        config: Arc<FinalConfig>,
        server: Arc<dyn HostServer>,
    ) -> Result<AttachOutcome> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(Error::Disposed);
        }

        let mut outcome = AttachOutcome::default();

        if self.is_attached() {
            info!(server = server.id(), "dev server restarted");
            self.ctx.report(ServerEvent::ServerRestart).await?;
            outcome.restarted = true;
        }

        self.ctx
            .set_server(Arc::clone(&config), Arc::clone(&server))
            .await?;
        self.attached.store(true, Ordering::SeqCst);

        if let Some(api_config) = config.api() {
            match &self.api {
                Some(api) if !self.api_started_for(config.generation()) => {
                    debug!(port = api_config.port, host = ?api_config.host, "starting API server");
                    api.setup(Arc::clone(&self.ctx)).await?;
                    self.mark_api_started(config.generation());
                    outcome.api_started = true;
                }
                Some(_) => {
                    debug!(generation = config.generation(), "API already started for this config");
                }
                None => {
                    warn!(port = api_config.port, "API requested but no API server is configured");
                }
            }
        }

        if !config.watch() {
            debug!(server = server.id(), "run mode, closing file watcher");
            server.close_watcher().await?;
            outcome.watcher_closed = true;
        }

        Ok(outcome)
    }

    /// Whether the API was already started for `generation`.
    fn api_started_for(&self, generation: u64) -> bool {
        *self
            .api_generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            == Some(generation)
    }

    /// Record `generation` once its API setup has succeeded.
    fn mark_api_started(&self, generation: u64) {
        *self
            .api_generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigStages, ConfigTree};
    use crate::context::TestSession;
    use crate::error::ContextError;
    use serde_json::{json, Value};
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Default)]
    struct CountingServer {
        id: String,
        closes: AtomicUsize,
    }

    impl CountingServer {
        fn new(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                closes: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl HostServer for CountingServer {
        fn id(&self) -> &str {
            &self.id
        }

        async fn close_watcher(&self) -> std::result::Result<(), HostError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingApi {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ApiSetup for CountingApi {
        async fn setup(&self, _ctx: Arc<dyn TestContext>) -> std::result::Result<(), HostError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Fails its first `setup` call, succeeds afterwards.
    #[derive(Default)]
    struct FailOnceApi {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ApiSetup for FailOnceApi {
        async fn setup(&self, _ctx: Arc<dyn TestContext>) -> std::result::Result<(), HostError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(HostError::new("api", "port busy"));
            }
            Ok(())
        }
    }

    struct RejectingContext;

    #[async_trait]
    impl TestContext for RejectingContext {
        async fn set_server(
            &self,
            _config: Arc<FinalConfig>,
            _server: Arc<dyn HostServer>,
        ) -> std::result::Result<(), ContextError> {
            Err(ContextError::Rejected("bad config".to_string()))
        }

        async fn report(&self, _event: ServerEvent) -> std::result::Result<(), ContextError> {
            Ok(())
        }
    }

    fn stages(user: Value) -> ConfigStages {
        ConfigStages::new(user.as_object().cloned().unwrap_or_default())
    }

    #[tokio::test]
    async fn test_first_attach_does_not_report_restart() {
        let session = Arc::new(TestSession::new());
        let controller = LifecycleController::new(session.clone());
        let config = stages(json!({ "watch": true })).apply_final(&ConfigTree::new(), None);

        let outcome = controller
            .attach(config, CountingServer::new("a"))
            .await
            .unwrap();

        assert!(!outcome.restarted);
        assert!(controller.is_attached());
        assert!(session.events().is_empty());
    }

    #[tokio::test]
    async fn test_second_attach_reports_exactly_one_restart() {
        let session = Arc::new(TestSession::new());
        let controller = LifecycleController::new(session.clone());
        let stages = stages(json!({ "watch": true }));

        let first = stages.apply_final(&ConfigTree::new(), None);
        controller.attach(first, CountingServer::new("a")).await.unwrap();
        let second = stages.apply_final(&ConfigTree::new(), None);
        let outcome = controller
            .attach(second, CountingServer::new("b"))
            .await
            .unwrap();

        assert!(outcome.restarted);
        assert!(controller.is_attached());
        assert_eq!(session.events(), vec![ServerEvent::ServerRestart]);
        assert_eq!(session.server().map(|s| s.id().to_string()), Some("b".to_string()));
        assert_eq!(session.config().map(|c| c.generation()), Some(2));
    }

    #[tokio::test]
    async fn test_run_mode_closes_watcher_once_per_attach() {
        let controller = LifecycleController::new(Arc::new(TestSession::new()));
        let stages = stages(json!({ "watch": false }));
        let server = CountingServer::new("a");

        let config = stages.apply_final(&ConfigTree::new(), None);
        let outcome = controller.attach(config, server.clone()).await.unwrap();
        assert!(outcome.watcher_closed);
        assert_eq!(server.closes.load(Ordering::SeqCst), 1);

        let config = stages.apply_final(&ConfigTree::new(), None);
        controller.attach(config, server.clone()).await.unwrap();
        assert_eq!(server.closes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_watch_mode_never_closes_watcher() {
        let controller = LifecycleController::new(Arc::new(TestSession::new()));
        let server = CountingServer::new("a");
        let config = stages(json!({ "watch": true })).apply_final(&ConfigTree::new(), None);

        let outcome = controller.attach(config, server.clone()).await.unwrap();
        assert!(!outcome.watcher_closed);
        assert_eq!(server.closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_api_starts_once_per_generation() {
        let api = Arc::new(CountingApi::default());
        let controller =
            LifecycleController::new(Arc::new(TestSession::new())).with_api(api.clone());
        let stages = stages(json!({ "api": true, "watch": true }));

        let config = stages.apply_final(&ConfigTree::new(), None);
        let outcome = controller
            .attach(Arc::clone(&config), CountingServer::new("a"))
            .await
            .unwrap();
        assert!(outcome.api_started);

        // Same generation attached again: restart is reported, API is not restarted.
        let outcome = controller
            .attach(config, CountingServer::new("b"))
            .await
            .unwrap();
        assert!(outcome.restarted);
        assert!(!outcome.api_started);
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);

        let config = stages.apply_final(&ConfigTree::new(), None);
        controller.attach(config, CountingServer::new("c")).await.unwrap();
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_api_setup_is_retried_for_same_generation() {
        let api = Arc::new(FailOnceApi::default());
        let controller =
            LifecycleController::new(Arc::new(TestSession::new())).with_api(api.clone());
        let config = stages(json!({ "api": true, "watch": true })).apply_final(&ConfigTree::new(), None);

        let err = controller
            .attach(Arc::clone(&config), CountingServer::new("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Host(ref e) if e.component == "api"));
        assert!(controller.is_attached());

        let outcome = controller
            .attach(Arc::clone(&config), CountingServer::new("b"))
            .await
            .unwrap();
        assert!(outcome.restarted);
        assert!(outcome.api_started);
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);

        let outcome = controller
            .attach(config, CountingServer::new("c"))
            .await
            .unwrap();
        assert!(!outcome.api_started);
        assert_eq!(api.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_api_without_config() {
        let api = Arc::new(CountingApi::default());
        let controller =
            LifecycleController::new(Arc::new(TestSession::new())).with_api(api.clone());
        let config = stages(json!({ "watch": true })).apply_final(&ConfigTree::new(), None);

        controller.attach(config, CountingServer::new("a")).await.unwrap();
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_context_failure_propagates_and_leaves_unattached() {
        let controller = LifecycleController::new(Arc::new(RejectingContext));
        let server = CountingServer::new("a");
        let config = stages(json!({ "watch": false })).apply_final(&ConfigTree::new(), None);

        let err = controller.attach(config, server.clone()).await.unwrap_err();

        assert!(matches!(err, Error::Context(ContextError::Rejected(_))));
        assert!(!controller.is_attached());
        assert_eq!(server.closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disposed_controller_refuses_attach() {
        let controller = LifecycleController::new(Arc::new(TestSession::new()));
        let config = stages(json!({})).apply_final(&ConfigTree::new(), None);
        controller.attach(Arc::clone(&config), CountingServer::new("a")).await.unwrap();

        controller.dispose();
        let err = controller
            .attach(config, CountingServer::new("b"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Disposed));
        assert!(controller.is_attached());
    }
}
