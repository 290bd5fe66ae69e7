//! The worker instance and its event handlers.

use pagekeep_client::{FetchClient, FetchConfig, Fetcher};
use pagekeep_core::{CacheDb, Error, Request, Response, WorkerConfig};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinSet;
use url::Url;

use crate::message::ControlMessage;
use crate::routing::{RouteTable, Strategy};
use crate::store::CacheStore;

/// Result of the fetch handler.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Not intercepted; the host sends the request to the network itself.
    Passthrough,
    /// Intercepted and answered by the worker.
    Respond(Response),
}

/// One deployed worker instance, pinned to a single version tag.
///
/// Must be driven on a current-thread tokio runtime. Background refreshes
/// then run only after the caller of [`ServiceWorker::handle_fetch`] has
/// the cached response; a multi-threaded runtime may start them earlier.
pub struct ServiceWorker {
    pub(crate) config: WorkerConfig,
    pub(crate) app_shell: Vec<Url>,
    pub(crate) routes: RouteTable,
    pub(crate) store: CacheStore,
    pub(crate) fetcher: Arc<dyn Fetcher>,
    refreshes: Mutex<JoinSet<()>>,
}

impl ServiceWorker {
    /// Create a worker over `db`, sending network traffic through `fetcher`.
    ///
    /// # Errors
    ///
    /// `Error::Config` if the configuration does not validate.
    pub fn new(config: WorkerConfig, db: CacheDb, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        config.validate()?;
        let app_shell = config.app_shell_urls()?;
        let routes = RouteTable::new(&app_shell, &config.host_rules);
        let store = CacheStore::new(db, config.cache_name());

        Ok(Self { config, app_shell, routes, store, fetcher, refreshes: Mutex::new(JoinSet::new()) })
    }

    /// Create a worker that talks to the real network.
    pub fn with_network(config: WorkerConfig, db: CacheDb) -> Result<Self, Error> {
        let fetcher = FetchClient::new(FetchConfig::from(&config))?;
        Self::new(config, db, Arc::new(fetcher))
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Name of the generation this instance reads and writes.
    pub fn cache_name(&self) -> &str {
        self.store.name()
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Resolved app-shell manifest.
    pub fn app_shell(&self) -> &[Url] {
        &self.app_shell
    }

    /// Fetch handler.
    ///
    /// # Errors
    ///
    /// Network failures the chosen strategy has no fallback for.
    pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome, Error> {
        let route = self.routes.classify(request);
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            route = %route.name,
            strategy = ?route.strategy,
            "routing request"
        );

        if route.strategy == Strategy::Passthrough {
            return Ok(FetchOutcome::Passthrough);
        }

        self.apply(route.strategy, request).await.map(FetchOutcome::Respond)
    }

    /// Message handler. Returns the recognised command, if any.
    pub fn handle_message(&self, payload: &serde_json::Value) -> Option<ControlMessage> {
        let message = ControlMessage::parse(payload);
        if message.is_none() {
            tracing::debug!(cache = %self.cache_name(), "ignoring unrecognised message");
        }
        message
    }

    /// Wait for every outstanding background refresh to finish.
    pub async fn settle(&self) {
        loop {
            let mut pending = std::mem::take(&mut *self.background());
            if pending.is_empty() {
                return;
            }
            while let Some(result) = pending.join_next().await {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "background refresh task aborted");
                }
            }
        }
    }

    pub(crate) fn background(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.refreshes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ServiceWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceWorker")
            .field("cache_name", &self.cache_name())
            .field("app_shell", &self.app_shell)
            .finish_non_exhaustive()
    }
}
