//! Hosting-runtime side of the worker lifecycle.
//!
//! A [`Registration`] owns the lifecycle state machine for every deployed
//! instance and the set of open pages (clients):
//!
//! ```text
//! installing -> installed (waiting) -> activating -> activated
//!      \______________\__________________________________\-> redundant
//! ```
//!
//! At most one instance is active and at most one is waiting. A waiting
//! instance is promoted when it asks to skip waiting, when no instance is
//! active, when the page posts a skip-waiting message, or when the last page
//! controlled by the active instance closes. Workers only react to these
//! transitions through their handlers; they never drive them.

use pagekeep_client::Fetcher;
use pagekeep_core::{Error, Request, Response};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::RegistrationError;
use crate::message::ControlMessage;
use crate::worker::{FetchOutcome, ServiceWorker};

/// Identifier of a deployed instance within a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub u64);

/// Identifier of an open page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

/// Lifecycle state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    /// Installed and waiting for activation.
    Installed,
    Activating,
    Activated,
    /// Superseded, or failed to install. Never routes again.
    Redundant,
}

#[derive(Debug, Clone)]
struct Slot {
    id: WorkerId,
    worker: Arc<ServiceWorker>,
}

/// Registration scope: the instances deployed for one app and its pages.
///
/// Must be driven on a current-thread tokio runtime. See [`ServiceWorker`]
/// for the ordering this provides.
pub struct Registration {
    network: Arc<dyn Fetcher>,
    waiting: Option<Slot>,
    active: Option<Slot>,
    states: HashMap<WorkerId, WorkerState>,
    /// Open pages and the instance controlling each, if any.
    clients: BTreeMap<ClientId, Option<WorkerId>>,
    next_worker: u64,
    next_client: u64,
}

impl Registration {
    /// `network` serves requests no instance intercepts.
    pub fn new(network: Arc<dyn Fetcher>) -> Self {
        Self {
            network,
            waiting: None,
            active: None,
            states: HashMap::new(),
            clients: BTreeMap::new(),
            next_worker: 1,
            next_client: 1,
        }
    }

    /// Deploy `worker`: run its install handler, then activate it if it
    /// asked to skip waiting or nothing is active yet.
    ///
    /// # Errors
    ///
    /// `InstallFailed` when the install handler errors; the instance is then
    /// redundant and the current state is left untouched.
    pub async fn register(&mut self, worker: ServiceWorker) -> Result<WorkerId, RegistrationError> {
        let id = WorkerId(self.next_worker);
        self.next_worker += 1;
        self.set_state(id, WorkerState::Installing);

        let worker = Arc::new(worker);
        let report = match worker.install().await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(worker = id.0, error = %e, "install failed");
                self.set_state(id, WorkerState::Redundant);
                return Err(RegistrationError::InstallFailed(e));
            }
        };

        if let Some(previous) = self.waiting.replace(Slot { id, worker }) {
            self.set_state(previous.id, WorkerState::Redundant);
        }
        self.set_state(id, WorkerState::Installed);

        if report.skip_waiting() || self.active.is_none() {
            self.promote_waiting().await;
        }

        Ok(id)
    }

    /// Post a message from a page to the waiting instance.
    ///
    /// Returns true if the message activated it.
    pub async fn post_message(&mut self, payload: &serde_json::Value) -> bool {
        let Some(waiting) = &self.waiting else {
            tracing::debug!("message posted with no waiting worker");
            return false;
        };

        let message = waiting.worker.handle_message(payload);
        match message {
            Some(ControlMessage::SkipWaiting) => {
                self.promote_waiting().await;
                true
            }
            None => false,
        }
    }

    /// Open a page. It is controlled by the active instance, if there is one.
    pub fn open_client(&mut self) -> ClientId {
        let id = ClientId(self.next_client);
        self.next_client += 1;
        let controller = self.active.as_ref().map(|slot| slot.id);
        self.clients.insert(id, controller);
        id
    }

    /// Close a page. Closing the last page controlled by the active instance
    /// lets a waiting instance take over.
    pub async fn close_client(&mut self, client: ClientId) {
        self.clients.remove(&client);

        let Some(active) = self.active.as_ref().map(|slot| slot.id) else {
            return;
        };
        let still_controlled = self.clients.values().any(|c| *c == Some(active));
        if self.waiting.is_some() && !still_controlled {
            self.promote_waiting().await;
        }
    }

    /// Route a request issued by `client`.
    ///
    /// Pages without a controller, and requests the controller does not
    /// intercept, go straight to the network.
    pub async fn fetch(&self, client: ClientId, request: Request) -> Result<Response, Error> {
        let controller = self.clients.get(&client).copied().flatten();
        let active = self.active.as_ref().filter(|slot| Some(slot.id) == controller);

        let Some(slot) = active else {
            return self.network.fetch(&request).await;
        };

        match slot.worker.handle_fetch(&request).await? {
            FetchOutcome::Respond(response) => Ok(response),
            FetchOutcome::Passthrough => self.network.fetch(&request).await,
        }
    }

    pub fn state(&self, id: WorkerId) -> Result<WorkerState, RegistrationError> {
        self.states.get(&id).copied().ok_or(RegistrationError::UnknownWorker(id.0))
    }

    pub fn active(&self) -> Option<WorkerId> {
        self.active.as_ref().map(|slot| slot.id)
    }

    pub fn waiting(&self) -> Option<WorkerId> {
        self.waiting.as_ref().map(|slot| slot.id)
    }

    /// Instance controlling `client`, if any.
    pub fn controller(&self, client: ClientId) -> Option<WorkerId> {
        self.clients.get(&client).copied().flatten()
    }

    /// Wait for background work of the active instance to finish.
    pub async fn settle(&self) {
        if let Some(slot) = &self.active {
            slot.worker.settle().await;
        }
    }

    async fn promote_waiting(&mut self) {
        let Some(next) = self.waiting.take() else {
            return;
        };

        if let Some(previous) = self.active.take() {
            previous.worker.settle().await;
            self.set_state(previous.id, WorkerState::Redundant);
        }

        self.set_state(next.id, WorkerState::Activating);
        let claim = match next.worker.activate().await {
            Ok(report) => report.claim_clients,
            Err(e) => {
                // An activate failure still leaves the instance active, just
                // with stale generations lingering.
                tracing::warn!(worker = next.id.0, error = %e, "activate failed");
                true
            }
        };
        self.set_state(next.id, WorkerState::Activated);

        if claim {
            for controller in self.clients.values_mut() {
                *controller = Some(next.id);
            }
        }
        tracing::info!(worker = next.id.0, cache = %next.worker.cache_name(), "worker active");
        self.active = Some(next);
    }

    fn set_state(&mut self, id: WorkerId, state: WorkerState) {
        tracing::debug!(worker = id.0, ?state, "worker state change");
        self.states.insert(id, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeNetwork, serve_app_shell, worker_on};
    use http::{Method, StatusCode};
    use pagekeep_core::CacheDb;
    use serde_json::json;
    use url::Url;

    async fn setup() -> (Arc<FakeNetwork>, CacheDb, Registration) {
        let network = FakeNetwork::new();
        serve_app_shell(&network);
        let db = CacheDb::open_in_memory().await.unwrap();
        let registration = Registration::new(network.clone());
        (network, db, registration)
    }

    #[tokio::test]
    async fn test_first_worker_activates_and_claims() {
        let (network, db, mut registration) = setup().await;
        let page = registration.open_client();
        assert_eq!(registration.controller(page), None);

        let id = registration.register(worker_on(&db, &network, "v4").await).await.unwrap();

        assert_eq!(registration.state(id).unwrap(), WorkerState::Activated);
        assert_eq!(registration.active(), Some(id));
        assert_eq!(registration.controller(page), Some(id));
    }

    #[tokio::test]
    async fn test_complete_install_skips_waiting() {
        let (network, db, mut registration) = setup().await;
        let v4 = registration.register(worker_on(&db, &network, "v4").await).await.unwrap();
        let page = registration.open_client();

        let v5 = registration.register(worker_on(&db, &network, "v5").await).await.unwrap();

        assert_eq!(registration.state(v4).unwrap(), WorkerState::Redundant);
        assert_eq!(registration.state(v5).unwrap(), WorkerState::Activated);
        assert_eq!(registration.controller(page), Some(v5));
        assert_eq!(db.generation_names().await.unwrap(), vec!["between-pages-v5".to_string()]);
    }

    #[tokio::test]
    async fn test_incomplete_install_waits_for_skip_waiting_message() {
        let (network, db, mut registration) = setup().await;
        let v4 = registration.register(worker_on(&db, &network, "v4").await).await.unwrap();
        let page = registration.open_client();

        network.fail("http://localhost/manifest.json");
        let v5 = registration.register(worker_on(&db, &network, "v5").await).await.unwrap();
        assert_eq!(registration.state(v5).unwrap(), WorkerState::Installed);
        assert_eq!(registration.waiting(), Some(v5));
        assert_eq!(registration.controller(page), Some(v4));

        assert!(!registration.post_message(&json!("reload please")).await);
        assert_eq!(registration.waiting(), Some(v5));

        assert!(registration.post_message(&json!("skipWaiting")).await);
        assert_eq!(registration.state(v5).unwrap(), WorkerState::Activated);
        assert_eq!(registration.state(v4).unwrap(), WorkerState::Redundant);
        assert_eq!(registration.controller(page), Some(v5));
        assert_eq!(registration.waiting(), None);
    }

    #[tokio::test]
    async fn test_closing_last_page_promotes_waiting() {
        let (network, db, mut registration) = setup().await;
        registration.register(worker_on(&db, &network, "v4").await).await.unwrap();
        let page = registration.open_client();

        network.fail("http://localhost/");
        let v5 = registration.register(worker_on(&db, &network, "v5").await).await.unwrap();
        assert_eq!(registration.waiting(), Some(v5));

        registration.close_client(page).await;
        assert_eq!(registration.active(), Some(v5));
    }

    #[tokio::test]
    async fn test_newer_waiting_replaces_older_waiting() {
        let (network, db, mut registration) = setup().await;
        registration.register(worker_on(&db, &network, "v4").await).await.unwrap();
        registration.open_client();

        network.fail("http://localhost/");
        let v5 = registration.register(worker_on(&db, &network, "v5").await).await.unwrap();
        let v6 = registration.register(worker_on(&db, &network, "v6").await).await.unwrap();

        assert_eq!(registration.state(v5).unwrap(), WorkerState::Redundant);
        assert_eq!(registration.waiting(), Some(v6));
    }

    #[tokio::test]
    async fn test_message_without_waiting_worker_is_ignored() {
        let (network, db, mut registration) = setup().await;
        let v4 = registration.register(worker_on(&db, &network, "v4").await).await.unwrap();

        assert!(!registration.post_message(&json!("skipWaiting")).await);
        assert_eq!(registration.active(), Some(v4));
    }

    #[tokio::test]
    async fn test_fetch_routes_through_controller() {
        let (network, db, mut registration) = setup().await;
        registration.register(worker_on(&db, &network, "v4").await).await.unwrap();
        let page = registration.open_client();

        network.set_offline(true);
        let response = registration
            .fetch(page, Request::navigate("http://localhost/index.html").unwrap())
            .await
            .unwrap();
        assert_eq!(response.body, "shell");
    }

    #[tokio::test]
    async fn test_uncontrolled_page_goes_to_network() {
        let (network, _db, registration) = setup().await;
        network.respond("http://localhost/index.html", StatusCode::OK, "live");

        let response = registration
            .fetch(ClientId(42), Request::navigate("http://localhost/index.html").unwrap())
            .await
            .unwrap();
        assert_eq!(response.body, "live");
    }

    #[tokio::test]
    async fn test_passthrough_goes_to_network_uncached() {
        let (network, db, mut registration) = setup().await;
        let id = registration.register(worker_on(&db, &network, "v4").await).await.unwrap();
        let page = registration.open_client();
        network.respond("https://abcd.supabase.co/rest/v1/entries", StatusCode::OK, "[]");

        let response = registration
            .fetch(page, Request::get("https://abcd.supabase.co/rest/v1/entries").unwrap())
            .await
            .unwrap();
        assert_eq!(response.body, "[]");
        registration.settle().await;

        let generation = db.generation("between-pages-v4");
        assert!(generation.keys().await.unwrap().iter().all(|k| !k.contains("supabase")));
        assert_eq!(registration.state(id).unwrap(), WorkerState::Activated);

        let post = Request::new(Method::POST, Url::parse("http://localhost/index.html").unwrap());
        network.respond("http://localhost/index.html", StatusCode::CREATED, "created");
        let response = registration.fetch(page, post).await.unwrap();
        assert_eq!(response.status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_unknown_worker_state() {
        let (_network, _db, registration) = setup().await;
        assert!(matches!(registration.state(WorkerId(99)), Err(RegistrationError::UnknownWorker(99))));
    }
}
