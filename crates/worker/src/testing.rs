//! Scripted network and worker builders for tests.

use http::StatusCode;
use pagekeep_client::Fetcher;
use pagekeep_core::{CacheDb, ConfigOverrides, Error, Request, Response, WorkerConfig};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::worker::ServiceWorker;

#[derive(Clone)]
enum Script {
    Respond(Response),
    Fail,
    Gated(Arc<Notify>, Response),
}

/// In-memory network keyed by request identity.
///
/// Unscripted URLs behave like unreachable hosts.
#[derive(Default)]
pub struct FakeNetwork {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
}

impl FakeNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, url: &str, status: StatusCode, body: &'static str) {
        self.script(url, Script::Respond(Response::new(status, body)));
    }

    pub fn fail(&self, url: &str) {
        self.script(url, Script::Fail);
    }

    /// Respond only once the returned gate is notified.
    pub fn gate(&self, url: &str, status: StatusCode, body: &'static str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.script(url, Script::Gated(Arc::clone(&gate), Response::new(status, body)));
        gate
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of fetches issued for `url`.
    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| u.as_str() == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn script(&self, url: &str, script: Script) {
        let identity = Request::get(url).unwrap().identity();
        self.scripts.lock().unwrap().insert(identity, script);
    }
}

#[async_trait::async_trait]
impl Fetcher for FakeNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let identity = request.identity();
        self.calls.lock().unwrap().push(identity.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{identity}: offline")));
        }

        let script = self.scripts.lock().unwrap().get(&identity).cloned();
        match script {
            Some(Script::Respond(response)) => Ok(response),
            Some(Script::Gated(gate, response)) => {
                gate.notified().await;
                Ok(response)
            }
            Some(Script::Fail) | None => Err(Error::Network(format!("{identity}: unreachable"))),
        }
    }
}

/// Script every default app-shell entry with a 200.
pub fn serve_app_shell(network: &FakeNetwork) {
    for url in WorkerConfig::default().app_shell_urls().unwrap() {
        network.respond(url.as_str(), StatusCode::OK, "shell");
    }
}

/// Worker with the default configuration over a fresh in-memory store.
pub async fn worker_with(network: &Arc<FakeNetwork>) -> ServiceWorker {
    let db = CacheDb::open_in_memory().await.unwrap();
    worker_on(&db, network, "v4").await
}

/// Worker for `version` sharing `db`.
pub async fn worker_on(db: &CacheDb, network: &Arc<FakeNetwork>, version: &str) -> ServiceWorker {
    let config = WorkerConfig::load_with(ConfigOverrides::version(version)).unwrap();
    ServiceWorker::new(config, db.clone(), network.clone()).unwrap()
}
