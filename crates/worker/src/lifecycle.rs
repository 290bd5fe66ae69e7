//! Install and activate handlers.
//!
//! Install pre-populates the app shell into the current generation.
//! Activate deletes every other generation.

use pagekeep_core::{Error, Request};
use url::Url;

use crate::worker::ServiceWorker;

/// Outcome of the install handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Generation the app shell was written into.
    pub generation: String,
    /// Entries fetched and stored.
    pub stored: Vec<Url>,
    /// Entries that could not be fetched or stored, with the reason.
    pub failed: Vec<(Url, String)>,
}

impl InstallReport {
    /// Every manifest entry was stored.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Whether the instance asks to skip waiting. Only a complete app
    /// shell does.
    pub fn skip_waiting(&self) -> bool {
        self.is_complete()
    }
}

/// Outcome of the activate handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateReport {
    /// Generations removed because their name differs from the current one.
    pub deleted: Vec<String>,
    /// Whether the instance asks to control already-open pages.
    pub claim_clients: bool,
}

impl ServiceWorker {
    /// Install handler.
    ///
    /// Creates the current generation and stores every app-shell entry.
    /// Individual entry failures are logged and reported, never raised.
    ///
    /// # Errors
    ///
    /// Only when the generation itself cannot be created.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        tracing::info!(cache = %self.cache_name(), entries = self.app_shell.len(), "installing");

        let generation = self.store.open().await?;
        let mut report =
            InstallReport { generation: generation.name().to_string(), stored: Vec::new(), failed: Vec::new() };

        for url in &self.app_shell {
            let request = Request::new(http::Method::GET, url.clone());
            let outcome = match self.fetcher.fetch(&request).await {
                Ok(response) if response.is_ok() => generation.put(&request, &response).await,
                Ok(response) => Err(Error::Network(format!("status {}", response.status.as_u16()))),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => report.stored.push(url.clone()),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "failed to cache app shell entry");
                    report.failed.push((url.clone(), e.to_string()));
                }
            }
        }

        if report.is_complete() {
            tracing::info!(cache = %report.generation, stored = report.stored.len(), "app shell cached");
        } else {
            tracing::warn!(
                cache = %report.generation,
                stored = report.stored.len(),
                failed = report.failed.len(),
                "app shell incomplete; misses will fall through to the network"
            );
        }

        Ok(report)
    }

    /// Activate handler.
    ///
    /// Deletes every generation not named after the current version tag,
    /// then asks to claim all open pages.
    ///
    /// # Errors
    ///
    /// When the generations cannot be listed or deleted.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        tracing::info!(cache = %self.cache_name(), "activating");

        let db = self.store.db();
        let mut deleted = Vec::new();
        for name in db.generation_names().await? {
            if name != self.cache_name() {
                tracing::info!(cache = %name, "deleting old cache");
                db.delete_generation(&name).await?;
                deleted.push(name);
            }
        }

        Ok(ActivateReport { deleted, claim_clients: true })
    }
}
