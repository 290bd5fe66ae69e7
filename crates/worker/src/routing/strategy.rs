//! Caching strategies.
//!
//! Every store write goes through [`CacheStore::store`], which only keeps
//! 2xx responses and never fails the request. Response bodies are
//! reference-counted, so the copy handed to the store and the copy returned
//! to the page are read independently.

use pagekeep_client::Fetcher;
use pagekeep_core::{Error, Request, Response};
use std::sync::Arc;
use tokio::task::JoinSet;

use super::Strategy;
use crate::store::CacheStore;
use crate::worker::ServiceWorker;

impl ServiceWorker {
    /// Serve `request` with an intercepting strategy.
    pub(crate) async fn apply(&self, strategy: Strategy, request: &Request) -> Result<Response, Error> {
        match strategy {
            Strategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
            Strategy::CacheFirstWithPlaceholder => self.cache_first_with_placeholder(request).await,
            Strategy::CacheFirst => self.cache_first(request).await,
            Strategy::NetworkFirst { store } => self.network_first(request, store).await,
            // Passthrough never reaches here; treat it as a plain network fetch.
            Strategy::Passthrough => self.fetcher.fetch(request).await,
        }
    }

    async fn stale_while_revalidate(&self, request: &Request) -> Result<Response, Error> {
        if let Some(cached) = self.store.lookup(request).await {
            tracing::debug!(url = %request.url, "serving cached copy, refreshing in background");
            self.spawn_refresh(request.clone());
            return Ok(cached);
        }

        fetch_and_store(self.fetcher.as_ref(), &self.store, request).await
    }

    async fn cache_first_with_placeholder(&self, request: &Request) -> Result<Response, Error> {
        if let Some(cached) = self.store.lookup(request).await {
            return Ok(cached);
        }

        match fetch_and_store(self.fetcher.as_ref(), &self.store, request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "image unavailable; returning placeholder");
                Ok(Response::not_found())
            }
        }
    }

    async fn cache_first(&self, request: &Request) -> Result<Response, Error> {
        if let Some(cached) = self.store.lookup(request).await {
            return Ok(cached);
        }

        fetch_and_store(self.fetcher.as_ref(), &self.store, request).await
    }

    async fn network_first(&self, request: &Request, store: bool) -> Result<Response, Error> {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if store {
                    self.store.store(request, &response).await;
                }
                Ok(response)
            }
            Err(e) => match self.store.lookup(request).await {
                Some(cached) => {
                    tracing::debug!(url = %request.url, error = %e, "network failed; serving cached copy");
                    Ok(cached)
                }
                None => Err(e),
            },
        }
    }

    /// Refresh the stored copy of `request` in a detached task.
    ///
    /// The task yields once before touching the network, so the caller
    /// already holds the cached response when the refresh is issued. Its
    /// outcome is only ever a store write, and its failure ends at the task
    /// boundary. Finished refreshes are reaped here, so the set only holds
    /// the ones still in flight.
    fn spawn_refresh(&self, request: Request) {
        let fetcher = Arc::clone(&self.fetcher);
        let store = self.store.clone();
        let mut refreshes = self.background();
        reap(&mut refreshes);
        refreshes.spawn(async move {
            tokio::task::yield_now().await;
            match fetcher.fetch(&request).await {
                Ok(response) => {
                    store.store(&request, &response).await;
                }
                Err(e) => tracing::warn!(url = %request.url, error = %e, "background refresh failed"),
            }
        });
    }
}

/// Drop every refresh that has already finished.
fn reap(refreshes: &mut JoinSet<()>) {
    while let Some(result) = refreshes.try_join_next() {
        if let Err(e) = result {
            tracing::warn!(error = %e, "background refresh task aborted");
        }
    }
}

/// Fetch `request`, store the response if it is 2xx, and return it.
async fn fetch_and_store(fetcher: &dyn Fetcher, store: &CacheStore, request: &Request) -> Result<Response, Error> {
    let response = fetcher.fetch(request).await?;
    store.store(request, &response).await;
    Ok(response)
}
