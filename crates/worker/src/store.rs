//! Accessor for the current cache generation.
//!
//! Reads and writes made while routing are best-effort: a store failure is
//! logged and treated as a miss (reads) or dropped (writes), so it never
//! fails the request it happened under.

use pagekeep_core::{CacheDb, Error, Generation, Request, Response};
use std::sync::Arc;

/// The current generation, opened on demand.
#[derive(Clone, Debug)]
pub struct CacheStore {
    db: CacheDb,
    name: Arc<str>,
}

impl CacheStore {
    pub fn new(db: CacheDb, name: impl Into<Arc<str>>) -> Self {
        Self { db, name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    /// Open the generation, creating it if absent.
    pub async fn open(&self) -> Result<Generation, Error> {
        self.db.open_generation(&self.name).await
    }

    /// Stored response for `request`, if any.
    pub async fn lookup(&self, request: &Request) -> Option<Response> {
        match self.db.generation(&self.name).match_request(request).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache lookup failed; treating as miss");
                None
            }
        }
    }

    /// Store `response` for `request` if its status is in the 2xx range.
    ///
    /// Returns whether a write happened.
    pub async fn store(&self, request: &Request, response: &Response) -> bool {
        if !response.is_ok() {
            tracing::debug!(url = %request.url, status = response.status.as_u16(), "not storing unsuccessful response");
            return false;
        }

        let result = match self.open().await {
            Ok(generation) => generation.put(request, response).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache write failed");
                false
            }
        }
    }
}
