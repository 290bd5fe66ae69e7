//! HTTP fetch pipeline.
//!
//! ### Behaviour
//! - Requests go out with their original method and headers
//! - Any HTTP status is a response; only transport failures are errors
//! - Redirects are followed up to a limit (default: 5)
//! - No overall deadline unless one is configured; the transport's own
//!   connect and read failures surface as `Error::Network`

pub mod url;

use pagekeep_core::{Error, Request, Response, WorkerConfig};
use reqwest::Client;
use std::time::{Duration, Instant};

pub use url::{UrlError, canonicalize};

/// The network seam used by the worker.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Send `request` and return whatever response the server produced.
    ///
    /// # Errors
    ///
    /// `Error::Network` when no response arrived at all.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "pagekeep/0.1")
    pub user_agent: String,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Optional overall request timeout (default: none)
    pub timeout: Option<Duration>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "pagekeep/0.1".to_string(), max_redirects: 5, timeout: None }
    }
}

impl From<&WorkerConfig> for FetchConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), max_redirects: config.max_redirects, timeout: None }
    }
}

/// reqwest-backed [`Fetcher`].
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl Fetcher for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let url = canonicalize(&request.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let response = self
            .http
            .request(request.method.clone(), url.as_str())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(|e| Error::Network(format!("{} {url}: {e}", request.method)))?;

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response from {url}: {e}")))?;

        tracing::debug!(
            "fetched {} {} -> {} ({}) in {}ms ({} bytes)",
            request.method,
            url,
            final_url,
            status.as_u16(),
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(Response { status, headers, body, url: Some(final_url) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "pagekeep/0.1");
        assert_eq!(config.max_redirects, 5);
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_fetch_config_from_worker_config() {
        let worker = WorkerConfig { user_agent: "journal/2".into(), max_redirects: 2, ..Default::default() };
        let config = FetchConfig::from(&worker);
        assert_eq!(config.user_agent, "journal/2");
        assert_eq!(config.max_redirects, 2);
    }

    #[tokio::test]
    async fn test_fetch_client_new() {
        let client = FetchClient::new(FetchConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_http() {
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let request = Request::get("chrome-extension://abcdef/popup.html").unwrap();
        let result = client.fetch(&request).await;
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_is_network_error() {
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        // Port 9 on loopback (discard) is closed on test hosts.
        let request = Request::get("http://127.0.0.1:9/").unwrap();
        let result = client.fetch(&request).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    #[ignore = "requires network"]
    async fn test_fetch_real_page() {
        let client = FetchClient::new(FetchConfig::default()).unwrap();
        let request = Request::get("https://example.com/").unwrap();
        let response = client.fetch(&request).await.unwrap();
        assert!(response.is_ok());
        assert!(!response.body.is_empty());
    }
}
