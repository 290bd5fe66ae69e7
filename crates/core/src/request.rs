//! Request and response model for intercepted traffic.
//!
//! Bodies are held as [`Bytes`], so cloning a [`Response`] shares the buffer
//! instead of copying it; the stored copy and the copy handed back to the page
//! stay independently readable.

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use url::Url;

use crate::Error;

/// How the page issued the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level document navigation.
    Navigate,
    SameOrigin,
    #[default]
    NoCors,
    Cors,
}

/// What the response will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    #[default]
    Empty,
    Document,
    Image,
    Script,
    Style,
    Font,
    Manifest,
}

/// An intercepted outgoing request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub mode: RequestMode,
    pub destination: Destination,
    pub headers: HeaderMap,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            mode: RequestMode::default(),
            destination: Destination::default(),
            headers: HeaderMap::new(),
        }
    }

    /// Parse `url` and build a plain GET request.
    pub fn get(url: &str) -> Result<Self, Error> {
        let url = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;
        Ok(Self::new(Method::GET, url))
    }

    /// A top-level navigation to `url`.
    pub fn navigate(url: &str) -> Result<Self, Error> {
        Ok(Self::get(url)?
            .with_mode(RequestMode::Navigate)
            .with_destination(Destination::Document))
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Whether the URL uses a scheme the network layer can fetch.
    pub fn is_http(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }

    /// The request identity: the URL with its fragment removed.
    ///
    /// Scheme, host, path and query all participate, so `?a=1` and `?a=2`
    /// are distinct identities.
    pub fn identity(&self) -> String {
        identity_of(&self.url)
    }
}

/// Identity string for a URL (fragment dropped, everything else kept).
pub fn identity_of(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

/// A response, either fresh from the network or read back from the store.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Final URL, when known.
    pub url: Option<Url>,
}

impl Response {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self { status, headers: HeaderMap::new(), body: body.into(), url: None }
    }

    /// Empty-bodied 404, used as a placeholder when an image cannot be fetched.
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, Bytes::new())
    }

    /// True for statuses in the 2xx range; only these are ever stored.
    pub fn is_ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }
}
