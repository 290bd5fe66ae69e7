//! URL checks applied before a request leaves for the network.

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

/// Canonicalize a request URL for sending.
///
/// 1. Reject schemes other than http/https (a parsed http(s) URL always has a host)
/// 2. Remove the fragment (never sent on the wire)
/// 3. Keep the query string intact
pub fn canonicalize(input: &url::Url) -> Result<url::Url, UrlError> {
    match input.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    let mut url = input.clone();
    url.set_fragment(None);
    Ok(url)
}
