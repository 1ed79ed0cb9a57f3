//! Network access to the library origin.
//!
//! ### Origin abstraction
//! - [`Origin`] is the only way the layer reaches the network, so the policy,
//!   lifecycle and reconciliation code can run against a scripted origin.
//! - A transport failure is `Error::Transport`; any HTTP status, including
//!   4xx/5xx, is a successful fetch and the caller decides what to cache.
//!
//! ### FetchClient
//! - reqwest with rustls, gzip/brotli/deflate, max 5 redirects.
//! - No request timeout: cancellation is the caller dropping the future,
//!   which abandons the fetch before any body is stored.
//! - Request headers are forwarded as given, `Authorization` included.

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Url};
use std::time::Instant;

pub use self::url::{UrlError, canonicalize, same_origin};

use stacks_core::{Error, ResponseSnapshot};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "stacks-offline/0.1")
    pub user_agent: String,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "stacks-offline/0.1".to_string(), max_redirects: 5 }
    }
}

/// Response from a fetch operation.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The URL requested
    pub url: Url,
    /// The final URL after redirects
    pub final_url: Url,
    /// HTTP status code
    pub status: u16,
    /// Response headers, byte values as received
    pub headers: HeaderMap,
    /// Response body bytes
    pub bytes: Bytes,
    /// Time taken to fetch in milliseconds
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// 2xx responses are the only ones written to a partition.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Capture this response as an immutable snapshot.
    pub fn into_snapshot(self) -> ResponseSnapshot {
        ResponseSnapshot::now(self.status, self.headers, self.bytes.to_vec())
    }
}

/// A remote origin the layer can fetch from.
#[async_trait]
pub trait Origin: Send + Sync {
    /// Perform one request against the origin.
    ///
    /// `url` is canonical and absolute. Errors are transport-level only.
    async fn fetch(&self, method: &str, url: &Url, headers: &HeaderMap) -> Result<FetchResponse, Error>;
}

/// reqwest-backed [`Origin`].
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

#[async_trait]
impl Origin for FetchClient {
    async fn fetch(&self, method: &str, url: &Url, headers: &HeaderMap) -> Result<FetchResponse, Error> {
        let start = Instant::now();
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid method: {method}")))?;

        let request = self.http.request(method, url.clone()).headers(headers.clone());

        let response = request.send().await.map_err(|e| {
            if e.is_builder() {
                Error::InvalidInput(format!("invalid request: {e}"))
            } else {
                Error::Transport(format!("network error: {e}"))
            }
        })?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let response_headers = response.headers().clone();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("failed to read response: {e}")))?;

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(
            url = %url,
            final_url = %final_url,
            status,
            fetch_ms,
            bytes = bytes.len(),
            "fetched from origin"
        );

        Ok(FetchResponse { url: url.clone(), final_url, status, headers: response_headers, bytes, fetch_ms })
    }
}
