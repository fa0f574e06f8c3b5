//! Outbound ports for the proxy.
//!
//! Every call the proxy makes (backend SPI, discovery generator, static
//! assets) goes through [`HttpTransport`], so tests can script the other side.

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;

/// Fully read response of an outbound call
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl BackendResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Header value as text
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Failure to complete an outbound call (no status was received)
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    /// The target URL could not be built
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Connection refused, reset, DNS failure...
    #[error("connection to {url} failed: {reason}")]
    Connect { url: String, reason: String },

    /// Call exceeded its timeout
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Response body could not be read
    #[error("failed to read response from {url}: {reason}")]
    Body { url: String, reason: String },
}

/// HTTP client used for every outbound call
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST a JSON body; `Content-Type: application/json` is always sent.
    async fn post_json(
        &self,
        url: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<BackendResponse, TransportError>;

    /// Plain GET
    async fn get(&self, url: &str) -> Result<BackendResponse, TransportError>;
}
