//! reqwest implementation of [`HttpTransport`].

use crate::domain::config::ProxyConfig;
use crate::ports::outbound::{BackendResponse, HttpTransport, TransportError};
use async_trait::async_trait;
use axum::http::header::{
    ACCEPT_ENCODING, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HOST, TRANSFER_ENCODING,
};
use axum::http::{HeaderMap, HeaderValue};
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Inbound headers as forwarded to the backend, minus hop-by-hop and framing
/// headers
pub fn forwarded_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = inbound.clone();
    for name in [HOST, CONTENT_LENGTH, TRANSFER_ENCODING, CONNECTION, ACCEPT_ENCODING] {
        headers.remove(name);
    }
    headers
}

/// Outbound transport over a pooled reqwest client.
///
/// Calls to the backend use the backend timeout, every other call the
/// discovery timeout.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    backend_url: String,
    backend_timeout: Duration,
    default_timeout: Duration,
}

impl ReqwestTransport {
    /// Build the transport from the proxy configuration
    pub fn from_config(config: &ProxyConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            client,
            backend_url: config.backend.url.clone(),
            backend_timeout: config.backend.timeout,
            default_timeout: config.discovery.timeout,
        })
    }

    fn timeout_for(&self, url: &str) -> Duration {
        if url.starts_with(&self.backend_url) {
            self.backend_timeout
        } else {
            self.default_timeout
        }
    }

    async fn read(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<BackendResponse, TransportError> {
        let response = request
            .timeout(self.timeout_for(url))
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| TransportError::Body {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        debug!(url = %url, status = status.as_u16(), len = body.len(), "Outbound call finished");
        Ok(BackendResponse {
            status,
            headers,
            body,
        })
    }
}

fn classify(url: &str, e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else if e.is_builder() {
        TransportError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        }
    } else {
        TransportError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<BackendResponse, TransportError> {
        let mut headers = forwarded_headers(headers);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let request = self.client.post(url).headers(headers).body(body);
        self.read(url, request).await
    }

    async fn get(&self, url: &str) -> Result<BackendResponse, TransportError> {
        let request = self.client.get(url);
        self.read(url, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarded_headers() {
        let mut inbound = HeaderMap::new();
        inbound.insert(HOST, HeaderValue::from_static("localhost:8081"));
        inbound.insert(CONTENT_LENGTH, HeaderValue::from_static("12"));
        inbound.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        inbound.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        inbound.insert("x-custom", HeaderValue::from_static("kept"));

        let forwarded = forwarded_headers(&inbound);
        assert_eq!(forwarded.len(), 1);
        assert_eq!(forwarded["x-custom"], "kept");
    }

    #[test]
    fn test_timeout_selection() {
        let mut config = ProxyConfig::default();
        config.backend.timeout = Duration::from_secs(3);
        config.discovery.timeout = Duration::from_secs(9);
        let transport = ReqwestTransport::from_config(&config).unwrap();

        assert_eq!(
            transport.timeout_for("http://localhost:8080/_ah/spi/Foo.bar"),
            Duration::from_secs(3)
        );
        assert_eq!(
            transport.timeout_for("https://webapis-discovery.appspot.com/_ah/api/x"),
            Duration::from_secs(9)
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let mut config = ProxyConfig::default();
        config.backend.url = "http://127.0.0.1:1".to_string();
        let transport = ReqwestTransport::from_config(&config).unwrap();

        let err = transport
            .post_json("http://127.0.0.1:1/_ah/spi/Foo.bar", &HeaderMap::new(), Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransportError::Connect { .. } | TransportError::Timeout { .. }
        ));
    }
}
