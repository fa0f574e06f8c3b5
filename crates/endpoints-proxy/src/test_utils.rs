//! Test utilities for the proxy.
//!
//! [`ScriptedTransport`] stands in for the backend, the discovery generator
//! and the static host: responses are registered per URL path suffix and
//! every call is recorded. Enable with the `test-utils` feature flag.

use crate::ports::outbound::{BackendResponse, HttpTransport, TransportError};
use async_trait::async_trait;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{json, Value};

/// One outbound call seen by the transport
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedCall {
    /// Body parsed as JSON
    pub fn body_json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }
}

type Scripted = Result<BackendResponse, TransportError>;

/// In-memory [`HttpTransport`] answering from a script.
///
/// A call is answered by the most recently registered entry whose suffix
/// ends the URL path (query ignored). Unscripted calls get a 404.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<Vec<(String, Scripted)>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer calls ending in `suffix` with a JSON body
    pub fn respond(&self, suffix: &str, status: u16, body: impl Into<Bytes>) -> &Self {
        let mut response = BackendResponse::new(
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body,
        );
        response
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.respond_with(suffix, response)
    }

    /// Answer calls ending in `suffix` with a prepared response
    pub fn respond_with(&self, suffix: &str, response: BackendResponse) -> &Self {
        self.script.lock().push((suffix.to_string(), Ok(response)));
        self
    }

    /// Fail calls ending in `suffix` without a response
    pub fn fail(&self, suffix: &str, error: TransportError) -> &Self {
        self.script.lock().push((suffix.to_string(), Err(error)));
        self
    }

    /// Script `BackendService.getApiConfigs` to hand out `descriptors`
    pub fn serve_api_configs(&self, descriptors: &[Value]) -> &Self {
        self.respond(
            "/_ah/spi/BackendService.getApiConfigs",
            200,
            api_configs_body(descriptors),
        )
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Calls whose URL path ends in `suffix`
    pub fn calls_to(&self, suffix: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| url_path(&call.url).ends_with(suffix))
            .cloned()
            .collect()
    }

    fn answer(&self, call: RecordedCall) -> Scripted {
        let path = url_path(&call.url).to_string();
        self.calls.lock().push(call);

        self.script
            .lock()
            .iter()
            .rev()
            .find(|(suffix, _)| path.ends_with(suffix.as_str()))
            .map(|(_, scripted)| scripted.clone())
            .unwrap_or_else(|| {
                Ok(BackendResponse::new(
                    StatusCode::NOT_FOUND,
                    Bytes::from_static(b"no scripted response"),
                ))
            })
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<BackendResponse, TransportError> {
        self.answer(RecordedCall {
            method: Method::POST,
            url: url.to_string(),
            headers: headers.clone(),
            body,
        })
    }

    async fn get(&self, url: &str) -> Result<BackendResponse, TransportError> {
        self.answer(RecordedCall {
            method: Method::GET,
            url: url.to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        })
    }
}

fn url_path(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// `getApiConfigs` body with each descriptor JSON-encoded as a string
pub fn api_configs_body(descriptors: &[Value]) -> String {
    let items: Vec<Value> = descriptors
        .iter()
        .map(|d| Value::String(d.to_string()))
        .collect();
    json!({ "items": items }).to_string()
}
