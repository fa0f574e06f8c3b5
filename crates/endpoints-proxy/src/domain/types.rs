//! Request envelope and response value passed through a dispatch.

use crate::domain::error::{RequestError, RequestResult};
use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;
use url::form_urlencoded;

/// Prefix every inbound API path carries
pub const API_PREFIX: &str = "/_ah/api/";

/// Path tail of the JSON-RPC endpoint
pub const RPC_PATH: &str = "rpc";

/// Content type used for every JSON body the proxy emits
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Canonical envelope for one inbound API request.
///
/// `Clone` is the deep copy: headers, body and path of a clone can be
/// rewritten without touching the original.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Inbound HTTP method
    pub method: Method,
    /// Path after `/_ah/api/`; rewritten to the backend method on transform
    pub path: String,
    /// Raw query string without `?`
    pub query: String,
    /// Inbound headers
    pub headers: HeaderMap,
    /// Raw body
    pub body: Bytes,
    /// Body parsed as an object (first element for batches)
    pub body_json: Map<String, Value>,
    /// JSON-RPC id, empty until the RPC transform fills it
    pub request_id: String,
    /// Body arrived wrapped in an array
    pub is_batch: bool,
}

impl ApiRequest {
    /// Build the envelope from the pieces of an inbound HTTP request.
    ///
    /// # Errors
    ///
    /// `notFound` when the path is outside `/_ah/api/`, `badRequest` when the
    /// body is neither empty, a JSON object nor a non-empty array of objects.
    pub fn parse(method: Method, uri: &Uri, headers: HeaderMap, body: Bytes) -> RequestResult<Self> {
        let path = uri
            .path()
            .strip_prefix(API_PREFIX)
            .ok_or_else(|| RequestError::not_found(format!("Not Found: {}", uri.path())))?
            .to_string();
        let query = uri.query().unwrap_or_default().to_string();

        let (body_json, is_batch) = parse_body(&body)?;

        Ok(Self {
            method,
            path,
            query,
            headers,
            body,
            body_json,
            request_id: String::new(),
            is_batch,
        })
    }

    /// True only for the exact `rpc` endpoint
    pub fn is_rpc(&self) -> bool {
        self.path == RPC_PATH
    }

    /// Query parameters grouped by name, values in arrival order.
    ///
    /// Blank values are kept.
    pub fn query_params(&self) -> BTreeMap<String, Vec<String>> {
        let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in form_urlencoded::parse(self.query.as_bytes()) {
            params
                .entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }
        params
    }

    /// Header value as text, `None` when absent or not visible ASCII
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Replace the JSON body and re-serialise the raw body from it
    pub fn set_body_json(&mut self, body_json: Map<String, Value>) {
        self.body = Bytes::from(Value::Object(body_json.clone()).to_string());
        self.body_json = body_json;
    }
}

fn parse_body(body: &[u8]) -> RequestResult<(Map<String, Value>, bool)> {
    if body.is_empty() {
        return Ok((Map::new(), false));
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(object)) => Ok((object, false)),
        Ok(Value::Array(items)) => {
            let count = items.len();
            let first = items
                .into_iter()
                .next()
                .ok_or_else(|| RequestError::bad_request("Batch request is empty"))?;
            if count > 1 {
                warn!(
                    count,
                    "Batch requests with more than 1 element aren't supported; only the first element will be handled"
                );
            }
            match first {
                Value::Object(object) => Ok((object, true)),
                _ => Err(RequestError::bad_request(
                    "Batch request elements must be JSON objects",
                )),
            }
        }
        Ok(_) => Err(RequestError::bad_request(
            "Request body must be a JSON object or array",
        )),
        Err(e) => Err(RequestError::bad_request(format!(
            "Request body is not valid JSON: {}",
            e
        ))),
    }
}

/// Fully buffered response produced by a dispatch
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Response with `Content-Type: application/json`
    pub fn json(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::new(status, body).with_header(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))
    }

    /// 204 with a zero-length body
    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT, Bytes::new())
    }

    /// 302 to `location`
    pub fn redirect(location: &str) -> RequestResult<Self> {
        let value = HeaderValue::from_str(location)
            .map_err(|_| RequestError::bad_request("Invalid redirect location"))?;
        Ok(Self::new(StatusCode::FOUND, Bytes::new()).with_header(LOCATION, value))
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Body parsed as JSON, `None` if it is not JSON
    pub fn body_json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
