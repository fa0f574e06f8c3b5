//! Backend responses and errors rendered in the client's dialect.

use crate::domain::error::{RequestError, RequestResult};
use crate::domain::types::{ApiRequest, ProxyResponse};
use axum::http::StatusCode;
use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};

/// Pretty-print a backend JSON body for a REST client
pub fn transform_rest_response(backend_body: &[u8]) -> RequestResult<Bytes> {
    let parsed = parse_backend_body(backend_body)?;
    Ok(Bytes::from(to_pretty(&parsed)))
}

/// Wrap a backend JSON body as a JSON-RPC result
pub fn transform_rpc_response(request: &ApiRequest, backend_body: &[u8]) -> RequestResult<Bytes> {
    let parsed = parse_backend_body(backend_body)?;
    let mut body = Map::new();
    body.insert("result".into(), parsed);
    Ok(finish_rpc_response(request, body))
}

/// Add the request `id` and the batch wrapper to a JSON-RPC body
pub fn finish_rpc_response(request: &ApiRequest, mut body: Map<String, Value>) -> Bytes {
    if !request.request_id.is_empty() {
        body.insert("id".into(), Value::String(request.request_id.clone()));
    }

    let body = Value::Object(body);
    let body = if request.is_batch {
        Value::Array(vec![body])
    } else {
        body
    };
    Bytes::from(to_pretty(&body))
}

/// REST error response: the envelope under the error's HTTP status
pub fn rest_error_response(error: &RequestError) -> ProxyResponse {
    ProxyResponse::json(error.status, to_pretty(&error.rest_error()))
}

/// JSON-RPC error response: always 200, shaped like the request
pub fn rpc_error_response(request: &ApiRequest, error: &RequestError) -> ProxyResponse {
    ProxyResponse::json(StatusCode::OK, finish_rpc_response(request, error.rpc_error()))
}

/// Error response in the dialect of `request`
pub fn error_response(request: &ApiRequest, error: &RequestError) -> ProxyResponse {
    if request.is_rpc() {
        rpc_error_response(request, error)
    } else {
        rest_error_response(error)
    }
}

fn parse_backend_body(body: &[u8]) -> RequestResult<Value> {
    if body.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(body).map_err(RequestError::invalid_backend_response)
}

/// Two-space indented JSON
fn to_pretty<T: Serialize>(value: &T) -> String {
    // Serialising a `Value` cannot fail
    serde_json::to_string_pretty(value).unwrap_or_default()
}
