//! Proxy error types and the canonical error envelope.
//!
//! Every failure that reaches a client is a [`RequestError`]. It renders either
//! as a REST body (`{error: {code, message, errors: [..]}}`) or as a JSON-RPC
//! body (`{error: {code, message, data: [..]}}`); the dispatcher picks the
//! shape from the dialect of the inbound request.

use crate::domain::config::ConfigError;
use crate::ports::outbound::TransportError;
use axum::http::StatusCode;
use serde_json::{json, Map, Value};
use std::fmt;

/// Error reasons used in the envelope
pub mod reasons {
    pub const BAD_REQUEST: &str = "badRequest";
    pub const REQUIRED: &str = "required";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "notFound";
    pub const UNSUPPORTED_METHOD: &str = "unsupportedMethod";
    pub const BACKEND_ERROR: &str = "backendError";
    pub const DUPLICATE: &str = "duplicate";
    pub const DELETED: &str = "deleted";
    pub const CONDITION_NOT_MET: &str = "conditionNotMet";
    pub const UPLOAD_TOO_LARGE: &str = "uploadTooLarge";
    pub const UNSUPPORTED_PROTOCOL: &str = "unsupportedProtocol";
    pub const INVALID_PARAMETER: &str = "invalidParameter";
}

/// Error domain shared by every error the proxy emits
pub const GLOBAL_DOMAIN: &str = "global";

/// JSON-RPC code reported for backend failures
pub const RPC_BACKEND_ERROR: i32 = -32099;

/// Method whose failure aborts a dispatch before routing
pub const GET_API_CONFIGS_METHOD: &str = "BackendService.getApiConfigs";

/// A client-visible error with HTTP status, JSON-RPC code and reason
#[derive(Debug, Clone, PartialEq)]
pub struct RequestError {
    /// HTTP status used for REST responses
    pub status: StatusCode,
    /// Code used inside JSON-RPC error bodies
    pub rpc_code: i32,
    /// Machine readable reason, e.g. `notFound`
    pub reason: String,
    /// Error domain
    pub domain: String,
    /// Human readable message
    pub message: String,
    /// Extra fields merged into the error item (e.g. `location`)
    pub extra: Map<String, Value>,
}

impl RequestError {
    /// Create a generic request error whose RPC code mirrors the HTTP status
    pub fn new(status: StatusCode, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            rpc_code: i32::from(status.as_u16()),
            reason: reason.into(),
            domain: GLOBAL_DOMAIN.to_string(),
            message: message.into(),
            extra: Map::new(),
        }
    }

    /// Attach an extra field to the error item
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// 400 for malformed client input
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, reasons::BAD_REQUEST, message)
    }

    /// 404 for unknown paths and methods
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, reasons::NOT_FOUND, message)
    }

    /// 413 for bodies above the configured limit
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            reasons::UPLOAD_TOO_LARGE,
            message,
        )
    }

    /// 500 emitted when the API configs cannot be fetched
    pub fn config_unavailable() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            reasons::BACKEND_ERROR,
            format!("{} Error", GET_API_CONFIGS_METHOD),
        )
    }

    /// 503 for backend failures that never produced a status
    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        let mut error = Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            reasons::BACKEND_ERROR,
            message,
        );
        error.rpc_code = RPC_BACKEND_ERROR;
        error
    }

    /// 500 for a backend success response the proxy cannot interpret
    pub fn invalid_backend_response(details: impl fmt::Display) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            reasons::BACKEND_ERROR,
            format!("Invalid backend response: {}", details),
        )
    }

    /// Parameter value outside of its enum
    pub fn enum_rejection(parameter: &str, value: &str, allowed: &[String]) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            reasons::INVALID_PARAMETER,
            format!(
                "Invalid string value: {:?}. Allowed values: {:?}",
                value, allowed
            ),
        )
        .with_location(parameter)
    }

    /// Parameter value that does not parse as its declared type
    pub fn basic_type(parameter: &str, value: &str, type_name: &str) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            reasons::INVALID_PARAMETER,
            format!("Invalid {} value: {:?}.", type_name, value),
        )
        .with_location(parameter)
    }

    /// Translate a failed backend response into the canonical error.
    ///
    /// The message comes from `error_message` when the body is JSON carrying
    /// one, and from the raw body text otherwise.
    pub fn backend(backend_status: u16, body: &[u8]) -> Self {
        let (status, rpc_code, reason) = classify_backend_status(backend_status);
        let message = backend_error_message(body);
        Self {
            status,
            rpc_code,
            reason: reason.to_string(),
            domain: GLOBAL_DOMAIN.to_string(),
            message,
            extra: Map::new(),
        }
    }

    fn with_location(self, parameter: &str) -> Self {
        self.with_field("locationType", "parameter")
            .with_field("location", parameter)
    }

    /// The single item listed under `errors` / `data`
    pub fn error_item(&self) -> Value {
        let mut item = Map::new();
        item.insert("domain".into(), Value::String(self.domain.clone()));
        item.insert("reason".into(), Value::String(self.reason.clone()));
        item.insert("message".into(), Value::String(self.message.clone()));
        for (key, value) in &self.extra {
            item.insert(key.clone(), value.clone());
        }
        Value::Object(item)
    }

    /// REST form of the envelope
    pub fn rest_error(&self) -> Value {
        json!({
            "error": {
                "code": self.status.as_u16(),
                "message": self.message,
                "errors": [self.error_item()],
            }
        })
    }

    /// JSON-RPC form of the envelope (without `id`)
    pub fn rpc_error(&self) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert(
            "error".into(),
            json!({
                "code": self.rpc_code,
                "message": self.message,
                "data": [self.error_item()],
            }),
        );
        body
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}] {}", self.status.as_u16(), self.reason, self.message)
    }
}

impl std::error::Error for RequestError {}

/// Map a backend status onto `(emitted status, rpc code, reason)`.
fn classify_backend_status(status: u16) -> (StatusCode, i32, &'static str) {
    let same = |code: StatusCode, reason| (code, i32::from(code.as_u16()), reason);
    match status {
        400 => same(StatusCode::BAD_REQUEST, reasons::BAD_REQUEST),
        401 => same(StatusCode::UNAUTHORIZED, reasons::REQUIRED),
        403 => same(StatusCode::FORBIDDEN, reasons::FORBIDDEN),
        404 => same(StatusCode::NOT_FOUND, reasons::NOT_FOUND),
        405 => same(StatusCode::NOT_IMPLEMENTED, reasons::UNSUPPORTED_METHOD),
        408 => (
            StatusCode::SERVICE_UNAVAILABLE,
            RPC_BACKEND_ERROR,
            reasons::BACKEND_ERROR,
        ),
        409 => same(StatusCode::CONFLICT, reasons::DUPLICATE),
        410 => same(StatusCode::GONE, reasons::DELETED),
        412 => same(StatusCode::PRECONDITION_FAILED, reasons::CONDITION_NOT_MET),
        413 => same(StatusCode::PAYLOAD_TOO_LARGE, reasons::UPLOAD_TOO_LARGE),
        s if s >= 500 => (
            StatusCode::SERVICE_UNAVAILABLE,
            RPC_BACKEND_ERROR,
            reasons::BACKEND_ERROR,
        ),
        // 402, 406, 407, 411, 414-417 and anything else unlisted
        _ => same(StatusCode::NOT_FOUND, reasons::UNSUPPORTED_PROTOCOL),
    }
}

fn backend_error_message(body: &[u8]) -> String {
    if let Ok(Value::Object(parsed)) = serde_json::from_slice::<Value>(body) {
        if let Some(Value::String(message)) = parsed.get("error_message") {
            return message.clone();
        }
    }
    String::from_utf8_lossy(body).into_owned()
}

/// Result type for request-scoped operations
pub type RequestResult<T> = Result<T, RequestError>;

/// Proxy-level errors (not client facing, internal use)
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Server loop terminated with an error
    #[error("server error: {0}")]
    Serve(String),

    /// The backend did not hand out a usable API config list
    #[error("failed to fetch API configs: {0}")]
    ConfigFetch(String),

    /// Outbound HTTP failure
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Inside a dispatch a `ProxyError` only comes out of the config refresh, so
/// fetch and transport failures both render as the `getApiConfigs` error.
impl From<&ProxyError> for RequestError {
    fn from(e: &ProxyError) -> Self {
        match e {
            ProxyError::ConfigFetch(_) | ProxyError::Transport(_) => {
                RequestError::config_unavailable()
            }
            other => RequestError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                reasons::BACKEND_ERROR,
                other.to_string(),
            ),
        }
    }
}
