//! Proxy service - HTTP server entry point.
//!
//! Every inbound request goes to one fallback handler which buffers the body,
//! builds an [`ApiRequest`] and hands it to the [`Dispatcher`].

use crate::dispatcher::Dispatcher;
use crate::domain::config::ProxyConfig;
use crate::domain::error::{ProxyError, RequestError};
use crate::domain::types::ApiRequest;
use crate::middleware::{CorsHandler, TracingLayer};
use crate::ports::outbound::HttpTransport;
use crate::transform::rest_error_response;
use axum::extract::rejection::{BytesRejection, FailedToBufferBody};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Local development proxy in front of an Endpoints backend
pub struct ProxyService {
    config: ProxyConfig,
    dispatcher: Arc<Dispatcher>,
}

impl ProxyService {
    /// Create a new proxy service
    pub fn new(config: ProxyConfig, transport: Arc<dyn HttpTransport>) -> Result<Self, ProxyError> {
        config.validate()?;

        let dispatcher = Arc::new(Dispatcher::new(&config, transport));
        Ok(Self { config, dispatcher })
    }

    /// Shared dispatcher
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Build the HTTP router
    pub fn router(&self) -> Router {
        let state = AppState {
            dispatcher: Arc::clone(&self.dispatcher),
        };

        // Oversized bodies surface as a `Bytes` rejection in `handle_request`
        Router::new()
            .fallback(handle_request)
            .with_state(state)
            .layer(DefaultBodyLimit::max(self.config.limits.max_request_size))
            .layer(TracingLayer::new())
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn start<F>(&self, shutdown: F) -> Result<(), ProxyError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.http_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ProxyError::Bind(format!("{}: {}", addr, e)))?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), ProxyError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener
            .local_addr()
            .map_err(|e| ProxyError::Bind(e.to_string()))?;
        info!(
            addr = %addr,
            backend = %self.config.backend.url,
            discovery = %self.config.discovery.url,
            "Starting endpoints proxy"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ProxyError::Serve(e.to_string()))?;

        info!("Endpoints proxy stopped");
        Ok(())
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
}

async fn handle_request(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let cors = CorsHandler::from_headers(&headers);

    let parsed = body
        .map_err(|rejection| match rejection {
            BytesRejection::FailedToBufferBody(FailedToBufferBody::LengthLimitError(_)) => {
                RequestError::payload_too_large("Request body exceeds the configured limit")
            }
            other => RequestError::bad_request(format!("Failed to read request body: {}", other)),
        })
        .and_then(|body| ApiRequest::parse(method, &uri, headers, body));

    match parsed {
        Ok(request) => state.dispatcher.dispatch(request).await.into_response(),
        Err(e) => {
            warn!(path = %uri.path(), error = %e, "Rejected request");
            let mut response = rest_error_response(&e);
            cors.apply(&mut response.headers);
            response.into_response()
        }
    }
}
