//! Request tracing middleware.
//!
//! Opens one `api_request` span per inbound request and records the status
//! and latency once the response is produced. A W3C `traceparent` header, if
//! present, is recorded on the span so proxy logs can be joined with the
//! caller's trace.

use axum::{body::Body, http::Request, response::Response};
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};
use tracing::{debug, field, info_span, Instrument, Span};

/// Tracing layer that creates spans for each request
#[derive(Clone, Default)]
pub struct TracingLayer;

impl TracingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = TracingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TracingService { inner }
    }
}

/// Tracing service
#[derive(Clone)]
pub struct TracingService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for TracingService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();

        let dialect = dialect_of(req.uri().path());
        let span = info_span!(
            "api_request",
            http.method = %req.method(),
            http.target = %req.uri().path(),
            api.dialect = dialect,
            trace_id = field::Empty,
            http.status_code = field::Empty,
            latency_ms = field::Empty,
        );

        if let Some(trace_id) = extract_trace_id(&req) {
            span.record("trace_id", trace_id);
        }

        Box::pin(
            async move {
                let started = Instant::now();
                let result = inner.call(req).await;

                let current = Span::current();
                current.record("latency_ms", started.elapsed().as_millis() as u64);
                if let Ok(response) = &result {
                    current.record("http.status_code", response.status().as_u16());
                }
                debug!("Request finished");

                result
            }
            .instrument(span),
        )
    }
}

/// Which client dialect a path belongs to
fn dialect_of(path: &str) -> &'static str {
    match path.strip_prefix(crate::domain::types::API_PREFIX) {
        Some("rpc") => "rpc",
        Some(_) => "rest",
        None => "other",
    }
}

/// Trace id of a W3C `traceparent` header (`version-trace_id-parent_id-flags`)
fn extract_trace_id<B>(req: &Request<B>) -> Option<&str> {
    let traceparent = req.headers().get("traceparent")?.to_str().ok()?;

    let parts: Vec<&str> = traceparent.split('-').collect();
    if parts.len() != 4 || parts[1].len() != 32 {
        return None;
    }

    Some(parts[1])
}
