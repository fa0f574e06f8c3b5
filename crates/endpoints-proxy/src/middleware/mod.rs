//! Middleware for the proxy.
//!
//! Layer order: Request → Tracing → BodyLimit → Handler. CORS headers are
//! written by the dispatcher on every response it produces, errors included.

pub mod cors;
pub mod tracing;

pub use cors::{CorsHandler, ALLOWED_CORS_METHODS};
pub use tracing::TracingLayer;
