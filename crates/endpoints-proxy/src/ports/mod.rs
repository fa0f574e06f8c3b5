//! Ports (hexagonal boundaries) of the proxy.

pub mod outbound;

pub use outbound::{BackendResponse, HttpTransport, TransportError};
