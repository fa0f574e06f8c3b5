//! Adapters for the proxy.
//!
//! Infrastructure implementations of the outbound ports.

pub mod http_client;

pub use http_client::{forwarded_headers, ReqwestTransport};
