//! Domain types for the proxy.
//!
//! Configuration, API descriptors, the request envelope and error handling.

pub mod config;
pub mod descriptor;
pub mod error;
pub mod types;

// Re-exports for convenience
pub use config::{ConfigError, ProxyConfig};
pub use descriptor::{ApiDescriptor, LookupKey, MethodDescriptor, ParamSpec};
pub use error::{ProxyError, RequestError, RequestResult};
pub use types::{ApiRequest, ProxyResponse, API_PREFIX};
