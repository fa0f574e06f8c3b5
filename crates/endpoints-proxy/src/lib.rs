//! Endpoints Proxy - local development front for Endpoints style APIs.
//!
//! Clients speak REST or JSON-RPC under `/_ah/api/`. The proxy learns the
//! backend's APIs from `BackendService.getApiConfigs`, routes each call to a
//! method, and forwards it as a JSON POST to `/_ah/spi/<rosyMethod>`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            ENDPOINTS PROXY                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │   /_ah/api/{api}/{version}/...          /_ah/api/rpc                    │
//! │              │                                │                         │
//! │  ┌───────────┴────────────────────────────────┴───────────┐            │
//! │  │        Middleware: Tracing → BodyLimit → Handler       │            │
//! │  └───────────────────────────┬────────────────────────────┘            │
//! │                              │                                          │
//! │  ┌───────────────────────────┴────────────────────────────┐            │
//! │  │  Dispatcher: explorer │ static │ REST │ JSON-RPC │ CORS │            │
//! │  └──────┬────────────────────┬──────────────────┬─────────┘            │
//! │         │                    │                  │                       │
//! │  ┌──────┴───────┐   ┌────────┴────────┐  ┌──────┴──────┐               │
//! │  │ ApiConfig    │   │   Transform     │  │  Discovery  │               │
//! │  │ Manager      │   │ request/response│  │  (built-in) │               │
//! │  └──────────────┘   └────────┬────────┘  └──────┬──────┘               │
//! └──────────────────────────────┼──────────────────┼───────────────────────┘
//!                                │                  │
//!                       Backend /_ah/spi/*   Discovery generator
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use endpoints_proxy::{ProxyConfig, ProxyService, ReqwestTransport};
//!
//! let config = ProxyConfig::default();
//! let transport = ReqwestTransport::from_config(&config)?;
//! let service = ProxyService::new(config, Arc::new(transport))?;
//! service.start(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod config_manager;
pub mod discovery;
pub mod dispatcher;
pub mod domain;
pub mod middleware;
pub mod ports;
pub mod routing;
pub mod service;
pub mod transform;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports for public API
pub use adapters::ReqwestTransport;
pub use config_manager::{ApiConfigManager, RestMatch};
pub use discovery::DiscoveryService;
pub use dispatcher::Dispatcher;
pub use domain::config::ProxyConfig;
pub use domain::error::{ProxyError, RequestError, RequestResult};
pub use domain::types::{ApiRequest, ProxyResponse};
pub use ports::outbound::{BackendResponse, HttpTransport, TransportError};
pub use service::ProxyService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
