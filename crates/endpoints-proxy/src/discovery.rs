//! Built-in Discovery API.
//!
//! `discovery/v1` is registered next to the backend's APIs, but its methods
//! never reach the backend: the proxy answers them by handing the cached
//! descriptors to the remote discovery-document generator.

use crate::config_manager::ApiConfigManager;
use crate::domain::descriptor::{ApiDescriptor, MethodDescriptor, ParamSpec};
use crate::domain::error::{RequestError, RequestResult};
use crate::domain::types::{ApiRequest, ProxyResponse};
use crate::ports::outbound::HttpTransport;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use bytes::Bytes;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, instrument};

pub const DISCOVERY_API_NAME: &str = "discovery";
pub const DISCOVERY_API_VERSION: &str = "v1";

/// Backend method ids the discovery API is routed to
pub const GET_REST_METHOD: &str = "apisdev.getRest";
pub const GET_RPC_METHOD: &str = "apisdev.getRpc";
pub const LIST_METHOD: &str = "apisdev.list";

/// Content type of generated discovery documents
pub const DISCOVERY_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Whether a backend method id belongs to the discovery API
pub fn is_discovery_method(rosy_method: &str) -> bool {
    matches!(rosy_method, GET_REST_METHOD | GET_RPC_METHOD | LIST_METHOD)
}

/// Descriptor of the built-in discovery API
pub fn discovery_api_config() -> ApiDescriptor {
    let api_and_version = |method: MethodDescriptor| {
        let mut method = method;
        for name in ["api", "version"] {
            method
                .request
                .parameters
                .insert(name.to_string(), ParamSpec::of_type("string"));
        }
        method
    };

    let mut methods = std::collections::BTreeMap::new();
    methods.insert(
        "discovery.apis.getRest".to_string(),
        api_and_version(MethodDescriptor::new(
            "GET",
            "apis/{api}/{version}/rest",
            GET_REST_METHOD,
        )),
    );
    methods.insert(
        "discovery.apis.getRpc".to_string(),
        api_and_version(MethodDescriptor::new(
            "GET",
            "apis/{api}/{version}/rpc",
            GET_RPC_METHOD,
        )),
    );
    methods.insert(
        "discovery.apis.list".to_string(),
        MethodDescriptor::new("GET", "apis", LIST_METHOD),
    );

    ApiDescriptor {
        name: DISCOVERY_API_NAME.to_string(),
        version: DISCOVERY_API_VERSION.to_string(),
        methods,
        ..ApiDescriptor::default()
    }
}

/// Document kinds produced by the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocKind {
    Rest,
    Rpc,
    Directory,
}

impl DocKind {
    fn as_str(self) -> &'static str {
        match self {
            DocKind::Rest => "rest",
            DocKind::Rpc => "rpc",
            DocKind::Directory => "directory",
        }
    }
}

/// Serves the discovery API through the remote generator
pub struct DiscoveryService {
    transport: Arc<dyn HttpTransport>,
    generator_url: String,
}

impl DiscoveryService {
    pub fn new(transport: Arc<dyn HttpTransport>, generator_url: impl Into<String>) -> Self {
        Self {
            transport,
            generator_url: generator_url.into(),
        }
    }

    /// Answer a transformed discovery request.
    ///
    /// `request.body_json` carries `api` and `version` for the per-API
    /// documents.
    ///
    /// # Errors
    ///
    /// `notFound` when the descriptor is unknown or the generator fails.
    #[instrument(skip(self, request, configs))]
    pub async fn handle(
        &self,
        rosy_method: &str,
        request: &ApiRequest,
        configs: &ApiConfigManager,
    ) -> RequestResult<ProxyResponse> {
        match rosy_method {
            GET_REST_METHOD => self.get_api_doc(DocKind::Rest, request, configs).await,
            GET_RPC_METHOD => self.get_api_doc(DocKind::Rpc, request, configs).await,
            LIST_METHOD => self.list(configs).await,
            other => Err(RequestError::not_found(format!(
                "Unknown discovery method: {}",
                other
            ))),
        }
    }

    async fn get_api_doc(
        &self,
        kind: DocKind,
        request: &ApiRequest,
        configs: &ApiConfigManager,
    ) -> RequestResult<ProxyResponse> {
        let field = |name: &str| {
            request
                .body_json
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let (api, version) = (field("api"), field("version"));

        let descriptor = configs.config(&api, &version).ok_or_else(|| {
            error!(api = %api, version = %version, "No API config for discovery request");
            RequestError::not_found(format!("Failed to get API configuration for {}/{}", api, version))
        })?;

        let payload = json!({ "config": encode_descriptor(&descriptor)? });
        self.generate(kind, payload).await
    }

    async fn list(&self, configs: &ApiConfigManager) -> RequestResult<ProxyResponse> {
        let encoded = configs
            .configs()
            .iter()
            .filter(|d| !(d.name == DISCOVERY_API_NAME && d.version == DISCOVERY_API_VERSION))
            .map(encode_descriptor)
            .collect::<RequestResult<Vec<_>>>()?;

        self.generate(DocKind::Directory, json!({ "configs": encoded }))
            .await
    }

    async fn generate(&self, kind: DocKind, payload: Value) -> RequestResult<ProxyResponse> {
        let url = format!(
            "{}/_ah/api/discovery/v1/apis/generate/{}",
            self.generator_url.trim_end_matches('/'),
            kind.as_str()
        );
        let failed = || {
            RequestError::not_found(format!("Failed to generate {} discovery document", kind.as_str()))
        };

        let response = self
            .transport
            .post_json(&url, &HeaderMap::new(), Bytes::from(payload.to_string()))
            .await
            .map_err(|e| {
                error!(url = %url, error = %e, "Discovery generator unreachable");
                failed()
            })?;

        if response.status != StatusCode::OK {
            error!(
                url = %url,
                status = response.status.as_u16(),
                body = %String::from_utf8_lossy(&response.body),
                "Discovery generator failed"
            );
            return Err(failed());
        }

        Ok(ProxyResponse::new(StatusCode::OK, response.body)
            .with_header(CONTENT_TYPE, HeaderValue::from_static(DISCOVERY_CONTENT_TYPE)))
    }
}

/// The generator takes each descriptor as a JSON string
fn encode_descriptor(descriptor: &ApiDescriptor) -> RequestResult<String> {
    serde_json::to_string(descriptor).map_err(|e| {
        RequestError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            crate::domain::error::reasons::BACKEND_ERROR,
            format!("Cannot encode API config: {}", e),
        )
    })
}
