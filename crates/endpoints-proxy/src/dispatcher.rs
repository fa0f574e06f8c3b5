//! Per-request orchestration.
//!
//! A dispatch refreshes the API configs, classifies the request as REST or
//! JSON-RPC, looks up the method, transforms the request, calls the backend
//! SPI (or the built-in discovery API) and renders the result in the client's
//! dialect. Every response leaves with CORS headers applied.

use crate::config_manager::ApiConfigManager;
use crate::discovery::{is_discovery_method, DiscoveryService};
use crate::domain::config::ProxyConfig;
use crate::domain::descriptor::MethodDescriptor;
use crate::domain::error::{ProxyError, RequestError, RequestResult, GET_API_CONFIGS_METHOD};
use crate::domain::types::{ApiRequest, ProxyResponse, JSON_CONTENT_TYPE};
use crate::middleware::cors::CorsHandler;
use crate::ports::outbound::{BackendResponse, HttpTransport};
use crate::transform::{
    error_response, extract_request_id, rest_error_response, rpc_error_response,
    transform_rest_request, transform_rest_response, transform_rpc_request,
    transform_rpc_response,
};
use axum::http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HOST, TRANSFER_ENCODING};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Path tail of the API Explorer redirect
pub const EXPLORER_PATH: &str = "explorer";

/// Path tail prefix relayed to the static asset host
pub const STATIC_PATH_PREFIX: &str = "static/";

/// Where the API Explorer lives
pub const EXPLORER_URL: &str = "https://developers.google.com/apis-explorer/?base=";

/// Routes inbound API requests to the backend
pub struct Dispatcher {
    config_manager: ApiConfigManager,
    transport: Arc<dyn HttpTransport>,
    discovery: DiscoveryService,
    backend_url: String,
    static_url: String,
    refresh_each_request: bool,
    fallback_host: String,
}

impl Dispatcher {
    pub fn new(config: &ProxyConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config_manager: ApiConfigManager::new(),
            discovery: DiscoveryService::new(Arc::clone(&transport), config.discovery.url.clone()),
            transport,
            backend_url: config.backend.url.trim_end_matches('/').to_string(),
            static_url: config.static_proxy_url().trim_end_matches('/').to_string(),
            refresh_each_request: config.backend.refresh_each_request,
            fallback_host: config.http_addr().to_string(),
        }
    }

    /// The API config cache
    pub fn config_manager(&self) -> &ApiConfigManager {
        &self.config_manager
    }

    /// Handle one API request end to end
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn dispatch(&self, request: ApiRequest) -> ProxyResponse {
        let cors = CorsHandler::from_headers(&request.headers);
        let mut response = self.dispatch_request(request).await;
        cors.apply(&mut response.headers);
        response
    }

    async fn dispatch_request(&self, request: ApiRequest) -> ProxyResponse {
        if request.path == EXPLORER_PATH || request.path.starts_with("explorer/") {
            return self.handle_explorer(&request);
        }
        if request.path.starts_with(STATIC_PATH_PREFIX) {
            return self.handle_static(&request).await;
        }

        if let Err(e) = self.refresh_api_configs().await {
            error!(error = %e, "Could not refresh API configs");
            return rest_error_response(&RequestError::from(&e));
        }

        if request.is_rpc() {
            self.handle_rpc(request).await
        } else {
            self.handle_rest(request).await
        }
    }

    /// Fetch the API configs from the backend and load them.
    ///
    /// Skipped while the cache is populated unless every request refreshes.
    #[instrument(skip(self))]
    pub async fn refresh_api_configs(&self) -> Result<(), ProxyError> {
        if !self.refresh_each_request && !self.config_manager.is_empty() {
            return Ok(());
        }

        let url = self.spi_url(GET_API_CONFIGS_METHOD);
        let response = self
            .transport
            .post_json(&url, &HeaderMap::new(), Bytes::from_static(b"{}"))
            .await?;

        if response.status != StatusCode::OK {
            return Err(ProxyError::ConfigFetch(format!(
                "backend answered {}",
                response.status
            )));
        }

        let is_json = response
            .header(CONTENT_TYPE.as_str())
            .is_some_and(|ct| ct.starts_with(JSON_CONTENT_TYPE));
        if !is_json {
            return Err(ProxyError::ConfigFetch(
                "response is not application/json".into(),
            ));
        }

        self.config_manager.parse_api_config_response(&response.body)?;
        Ok(())
    }

    async fn handle_rest(&self, request: ApiRequest) -> ProxyResponse {
        let Some(rest) = self
            .config_manager
            .lookup_rest_method(&request.path, request.method.as_str())
        else {
            return rest_error_response(&RequestError::not_found(format!(
                "No endpoint found for path: {}",
                request.path
            )));
        };

        let transformed = match transform_rest_request(&request, &rest) {
            Ok(transformed) => transformed,
            Err(e) => return rest_error_response(&e),
        };

        self.call_method(&request, transformed, &rest.method).await
    }

    async fn handle_rpc(&self, mut request: ApiRequest) -> ProxyResponse {
        match extract_request_id(&request.body_json) {
            Ok(id) => request.request_id = id,
            Err(e) => return rpc_error_response(&request, &e),
        }

        let field = |name: &str| {
            request
                .body_json
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let (method_name, version) = (field("method"), field("apiVersion"));

        let Some(method) = self.config_manager.lookup_rpc_method(&method_name, &version) else {
            warn!(method = %method_name, version = %version, "No RPC method found");
            return rpc_error_response(
                &request,
                &RequestError::not_found(format!(
                    "No method found for name {} and version {}",
                    method_name, version
                )),
            );
        };

        let transformed = match transform_rpc_request(&request, &method) {
            Ok(transformed) => transformed,
            Err(e) => return rpc_error_response(&request, &e),
        };

        self.call_method(&request, transformed, &method).await
    }

    async fn call_method(
        &self,
        original: &ApiRequest,
        transformed: ApiRequest,
        method: &MethodDescriptor,
    ) -> ProxyResponse {
        if is_discovery_method(&method.rosy_method) {
            return match self
                .discovery
                .handle(&method.rosy_method, &transformed, &self.config_manager)
                .await
            {
                Ok(response) => response,
                Err(e) => error_response(original, &e),
            };
        }

        match self.call_spi(&transformed).await {
            Ok(backend) => self.handle_spi_response(original, method, backend),
            Err(e) => error_response(original, &e),
        }
    }

    /// POST the transformed request to `/_ah/spi/<rosyMethod>`
    #[instrument(skip_all, fields(spi_method = %request.path))]
    async fn call_spi(&self, request: &ApiRequest) -> RequestResult<BackendResponse> {
        let url = self.spi_url(&request.path);
        self.transport
            .post_json(&url, &request.headers, request.body.clone())
            .await
            .map_err(|e| {
                error!(url = %url, error = %e, "Backend call failed");
                RequestError::backend_unavailable(e.to_string())
            })
    }

    /// Render a backend response in the dialect of the original request
    fn handle_spi_response(
        &self,
        request: &ApiRequest,
        method: &MethodDescriptor,
        backend: BackendResponse,
    ) -> ProxyResponse {
        let status = backend.status.as_u16();
        if status >= 300 {
            info!(status, path = %request.path, "Backend returned an error");
            return error_response(request, &RequestError::backend(status, &backend.body));
        }

        if method.has_empty_response() {
            return ProxyResponse::no_content();
        }

        let body = if request.is_rpc() {
            transform_rpc_response(request, &backend.body)
        } else {
            transform_rest_response(&backend.body)
        };

        match body {
            Ok(body) => {
                let mut response = ProxyResponse::new(backend.status, body);
                response.headers = relayed_headers(&backend.headers);
                response
                    .headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
                response
            }
            Err(e) => {
                error!(error = %e, "Backend response is not JSON");
                error_response(request, &e)
            }
        }
    }

    fn handle_explorer(&self, request: &ApiRequest) -> ProxyResponse {
        let host = request
            .header(HOST.as_str())
            .unwrap_or(&self.fallback_host);
        let location = format!("{}http://{}/_ah/api", EXPLORER_URL, host);
        ProxyResponse::redirect(&location).unwrap_or_else(|e| rest_error_response(&e))
    }

    /// Relay `/_ah/api/static/*` from the static host, keeping only its
    /// `Content-Type`
    async fn handle_static(&self, request: &ApiRequest) -> ProxyResponse {
        let mut url = format!("{}/_ah/api/{}", self.static_url, request.path);
        if !request.query.is_empty() {
            url.push('?');
            url.push_str(&request.query);
        }

        let backend = match self.transport.get(&url).await {
            Ok(backend) => backend,
            Err(e) => {
                error!(url = %url, error = %e, "Static proxy request failed");
                return rest_error_response(&RequestError::backend_unavailable(e.to_string()));
            }
        };

        if backend.status != StatusCode::OK {
            error!(
                url = %url,
                status = backend.status.as_u16(),
                "Static proxy returned an error"
            );
        }

        let mut response = ProxyResponse::new(backend.status, backend.body);
        if let Some(content_type) = backend.headers.get(CONTENT_TYPE) {
            response.headers.insert(CONTENT_TYPE, content_type.clone());
        }
        response
    }

    fn spi_url(&self, method: &str) -> String {
        format!("{}/_ah/spi/{}", self.backend_url, method)
    }
}

/// Backend headers relayed to the client; framing is recomputed
fn relayed_headers(backend: &HeaderMap) -> HeaderMap {
    let mut headers = backend.clone();
    for name in [CONTENT_LENGTH, TRANSFER_ENCODING, CONNECTION] {
        headers.remove(name);
    }
    headers
}
