//! Cache of API descriptors and the two method indices built from them.
//!
//! Descriptors, the RPC index and the ordered REST route list live behind one
//! mutex and are replaced together: a refresh builds fresh tables and swaps
//! them in, so a reader always sees one coherent generation.

use crate::discovery::discovery_api_config;
use crate::domain::descriptor::{ApiDescriptor, LookupKey, MethodDescriptor};
use crate::domain::error::ProxyError;
use crate::routing::{sort_methods, PathPattern};
use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error, instrument, warn};

/// One REST route: a compiled template and the methods served on it
#[derive(Debug, Clone)]
struct RestRoute {
    pattern: PathPattern,
    /// Lower-cased HTTP method -> (method name, descriptor)
    methods: BTreeMap<String, (String, MethodDescriptor)>,
}

/// Result of a REST lookup
#[derive(Debug, Clone, PartialEq)]
pub struct RestMatch {
    pub method_name: String,
    pub method: MethodDescriptor,
    /// Path parameters keyed by their original (dotted) names
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct ConfigTables {
    configs: BTreeMap<LookupKey, ApiDescriptor>,
    rpc_methods: HashMap<LookupKey, MethodDescriptor>,
    rest_routes: Vec<RestRoute>,
}

impl ConfigTables {
    fn from_descriptors(descriptors: Vec<ApiDescriptor>) -> Self {
        let mut tables = Self::default();
        for descriptor in descriptors {
            tables.configs.insert(descriptor.lookup_key(), descriptor);
        }

        let mut rpc_methods = HashMap::new();
        let mut rest_routes = Vec::new();
        for api in tables.configs.values() {
            for (name, method) in sort_methods(&api.methods) {
                save_rpc_method(&mut rpc_methods, name, &api.version, method);
                save_rest_method(&mut rest_routes, name, &api.name, &api.version, method);
            }
        }

        tables.rpc_methods = rpc_methods;
        tables.rest_routes = rest_routes;
        tables
    }
}

fn save_rpc_method(
    rpc_methods: &mut HashMap<LookupKey, MethodDescriptor>,
    name: &str,
    version: &str,
    method: &MethodDescriptor,
) {
    rpc_methods.insert((name.to_string(), version.to_string()), method.clone());
}

fn save_rest_method(
    rest_routes: &mut Vec<RestRoute>,
    name: &str,
    api: &str,
    version: &str,
    method: &MethodDescriptor,
) {
    let raw_path = format!("{}/{}/{}", api, version, method.path);
    let http_method = method.http_method.to_ascii_lowercase();
    let entry = (name.to_string(), method.clone());

    if let Some(route) = rest_routes.iter_mut().find(|r| r.pattern.raw() == raw_path) {
        route.methods.insert(http_method, entry);
        return;
    }

    match PathPattern::compile(&raw_path) {
        Ok(pattern) => {
            let mut methods = BTreeMap::new();
            methods.insert(http_method, entry);
            rest_routes.push(RestRoute { pattern, methods });
        }
        Err(e) => {
            error!(method = %name, error = %e, "Skipping REST method with invalid path");
        }
    }
}

/// Owner of the API configuration cache
#[derive(Debug, Default)]
pub struct ApiConfigManager {
    tables: Mutex<ConfigTables>,
}

impl ApiConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cache with the configs in a `getApiConfigs` response.
    ///
    /// `items` entries are descriptor JSON strings (objects are accepted
    /// too). Entries that fail to parse are logged and skipped. The built-in
    /// discovery API is always registered. Returns the number of descriptors
    /// loaded from the response.
    ///
    /// # Errors
    ///
    /// Fails, leaving the cache untouched, when the body is not a JSON
    /// object.
    #[instrument(skip_all, fields(len = body.len()))]
    pub fn parse_api_config_response(&self, body: &[u8]) -> Result<usize, ProxyError> {
        let response: Value = serde_json::from_slice(body).map_err(|e| {
            ProxyError::ConfigFetch(format!("cannot parse getApiConfigs response: {}", e))
        })?;
        let response = response.as_object().ok_or_else(|| {
            ProxyError::ConfigFetch("getApiConfigs response is not a JSON object".into())
        })?;

        let mut descriptors = vec![discovery_api_config()];
        let items = response
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for item in items {
            match parse_descriptor(item) {
                Ok(mut descriptor) => {
                    descriptor.downgrade_https();
                    descriptors.push(descriptor);
                }
                Err(e) => {
                    error!(error = %e, item = %item, "Cannot parse API config");
                }
            }
        }

        let loaded = descriptors.len() - 1;
        let tables = ConfigTables::from_descriptors(descriptors);
        debug!(
            apis = tables.configs.len(),
            rest_routes = tables.rest_routes.len(),
            "Loaded API configs"
        );
        *self.tables.lock() = tables;
        Ok(loaded)
    }

    /// Whether no configs have been loaded yet
    pub fn is_empty(&self) -> bool {
        self.tables.lock().configs.is_empty()
    }

    /// Every cached descriptor, ordered by `(name, version)`
    pub fn configs(&self) -> Vec<ApiDescriptor> {
        self.tables.lock().configs.values().cloned().collect()
    }

    /// Descriptor of one API
    pub fn config(&self, name: &str, version: &str) -> Option<ApiDescriptor> {
        self.tables
            .lock()
            .configs
            .get(&(name.to_string(), version.to_string()))
            .cloned()
    }

    /// Look up a JSON-RPC method by name and API version
    pub fn lookup_rpc_method(&self, name: &str, version: &str) -> Option<MethodDescriptor> {
        self.tables
            .lock()
            .rpc_methods
            .get(&(name.to_string(), version.to_string()))
            .cloned()
    }

    /// Find the REST method serving `path` for `http_method`.
    ///
    /// The path is percent-decoded first. Only the first route whose pattern
    /// matches is considered: if it has no method for `http_method` the
    /// lookup fails.
    pub fn lookup_rest_method(&self, path: &str, http_method: &str) -> Option<RestMatch> {
        let path = percent_decode_str(path).decode_utf8_lossy();
        let tables = self.tables.lock();

        for route in &tables.rest_routes {
            let Some(params) = route.pattern.match_path(&path) else {
                continue;
            };

            let key = http_method.to_ascii_lowercase();
            return match route.methods.get(&key) {
                Some((method_name, method)) => Some(RestMatch {
                    method_name: method_name.clone(),
                    method: method.clone(),
                    params,
                }),
                None => {
                    warn!(
                        path = %path,
                        http_method = %http_method,
                        route = %route.pattern.raw(),
                        "Path matched but HTTP method is not served"
                    );
                    None
                }
            };
        }

        warn!(path = %path, "No endpoint found for path");
        None
    }

    /// Raw templates of the REST routes in match order
    pub fn rest_route_paths(&self) -> Vec<String> {
        self.tables
            .lock()
            .rest_routes
            .iter()
            .map(|r| r.pattern.raw().to_string())
            .collect()
    }
}

fn parse_descriptor(item: &Value) -> Result<ApiDescriptor, serde_json::Error> {
    match item {
        Value::String(encoded) => serde_json::from_str(encoded),
        other => serde_json::from_value(other.clone()),
    }
}
