//! API descriptors as handed out by `BackendService.getApiConfigs`.
//!
//! Only the fields the proxy acts on are typed. Everything else lands in the
//! flattened `extra` maps so a descriptor serialises back to the discovery
//! generator without losing information.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// `(name, version)` pair addressing an API or an RPC method
pub type LookupKey = (String, String);

/// Response body marker for methods that return nothing
pub const EMPTY_RESPONSE_BODY: &str = "empty";

/// A complete API: name, version and its methods
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adapter: Option<Adapter>,
    #[serde(default)]
    pub methods: BTreeMap<String, MethodDescriptor>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ApiDescriptor {
    /// Key under which the descriptor is stored
    pub fn lookup_key(&self) -> LookupKey {
        (self.name.clone(), self.version.clone())
    }

    /// Rewrite `https://` on `root` and `adapter.bns` to `http://`.
    ///
    /// The local backend only speaks plaintext.
    pub fn downgrade_https(&mut self) {
        if let Some(root) = self.root.as_mut() {
            downgrade_url(root);
        }
        if let Some(bns) = self.adapter.as_mut().and_then(|a| a.bns.as_mut()) {
            downgrade_url(bns);
        }
    }
}

fn downgrade_url(url: &mut String) {
    if let Some(rest) = url.strip_prefix("https://") {
        *url = format!("http://{}", rest);
    }
}

/// Backend adapter block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Adapter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bns: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One method of an API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    #[serde(rename = "httpMethod", default, skip_serializing_if = "String::is_empty")]
    pub http_method: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(rename = "rosyMethod", default, skip_serializing_if = "String::is_empty")]
    pub rosy_method: String,
    #[serde(default, skip_serializing_if = "RequestSpec::is_empty")]
    pub request: RequestSpec,
    #[serde(default, skip_serializing_if = "ResponseSpec::is_empty")]
    pub response: ResponseSpec,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MethodDescriptor {
    /// Build a method from its routing essentials
    pub fn new(
        http_method: impl Into<String>,
        path: impl Into<String>,
        rosy_method: impl Into<String>,
    ) -> Self {
        Self {
            http_method: http_method.into(),
            path: path.into(),
            rosy_method: rosy_method.into(),
            ..Self::default()
        }
    }

    /// Declared spec for a (possibly dotted) parameter name
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.request.parameters.get(name)
    }

    /// Whether the method answers with 204 No Content
    pub fn has_empty_response(&self) -> bool {
        self.response.body.as_deref() == Some(EMPTY_RESPONSE_BODY)
    }
}

/// Request half of a method
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, alias = "params", skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ParamSpec>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestSpec {
    fn is_empty(&self) -> bool {
        self.body.is_none() && self.parameters.is_empty() && self.extra.is_empty()
    }
}

/// Response half of a method
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResponseSpec {
    fn is_empty(&self) -> bool {
        self.body.is_none() && self.extra.is_empty()
    }
}

/// Declared type information for one parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub repeated: bool,
    #[serde(rename = "enum", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub enum_values: BTreeMap<String, EnumEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ParamSpec {
    /// Spec of a scalar parameter of the given type
    pub fn of_type(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    /// Mark the parameter as repeated
    pub fn as_repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    /// Add an enum label with its backend value
    pub fn with_enum(mut self, label: impl Into<String>, backend_value: impl Into<String>) -> Self {
        self.enum_values.insert(
            label.into(),
            EnumEntry {
                backend_value: Some(backend_value.into()),
                extra: Map::new(),
            },
        );
        self
    }

    /// Backend values accepted for an enum parameter, in label order
    pub fn allowed_enum_values(&self) -> Vec<String> {
        self.enum_values
            .values()
            .filter_map(|entry| entry.backend_value.clone())
            .collect()
    }
}

/// One enum label
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumEntry {
    #[serde(
        rename = "backendValue",
        alias = "backendVal",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub backend_value: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
