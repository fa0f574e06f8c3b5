//! Rewrite inbound REST and JSON-RPC requests into backend SPI calls.

use crate::config_manager::RestMatch;
use crate::domain::descriptor::MethodDescriptor;
use crate::domain::error::{RequestError, RequestResult};
use crate::domain::types::ApiRequest;
use crate::transform::params::transform_parameter_value;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Build the backend request for a matched REST method.
///
/// Path and query parameters are merged (query values first on collision),
/// converted according to their specs and expanded on dotted names, then the
/// JSON body is overlaid on top. The path becomes the method's `rosyMethod`.
pub fn transform_rest_request(request: &ApiRequest, rest: &RestMatch) -> RequestResult<ApiRequest> {
    let mut merged: BTreeMap<String, Vec<String>> = rest
        .params
        .iter()
        .map(|(name, value)| (name.clone(), vec![value.clone()]))
        .collect();

    for (name, mut values) in request.query_params() {
        if let Some(path_values) = merged.remove(&name) {
            values.extend(path_values);
        }
        merged.insert(name, values);
    }

    let mut body = Map::new();
    for (name, values) in merged {
        let spec = rest.method.param(&name);
        let value = if spec.is_some_and(|s| s.repeated) {
            Value::Array(values.into_iter().map(Value::String).collect())
        } else {
            match values.into_iter().next() {
                Some(first) => Value::String(first),
                None => continue,
            }
        };

        let value = transform_parameter_value(&name, value, spec)?;
        add_message_field(&mut body, &name, value);
    }

    update_from_body(&mut body, &request.body_json);

    let mut transformed = request.clone();
    transformed.set_body_json(body);
    transformed.path = rest.method.rosy_method.clone();
    Ok(transformed)
}

/// Build the backend request for a JSON-RPC call.
///
/// `params` becomes the body, `id` is kept on the request for the response.
pub fn transform_rpc_request(
    request: &ApiRequest,
    method: &MethodDescriptor,
) -> RequestResult<ApiRequest> {
    let request_id = extract_request_id(&request.body_json)?;
    let body = match request.body_json.get("params") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(params)) => params.clone(),
        Some(_) => {
            return Err(RequestError::bad_request(
                "JSON-RPC params must be an object",
            ))
        }
    };

    let mut transformed = request.clone();
    transformed.request_id = request_id;
    transformed.set_body_json(body);
    transformed.path = method.rosy_method.clone();
    Ok(transformed)
}

/// JSON-RPC `id` as text: strings verbatim, integers in decimal, empty when
/// absent.
pub fn extract_request_id(body: &Map<String, Value>) -> RequestResult<String> {
    match body.get("id") {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(id)) => Ok(id.clone()),
        Some(Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(n.to_string()),
        Some(other) => Err(RequestError::bad_request(format!(
            "Invalid JSON-RPC id: {}",
            other
        ))),
    }
}

/// Insert `value` at a dotted field path, creating intermediate objects.
///
/// Siblings already present at each level are kept; a non-object sitting on
/// the path is replaced.
pub fn add_message_field(target: &mut Map<String, Value>, field: &str, value: Value) {
    match field.split_once('.') {
        None => {
            target.insert(field.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(inner) = entry {
                add_message_field(inner, rest, value);
            }
        }
    }
}

/// Recursively overlay `source` onto `destination`.
///
/// Objects merge key by key; any other value in `source` wins.
pub fn update_from_body(destination: &mut Map<String, Value>, source: &Map<String, Value>) {
    for (key, value) in source {
        if let (Some(Value::Object(dest)), Value::Object(src)) = (destination.get_mut(key), value)
        {
            update_from_body(dest, src);
            continue;
        }
        destination.insert(key.clone(), value.clone());
    }
}
