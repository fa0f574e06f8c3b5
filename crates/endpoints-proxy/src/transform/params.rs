//! Validation and type coercion of path and query parameter values.

use crate::domain::descriptor::ParamSpec;
use crate::domain::error::{RequestError, RequestResult};
use serde_json::{Number, Value};

/// Validate and convert one merged parameter value.
///
/// `value` is a string or a list of strings; lists are converted element by
/// element and errors name the failing index (`gid[2]`). Values of
/// parameters without a spec pass through unchanged.
pub fn transform_parameter_value(
    name: &str,
    value: Value,
    spec: Option<&ParamSpec>,
) -> RequestResult<Value> {
    let Some(spec) = spec else {
        return Ok(value);
    };

    match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| convert_scalar(&format!("{}[{}]", name, i), item, spec))
            .collect::<RequestResult<Vec<_>>>()
            .map(Value::Array),
        scalar => convert_scalar(name, scalar, spec),
    }
}

fn convert_scalar(name: &str, value: Value, spec: &ParamSpec) -> RequestResult<Value> {
    let Value::String(text) = value else {
        return Ok(value);
    };

    if !spec.enum_values.is_empty() {
        check_enum(name, &text, spec)?;
    }

    match spec.kind.as_str() {
        "boolean" => parse_boolean(&text)
            .map(Value::Bool)
            .ok_or_else(|| RequestError::basic_type(name, &text, "boolean")),
        "int32" => text
            .parse::<i32>()
            .map(Value::from)
            .map_err(|_| RequestError::basic_type(name, &text, "integer")),
        "uint32" => text
            .parse::<u32>()
            .map(Value::from)
            .map_err(|_| RequestError::basic_type(name, &text, "integer")),
        kind @ ("float" | "double") => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| RequestError::basic_type(name, &text, kind)),
        // int64/uint64 travel as strings; unknown types are left alone
        _ => Ok(Value::String(text)),
    }
}

fn check_enum(name: &str, value: &str, spec: &ParamSpec) -> RequestResult<()> {
    let allowed = spec.allowed_enum_values();
    if allowed.iter().any(|v| v == value) {
        Ok(())
    } else {
        Err(RequestError::enum_rejection(name, value, &allowed))
    }
}

fn parse_boolean(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    fn convert(kind: &str, value: &str) -> RequestResult<Value> {
        transform_parameter_value("p", json!(value), Some(&ParamSpec::of_type(kind)))
    }

    #[test]
    fn test_boolean() {
        assert_eq!(convert("boolean", "true").unwrap(), json!(true));
        assert_eq!(convert("boolean", "TRUE").unwrap(), json!(true));
        assert_eq!(convert("boolean", "1").unwrap(), json!(true));
        assert_eq!(convert("boolean", "False").unwrap(), json!(false));
        assert_eq!(convert("boolean", "0").unwrap(), json!(false));

        let err = convert("boolean", "yes").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.reason, "invalidParameter");
        assert_eq!(err.extra["location"], "p");
    }

    #[test]
    fn test_integers() {
        assert_eq!(convert("int32", "-42").unwrap(), json!(-42));
        assert_eq!(convert("int32", "2147483647").unwrap(), json!(2147483647));
        assert!(convert("int32", "2147483648").is_err());
        assert!(convert("int32", "4.5").is_err());
        assert!(convert("int32", "").is_err());

        assert_eq!(convert("uint32", "4294967295").unwrap(), json!(4294967295u32));
        assert!(convert("uint32", "-1").is_err());
    }

    #[test]
    fn test_floats() {
        assert_eq!(convert("float", "1.5").unwrap(), json!(1.5));
        assert_eq!(convert("double", "-3").unwrap(), json!(-3.0));
        assert!(convert("double", "abc").is_err());
        assert!(convert("double", "NaN").is_err());
        assert!(convert("float", "inf").is_err());
    }

    #[test]
    fn test_64_bit_and_unknown_types_pass_through() {
        assert_eq!(convert("int64", "9223372036854775807").unwrap(), json!("9223372036854775807"));
        assert_eq!(convert("uint64", "not-checked").unwrap(), json!("not-checked"));
        assert_eq!(convert("string", "x").unwrap(), json!("x"));
        assert_eq!(convert("", "x").unwrap(), json!("x"));
    }

    #[test]
    fn test_no_spec_passes_through() {
        assert_eq!(
            transform_parameter_value("p", json!(["a", "b"]), None).unwrap(),
            json!(["a", "b"])
        );
    }

    #[test]
    fn test_enum() {
        let spec = ParamSpec::of_type("string").with_enum("X", "X").with_enum("Y", "y_val");
        assert_eq!(
            transform_parameter_value("gid", json!("y_val"), Some(&spec)).unwrap(),
            json!("y_val")
        );

        let err = transform_parameter_value("gid", json!("Y"), Some(&spec)).unwrap_err();
        assert_eq!(err.reason, "invalidParameter");
        assert_eq!(err.extra["location"], "gid");
        assert!(err.message.contains("\"Y\""));
        assert!(err.message.contains("y_val"));
    }

    #[test]
    fn test_enum_regardless_of_declared_type() {
        let spec = ParamSpec::of_type("int32").with_enum("ONE", "1");
        assert_eq!(
            transform_parameter_value("n", json!("1"), Some(&spec)).unwrap(),
            json!(1)
        );
        assert!(transform_parameter_value("n", json!("2"), Some(&spec)).is_err());
    }

    #[test]
    fn test_list_errors_are_indexed() {
        let spec = ParamSpec::of_type("int32").as_repeated();
        assert_eq!(
            transform_parameter_value("n", json!(["1", "2"]), Some(&spec)).unwrap(),
            json!([1, 2])
        );

        let err = transform_parameter_value("n", json!(["1", "2", "x"]), Some(&spec)).unwrap_err();
        assert_eq!(err.extra["location"], "n[2]");
    }
}
