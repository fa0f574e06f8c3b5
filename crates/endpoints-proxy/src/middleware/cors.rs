//! CORS headers for API responses.
//!
//! Eligibility is decided from the request's `Origin` and
//! `Access-Control-Request-*` headers; the allowed method set is fixed.

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, ORIGIN,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

/// Methods a cross-origin request may ask for
pub const ALLOWED_CORS_METHODS: [&str; 5] = ["DELETE", "GET", "PATCH", "POST", "PUT"];

/// Value written to `Access-Control-Allow-Methods`
pub const ALLOWED_CORS_METHODS_HEADER: &str = "DELETE,GET,PATCH,POST,PUT";

/// CORS state captured from an inbound request
#[derive(Debug, Clone, Default)]
pub struct CorsHandler {
    origin: Option<HeaderValue>,
    request_method: Option<HeaderValue>,
    request_headers: Option<HeaderValue>,
}

impl CorsHandler {
    /// Capture the CORS request headers
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let non_empty = |name: HeaderName| {
            headers
                .get(name)
                .filter(|v: &&HeaderValue| !v.is_empty())
                .cloned()
        };

        Self {
            origin: non_empty(ORIGIN),
            request_method: non_empty(ACCESS_CONTROL_REQUEST_METHOD),
            request_headers: non_empty(ACCESS_CONTROL_REQUEST_HEADERS),
        }
    }

    /// Whether the response should carry CORS headers
    pub fn allow_cors_request(&self) -> bool {
        if self.origin.is_none() {
            return false;
        }

        match &self.request_method {
            None => true,
            Some(method) => method
                .to_str()
                .map(|m| ALLOWED_CORS_METHODS.contains(&m.to_ascii_uppercase().as_str()))
                .unwrap_or(false),
        }
    }

    /// Write the CORS headers onto a response if the request is eligible
    pub fn apply(&self, headers: &mut HeaderMap) {
        if !self.allow_cors_request() {
            return;
        }

        if let Some(origin) = &self.origin {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        }
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_CORS_METHODS_HEADER),
        );
        if let Some(requested) = &self.request_headers {
            headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    fn applied(request: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut response = HeaderMap::new();
        CorsHandler::from_headers(&headers(request)).apply(&mut response);
        response
    }

    #[test]
    fn test_no_origin_no_headers() {
        assert!(applied(&[]).is_empty());
        assert!(applied(&[("origin", "")]).is_empty());
        assert!(applied(&[("access-control-request-method", "GET")]).is_empty());
    }

    #[test]
    fn test_simple_request() {
        let response = applied(&[("origin", "http://example.com")]);
        assert_eq!(response[ACCESS_CONTROL_ALLOW_ORIGIN], "http://example.com");
        assert_eq!(
            response[ACCESS_CONTROL_ALLOW_METHODS],
            "DELETE,GET,PATCH,POST,PUT"
        );
        assert!(response.get(ACCESS_CONTROL_ALLOW_HEADERS).is_none());
    }

    #[test]
    fn test_preflight_echoes_headers() {
        let response = applied(&[
            ("origin", "http://example.com"),
            ("access-control-request-method", "patch"),
            ("access-control-request-headers", "Date,Expires"),
        ]);
        assert_eq!(response[ACCESS_CONTROL_ALLOW_ORIGIN], "http://example.com");
        assert_eq!(response[ACCESS_CONTROL_ALLOW_HEADERS], "Date,Expires");
    }

    #[test]
    fn test_disallowed_request_method() {
        assert!(applied(&[
            ("origin", "http://example.com"),
            ("access-control-request-method", "OPTIONS"),
        ])
        .is_empty());
        assert!(applied(&[
            ("origin", "http://example.com"),
            ("access-control-request-method", "TRACE"),
            ("access-control-request-headers", "Date"),
        ])
        .is_empty());
    }
}
