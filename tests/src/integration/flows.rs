//! # Integration Test Flows
//!
//! Drives the full HTTP router against a scripted backend:
//!
//! 1. **Config load**: `getApiConfigs` is fetched before routing
//! 2. **REST**: route matching, parameter validation, body merge
//! 3. **JSON-RPC**: method lookup, result wrapping, batch shape
//! 4. **Errors**: backend failures rendered in both dialects

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use endpoints_proxy::test_utils::ScriptedTransport;
    use endpoints_proxy::{ProxyConfig, ProxyService};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const GET_API_CONFIGS: &str = "/_ah/spi/BackendService.getApiConfigs";

    fn guestbook_api() -> Value {
        json!({
            "name": "guestbook_api",
            "version": "v1",
            "methods": {
                "guestbook_api.greetings.get": {
                    "httpMethod": "GET",
                    "path": "greetings/{gid}",
                    "rosyMethod": "GreetingsV1.get",
                    "request": {
                        "parameters": {
                            "gid": {"type": "string"}
                        }
                    }
                },
                "guestbook_api.greetings.list": {
                    "httpMethod": "GET",
                    "path": "greetings",
                    "rosyMethod": "GreetingsV1.list",
                    "request": {
                        "parameters": {
                            "limit": {"type": "int32"},
                            "tag": {"type": "string", "repeated": true}
                        }
                    }
                },
                "guestbook_api.greetings.insert": {
                    "httpMethod": "POST",
                    "path": "greetings",
                    "rosyMethod": "GreetingsV1.insert"
                },
                "guestbook_api.greetings.delete": {
                    "httpMethod": "DELETE",
                    "path": "greetings/{gid}",
                    "rosyMethod": "GreetingsV1.delete",
                    "response": {"body": "empty"}
                }
            }
        })
    }

    fn enum_api() -> Value {
        json!({
            "name": "api",
            "version": "v1",
            "methods": {
                "api.greetings.get": {
                    "httpMethod": "GET",
                    "path": "greetings/{gid}",
                    "rosyMethod": "Greetings.get",
                    "request": {
                        "parameters": {
                            "gid": {"type": "string", "enum": {"X": {"backendValue": "X"}}}
                        }
                    }
                }
            }
        })
    }

    fn proxy(apis: &[Value]) -> (Arc<ScriptedTransport>, ProxyService) {
        let transport = Arc::new(ScriptedTransport::new());
        transport.serve_api_configs(apis);
        let service = ProxyService::new(ProxyConfig::default(), transport.clone())
            .expect("default config is valid");
        (transport, service)
    }

    async fn send(service: &ProxyService, request: Request<Body>) -> Response {
        service.router().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    // =============================================================================
    // CONFIG LOAD
    // =============================================================================

    #[tokio::test]
    async fn test_configs_fetched_before_routing() {
        let (transport, service) = proxy(&[guestbook_api()]);
        transport.respond("/_ah/spi/GreetingsV1.list", 200, r#"{"items": []}"#);

        let response = send(
            &service,
            Request::get("/_ah/api/guestbook_api/v1/greetings")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].url.ends_with(GET_API_CONFIGS));
        assert!(calls[1].url.ends_with("/_ah/spi/GreetingsV1.list"));
    }

    #[tokio::test]
    async fn test_config_fetch_failure_is_500() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(GET_API_CONFIGS, 503, "unavailable");
        let service = ProxyService::new(ProxyConfig::default(), transport.clone()).unwrap();

        let response = send(
            &service,
            Request::get("/_ah/api/guestbook_api/v1/greetings")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(transport.calls().len(), 1);
    }

    // =============================================================================
    // REST FLOWS
    // =============================================================================

    #[tokio::test]
    async fn test_rest_path_and_query_parameters() {
        let (transport, service) = proxy(&[guestbook_api()]);
        transport.respond("/_ah/spi/GreetingsV1.list", 200, r#"{"items": []}"#);

        send(
            &service,
            Request::get("/_ah/api/guestbook_api/v1/greetings?limit=5&tag=a&tag=b")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        let sent = transport.calls_to("/_ah/spi/GreetingsV1.list");
        assert_eq!(sent[0].body_json(), json!({"limit": 5, "tag": ["a", "b"]}));
    }

    #[tokio::test]
    async fn test_rest_path_variable() {
        let (transport, service) = proxy(&[guestbook_api()]);
        transport.respond("/_ah/spi/GreetingsV1.get", 200, r#"{"message": "hello"}"#);

        let response = send(
            &service,
            Request::get("/_ah/api/guestbook_api/v1/greetings/42")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"message": "hello"}));
        let sent = transport.calls_to("/_ah/spi/GreetingsV1.get");
        assert_eq!(sent[0].body_json(), json!({"gid": "42"}));
    }

    #[tokio::test]
    async fn test_rest_body_overrides_query() {
        let (transport, service) = proxy(&[guestbook_api()]);
        transport.respond("/_ah/spi/GreetingsV1.insert", 200, "{}");

        send(
            &service,
            post_json(
                "/_ah/api/guestbook_api/v1/greetings?message=query",
                json!({"message": "body"}),
            ),
        )
        .await;

        let sent = transport.calls_to("/_ah/spi/GreetingsV1.insert");
        assert_eq!(sent[0].body_json(), json!({"message": "body"}));
    }

    #[tokio::test]
    async fn test_rest_empty_response_is_204() {
        let (transport, service) = proxy(&[guestbook_api()]);
        transport.respond("/_ah/spi/GreetingsV1.delete", 200, "");

        let response = send(
            &service,
            Request::delete("/_ah/api/guestbook_api/v1/greetings/7")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_rest_enum_rejection() {
        let (transport, service) = proxy(&[enum_api()]);

        let response = send(
            &service,
            Request::get("/_ah/api/api/v1/greetings/invalid_enum")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        let errors = body["error"]["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["location"], "gid");
        assert_eq!(errors[0]["reason"], "invalidParameter");
        assert!(transport.calls_to("/_ah/spi/Greetings.get").is_empty());
    }

    #[tokio::test]
    async fn test_rest_unknown_route_is_404() {
        let (_, service) = proxy(&[guestbook_api()]);

        let response = send(
            &service,
            Request::get("/_ah/api/guestbook_api/v1/nothing/here")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"]["code"], 404);
    }

    #[tokio::test]
    async fn test_rest_backend_error() {
        let (transport, service) = proxy(&[guestbook_api()]);
        transport.respond(
            "/_ah/spi/GreetingsV1.get",
            404,
            r#"{"state": "APPLICATION_ERROR", "error_message": "Test error"}"#,
        );

        let response = send(
            &service,
            Request::get("/_ah/api/guestbook_api/v1/greetings/1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await,
            json!({
                "error": {
                    "code": 404,
                    "message": "Test error",
                    "errors": [{
                        "domain": "global",
                        "reason": "notFound",
                        "message": "Test error"
                    }]
                }
            })
        );
    }

    // =============================================================================
    // JSON-RPC FLOWS
    // =============================================================================

    #[tokio::test]
    async fn test_rpc_result_wrapping() {
        let (transport, service) = proxy(&[guestbook_api()]);
        transport.respond("/_ah/spi/GreetingsV1.get", 200, r#"{"some": "response"}"#);

        let response = send(
            &service,
            post_json(
                "/_ah/api/rpc",
                json!({
                    "method": "guestbook_api.greetings.get",
                    "apiVersion": "v1",
                    "id": "Z",
                    "params": {"gid": "9"}
                }),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"id": "Z", "result": {"some": "response"}})
        );
        let sent = transport.calls_to("/_ah/spi/GreetingsV1.get");
        assert_eq!(sent[0].body_json(), json!({"gid": "9"}));
    }

    #[tokio::test]
    async fn test_rpc_batch_shape() {
        let (transport, service) = proxy(&[guestbook_api()]);
        transport.respond("/_ah/spi/GreetingsV1.list", 200, r#"{"items": []}"#);

        let response = send(
            &service,
            post_json(
                "/_ah/api/rpc",
                json!([{
                    "method": "guestbook_api.greetings.list",
                    "apiVersion": "v1",
                    "id": "1"
                }]),
            ),
        )
        .await;

        assert_eq!(
            json_body(response).await,
            json!([{"id": "1", "result": {"items": []}}])
        );
    }

    #[tokio::test]
    async fn test_rpc_backend_error() {
        let (transport, service) = proxy(&[guestbook_api()]);
        transport.respond(
            "/_ah/spi/GreetingsV1.get",
            404,
            r#"{"state": "APPLICATION_ERROR", "error_message": "Test error"}"#,
        );

        let response = send(
            &service,
            post_json(
                "/_ah/api/rpc",
                json!({
                    "method": "guestbook_api.greetings.get",
                    "apiVersion": "v1",
                    "id": "Z"
                }),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["id"], "Z");
        assert_eq!(body["error"]["code"], 404);
        assert_eq!(body["error"]["message"], "Test error");
        assert_eq!(body["error"]["data"][0]["reason"], "notFound");
    }

    #[tokio::test]
    async fn test_rpc_unknown_method() {
        let (transport, service) = proxy(&[guestbook_api()]);

        let response = send(
            &service,
            post_json(
                "/_ah/api/rpc",
                json!({"method": "nope.nothing", "apiVersion": "v1", "id": "3"}),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["id"], "3");
        assert_eq!(body["error"]["code"], 404);
        assert_eq!(transport.calls().len(), 1);
    }

    // =============================================================================
    // CORS
    // =============================================================================

    #[tokio::test]
    async fn test_cors_preflight_headers() {
        let (transport, service) = proxy(&[guestbook_api()]);
        transport.respond("/_ah/spi/GreetingsV1.list", 200, "{}");

        let response = send(
            &service,
            Request::get("/_ah/api/guestbook_api/v1/greetings")
                .header("origin", "http://app.example.com")
                .header("access-control-request-method", "GET")
                .header("access-control-request-headers", "x-custom")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        let headers = response.headers();
        assert_eq!(
            headers["access-control-allow-origin"],
            "http://app.example.com"
        );
        assert_eq!(headers["access-control-allow-methods"], "DELETE,GET,PATCH,POST,PUT");
        assert_eq!(headers["access-control-allow-headers"], "x-custom");
    }
}
