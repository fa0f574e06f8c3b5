//! # Endpoints Proxy Routing Benchmarks
//!
//! | Area | Operation |
//! |------|-----------|
//! | Config load | parse a `getApiConfigs` response |
//! | REST lookup | first-match route search |
//! | Transform | parameter merge into the backend body |

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Uri};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};

use endpoints_proxy::routing::score_path;
use endpoints_proxy::test_utils::api_configs_body;
use endpoints_proxy::transform::transform_rest_request;
use endpoints_proxy::{ApiConfigManager, ApiRequest};

fn api_with_methods(count: usize) -> Value {
    let mut methods = serde_json::Map::new();
    for i in 0..count {
        methods.insert(
            format!("bench.resource{}.get", i),
            json!({
                "httpMethod": "GET",
                "path": format!("resource{}/{{id}}/items/{{item}}", i),
                "rosyMethod": format!("Bench.get{}", i),
            }),
        );
    }
    json!({"name": "bench", "version": "v1", "methods": methods})
}

fn bench_config_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("config-load");

    for size in [10, 100, 500] {
        let body = api_configs_body(&[api_with_methods(size)]);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("parse_api_configs", size), &body, |b, body| {
            b.iter(|| {
                let manager = ApiConfigManager::new();
                black_box(manager.parse_api_config_response(body.as_bytes()).is_ok())
            })
        });
    }

    group.finish();
}

fn bench_rest_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("rest-lookup");

    for size in [10, 100, 500] {
        let manager = ApiConfigManager::new();
        let body = api_configs_body(&[api_with_methods(size)]);
        let _ = manager.parse_api_config_response(body.as_bytes());
        let last = format!("bench/v1/resource{}/7/items/abc", size - 1);

        group.bench_with_input(BenchmarkId::new("worst_case", size), &last, |b, path| {
            b.iter(|| black_box(manager.lookup_rest_method(path, "GET").is_some()))
        });
    }

    group.finish();
}

fn bench_transform(c: &mut Criterion) {
    let api = json!({
        "name": "bench",
        "version": "v1",
        "methods": {
            "bench.items.update": {
                "httpMethod": "POST",
                "path": "items/{id}/owners/{owner.name}",
                "rosyMethod": "Bench.update",
                "request": {
                    "parameters": {
                        "id": {"type": "int32"},
                        "limit": {"type": "uint32"},
                        "tag": {"type": "string", "repeated": true}
                    }
                }
            }
        }
    });
    let manager = ApiConfigManager::new();
    let _ = manager.parse_api_config_response(api_configs_body(&[api]).as_bytes());
    let rest = manager
        .lookup_rest_method("bench/v1/items/7/owners/ann", "POST")
        .unwrap();

    let uri: Uri = "/_ah/api/bench/v1/items/7/owners/ann?limit=20&tag=a&tag=b&tag=c"
        .parse()
        .unwrap();
    let body = Bytes::from_static(br#"{"owner": {"email": "ann@example.com"}, "note": "x"}"#);
    let request = ApiRequest::parse(Method::POST, &uri, HeaderMap::new(), body).unwrap();

    c.bench_function("transform_rest_request", |b| {
        b.iter(|| black_box(transform_rest_request(black_box(&request), &rest).is_ok()))
    });
}

fn bench_score_path(c: &mut Criterion) {
    c.bench_function("score_path", |b| {
        b.iter(|| black_box(score_path(black_box("short/but/{many}/constants/{and}/vars"))))
    });
}

criterion_group!(
    benches,
    bench_config_load,
    bench_rest_lookup,
    bench_transform,
    bench_score_path
);
criterion_main!(benches);
