//! Benchmarks for the latency the login shield adds to a request.
//!
//! Compares a bare router against the same routes behind the shield for the
//! request kinds the shield treats differently.

use axum::{Router, body::Body, http::Request, routing::get};
use axum_login_shield::{
    Config, HttpMiddleware, HttpMiddlewareConfig, SiteRouter,
    shield::{InMemoryRoutingContext, LoginShield, RequestFacts},
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use http::Method;
use std::hint::black_box;
use tower::ServiceExt;

async fn handler() -> &'static str {
    "OK"
}

fn test_config() -> Config {
    Config::from_toml("").expect("Failed to parse bench config")
}

fn test_request(path: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

fn routes() -> Router {
    Router::new()
        .route("/", get(handler))
        .route("/wp-login.php", get(handler))
        .route("/hello-world/", get(handler))
}

/// Bare axum router, no shield
fn bench_bare_axum(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let router = routes();

    c.bench_function("bare_axum", |b| {
        b.to_async(&rt).iter(|| async {
            let response = router
                .clone()
                .oneshot(test_request("/hello-world/"))
                .await
                .unwrap();
            black_box(response)
        })
    });
}

/// The shield alone in front of the routes, per request kind
fn bench_shield_only(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut config = test_config();
    config.http.middleware = Some(HttpMiddlewareConfig::Include(vec![
        HttpMiddleware::LoginShield,
    ]));
    let router = SiteRouter::without_state(config)
        .unwrap()
        .merge(routes())
        .into_service();

    let mut group = c.benchmark_group("shield_only");
    for path in [
        "/hello-world/",
        "/secure-login/",
        "/wp-login.php",
        "/wp%2Dlogin.php",
        "/wp-admin/",
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(path), &path, |b, path| {
            b.to_async(&rt).iter(|| async {
                let response = router.clone().oneshot(test_request(path)).await.unwrap();
                black_box(response)
            })
        });
    }
    group.finish();
}

/// Classification and interception without HTTP
fn bench_pipeline(c: &mut Criterion) {
    let shield = LoginShield::from_config(&test_config()).unwrap();

    c.bench_function("pipeline_run", |b| {
        b.iter(|| {
            let mut routing = InMemoryRoutingContext::default();
            let facts = RequestFacts {
                method: &Method::GET,
                raw_path: black_box("/secure-login/"),
                raw_query: Some("action=lostpassword"),
                caller: None,
                authenticated: false,
            };
            black_box(shield.run(facts, &mut routing).unwrap())
        })
    });
}

/// Every ambient layer plus the shield
fn bench_full_stack(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let router = SiteRouter::without_state(test_config())
        .unwrap()
        .merge(routes())
        .setup_middleware()
        .into_service();

    c.bench_function("full_stack", |b| {
        b.to_async(&rt).iter(|| async {
            let response = router
                .clone()
                .oneshot(test_request("/hello-world/"))
                .await
                .unwrap();
            black_box(response)
        })
    });
}

criterion_group!(
    benches,
    bench_bare_axum,
    bench_shield_only,
    bench_pipeline,
    bench_full_stack,
);
criterion_main!(benches);
