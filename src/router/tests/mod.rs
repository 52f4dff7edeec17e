//! Test helpers for SiteRouter unit tests.
//!
//! These tests go through `into_service()` and `oneshot()`, so every request
//! passes the shield and the ambient layers without opening a socket. Tests
//! that need a real listener live in `tests/`.

use crate::{Config, SiteRouter};
use axum::{
    body::Body,
    extract::OriginalUri,
    http::Request,
    response::Response,
    routing::{get, post},
};


const BASE_CONFIG_TOML: &str = r#"
[http]
bind_addr = "127.0.0.1"
bind_port = 3000

[site]
home_url = "http://localhost:3000"

[logging]
format = "json"
"#;

pub(crate) fn create_base_config() -> Config {
    BASE_CONFIG_TOML
        .parse()
        .expect("Failed to parse test config TOML")
}

/// Base config with `additional_toml` appended.
pub(crate) fn create_config_with_toml(additional_toml: &str) -> Config {
    format!("{BASE_CONFIG_TOML}\n{additional_toml}")
        .parse()
        .expect("Failed to parse test config TOML")
}

async fn login_form(OriginalUri(original): OriginalUri) -> String {
    format!("login form for {original}")
}

async fn explode() -> &'static str {
    panic!("handler exploded")
}

/// A host site with a legacy login script, an admin area, an ajax endpoint
/// and a public page.
pub(crate) fn create_site(config: Config) -> SiteRouter {
    SiteRouter::without_state(config)
        .expect("Failed to create SiteRouter")
        .route("/wp-login.php", get(login_form).post(login_form))
        .route("/wp-admin/", get(|| async { "dashboard" }))
        .route("/wp-admin/admin-ajax.php", post(|| async { "ajax" }))
        .route("/hello-world/", get(|| async { "Hello, World!" }))
        .route("/panic", get(explode))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                "slow"
            }),
        )
}

pub(crate) fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub(crate) fn post_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub(crate) async fn get_body_string(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}
