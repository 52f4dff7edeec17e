//! Hardened Site Example
//!
//! A small site whose login form lives behind a custom slug.
//!
//! Run with:
//! ```bash
//! cargo run --example hardened_site
//! ```
//!
//! Then test:
//! ```bash
//! curl -i http://localhost:3000/wp-login.php       # 404
//! curl -i http://localhost:3000/back-office/       # login form
//! curl -i http://localhost:3000/wp-admin/          # 302 to /404/
//! curl -i -b logged_in=1 http://localhost:3000/wp-admin/
//! curl -i http://localhost:3000/logout             # Location: /back-office/?loggedout=true
//! curl -i -X POST -d slug=front-desk http://localhost:3000/wp-admin/settings -b logged_in=1
//! ```

use axum::{
    Form,
    http::{Extensions, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_login_shield::{Config, LoginShield, Result, SiteRouter, shield::FnSession};
use serde::Deserialize;

#[derive(Deserialize)]
struct SlugForm {
    slug: String,
}

async fn home() -> Html<&'static str> {
    Html("<h1>Welcome</h1>")
}

async fn login_form() -> Html<&'static str> {
    Html(r#"<form method="post"><input name="log"><input name="pwd" type="password"></form>"#)
}

fn dashboard(shield: &LoginShield) -> String {
    format!("Dashboard. Log in at {}", shield.login_url(Some("http")))
}

fn update_slug(shield: &LoginShield, form: SlugForm) -> Response {
    match shield.try_update_slug(&form.slug) {
        Ok(slug) => (StatusCode::OK, format!("Login moved to /{slug}/")).into_response(),
        Err(err) => err.into_response(),
    }
}

fn logged_in(headers: &HeaderMap, _: &Extensions) -> bool {
    headers
        .get(http::header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|cookie| cookie.split(';').any(|pair| pair.trim() == "logged_in=1"))
}

#[tokio::main]
async fn main() -> Result<()> {
    // In production, use Config::default() to load from config/{RUST_ENV}.toml
    let config: Config = r#"
[http]
bind_addr = "127.0.0.1"
bind_port = 3000
request_timeout = "30s"

[login]
slug = "back-office"
not_found_location = "/404/"

[logging]
format = "default"
"#
    .parse()?;

    config.setup_tracing();

    // Handlers share the router's shield, so a slug changed from the settings
    // page applies to the next request and is checked against the host routes.
    let site = SiteRouter::without_state(config)?.with_session_verifier(FnSession(logged_in));
    let shield = site.shield().clone();
    let settings_shield = shield.clone();
    println!("Login form at {}", shield.login_url(Some("http")));

    site.route("/", get(home))
        .route("/wp-login.php", get(login_form).post(login_form))
        .route(
            "/wp-admin/",
            get(move || std::future::ready(dashboard(&shield))),
        )
        .route(
            "/wp-admin/settings",
            post(move |Form(form): Form<SlugForm>| {
                std::future::ready(update_slug(&settings_shield, form))
            }),
        )
        .route("/logout", get(|| async { Redirect::to("/wp-login.php?loggedout=true") }))
        .setup_middleware()
        .start()
        .await
}
