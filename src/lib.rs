//! # axum-login-shield
//!
//! Moves the well-known login entry point of an Axum-hosted site to a
//! configurable slug, answers direct requests for the old path with a 404 and
//! keeps anonymous visitors out of the admin area. Configured through TOML.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use axum::routing::get;
//! use axum_login_shield::{Config, Result, SiteRouter};
//!
//! async fn login_form() -> &'static str {
//!     "<form>...</form>"
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::default(); // Loads from config/{RUST_ENV}.toml
//!     config.setup_tracing();
//!
//!     SiteRouter::without_state(config)?
//!         .route("/wp-login.php", get(login_form).post(login_form))
//!         .route("/wp-admin/", get(|| async { "dashboard" }))
//!         .setup_middleware()
//!         .start()
//!         .await
//! }
//! ```
//!
//! With `config/dev.toml`:
//! ```toml
//! [site]
//! home_url = "https://example.com"
//!
//! [login]
//! slug = "back-office"
//! ```
//!
//! The login form is now served at `/back-office/`, `/wp-login.php` answers
//! 404 and `/wp-admin/` redirects anonymous visitors to `/404/`.
//!
//! # What You Get
//!
//! | Feature | Description | Default |
//! |---------|-------------|---------|
//! | Login relocation | Login handler reachable only through the slug | `secure-login` |
//! | Legacy hiding | Encoded and case variants of the old path answer 404 | Enabled |
//! | Admin gate | Anonymous admin requests redirected to the not-found page | Enabled |
//! | Exemptions | Background jobs, cron, REST, form posts pass the gate | Enabled |
//! | Link rewriting | Redirects to the legacy script point at the slug | Enabled |
//! | Request logging | Structured logs with UUIDv7 correlation IDs | Enabled |
//! | Panic recovery | Catches panics, returns 500, keeps running | Enabled |
//! | Graceful shutdown | Handles SIGTERM, drains connections | 30s timeout |
//!
//! # Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`shield`] | Slug resolution, classification, interception, gate, rewriting |
//! | config | Configuration loading and validation ([`Config`]) |
//! | router | Site builder and ambient middleware ([`SiteRouter`]) |
//! | store | Settings storage ([`ConfigurationStore`], [`MemoryStore`]) |
//! | error | Error types and handling ([`Error`]) |
//!
//! # Using the shield without `SiteRouter`
//!
//! [`shield::LoginShieldLayer`] wraps any `axum::Router`:
//!
//! ```rust
//! use axum::{Router, routing::get};
//! use axum_login_shield::{Config, shield::{LoginShield, LoginShieldLayer}};
//! use tower::Layer;
//!
//! let config = Config::from_toml("[login]\nslug = \"door\"").unwrap();
//! let shield = LoginShield::from_config(&config).unwrap();
//! assert_eq!(shield.login_url(None), "/door/");
//!
//! let routes: Router = Router::new().route("/wp-login.php", get(|| async { "login form" }));
//! let app: Router = Router::new().fallback_service(LoginShieldLayer::new(shield).layer(routes));
//! ```

mod config;
mod error;
mod router;
pub mod shield;
mod store;
mod utils;

pub use config::*;
pub use error::*;
pub use router::*;
pub use shield::{GateOutcome, LoginShield, LoginSlug};
pub use store::*;
pub use utils::{RequestIdGenerator, replace_handlebars_with_env};

pub type Result<T> = std::result::Result<T, Error>;
