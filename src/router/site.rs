//! Core SiteRouter struct and initialization methods.

use {
    super::shutdown::{ShutdownNotifier, ShutdownPhase},
    crate::{
        Config, HttpMiddleware, Result,
        shield::{LoginShield, LoginShieldLayer, SessionVerifier},
        store::ConfigurationStore,
    },
    axum::Router,
    tokio::sync::broadcast,
    tokio_util::sync::CancellationToken,
    tower::Layer,
};

/// Fluent builder for a site guarded by the login shield.
///
/// Host routes are added to the inner `axum::Router`. `setup_*` calls only
/// record their layer; [`SiteRouter::into_service`] wraps the host routes in
/// the [`LoginShieldLayer`] and then applies every recorded layer around the
/// shielded router, so blocked requests are still logged, get a request id
/// and are covered by panic recovery. Routes and layers can be added in any
/// order.
///
/// The first static segment of every route added with `route` or `nest` is
/// registered with the shield's route table, so the login slug can never
/// shadow a host route.
///
/// ```rust,no_run
/// use axum::routing::get;
/// use axum_login_shield::{Config, SiteRouter};
///
/// # async fn example() -> axum_login_shield::Result<()> {
/// SiteRouter::without_state(Config::default())?
///     .route("/wp-login.php", get(|| async { "login form" }))
///     .setup_middleware()
///     .start()
///     .await
/// # }
/// ```
pub(crate) type OuterLayer = Box<dyn FnOnce(Router) -> Router + Send>;

pub struct SiteRouter<State = ()> {
    pub(crate) config: Config,
    pub(crate) state: State,
    pub(crate) inner: Router<State>,
    pub(crate) layers: Vec<OuterLayer>,
    pub(crate) host_segments: Vec<String>,
    pub(crate) shield: LoginShield,
    pub(crate) panic_channel: Option<tokio::sync::mpsc::Sender<String>>,
    pub(crate) shutdown_notifier: ShutdownNotifier,
}

impl SiteRouter {
    /// Creates a new `SiteRouter` without application state.
    pub fn without_state(config: Config) -> Result<SiteRouter<()>> {
        SiteRouter::<()>::with_state(config, ())
    }
}

impl<State> SiteRouter<State>
where
    State: Clone + Send + Sync + 'static,
{
    /// Creates a new `SiteRouter` with the provided configuration.
    ///
    /// Validates the configuration and builds a [`LoginShield`] backed by an
    /// in-memory settings store seeded from `[login]`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails.
    pub fn with_state<S: Clone + Send + Sync + 'static>(
        config: Config,
        state: S,
    ) -> Result<SiteRouter<S>> {
        config.validate()?;
        let shield = LoginShield::from_config(&config)?;

        Ok(SiteRouter {
            config,
            state,
            inner: Router::new(),
            layers: Vec::new(),
            host_segments: Vec::new(),
            shield,
            panic_channel: None,
            shutdown_notifier: ShutdownNotifier::default(),
        })
    }

    /// Reads the login slug and toggle from `store` instead of the in-memory default.
    ///
    /// Replaces the shield, so a session verifier set earlier has to be set again.
    pub fn with_store(mut self, store: impl ConfigurationStore) -> Result<Self> {
        self.shield = LoginShield::with_store(&self.config, store)?;
        for segment in &self.host_segments {
            self.shield.routes().register_route(segment);
        }
        Ok(self)
    }

    /// Replaces how authenticated sessions are recognised by the admin gate.
    #[must_use]
    pub fn with_session_verifier(mut self, verifier: impl SessionVerifier) -> Self {
        self.shield = self.shield.with_session_verifier(verifier);
        self
    }

    /// The shield guarding this site. Use it for administrative slug updates
    /// or to register host routes as reserved words.
    #[must_use]
    pub fn shield(&self) -> &LoginShield {
        &self.shield
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns a reference to the shutdown notifier.
    #[must_use]
    pub fn shutdown_notifier(&self) -> &ShutdownNotifier {
        &self.shutdown_notifier
    }

    /// Returns a cancellation token that is triggered when shutdown begins.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown_notifier.cancellation_token()
    }

    #[must_use]
    pub fn subscribe_to_shutdown(&self) -> broadcast::Receiver<ShutdownPhase> {
        self.shutdown_notifier.subscribe()
    }

    pub(crate) fn is_middleware_enabled(&self, middleware: HttpMiddleware) -> bool {
        self.config
            .http
            .middleware
            .as_ref()
            .map(|config| config.is_enabled(middleware))
            .unwrap_or(true) // If no middleware config, all are enabled
    }

    /// Sends panic messages caught by `setup_catch_panic` to `ch`.
    #[must_use]
    pub fn with_panic_notification_channel(self, ch: tokio::sync::mpsc::Sender<String>) -> Self {
        Self {
            panic_channel: Some(ch),
            ..self
        }
    }

    /// Records `path` as a host route segment reserved against the login slug.
    pub(crate) fn reserve_host_path(&mut self, path: &str) {
        let Some(segment) = first_static_segment(path) else {
            return;
        };
        self.shield.routes().register_route(segment);
        self.host_segments.push(segment.to_string());
    }

    /// Records a layer to apply around the shielded router.
    pub(crate) fn map_outer(mut self, f: impl FnOnce(Router) -> Router + Send + 'static) -> Self {
        self.layers.push(Box::new(f));
        self
    }

    /// Wraps the host routes in the shield and applies the recorded layers,
    /// first recorded innermost.
    pub(crate) fn assemble(self) -> Router {
        let shield_enabled = self.is_middleware_enabled(HttpMiddleware::LoginShield);
        let routes = self.inner.with_state(self.state);

        let outer = if shield_enabled {
            Router::new().fallback_service(LoginShieldLayer::new(self.shield).layer(routes))
        } else {
            tracing::warn!("Login shield middleware is disabled by configuration");
            Router::new().fallback_service(routes)
        };

        self.layers
            .into_iter()
            .fold(outer, |router, layer| layer(router))
    }
}

/// The first path segment that is not a capture or wildcard, e.g. `shop` for
/// `/shop/{id}`. `None` for `/` and for paths starting with a capture.
fn first_static_segment(path: &str) -> Option<&str> {
    let segment = path.split('/').find(|s| !s.is_empty())?;
    if segment.starts_with('{') || segment.starts_with('*') || segment.starts_with(':') {
        None
    } else {
        Some(segment)
    }
}
