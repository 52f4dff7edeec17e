//! Orchestration and router delegation: setup_middleware(), start(), route(), etc.

use super::shutdown::{ShutdownNotifier, ShutdownPhase};
use super::site::SiteRouter;
use crate::Result;

use {
    axum::{Router, routing::MethodRouter},
    std::{net::SocketAddr, time::Duration},
    tokio::signal,
};

impl<State> SiteRouter<State>
where
    State: Clone + Send + Sync + 'static,
{
    /// Sets up all standard middleware layers in the correct order.
    ///
    /// # Middleware Order
    ///
    /// The **last layer added is the outermost layer** and executes **first**
    /// on incoming requests. From innermost to outermost:
    ///
    /// 0. **Login shield** - wraps the host routes, runs before routing
    /// 1. **Sensitive headers** - hide credentials before logging
    /// 2. **Logging** - log all requests, including blocked ones
    /// 3. **Timeout** - set timeout boundary for everything (optional)
    /// 4. **Request ID** - generate/extract ID for tracing
    /// 5. **Panic catching** - catch ALL panics from inner layers (outermost)
    ///
    /// Each layer can be skipped with `[http.middleware] exclude = [...]`.
    #[must_use]
    pub fn setup_middleware(self) -> Self {
        const PACKAGE_NAME: &str = env!("CARGO_PKG_NAME");
        const VERSION: &str = env!("CARGO_PKG_VERSION");
        tracing::info!("Starting {PACKAGE_NAME} version {VERSION}...");

        self.setup_sensitive_headers() // 1. Filter sensitive headers
            .setup_logging() // 2. Request/response logging
            .setup_timeout() // 3. Request timeout (optional)
            .setup_request_id() // 4. Request ID - early so all requests get IDs
            .setup_catch_panic() // 5. Outermost - panic recovery
    }

    /// Returns the finished service: host routes behind the shield plus every
    /// layer set up so far.
    pub fn into_service(self) -> Router {
        self.assemble()
    }

    /// Starts the HTTP server based on the current configuration.
    ///
    /// On SIGTERM or SIGINT the server stops accepting connections, emits
    /// [`ShutdownPhase::Initiated`] and [`ShutdownPhase::GracePeriodStarted`],
    /// and waits up to `shutdown_timeout` for in-flight requests before
    /// emitting [`ShutdownPhase::GracePeriodEnded`] and exiting.
    pub async fn start(self) -> Result<()> {
        let bind_addr = self.config.http.full_bind_addr();
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        tracing::info!("Bound to {}", &bind_addr);
        tracing::info!(login_url = %self.shield.login_url(None), "Waiting for connections");

        let shutdown_timeout = self.config.http.shutdown_timeout;
        let shutdown_notifier = self.shutdown_notifier.clone();
        let mut shutdown_rx = shutdown_notifier.subscribe();

        let service = self
            .into_service()
            .into_make_service_with_connect_info::<SocketAddr>();

        let serve_future = axum::serve(listener, service).with_graceful_shutdown(
            shutdown_signal_with_notifications(shutdown_timeout, shutdown_notifier.clone()),
        );

        // The timeout only starts once a shutdown signal has been received.
        tokio::select! {
            result = serve_future => {
                tracing::info!("Graceful shutdown completed");
                result?;
            }
            _ = async {
                loop {
                    match shutdown_rx.recv().await {
                        Ok(ShutdownPhase::Initiated) => break,
                        Ok(_) => continue,
                        Err(_) => return,
                    }
                }
                tokio::time::sleep(shutdown_timeout).await;
            } => {
                tracing::warn!("Graceful shutdown timeout expired, forcing shutdown");
                shutdown_notifier.emit(ShutdownPhase::GracePeriodEnded);
            }
        }

        Ok(())
    }

    /// Adds a new route to the host router at the specified path.
    ///
    /// The first static segment of `path` becomes a reserved word, so the
    /// login slug falls back instead of shadowing the route.
    #[must_use]
    pub fn route(mut self, path: &str, route: MethodRouter<State>) -> Self {
        self.reserve_host_path(path);
        self.inner = self.inner.route(path, route);
        self
    }

    /// Nests another router at a specific path prefix. The prefix is reserved
    /// like a route path.
    #[must_use]
    pub fn nest(mut self, path: &str, router: Router<State>) -> Self {
        self.reserve_host_path(path);
        self.inner = self.inner.nest(path, router);
        self
    }

    /// Merges another router into this one.
    ///
    /// The paths of a merged router cannot be read back, so they are not
    /// reserved. Register them with `shield().routes().register_route()` or
    /// list them in `[site] registered_routes`.
    #[must_use]
    pub fn merge<R>(mut self, other: R) -> Self
    where
        R: Into<Router<State>>,
    {
        self.inner = self.inner.merge(other);
        self
    }

    /// Sets the handler for requests no route matches, such as the dead-end
    /// path blocked legacy requests are pointed at.
    #[must_use]
    pub fn fallback<H, T>(mut self, handler: H) -> Self
    where
        H: axum::handler::Handler<T, State>,
        T: 'static,
    {
        self.inner = self.inner.fallback(handler);
        self
    }
}

/// Returns a signal handler that emits shutdown phase notifications.
///
/// Waits for SIGTERM or SIGINT (Ctrl+C), emits [`ShutdownPhase::Initiated`]
/// and [`ShutdownPhase::GracePeriodStarted`], then returns so axum can start
/// draining connections.
pub(crate) async fn shutdown_signal_with_notifications(
    timeout: Duration,
    notifier: ShutdownNotifier,
) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {
                tracing::debug!("Ctrl+C signal received");
            }
            Err(err) => {
                tracing::warn!("Failed to install Ctrl+C handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal_handler) => {
                signal_handler.recv().await;
                tracing::debug!("SIGTERM signal received");
            }
            Err(err) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!(
        "Shutdown signal received, starting graceful shutdown (timeout: {}s)",
        timeout.as_secs()
    );
    let subscriber_count = notifier.emit(ShutdownPhase::Initiated);
    tracing::debug!(
        "Shutdown initiated notification sent to {} subscriber(s)",
        subscriber_count
    );

    notifier.emit(ShutdownPhase::GracePeriodStarted { timeout });
}
