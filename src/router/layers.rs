//! Ambient middleware: request ids, sensitive headers, request logging,
//! timeouts and panic recovery.

use super::site::SiteRouter;
use crate::{HttpMiddleware, RequestIdGenerator};

use {
    axum::{body::Body, response::Response},
    http::{
        HeaderName, Request, StatusCode,
        header::{AUTHORIZATION, COOKIE, SET_COOKIE},
    },
    tower_http::{
        catch_panic::CatchPanicLayer,
        request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
        sensitive_headers::SetSensitiveHeadersLayer,
        timeout::TimeoutLayer,
        trace::TraceLayer,
    },
};

impl<State> SiteRouter<State>
where
    State: Clone + Send + Sync + 'static,
{
    /// Sets up request ID middleware.
    ///
    /// 1. Generates or preserves `x-request-id` headers
    /// 2. Propagates the request ID to response headers
    ///
    /// Blocked login requests carry the id too, which makes them easy to find
    /// in the logs.
    #[must_use]
    pub fn setup_request_id(self) -> Self {
        if !self.is_middleware_enabled(HttpMiddleware::RequestId) {
            return self;
        }

        let x_request_id = HeaderName::from_static("x-request-id");
        self.map_outer(|outer| {
            outer
                .layer(SetRequestIdLayer::new(
                    x_request_id.clone(),
                    RequestIdGenerator,
                ))
                .layer(PropagateRequestIdLayer::new(x_request_id))
        })
    }

    /// Marks credential headers as sensitive so they never reach the logs.
    ///
    /// # Protected Headers
    ///
    /// - `Authorization`
    /// - `Cookie` (carries the login session)
    /// - `Set-Cookie`
    #[must_use]
    pub fn setup_sensitive_headers(self) -> Self {
        if !self.is_middleware_enabled(HttpMiddleware::SensitiveHeaders) {
            return self;
        }

        self.map_outer(|outer| {
            outer.layer(SetSensitiveHeadersLayer::new([
                AUTHORIZATION,
                COOKIE,
                SET_COOKIE,
            ]))
        })
    }

    /// Sets up request/response logging with a span per request.
    ///
    /// The span records the method, the path as sent by the client and the
    /// request id. The query string is left out so reset keys and similar
    /// login parameters are not written to the logs.
    #[must_use]
    pub fn setup_logging(self) -> Self {
        if !self.is_middleware_enabled(HttpMiddleware::Logging) {
            return self;
        }

        self.map_outer(|outer| {
            outer.layer(
                TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");

                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                        request_id = %request_id,
                    )
                }),
            )
        })
    }

    /// Sets up request timeout middleware.
    ///
    /// ```toml
    /// [http]
    /// request_timeout = "30s"  # Optional, uses humantime format
    /// ```
    ///
    /// Requests exceeding the timeout receive a `408 Request Timeout`.
    #[must_use]
    pub fn setup_timeout(self) -> Self {
        if !self.is_middleware_enabled(HttpMiddleware::Timeout) {
            return self;
        }

        match self.config.http.request_timeout {
            Some(timeout) => self.map_outer(move |outer| {
                outer.layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    timeout,
                ))
            }),
            None => self,
        }
    }

    /// Sets up panic catching middleware.
    ///
    /// When a handler panics the client receives a `500 Internal Server Error`,
    /// the panic message is logged and, if configured with
    /// `with_panic_notification_channel()`, sent to the channel.
    #[must_use]
    pub fn setup_catch_panic(self) -> Self {
        if !self.is_middleware_enabled(HttpMiddleware::CatchPanic) {
            return self;
        }

        let panic_channel = self.panic_channel.clone();
        self.map_outer(|outer| {
            outer.layer(CatchPanicLayer::custom(
                move |err: Box<dyn std::any::Any + Send + 'static>| {
                    let msg = if let Some(s) = err.downcast_ref::<String>() {
                        format!("Service panicked: {}", s)
                    } else if let Some(s) = err.downcast_ref::<&str>() {
                        format!("Service panicked: {}", s)
                    } else {
                        "`CatchPanic` was unable to downcast the panic info".to_string()
                    };

                    tracing::error!("{}", msg);
                    if let Some(ch) = &panic_channel {
                        ch.try_send(msg).ok();
                    }

                    Response::builder()
                        .status(StatusCode::INTERNAL_SERVER_ERROR)
                        .header(http::header::CONTENT_TYPE, "text/plain; charset=utf-8")
                        .body(Body::from("Internal Server Error"))
                        .unwrap_or_else(|_| Response::new(Body::from("Internal Server Error")))
                },
            ))
        })
    }
}
