//! Tower layer that puts the [`LoginShield`] in front of a router.
//!
//! The layer has to wrap the router itself rather than be added with
//! `Router::layer`, because layers added to a router run after the route has
//! already been matched and rewriting the URI there has no effect.
//!
//! ```
//! use axum::{Router, routing::get};
//! use axum_login_shield::{Config, shield::{LoginShield, LoginShieldLayer}};
//! use tower::Layer;
//!
//! let shield = LoginShield::from_config(&Config::from_toml("").unwrap()).unwrap();
//! let app: Router = Router::new().route("/wp-login.php", get(|| async { "login form" }));
//! let service = LoginShieldLayer::new(shield).layer(app);
//! ```

use {
    super::{gate::GateOutcome, gate::suppress_caching, pipeline::LoginShield},
    axum::{
        body::Body,
        extract::Request,
        response::{IntoResponse, Response},
    },
    http::{HeaderValue, header::LOCATION},
    std::{
        future::Future,
        pin::Pin,
        task::{Context, Poll},
    },
    tower::{Layer, Service},
};

#[derive(Debug, Clone)]
pub struct LoginShieldLayer {
    shield: LoginShield,
}

impl LoginShieldLayer {
    pub fn new(shield: LoginShield) -> Self {
        Self { shield }
    }
}

impl<S> Layer<S> for LoginShieldLayer {
    type Service = LoginShieldService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoginShieldService {
            inner,
            shield: self.shield.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoginShieldService<S> {
    inner: S,
    shield: LoginShield,
}

impl<S> Service<Request> for LoginShieldService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let shield = self.shield.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let inspection = match shield.inspect(&mut req) {
                Ok(inspection) => inspection,
                Err(err) => return Ok(err.into_response()),
            };

            let Some(inspection) = inspection else {
                return inner.call(req).await;
            };

            let mut response = match inspection.outcome {
                GateOutcome::NotFound => return Ok(shield.gate().not_found_response().await),
                GateOutcome::RedirectNotFound(location) => {
                    return Ok(crate::shield::AccessGate::redirect_response(location));
                }
                GateOutcome::InvokeLoginHandler => {
                    let mut response = inner.call(req).await?;
                    suppress_caching(response.headers_mut());
                    response
                }
                GateOutcome::Proceed => inner.call(req).await?,
            };

            rewrite_location(&mut response, &inspection.rewriter);
            Ok(response)
        })
    }
}

fn rewrite_location(response: &mut Response, rewriter: &super::UrlRewriter) {
    let Some(location) = response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
    else {
        return;
    };

    let rewritten = rewriter.rewrite_redirect(location, response.status());
    if rewritten == location {
        return;
    }

    match HeaderValue::from_str(&rewritten) {
        Ok(value) => {
            response.headers_mut().insert(LOCATION, value);
        }
        Err(err) => tracing::warn!(error = %err, "Rewritten Location header is not a valid header value"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Config,
        shield::{AuthenticatedSession, CallerKind, RequestContext, ScriptName, UrlRewriter},
    };
    use axum::{
        Extension, Router,
        extract::OriginalUri,
        response::Redirect,
        routing::{get, post},
    };
    use http::{StatusCode, header::CACHE_CONTROL};
    use tower::ServiceExt;

    async fn login_handler(
        script: Option<Extension<ScriptName>>,
        OriginalUri(original): OriginalUri,
    ) -> String {
        let script = script.map(|Extension(s)| s.0).unwrap_or_default();
        format!("login form script={script} original={original}")
    }

    fn app() -> Router {
        Router::new()
            .route("/wp-login.php", get(login_handler).post(|| async { "postpass ok" }))
            .route("/wp-admin/", get(|| async { "dashboard" }))
            .route("/wp-admin/admin-ajax.php", post(|| async { "ajax" }))
            .route(
                "/logout",
                get(|| async { Redirect::to("/wp-login.php?loggedout=true") }),
            )
            .route(
                "/context",
                get(|ctx: Option<Extension<RequestContext>>, rw: Extension<UrlRewriter>| async move {
                    format!(
                        "{} {}",
                        ctx.map(|Extension(c)| c.classification.as_str()).unwrap_or("none"),
                        rw.rewrite("/wp-login.php", None, None)
                    )
                }),
            )
    }

    fn service() -> LoginShieldService<Router> {
        let shield = LoginShield::from_config(&Config::from_toml("").unwrap()).unwrap();
        LoginShieldLayer::new(shield).layer(app())
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn get_body_string(response: Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_legacy_login_is_not_found() {
        let response = service().oneshot(get_request("/wp-login.php")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers()[CACHE_CONTROL].to_str().unwrap().contains("no-store"));
        assert!(!get_body_string(response).await.contains("login form"));
    }

    #[tokio::test]
    async fn test_encoded_legacy_login_is_not_found() {
        let response = service().oneshot(get_request("/wp%2Dlogin.php")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_custom_slug_reaches_login_handler() {
        let response = service()
            .oneshot(get_request("/secure-login?action=lostpassword"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[CACHE_CONTROL].to_str().unwrap().contains("no-cache"));
        let body = get_body_string(response).await;
        assert!(body.contains("script=secure-login"));
        assert!(body.contains("original=/secure-login?action=lostpassword"));
    }

    #[tokio::test]
    async fn test_postpass_reaches_handler() {
        let request = Request::builder()
            .method("POST")
            .uri("/wp-login.php?action=postpass")
            .body(Body::empty())
            .unwrap();
        let response = service().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(get_body_string(response).await, "postpass ok");
    }

    #[tokio::test]
    async fn test_admin_redirects_anonymous_callers() {
        let response = service().oneshot(get_request("/wp-admin/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[LOCATION], "/404/");
    }

    #[tokio::test]
    async fn test_admin_allows_sessions_and_exempt_callers() {
        let mut request = get_request("/wp-admin/");
        request.extensions_mut().insert(AuthenticatedSession);
        let response = service().oneshot(request).await.unwrap();
        assert_eq!(get_body_string(response).await, "dashboard");

        let request = Request::builder()
            .method("POST")
            .uri("/wp-admin/admin-ajax.php")
            .body(Body::empty())
            .unwrap();
        let response = service().oneshot(request).await.unwrap();
        assert_eq!(get_body_string(response).await, "ajax");

        let mut request = get_request("/wp-admin/");
        request.extensions_mut().insert(CallerKind::CommandLine);
        let response = service().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_outgoing_redirect_is_rewritten() {
        let response = service().oneshot(get_request("/logout")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[LOCATION],
            "/secure-login/?loggedout=true"
        );
    }

    #[tokio::test]
    async fn test_handlers_see_context_and_rewriter() {
        let response = service().oneshot(get_request("/context")).await.unwrap();
        assert_eq!(get_body_string(response).await, "unrelated /secure-login/");
    }

    #[tokio::test]
    async fn test_disabled_shield_passes_everything() {
        let shield = LoginShield::from_config(
            &Config::from_toml("[login]\nenabled = false").unwrap(),
        )
        .unwrap();
        let service = LoginShieldLayer::new(shield).layer(app());

        let response = service
            .clone()
            .oneshot(get_request("/wp-login.php"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = service.oneshot(get_request("/logout")).await.unwrap();
        assert_eq!(
            response.headers()[LOCATION],
            "/wp-login.php?loggedout=true"
        );
    }

    #[tokio::test]
    async fn test_session_verifier_closure() {
        let shield = LoginShield::from_config(&Config::from_toml("").unwrap())
            .unwrap()
            .with_session_verifier(crate::shield::FnSession(
                |headers: &http::HeaderMap, _: &http::Extensions| headers.contains_key("x-user"),
            ));
        let service = LoginShieldLayer::new(shield).layer(app());

        let request = Request::builder()
            .uri("/wp-admin/")
            .header("x-user", "alice")
            .body(Body::empty())
            .unwrap();
        let response = service.oneshot(request).await.unwrap();
        assert_eq!(get_body_string(response).await, "dashboard");
    }
}
