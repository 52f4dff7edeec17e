//! The access gate: the final word on blocked, redirected and login requests.

use {
    super::{engine::InterceptionDecision, engine::RequestContext, exemption::ExemptionContext},
    crate::{
        Result,
        config::{LoginConfig, SiteConfig},
    },
    axum::{
        body::Body,
        response::{IntoResponse, Response},
    },
    http::{
        Extensions, HeaderMap, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, EXPIRES, LAST_MODIFIED, LOCATION, PRAGMA},
    },
    std::{path::PathBuf, sync::Arc},
};

const MINIMAL_NOT_FOUND: &str = "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Page not found</title></head>\
<body><h1>Page not found.</h1></body></html>\n";

/// What the gate decided for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Render a 404 page and stop.
    NotFound,
    /// Send the caller to the generic not-found location and stop.
    RedirectNotFound(HeaderValue),
    /// Run the login handler with caching suppressed.
    InvokeLoginHandler,
    Proceed,
}

impl GateOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not-found",
            Self::RedirectNotFound(_) => "redirect-not-found",
            Self::InvokeLoginHandler => "login-handler",
            Self::Proceed => "proceed",
        }
    }
}

/// Marker extension meaning the request carries an authenticated session.
///
/// Inserted by whatever authentication layer runs in front of the shield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthenticatedSession;

/// Decides whether a request belongs to a logged-in user.
pub trait SessionVerifier: Send + Sync + 'static {
    fn is_authenticated(&self, headers: &HeaderMap, extensions: &Extensions) -> bool;
}

/// Trusts the [`AuthenticatedSession`] extension. This is the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionSession;

impl SessionVerifier for ExtensionSession {
    fn is_authenticated(&self, _headers: &HeaderMap, extensions: &Extensions) -> bool {
        extensions.get::<AuthenticatedSession>().is_some()
    }
}

/// Adapts a closure into a [`SessionVerifier`].
///
/// ```
/// use axum_login_shield::shield::FnSession;
///
/// let verifier = FnSession(|headers: &http::HeaderMap, _: &http::Extensions| {
///     headers
///         .get(http::header::COOKIE)
///         .and_then(|v| v.to_str().ok())
///         .is_some_and(|c| c.contains("logged_in="))
/// });
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FnSession<F>(pub F);

impl<F> SessionVerifier for FnSession<F>
where
    F: Fn(&HeaderMap, &Extensions) -> bool + Send + Sync + 'static,
{
    fn is_authenticated(&self, headers: &HeaderMap, extensions: &Extensions) -> bool {
        (self.0)(headers, extensions)
    }
}

/// Marks a response as uncacheable and strips validators.
pub fn suppress_caching(headers: &mut HeaderMap) {
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-cache, must-revalidate, max-age=0, no-store, private"),
    );
    headers.insert(EXPIRES, HeaderValue::from_static("Wed, 11 Jan 1984 05:00:00 GMT"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.remove(LAST_MODIFIED);
    headers.remove(ETAG);
}

#[derive(Debug, Clone)]
pub struct AccessGate {
    redirect_location: HeaderValue,
    template: Option<Arc<PathBuf>>,
}

impl AccessGate {
    pub fn new(site: &SiteConfig, login: &LoginConfig) -> Result<Self> {
        let location = format!(
            "{}/{}",
            site.home_base(),
            login.not_found_location.trim().trim_start_matches('/')
        );
        Ok(Self {
            redirect_location: HeaderValue::from_str(&location)?,
            template: login.not_found_template.clone().map(Arc::new),
        })
    }

    pub fn redirect_location(&self) -> &HeaderValue {
        &self.redirect_location
    }

    /// Applies the gate rules in order: legacy access is a 404, anonymous
    /// non-exempt admin access is redirected, a custom slug request runs the
    /// login handler, and everything else proceeds.
    pub fn evaluate(
        &self,
        ctx: &RequestContext,
        authenticated: bool,
        exemptions: &ExemptionContext,
    ) -> GateOutcome {
        if ctx.legacy_accessed {
            GateOutcome::NotFound
        } else if ctx.is_admin_route() && !authenticated && !exemptions.is_exempt() {
            GateOutcome::RedirectNotFound(self.redirect_location.clone())
        } else if ctx.decision == InterceptionDecision::RouteToLoginHandler {
            GateOutcome::InvokeLoginHandler
        } else {
            GateOutcome::Proceed
        }
    }

    /// 404 page for blocked requests. Uses the configured template when it can
    /// be read and a minimal page otherwise.
    pub async fn not_found_response(&self) -> Response {
        let body = match &self.template {
            Some(path) => match tokio::fs::read_to_string(path.as_path()).await {
                Ok(html) => html,
                Err(err) => {
                    tracing::warn!(
                        template = %path.display(),
                        error = %err,
                        "Unable to read not-found template, using the built-in page"
                    );
                    MINIMAL_NOT_FOUND.to_string()
                }
            },
            None => MINIMAL_NOT_FOUND.to_string(),
        };

        let mut response = (StatusCode::NOT_FOUND, Body::from(body)).into_response();
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        suppress_caching(response.headers_mut());
        response
    }

    pub fn redirect_response(location: HeaderValue) -> Response {
        let mut response = StatusCode::FOUND.into_response();
        response.headers_mut().insert(LOCATION, location);
        response
    }
}
