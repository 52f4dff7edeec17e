use crate::Result;
use serde::Deserialize;

/// Selects which middleware layers are installed by `SiteRouter::setup_middleware`.
///
/// ```toml
/// [http.middleware]
/// exclude = ["timeout"]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMiddlewareConfig {
    Include(Vec<HttpMiddleware>),
    Exclude(Vec<HttpMiddleware>),
}

impl HttpMiddlewareConfig {
    pub fn is_enabled(&self, middleware: HttpMiddleware) -> bool {
        match self {
            HttpMiddlewareConfig::Include(list) => list.contains(&middleware),
            HttpMiddlewareConfig::Exclude(list) => !list.contains(&middleware),
        }
    }

    /// Validates the middleware selection.
    ///
    /// Request logging without the sensitive-headers layer would write login
    /// cookies and credentials to the logs. That combination is allowed but
    /// reported at `warn`.
    pub fn validate(&self) -> Result<()> {
        if self.is_enabled(HttpMiddleware::Logging)
            && !self.is_enabled(HttpMiddleware::SensitiveHeaders)
        {
            tracing::warn!(
                "Request logging is enabled without 'sensitive-headers'. \
                 Authorization and Cookie headers will appear in request logs."
            );
        }

        if !self.is_enabled(HttpMiddleware::LoginShield) {
            tracing::warn!(
                "The 'login-shield' middleware is disabled. The legacy login path is reachable."
            );
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum HttpMiddleware {
    LoginShield,
    SensitiveHeaders,
    RequestId,
    Logging,
    Timeout,
    CatchPanic,
}
