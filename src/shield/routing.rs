//! Read/write access to the routing inputs of a request.
//!
//! The interception engine never touches an HTTP request directly. It goes
//! through [`RoutingContext`], which the service implements over the real
//! request ([`HttpRoutingContext`]) and tests implement in memory
//! ([`InMemoryRoutingContext`]).

use {
    crate::{Error, ErrorKind, Result},
    axum::extract::OriginalUri,
    http::{Request, Uri, uri::PathAndQuery},
};

/// The two pieces of routing state the engine rewrites: which page the router
/// will dispatch, and which script name the request reports.
pub trait RoutingContext {
    /// The page (path) the router will dispatch.
    fn page(&self) -> &str;

    /// Points the router at a different page. The query string is kept.
    fn set_page(&mut self, page: &str) -> Result<()>;

    fn script_name(&self) -> Option<&str>;

    fn set_script_name(&mut self, name: &str);
}

/// Script name recorded for a request that was routed to the login handler.
///
/// Handlers see it as a request extension:
///
/// ```
/// use axum::Extension;
/// use axum_login_shield::shield::ScriptName;
///
/// async fn login(script: Option<Extension<ScriptName>>) -> String {
///     script.map(|Extension(s)| s.0).unwrap_or_default()
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptName(pub String);

/// [`RoutingContext`] over an in-flight HTTP request.
///
/// The first page change stores the URI the client actually sent as
/// [`OriginalUri`] so handlers behind the router can still see it.
pub struct HttpRoutingContext<'a, B> {
    request: &'a mut Request<B>,
}

impl<'a, B> HttpRoutingContext<'a, B> {
    pub fn new(request: &'a mut Request<B>) -> Self {
        Self { request }
    }
}

impl<B> RoutingContext for HttpRoutingContext<'_, B> {
    fn page(&self) -> &str {
        self.request.uri().path()
    }

    fn set_page(&mut self, page: &str) -> Result<()> {
        let uri = self.request.uri().clone();
        let path_and_query = match uri.query() {
            Some(query) => format!("{page}?{query}"),
            None => page.to_string(),
        };

        let mut parts = uri.clone().into_parts();
        parts.path_and_query = Some(path_and_query.parse::<PathAndQuery>()?);
        let rewritten = Uri::from_parts(parts).map_err(|e| Error::new(ErrorKind::InvalidInput, e))?;

        if self.request.extensions().get::<OriginalUri>().is_none() {
            self.request.extensions_mut().insert(OriginalUri(uri));
        }
        *self.request.uri_mut() = rewritten;
        Ok(())
    }

    fn script_name(&self) -> Option<&str> {
        self.request
            .extensions()
            .get::<ScriptName>()
            .map(|name| name.0.as_str())
    }

    fn set_script_name(&mut self, name: &str) {
        self.request
            .extensions_mut()
            .insert(ScriptName(name.to_string()));
    }
}

/// [`RoutingContext`] that only records what was set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryRoutingContext {
    pub page: String,
    pub script_name: Option<String>,
}

impl InMemoryRoutingContext {
    pub fn new(page: &str) -> Self {
        Self {
            page: page.to_string(),
            script_name: None,
        }
    }
}

impl RoutingContext for InMemoryRoutingContext {
    fn page(&self) -> &str {
        &self.page
    }

    fn set_page(&mut self, page: &str) -> Result<()> {
        self.page = page.to_string();
        Ok(())
    }

    fn script_name(&self) -> Option<&str> {
        self.script_name.as_deref()
    }

    fn set_script_name(&mut self, name: &str) {
        self.script_name = Some(name.to_string());
    }
}
