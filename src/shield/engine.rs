//! The interception step: turns a classification into a decision and rewrites
//! the routing inputs before the router sees them.

use {
    super::{classify::RequestClassification, routing::RoutingContext, slug::LoginSlug},
    crate::{Result, config::SiteConfig},
};

/// What the shield intends to do with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptionDecision {
    PassThrough,
    BlockWithNotFound,
    RouteToLoginHandler,
}

impl InterceptionDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PassThrough => "pass-through",
            Self::BlockWithNotFound => "block",
            Self::RouteToLoginHandler => "route-to-login",
        }
    }
}

/// Per-request state handed from the interception step to the access gate.
///
/// Also inserted into the request extensions so handlers can inspect it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub slug: LoginSlug,
    pub classification: RequestClassification,
    pub decision: InterceptionDecision,
    /// Set when the legacy login or registration script was requested.
    pub legacy_accessed: bool,
}

impl RequestContext {
    pub fn is_admin_route(&self) -> bool {
        self.classification == RequestClassification::AdminAreaAccess
    }
}

/// Maps classifications to decisions and applies the routing side effects.
#[derive(Debug, Clone)]
pub struct InterceptionEngine {
    login_page: String,
    dead_end: String,
}

impl InterceptionEngine {
    pub fn new(site: &SiteConfig) -> Self {
        let login_page = format!(
            "{}/{}",
            site.home_path(),
            site.legacy_login_path.trim_start_matches('/')
        );

        // A path no route will ever match.
        let mut dead_end = format!("{}/{}", site.home_path(), ["-"; 10].join("/"));
        if site.uses_trailing_slashes() {
            dead_end.push('/');
        }

        Self {
            login_page,
            dead_end,
        }
    }

    /// The page a custom slug request is dispatched to.
    pub fn login_page(&self) -> &str {
        &self.login_page
    }

    /// The page a blocked legacy request is pointed at.
    pub fn dead_end(&self) -> &str {
        &self.dead_end
    }

    pub fn decide(classification: RequestClassification) -> InterceptionDecision {
        match classification {
            RequestClassification::LegacyLoginAccess | RequestClassification::LegacyRegisterAccess => {
                InterceptionDecision::BlockWithNotFound
            }
            RequestClassification::CustomSlugAccess => InterceptionDecision::RouteToLoginHandler,
            RequestClassification::PostPassSubmission
            | RequestClassification::AdminAreaAccess
            | RequestClassification::Unrelated => InterceptionDecision::PassThrough,
        }
    }

    /// Decides and rewrites `routing` accordingly. Must run before the router
    /// dispatches the request.
    pub fn intercept<R: RoutingContext>(
        &self,
        slug: LoginSlug,
        classification: RequestClassification,
        routing: &mut R,
    ) -> Result<RequestContext> {
        let decision = Self::decide(classification);
        let legacy_accessed = decision == InterceptionDecision::BlockWithNotFound;

        match decision {
            InterceptionDecision::BlockWithNotFound => {
                routing.set_page(&self.dead_end)?;
            }
            InterceptionDecision::RouteToLoginHandler => {
                routing.set_page(&self.login_page)?;
                routing.set_script_name(slug.as_str());
            }
            InterceptionDecision::PassThrough => {}
        }

        Ok(RequestContext {
            slug,
            classification,
            decision,
            legacy_accessed,
        })
    }
}
