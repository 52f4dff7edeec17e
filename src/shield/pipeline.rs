//! [`LoginShield`]: the classification, interception and gate stages run in
//! order over one request.

use {
    super::{
        classify::{RequestClassification, RequestClassifier},
        engine::{InterceptionEngine, RequestContext},
        exemption::{CallerKind, ExemptionContext, ExemptionDetector},
        gate::{AccessGate, ExtensionSession, GateOutcome, SessionVerifier},
        rewrite::UrlRewriter,
        routes::RouteTable,
        routing::{HttpRoutingContext, RoutingContext},
        slug::{LoginSlug, SlugResolver},
    },
    crate::{
        Config, Result,
        config::{LoginConfig, SiteConfig},
        store::{ConfigurationStore, ENABLED_KEY, MemoryStore, SLUG_KEY},
        utils::decode_once,
    },
    dashmap::DashSet,
    http::{Method, Request},
    std::{fmt, sync::Arc},
};

/// Everything the pipeline learned about one request.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub context: RequestContext,
    pub exemptions: ExemptionContext,
    pub outcome: GateOutcome,
    pub rewriter: UrlRewriter,
}

/// Inputs of one request, independent of the HTTP types.
#[derive(Debug, Clone, Copy)]
pub struct RequestFacts<'a> {
    pub method: &'a Method,
    pub raw_path: &'a str,
    pub raw_query: Option<&'a str>,
    pub caller: Option<CallerKind>,
    pub authenticated: bool,
}

struct Shared {
    site: SiteConfig,
    login: LoginConfig,
    store: Arc<dyn ConfigurationStore>,
    resolver: SlugResolver,
    classifier: RequestClassifier,
    engine: InterceptionEngine,
    exemptions: ExemptionDetector,
    gate: AccessGate,
    // Raw values already reported as unusable, so the fallback warning is
    // logged once per value rather than once per request.
    reported: DashSet<String>,
}

/// The login shield.
///
/// Cheap to clone; clones share the settings store and the route table.
///
/// ```
/// use axum_login_shield::{Config, shield::LoginShield};
///
/// let config = Config::from_toml("").unwrap();
/// let shield = LoginShield::from_config(&config).unwrap();
/// assert_eq!(shield.current_slug().as_str(), "secure-login");
/// assert!(!shield.update_slug("wp-admin"));
/// assert!(shield.update_slug("Back Office"));
/// assert_eq!(shield.login_url(None), "/back-office/");
/// ```
#[derive(Clone)]
pub struct LoginShield {
    shared: Arc<Shared>,
    session: Arc<dyn SessionVerifier>,
}

impl fmt::Debug for LoginShield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginShield")
            .field("enabled", &self.is_enabled())
            .field("slug", &self.current_slug())
            .finish()
    }
}

impl LoginShield {
    /// Creates a shield with an in-memory store seeded from `[login]`.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_store(config, MemoryStore::from_login_config(&config.login))
    }

    /// Creates a shield that reads its slug and toggle from `store`.
    pub fn with_store(config: &Config, store: impl ConfigurationStore) -> Result<Self> {
        let routes = RouteTable::from_config(&config.site, &config.login);
        let shield = Self {
            shared: Arc::new(Shared {
                site: config.site.clone(),
                login: config.login.clone(),
                store: Arc::new(store),
                resolver: SlugResolver::new(routes.clone()),
                classifier: RequestClassifier::new(&config.site, routes),
                engine: InterceptionEngine::new(&config.site),
                exemptions: ExemptionDetector::new(
                    config.login.exemptions.clone(),
                    config.site.home_path(),
                ),
                gate: AccessGate::new(&config.site, &config.login)?,
                reported: DashSet::new(),
            }),
            session: Arc::new(ExtensionSession),
        };

        tracing::info!(
            enabled = shield.is_enabled(),
            login_url = %shield.login_url(None),
            "Login shield ready"
        );
        Ok(shield)
    }

    /// Replaces how authenticated sessions are recognised.
    #[must_use]
    pub fn with_session_verifier(mut self, verifier: impl SessionVerifier) -> Self {
        self.session = Arc::new(verifier);
        self
    }

    pub fn store(&self) -> &dyn ConfigurationStore {
        self.shared.store.as_ref()
    }

    /// The route table; register host routes here so they become reserved.
    pub fn routes(&self) -> &RouteTable {
        self.shared.resolver.routes()
    }

    pub fn resolver(&self) -> &SlugResolver {
        &self.shared.resolver
    }

    /// Whether the custom login URL feature is switched on.
    pub fn is_enabled(&self) -> bool {
        self.shared.store.flag(ENABLED_KEY, self.shared.login.enabled)
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.shared.store.set(ENABLED_KEY, &enabled.to_string())?;
        tracing::info!(enabled, "Custom login URL toggled");
        Ok(())
    }

    /// Resolves the slug from the store. Re-read on every call.
    pub fn current_slug(&self) -> LoginSlug {
        let raw = self.shared.store.get_or(SLUG_KEY, &self.shared.login.slug);
        match self.shared.resolver.validate(&raw) {
            Ok(slug) => {
                if !self.shared.reported.is_empty() {
                    self.shared.reported.remove(&raw);
                }
                slug
            }
            Err(_) if self.shared.reported.insert(raw.clone()) => self.shared.resolver.resolve(&raw),
            Err(_) => self.shared.resolver.fallback(),
        }
    }

    /// A rewriter for the current slug. Returns URLs unchanged while the
    /// feature is switched off.
    pub fn rewriter(&self) -> UrlRewriter {
        let rewriter = UrlRewriter::new(&self.shared.site, &self.shared.login, self.current_slug());
        if self.is_enabled() {
            rewriter
        } else {
            rewriter.disabled()
        }
    }

    /// The public login URL for the current slug.
    pub fn login_url(&self, scheme: Option<&str>) -> String {
        UrlRewriter::new(&self.shared.site, &self.shared.login, self.current_slug()).login_url(scheme)
    }

    /// Administrative slug update. Returns false and leaves the store alone when
    /// the value is empty or reserved.
    pub fn update_slug(&self, new_slug: &str) -> bool {
        match self.try_update_slug(new_slug) {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!(requested = %new_slug, error = %err, "Login slug update rejected");
                false
            }
        }
    }

    /// Like [`update_slug`](Self::update_slug) but returns the reason.
    pub fn try_update_slug(&self, new_slug: &str) -> Result<LoginSlug> {
        let slug = self.shared.resolver.validate(new_slug)?;
        self.shared.store.set(SLUG_KEY, slug.as_str())?;
        tracing::info!(login_url = %self.login_url(None), "Login slug updated");
        Ok(slug)
    }

    /// Runs classification, interception and the gate over `routing`.
    pub fn run<R: RoutingContext>(&self, facts: RequestFacts<'_>, routing: &mut R) -> Result<Inspection> {
        let shared = &self.shared;
        let slug = self.current_slug();
        let rewriter = UrlRewriter::new(&shared.site, &shared.login, slug.clone());

        let classification =
            shared
                .classifier
                .classify(&slug, facts.method, facts.raw_path, facts.raw_query);
        let context = shared.engine.intercept(slug, classification, routing)?;

        let decoded = decode_once(facts.raw_path);
        let exemptions = shared.exemptions.detect(&decoded, facts.raw_query, facts.caller);
        let outcome = shared.gate.evaluate(&context, facts.authenticated, &exemptions);

        tracing::debug!(
            path = %decoded,
            classification = classification.as_str(),
            decision = context.decision.as_str(),
            outcome = outcome.as_str(),
            exemption = exemptions.reason().unwrap_or("none"),
            "Login shield inspected request"
        );

        match (&outcome, classification) {
            (GateOutcome::NotFound, _) => tracing::info!(
                path = %decoded,
                classification = classification.as_str(),
                "Blocked direct request for the legacy login path"
            ),
            (GateOutcome::RedirectNotFound(_), RequestClassification::AdminAreaAccess) => {
                tracing::info!(path = %decoded, "Redirected anonymous admin request")
            }
            _ => {}
        }

        Ok(Inspection {
            context,
            exemptions,
            outcome,
            rewriter,
        })
    }

    /// Runs the pipeline over an HTTP request, rewriting its URI in place.
    ///
    /// Returns `None` while the feature is switched off. Otherwise the
    /// [`RequestContext`] and the [`UrlRewriter`] are added to the request
    /// extensions.
    pub fn inspect<B>(&self, request: &mut Request<B>) -> Result<Option<Inspection>> {
        if !self.is_enabled() {
            return Ok(None);
        }

        let method = request.method().clone();
        let raw_path = request.uri().path().to_string();
        let raw_query = request.uri().query().map(str::to_string);
        let caller = request.extensions().get::<CallerKind>().copied();
        let authenticated = self
            .session
            .is_authenticated(request.headers(), request.extensions());

        let facts = RequestFacts {
            method: &method,
            raw_path: &raw_path,
            raw_query: raw_query.as_deref(),
            caller,
            authenticated,
        };
        let inspection = self.run(facts, &mut HttpRoutingContext::new(request))?;

        request.extensions_mut().insert(inspection.context.clone());
        request.extensions_mut().insert(inspection.rewriter.clone());
        Ok(Some(inspection))
    }

    pub(crate) fn gate(&self) -> &AccessGate {
        &self.shared.gate
    }
}
