//! Login slug normalisation and resolution against the reserved path set.

use {
    super::routes::{ReservedPathSet, RouteTable},
    crate::{Error, Result},
    regex::Regex,
    std::{fmt, sync::LazyLock},
};

/// The slug used whenever the configured one cannot be used.
pub const DEFAULT_SLUG: &str = "secure-login";

static INVALID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9-]+").expect("static regex"));

static HYPHEN_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-{2,}").expect("static regex"));

/// The active login entry-point segment.
///
/// Always non-empty, lowercase and hyphen-delimited. A `LoginSlug` is only
/// handed out by [`SlugResolver`], so holding one means it was checked against
/// the reserved set at the time it was resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoginSlug(String);

impl LoginSlug {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LoginSlug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LoginSlug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lowercases the value and collapses whitespace and any other character that
/// is not URL-safe into single hyphens. Leading and trailing hyphens are dropped.
///
/// ```
/// use axum_login_shield::shield::normalize_slug;
///
/// assert_eq!(normalize_slug("  My Secret  Door! "), "my-secret-door");
/// assert_eq!(normalize_slug("///"), "");
/// ```
pub fn normalize_slug(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    let hyphenated = INVALID_CHARS.replace_all(&lowered, "-");
    let collapsed = HYPHEN_RUNS.replace_all(&hyphenated, "-");
    collapsed.trim_matches('-').to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Empty,
    Reserved,
}

impl Rejection {
    fn as_str(self) -> &'static str {
        match self {
            Rejection::Empty => "empty",
            Rejection::Reserved => "reserved",
        }
    }
}

/// Turns configured values into a usable [`LoginSlug`].
///
/// The reserved set is read from the [`RouteTable`] on every call, so a slug
/// that was fine yesterday falls back as soon as the host registers a route
/// with the same name. Callers re-resolve instead of caching.
#[derive(Debug, Clone)]
pub struct SlugResolver {
    routes: RouteTable,
}

impl SlugResolver {
    pub fn new(routes: RouteTable) -> Self {
        Self { routes }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Normalises `raw` and returns it, or the fallback slug when the value is
    /// empty or reserved. Never fails.
    pub fn resolve(&self, raw: &str) -> LoginSlug {
        let reserved = self.routes.reserved_set();
        match Self::check(raw, &reserved) {
            Ok(slug) => slug,
            Err(rejection) => {
                let fallback = Self::fallback_from(&reserved);
                tracing::warn!(
                    configured = %raw,
                    fallback = %fallback,
                    reason = rejection.as_str(),
                    "Configured login slug is unusable, falling back"
                );
                fallback
            }
        }
    }

    /// Like [`resolve`](Self::resolve) but reports the problem instead of
    /// falling back. Used by the administrative update path.
    pub fn validate(&self, raw: &str) -> Result<LoginSlug> {
        Self::check(raw, &self.routes.reserved_set()).map_err(|_| Error::invalid_slug(raw))
    }

    /// The slug used in place of an unusable configured value.
    pub fn fallback(&self) -> LoginSlug {
        Self::fallback_from(&self.routes.reserved_set())
    }

    /// Membership test against the current reserved path set.
    pub fn is_reserved(&self, slug: &str) -> bool {
        self.routes.reserved_set().contains(slug)
    }

    fn check(raw: &str, reserved: &ReservedPathSet) -> std::result::Result<LoginSlug, Rejection> {
        let normalized = normalize_slug(raw);
        if normalized.is_empty() {
            Err(Rejection::Empty)
        } else if reserved.contains(&normalized) {
            Err(Rejection::Reserved)
        } else {
            Ok(LoginSlug(normalized))
        }
    }

    // The reserved set is finite so a free suffix always exists.
    fn fallback_from(reserved: &ReservedPathSet) -> LoginSlug {
        if !reserved.contains(DEFAULT_SLUG) {
            return LoginSlug(DEFAULT_SLUG.to_string());
        }
        (1..)
            .map(|n| format!("{DEFAULT_SLUG}-{n}"))
            .find(|candidate| !reserved.contains(candidate))
            .map(LoginSlug)
            .unwrap_or_else(|| LoginSlug(DEFAULT_SLUG.to_string()))
    }
}
