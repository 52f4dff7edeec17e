//! Rewriting outgoing references to the legacy login script.

use {
    super::{classify::is_postpass_query, slug::LoginSlug},
    crate::{
        config::{LoginConfig, SiteConfig},
        utils::decode_once,
    },
    http::StatusCode,
    std::sync::Arc,
    url::{Url, form_urlencoded},
};

/// Rewrites links, redirects and notification text so they point at the
/// custom login slug instead of the legacy login script.
///
/// A rewriter for the current request is available to handlers as an
/// extension:
///
/// ```
/// use axum::Extension;
/// use axum_login_shield::shield::UrlRewriter;
///
/// async fn lost_password_link(Extension(rewriter): Extension<UrlRewriter>) -> String {
///     rewriter.rewrite("/wp-login.php?action=lostpassword", None, None)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct UrlRewriter {
    slug: LoginSlug,
    enabled: bool,
    home_base: Arc<str>,
    clean_urls: bool,
    trailing_slashes: bool,
    legacy_login: Arc<str>,
    trusted_domains: Arc<[String]>,
}

impl UrlRewriter {
    pub fn new(site: &SiteConfig, login: &LoginConfig, slug: LoginSlug) -> Self {
        Self {
            slug,
            enabled: true,
            home_base: site.home_base().into(),
            clean_urls: site.uses_clean_urls(),
            trailing_slashes: site.uses_trailing_slashes(),
            legacy_login: site
                .legacy_login_path
                .trim_matches('/')
                .to_ascii_lowercase()
                .into(),
            trusted_domains: login
                .trusted_auth_domains
                .iter()
                .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    /// A rewriter that returns everything unchanged, for when the custom login
    /// URL feature is switched off.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn slug(&self) -> &LoginSlug {
        &self.slug
    }

    /// The public login URL, e.g. `https://example.com/secure-login/` or
    /// `https://example.com/?secure-login` on sites without clean URLs.
    /// `scheme` replaces the scheme of an absolute home URL.
    pub fn login_url(&self, scheme: Option<&str>) -> String {
        let url = if self.clean_urls {
            let mut url = format!("{}/{}", self.home_base, self.slug);
            if self.trailing_slashes {
                url.push('/');
            }
            url
        } else {
            format!("{}/?{}", self.home_base, self.slug)
        };
        with_scheme(url, scheme)
    }

    /// Points `url` at the custom slug when its path names the legacy login
    /// script. Query parameters and the fragment are carried over.
    ///
    /// With an absolute home URL the result is built on it. With a relative
    /// home URL an absolute `url` keeps its own scheme and authority.
    ///
    /// Left untouched: postpass form targets (also when `path` says so), links
    /// to trusted federated-login domains, and anything while disabled.
    /// Rewriting an already rewritten URL returns it unchanged.
    pub fn rewrite(&self, url: &str, path: Option<&str>, scheme: Option<&str>) -> String {
        if !self.enabled || !self.references_legacy(url) {
            return url.to_string();
        }

        let (without_fragment, fragment) = match url.split_once('#') {
            Some((head, fragment)) => (head, Some(fragment)),
            None => (url, None),
        };
        let query = without_fragment.split_once('?').map(|(_, q)| q);

        if is_postpass_query(query) || path.is_some_and(is_postpass_path) {
            return url.to_string();
        }

        if self.is_trusted_domain(url) {
            return url.to_string();
        }

        let mut rewritten = self.login_url_for(url, scheme);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            rewritten = set_query_args(
                &rewritten,
                form_urlencoded::parse(query.as_bytes()).into_owned(),
            );
        }
        if let Some(fragment) = fragment {
            rewritten.push('#');
            rewritten.push_str(fragment);
        }

        tracing::trace!(login_url = %self.login_url(None), "Rewrote login URL");
        rewritten
    }

    fn login_url_for(&self, url: &str, scheme: Option<&str>) -> String {
        let scheme = scheme.or_else(|| absolute_scheme(url));
        if absolute_scheme(&self.home_base).is_some() {
            return self.login_url(scheme);
        }

        match origin_of(url) {
            Some(origin) => with_scheme(format!("{origin}{}", self.login_url(None)), scheme),
            None => self.login_url(scheme),
        }
    }

    /// Rewrites a redirect target. The status is not changed.
    pub fn rewrite_redirect(&self, location: &str, status: StatusCode) -> String {
        let rewritten = self.rewrite(location, None, None);
        if rewritten != location {
            tracing::debug!(status = status.as_u16(), "Rewrote redirect to the login page");
        }
        rewritten
    }

    /// Rewrites a login link and adds the post-login redirect and the
    /// re-authentication flag. URLs that [`rewrite`](Self::rewrite) leaves
    /// alone (unrelated pages, postpass targets, trusted domains) are returned
    /// without the extra arguments.
    ///
    /// ```
    /// use axum_login_shield::{Config, shield::LoginShield};
    ///
    /// let shield = LoginShield::from_config(&Config::from_toml("").unwrap()).unwrap();
    /// let link = shield
    ///     .rewriter()
    ///     .rewrite_login_link("/wp-login.php", Some("/dashboard"), true);
    /// assert_eq!(link, "/secure-login/?redirect_to=%2Fdashboard&reauth=1");
    /// ```
    pub fn rewrite_login_link(
        &self,
        url: &str,
        redirect_target: Option<&str>,
        force_reauth: bool,
    ) -> String {
        let mut args = Vec::new();
        if let Some(target) = redirect_target.filter(|t| !t.is_empty()) {
            args.push(("redirect_to".to_string(), target.to_string()));
        }
        if force_reauth {
            args.push(("reauth".to_string(), "1".to_string()));
        }

        let rewritten = self.rewrite(url, None, None);
        if args.is_empty() || rewritten == url {
            rewritten
        } else {
            set_query_args(&rewritten, args)
        }
    }

    /// Replaces the legacy script name inside free text such as a welcome
    /// message with the slug-based path.
    pub fn rewrite_notification_text(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }

        let legacy = self.legacy_login.as_ref();
        if self.clean_urls {
            let mut replacement = self.slug.to_string();
            if self.trailing_slashes {
                replacement.push('/');
            }
            text.replace(legacy, &replacement)
        } else {
            text.replace(&format!("{legacy}?"), &format!("?{}&", self.slug))
                .replace(legacy, &format!("?{}", self.slug))
        }
    }

    fn references_legacy(&self, url: &str) -> bool {
        let path = url.split(['?', '#']).next().unwrap_or_default();
        decode_once(path)
            .to_ascii_lowercase()
            .contains(self.legacy_login.as_ref())
    }

    fn is_trusted_domain(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        self.trusted_domains.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

fn is_postpass_path(path: &str) -> bool {
    is_postpass_query(path.split_once('?').map(|(_, q)| q))
}

fn absolute_scheme(url: &str) -> Option<&'static str> {
    let lowered = url.get(..8).unwrap_or(url).to_ascii_lowercase();
    if lowered.starts_with("https://") {
        Some("https")
    } else if lowered.starts_with("http://") {
        Some("http")
    } else {
        None
    }
}

/// `scheme://host[:port]` of an absolute http(s) URL, or `//host[:port]` for a
/// protocol-relative one.
fn origin_of(url: &str) -> Option<String> {
    let relative_scheme = url.starts_with("//");
    let parsed = if relative_scheme {
        Url::parse(&format!("http:{url}")).ok()?
    } else {
        Url::parse(url).ok()?
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    let host = parsed.host_str()?;
    let authority = match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Some(if relative_scheme {
        format!("//{authority}")
    } else {
        format!("{}://{authority}", parsed.scheme())
    })
}

fn with_scheme(url: String, scheme: Option<&str>) -> String {
    match (scheme, url.split_once("://")) {
        (Some(scheme @ ("http" | "https")), Some((_, rest))) => format!("{scheme}://{rest}"),
        _ => url,
    }
}

/// Sets query arguments on `url`, replacing existing keys and keeping the rest
/// in order. Keys with an empty value are written bare (`?secure-login`).
pub(crate) fn set_query_args(
    url: &str,
    args: impl IntoIterator<Item = (String, String)>,
) -> String {
    let (base, query) = match url.split_once('?') {
        Some((base, query)) => (base, query),
        None => (url, ""),
    };

    let mut pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    for (key, value) in args {
        match pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(existing) => existing.1 = value,
            None => pairs.push((key, value)),
        }
    }

    if pairs.is_empty() {
        return base.to_string();
    }

    let query = pairs
        .iter()
        .map(|(key, value)| {
            let key: String = form_urlencoded::byte_serialize(key.as_bytes()).collect();
            if value.is_empty() {
                key
            } else {
                let value: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
                format!("{key}={value}")
            }
        })
        .collect::<Vec<_>>()
        .join("&");
    format!("{base}?{query}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shield::{RouteTable, SlugResolver};
    use proptest::prelude::*;

    fn rewriter_with(site: SiteConfig) -> UrlRewriter {
        let slug = SlugResolver::new(RouteTable::new("/wp-admin")).resolve("secure-login");
        UrlRewriter::new(&site, &LoginConfig::default(), slug)
    }

    fn rewriter() -> UrlRewriter {
        rewriter_with(SiteConfig {
            home_url: "https://example.com".into(),
            ..SiteConfig::default()
        })
    }

    fn query_rewriter() -> UrlRewriter {
        rewriter_with(SiteConfig {
            home_url: "https://example.com".into(),
            permalink_structure: String::new(),
            ..SiteConfig::default()
        })
    }

    #[test]
    fn test_login_url() {
        assert_eq!(rewriter().login_url(None), "https://example.com/secure-login/");
        assert_eq!(
            rewriter().login_url(Some("http")),
            "http://example.com/secure-login/"
        );
        assert_eq!(query_rewriter().login_url(None), "https://example.com/?secure-login");
        assert_eq!(
            rewriter_with(SiteConfig::default()).login_url(Some("https")),
            "/secure-login/"
        );
    }

    #[test]
    fn test_rewrite_preserves_query_and_fragment() {
        let r = rewriter();
        assert_eq!(
            r.rewrite("https://example.com/wp-login.php?action=lostpassword#top", None, None),
            "https://example.com/secure-login/?action=lostpassword#top"
        );
        assert_eq!(
            r.rewrite("/wp-login.php?action=rp&key=a%20b", None, None),
            "https://example.com/secure-login/?action=rp&key=a+b"
        );
    }

    #[test]
    fn test_rewrite_uses_requested_scheme() {
        assert_eq!(
            rewriter().rewrite("http://example.com/wp-login.php", None, None),
            "http://example.com/secure-login/"
        );
        assert_eq!(
            rewriter().rewrite("http://example.com/wp-login.php", None, Some("https")),
            "https://example.com/secure-login/"
        );
    }

    #[test]
    fn test_rewrite_query_form() {
        assert_eq!(
            query_rewriter().rewrite("https://example.com/wp-login.php?action=register", None, None),
            "https://example.com/?secure-login&action=register"
        );
    }

    #[test]
    fn test_rewrite_skips_postpass_and_trusted_domains() {
        let r = rewriter();
        let postpass = "https://example.com/wp-login.php?action=postpass";
        assert_eq!(r.rewrite(postpass, None, None), postpass);
        assert_eq!(
            r.rewrite("https://example.com/wp-login.php", Some("wp-login.php?action=postpass"), None),
            "https://example.com/wp-login.php"
        );

        let federated = "https://wordpress.com/wp-login.php?redirect_to=x";
        assert_eq!(r.rewrite(federated, None, None), federated);
        let sub = "https://auth.wordpress.com/wp-login.php";
        assert_eq!(r.rewrite(sub, None, None), sub);
        assert_eq!(
            r.rewrite("https://notwordpress.com/wp-login.php", None, None),
            "https://example.com/secure-login/"
        );
    }

    #[test]
    fn test_rewrite_ignores_unrelated_urls() {
        let r = rewriter();
        assert_eq!(r.rewrite("/hello-world/", None, None), "/hello-world/");
        assert_eq!(
            r.rewrite("/search?q=wp-login.php", None, None),
            "/search?q=wp-login.php"
        );
    }

    #[test]
    fn test_disabled_rewriter_is_identity() {
        let r = rewriter().disabled();
        assert!(!r.is_enabled());
        assert_eq!(r.rewrite("/wp-login.php", None, None), "/wp-login.php");
        assert_eq!(
            r.rewrite_notification_text("Log in at /wp-login.php"),
            "Log in at /wp-login.php"
        );
    }

    #[test]
    fn test_rewrite_redirect() {
        assert_eq!(
            rewriter().rewrite_redirect("/wp-login.php?loggedout=true", StatusCode::FOUND),
            "https://example.com/secure-login/?loggedout=true"
        );
        assert_eq!(
            rewriter().rewrite_redirect("/wp-admin/", StatusCode::SEE_OTHER),
            "/wp-admin/"
        );
    }

    #[test]
    fn test_rewrite_login_link() {
        let link = rewriter().rewrite_login_link(
            "https://example.com/wp-login.php",
            Some("/dashboard"),
            true,
        );
        assert!(link.starts_with("https://example.com/secure-login/?"));
        assert!(link.contains("redirect_to=%2Fdashboard"));
        assert!(link.contains("reauth=1"));

        let replaced = rewriter().rewrite_login_link(
            "/wp-login.php?redirect_to=%2Fold&reauth=0",
            Some("/new"),
            true,
        );
        assert_eq!(
            replaced,
            "https://example.com/secure-login/?redirect_to=%2Fnew&reauth=1"
        );

        assert_eq!(
            rewriter().rewrite_login_link("/wp-login.php", None, false),
            "https://example.com/secure-login/"
        );
    }

    #[test]
    fn test_rewrite_keeps_origin_with_relative_home() {
        let r = rewriter_with(SiteConfig::default());
        assert_eq!(
            r.rewrite("https://example.com/wp-login.php?a=1", None, None),
            "https://example.com/secure-login/?a=1"
        );
        assert_eq!(
            r.rewrite("http://localhost:8080/wp-login.php#form", None, None),
            "http://localhost:8080/secure-login/#form"
        );
        assert_eq!(
            r.rewrite("http://example.com/wp-login.php", None, Some("https")),
            "https://example.com/secure-login/"
        );
        assert_eq!(
            r.rewrite("//cdn.example.com/wp-login.php", None, None),
            "//cdn.example.com/secure-login/"
        );
        assert_eq!(r.rewrite("/wp-login.php?a=1", None, None), "/secure-login/?a=1");
    }

    #[test]
    fn test_login_link_leaves_other_urls_alone() {
        let r = rewriter();
        assert_eq!(
            r.rewrite_login_link("/some/page", Some("/dashboard"), true),
            "/some/page"
        );

        let postpass = "/wp-login.php?action=postpass";
        assert_eq!(r.rewrite_login_link(postpass, Some("/d"), true), postpass);

        let federated = "https://wordpress.com/wp-login.php";
        assert_eq!(r.rewrite_login_link(federated, Some("/d"), true), federated);

        assert_eq!(
            r.disabled().rewrite_login_link("/wp-login.php", Some("/d"), true),
            "/wp-login.php"
        );
    }

    #[test]
    fn test_rewrite_notification_text() {
        let text = "Set your password: https://example.com/wp-login.php?action=rp&key=abc";
        assert_eq!(
            rewriter().rewrite_notification_text(text),
            "Set your password: https://example.com/secure-login/?action=rp&key=abc"
        );
        assert_eq!(
            query_rewriter().rewrite_notification_text(text),
            "Set your password: https://example.com/?secure-login&action=rp&key=abc"
        );
        assert_eq!(
            query_rewriter().rewrite_notification_text("Log in: https://example.com/wp-login.php"),
            "Log in: https://example.com/?secure-login"
        );
    }

    #[test]
    fn test_set_query_args() {
        assert_eq!(
            set_query_args("/x", vec![("a".into(), "1".into())]),
            "/x?a=1"
        );
        assert_eq!(
            set_query_args("/x?a=1&b=2", vec![("a".into(), "3".into())]),
            "/x?a=3&b=2"
        );
        assert_eq!(set_query_args("/x?", Vec::new()), "/x");
    }

    proptest! {
        #[test]
        fn prop_rewrite_is_idempotent(
            host in prop::sample::select(vec!["", "https://example.com", "http://wordpress.com", "https://cdn.example.org"]),
            dir in "(/[a-z]{1,6}){0,2}",
            script in prop::sample::select(vec!["wp-login.php", "WP-Login.PHP", "index.php", "secure-login/", ""]),
            query in prop::option::of("[a-z]{1,5}=[a-z0-9%]{0,6}(&[a-z_]{1,8}=[a-z0-9]{0,4}){0,2}"),
            clean in any::<bool>(),
        ) {
            let r = if clean { rewriter() } else { query_rewriter() };
            let mut url = format!("{host}{dir}/{script}");
            if let Some(q) = query {
                url.push('?');
                url.push_str(&q);
            }
            let once = r.rewrite(&url, None, None);
            let twice = r.rewrite(&once, None, None);
            prop_assert_eq!(once, twice);
        }
    }
}
