//! Sorting incoming requests into the handful of cases the shield cares about.

use {
    super::{routes::RouteTable, slug::LoginSlug},
    crate::{
        config::SiteConfig,
        utils::{decode_once, untrailing_slash_it},
    },
    http::Method,
    url::form_urlencoded,
};

/// What an incoming request is, as far as the login entry point is concerned.
///
/// Derived from the method, path and query alone and recomputed for every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClassification {
    /// A direct request for the well-known login script.
    LegacyLoginAccess,
    /// A direct request for the well-known registration script.
    LegacyRegisterAccess,
    /// A password-protected content form posted to the login script.
    PostPassSubmission,
    /// A request for the custom login slug.
    CustomSlugAccess,
    /// Anything under the administrative area.
    AdminAreaAccess,
    Unrelated,
}

impl RequestClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LegacyLoginAccess => "legacy-login",
            Self::LegacyRegisterAccess => "legacy-register",
            Self::PostPassSubmission => "postpass",
            Self::CustomSlugAccess => "custom-slug",
            Self::AdminAreaAccess => "admin-area",
            Self::Unrelated => "unrelated",
        }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::LegacyLoginAccess | Self::LegacyRegisterAccess)
    }
}

/// Returns true when the query carries `action=postpass`.
pub(crate) fn is_postpass_query(raw_query: Option<&str>) -> bool {
    raw_query.is_some_and(|query| {
        form_urlencoded::parse(query.as_bytes()).any(|(key, value)| key == "action" && value == "postpass")
    })
}

pub(crate) fn query_has_key(raw_query: Option<&str>, wanted: &str) -> bool {
    raw_query.is_some_and(|query| {
        form_urlencoded::parse(query.as_bytes()).any(|(key, _)| key == wanted)
    })
}

/// Classifies requests for one site.
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    legacy_login: String,
    legacy_register: String,
    home_path: String,
    clean_urls: bool,
    routes: RouteTable,
}

impl RequestClassifier {
    pub fn new(site: &SiteConfig, routes: RouteTable) -> Self {
        Self {
            legacy_login: site.legacy_login_path.trim_matches('/').to_ascii_lowercase(),
            legacy_register: site.legacy_register_path.trim_matches('/').to_ascii_lowercase(),
            home_path: site.home_path(),
            clean_urls: site.uses_clean_urls(),
            routes,
        }
    }

    /// Classifies one request. First match wins:
    ///
    /// 1. the legacy login or registration script, unless it is a postpass form
    /// 2. a postpass form on one of those scripts
    /// 3. the custom slug (`/slug`, `/slug/`, or `/?slug` without clean URLs)
    /// 4. the administrative area
    /// 5. anything else
    ///
    /// The path is percent-decoded exactly once before matching. The legacy
    /// check ignores ASCII case.
    pub fn classify(
        &self,
        slug: &LoginSlug,
        method: &Method,
        raw_path: &str,
        raw_query: Option<&str>,
    ) -> RequestClassification {
        let decoded = decode_once(raw_path);
        let lowered = decoded.to_ascii_lowercase();

        let classification = if lowered.contains(&self.legacy_login) {
            if is_postpass_query(raw_query) {
                RequestClassification::PostPassSubmission
            } else {
                RequestClassification::LegacyLoginAccess
            }
        } else if lowered.contains(&self.legacy_register) {
            if is_postpass_query(raw_query) {
                RequestClassification::PostPassSubmission
            } else {
                RequestClassification::LegacyRegisterAccess
            }
        } else if self.is_custom_slug(slug, &decoded, raw_query) {
            RequestClassification::CustomSlugAccess
        } else if self.routes.is_admin_area(&decoded) {
            RequestClassification::AdminAreaAccess
        } else {
            RequestClassification::Unrelated
        };

        tracing::trace!(
            method = %method,
            classification = classification.as_str(),
            "Classified request"
        );
        classification
    }

    fn is_custom_slug(&self, slug: &LoginSlug, decoded_path: &str, raw_query: Option<&str>) -> bool {
        let path = untrailing_slash_it(decoded_path);
        let slug_path = format!("{}/{}", self.home_path, slug);
        if path == untrailing_slash_it(&slug_path) {
            return true;
        }

        !self.clean_urls && path == self.home_path && query_has_key(raw_query, slug.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shield::{RouteTable, SlugResolver};
    use proptest::prelude::*;

    fn slug(raw: &str) -> LoginSlug {
        SlugResolver::new(RouteTable::new("/wp-admin")).resolve(raw)
    }

    fn classifier_for(site: &SiteConfig) -> RequestClassifier {
        RequestClassifier::new(site, RouteTable::new(&site.admin_path))
    }

    fn classify(path: &str, query: Option<&str>) -> RequestClassification {
        classifier_for(&SiteConfig::default()).classify(
            &slug("secure-login"),
            &Method::GET,
            path,
            query,
        )
    }

    #[test]
    fn test_legacy_paths() {
        use RequestClassification::*;
        assert_eq!(classify("/wp-login.php", None), LegacyLoginAccess);
        assert_eq!(classify("/wp-login.php", Some("action=lostpassword")), LegacyLoginAccess);
        assert_eq!(classify("/blog/wp-login.php", None), LegacyLoginAccess);
        assert_eq!(classify("/WP-LOGIN.PHP", None), LegacyLoginAccess);
        assert_eq!(classify("/wp-register.php", None), LegacyRegisterAccess);
    }

    #[test]
    fn test_encoded_legacy_path() {
        use RequestClassification::*;
        assert_eq!(classify("/wp%2Dlogin.php", None), LegacyLoginAccess);
        assert_eq!(classify("/%77%70-login%2ephp", None), LegacyLoginAccess);
        // A doubly encoded path is decoded once and no longer names the script.
        assert_eq!(classify("/wp%252Dlogin.php", None), Unrelated);
    }

    #[test]
    fn test_postpass_passes() {
        use RequestClassification::*;
        assert_eq!(classify("/wp-login.php", Some("action=postpass")), PostPassSubmission);
        assert_eq!(
            classify("/wp-login.php", Some("foo=1&action=postpass")),
            PostPassSubmission
        );
        assert_eq!(classify("/wp-login.php", Some("action=postpassx")), LegacyLoginAccess);
    }

    #[test]
    fn test_custom_slug_both_slash_conventions() {
        use RequestClassification::*;
        assert_eq!(classify("/secure-login", None), CustomSlugAccess);
        assert_eq!(classify("/secure-login/", None), CustomSlugAccess);
        assert_eq!(classify("/secure-login/", Some("action=register")), CustomSlugAccess);
        assert_eq!(classify("/secure-login/extra", None), Unrelated);

        let site = SiteConfig {
            permalink_structure: "/%postname%".into(),
            ..SiteConfig::default()
        };
        let classifier = classifier_for(&site);
        let slug = slug("secure-login");
        assert_eq!(
            classifier.classify(&slug, &Method::GET, "/secure-login/", None),
            CustomSlugAccess
        );
        assert_eq!(
            classifier.classify(&slug, &Method::POST, "/secure-login", None),
            CustomSlugAccess
        );
    }

    #[test]
    fn test_custom_slug_under_subdirectory_home() {
        let site = SiteConfig {
            home_url: "https://example.com/blog".into(),
            ..SiteConfig::default()
        };
        let classifier = classifier_for(&site);
        let slug = slug("secure-login");
        assert_eq!(
            classifier.classify(&slug, &Method::GET, "/blog/secure-login/", None),
            RequestClassification::CustomSlugAccess
        );
        assert_eq!(
            classifier.classify(&slug, &Method::GET, "/secure-login/", None),
            RequestClassification::Unrelated
        );
    }

    #[test]
    fn test_query_string_form_without_clean_urls() {
        let site = SiteConfig {
            permalink_structure: String::new(),
            ..SiteConfig::default()
        };
        let classifier = classifier_for(&site);
        let slug = slug("secure-login");
        assert_eq!(
            classifier.classify(&slug, &Method::GET, "/", Some("secure-login&action=lostpassword")),
            RequestClassification::CustomSlugAccess
        );
        assert_eq!(
            classifier.classify(&slug, &Method::GET, "/", Some("p=12")),
            RequestClassification::Unrelated
        );
        // With clean URLs the query form is not a login entry point.
        assert_eq!(classify("/", Some("secure-login")), RequestClassification::Unrelated);
    }

    #[test]
    fn test_admin_and_unrelated() {
        use RequestClassification::*;
        assert_eq!(classify("/wp-admin/", None), AdminAreaAccess);
        assert_eq!(classify("/wp-admin/options-general.php", None), AdminAreaAccess);
        assert_eq!(classify("/wp-admin%2Foptions.php", None), AdminAreaAccess);
        assert_eq!(classify("/hello-world/", None), Unrelated);
        assert_eq!(classify("/", None), Unrelated);
    }

    #[test]
    fn test_legacy_check_ignores_query_values() {
        assert_eq!(
            classify("/search", Some("q=wp-login.php")),
            RequestClassification::Unrelated
        );
    }

    proptest! {
        #[test]
        fn prop_any_single_encoding_of_legacy_path_is_blocked(mask in prop::collection::vec(any::<bool>(), 12), prefix in "(/[a-z]{1,8}){0,2}") {
            let encoded: String = "wp-login.php"
                .chars()
                .zip(mask)
                .map(|(c, encode)| if encode { format!("%{:02X}", c as u32) } else { c.to_string() })
                .collect();
            let path = format!("{prefix}/{encoded}");
            prop_assert_eq!(classify(&path, None), RequestClassification::LegacyLoginAccess);
        }
    }
}
