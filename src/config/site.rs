use {
    crate::{Error, Result, utils::untrailing_slash_it},
    serde::Deserialize,
    url::Url,
};

///
/// Facts about the host site that the login shield needs to know.
///
/// ```toml
/// [site]
/// home_url = "https://example.com"
/// permalink_structure = "/%postname%/"
/// admin_path = "/wp-admin"
/// ```
///
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Absolute home URL used when generating login links. When empty, links
    /// are generated root-relative.
    #[serde(default)]
    pub home_url: String,

    /// The clean URL structure of the site. An empty structure means the site
    /// is addressed with query strings and the login page lives at `/?slug`.
    /// A structure ending in `/` selects the trailing-slash convention.
    #[serde(default = "SiteConfig::default_permalink_structure")]
    pub permalink_structure: String,

    /// Path prefix of the administrative area.
    #[serde(default = "SiteConfig::default_admin_path")]
    pub admin_path: String,

    /// The well-known login script.
    #[serde(default = "SiteConfig::default_legacy_login_path")]
    pub legacy_login_path: String,

    /// The well-known registration script.
    #[serde(default = "SiteConfig::default_legacy_register_path")]
    pub legacy_register_path: String,

    /// Route keywords the host has registered (public query variables and the
    /// like). A login slug may never equal one of these.
    #[serde(default = "SiteConfig::default_registered_routes")]
    pub registered_routes: Vec<String>,
}

impl SiteConfig {
    fn default_permalink_structure() -> String {
        "/%postname%/".into()
    }

    fn default_admin_path() -> String {
        "/wp-admin".into()
    }

    fn default_legacy_login_path() -> String {
        "wp-login.php".into()
    }

    fn default_legacy_register_path() -> String {
        "wp-register.php".into()
    }

    fn default_registered_routes() -> Vec<String> {
        [
            "m",
            "p",
            "posts",
            "w",
            "cat",
            "withcomments",
            "withoutcomments",
            "s",
            "search",
            "exact",
            "sentence",
            "calendar",
            "page",
            "paged",
            "more",
            "tb",
            "pb",
            "author",
            "order",
            "orderby",
            "year",
            "monthnum",
            "day",
            "hour",
            "minute",
            "second",
            "name",
            "category_name",
            "tag",
            "feed",
            "author_name",
            "pagename",
            "page_id",
            "error",
            "attachment",
            "attachment_id",
            "subpost",
            "subpost_id",
            "preview",
            "robots",
            "favicon",
            "taxonomy",
            "term",
            "cpage",
            "post_type",
            "embed",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    /// Returns true when the site has a clean URL structure configured.
    pub fn uses_clean_urls(&self) -> bool {
        !self.permalink_structure.trim().is_empty()
    }

    /// Returns true when generated paths end with a slash.
    pub fn uses_trailing_slashes(&self) -> bool {
        self.permalink_structure.ends_with('/')
    }

    /// The home URL without a trailing slash, or an empty string.
    pub fn home_base(&self) -> &str {
        untrailing_slash_it(self.home_url.trim())
    }

    /// The path component of the home URL without a trailing slash
    /// (`""` for a site mounted at the root).
    pub fn home_path(&self) -> String {
        match Url::parse(self.home_base()) {
            Ok(url) => untrailing_slash_it(url.path()).to_string(),
            Err(_) => String::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.admin_path.starts_with('/') {
            return Err(Error::config(format!(
                "[site] admin_path must start with '/', got '{}'",
                self.admin_path
            )));
        }

        for (key, value) in [
            ("legacy_login_path", &self.legacy_login_path),
            ("legacy_register_path", &self.legacy_register_path),
        ] {
            // Matching works on the path without slashes, so "/" would match everything.
            if value.trim().trim_matches('/').is_empty() {
                return Err(Error::config(format!(
                    "[site] {key} must name a path, got '{value}'"
                )));
            }
        }

        let home = self.home_url.trim();
        if !home.is_empty() {
            let url = Url::parse(home).map_err(|e| {
                Error::config(format!("[site] home_url '{home}' is not an absolute URL: {e}"))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::config(format!(
                    "[site] home_url must use http or https, got '{}'",
                    url.scheme()
                )));
            }
        }

        Ok(())
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            home_url: String::new(),
            permalink_structure: Self::default_permalink_structure(),
            admin_path: Self::default_admin_path(),
            legacy_login_path: Self::default_legacy_login_path(),
            legacy_register_path: Self::default_legacy_register_path(),
            registered_routes: Self::default_registered_routes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_home_path_for_subdirectory_install() {
        let site = SiteConfig {
            home_url: "https://example.com/blog/".into(),
            ..SiteConfig::default()
        };
        assert_eq!(site.home_base(), "https://example.com/blog");
        assert_eq!(site.home_path(), "/blog");
    }

    #[test]
    fn test_home_path_for_root_install() {
        let site = SiteConfig {
            home_url: "https://example.com".into(),
            ..SiteConfig::default()
        };
        assert_eq!(site.home_path(), "");
        assert_eq!(SiteConfig::default().home_path(), "");
    }

    #[test]
    fn test_permalink_conventions() {
        let mut site = SiteConfig::default();
        assert!(site.uses_clean_urls());
        assert!(site.uses_trailing_slashes());

        site.permalink_structure = "/%year%/%postname%".into();
        assert!(site.uses_clean_urls());
        assert!(!site.uses_trailing_slashes());

        site.permalink_structure = String::new();
        assert!(!site.uses_clean_urls());
    }

    #[test]
    fn test_validate_rejects_non_http_home() {
        let site = SiteConfig {
            home_url: "ftp://example.com".into(),
            ..SiteConfig::default()
        };
        assert!(site.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bare_slash_legacy_paths() {
        for path in ["/", "//", " / ", ""] {
            let login = SiteConfig {
                legacy_login_path: path.into(),
                ..SiteConfig::default()
            };
            assert!(login.validate().is_err(), "login path {path:?}");

            let register = SiteConfig {
                legacy_register_path: path.into(),
                ..SiteConfig::default()
            };
            assert!(register.validate().is_err(), "register path {path:?}");
        }

        let custom = SiteConfig {
            legacy_login_path: "/login.php".into(),
            ..SiteConfig::default()
        };
        assert!(custom.validate().is_ok());
    }
}
