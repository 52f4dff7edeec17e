use {
    crate::{Error, Result},
    serde::Deserialize,
    std::path::PathBuf,
};

///
/// Configuration of the custom login entry point.
///
/// ```toml
/// [login]
/// enabled = true
/// slug = "secure-login"
/// not_found_location = "/404/"
/// trusted_auth_domains = ["wordpress.com"]
/// ```
///
#[derive(Debug, Clone, Deserialize)]
pub struct LoginConfig {
    /// Initial value of the `custom_login_url_enabled` flag.
    #[serde(default = "LoginConfig::default_enabled")]
    pub enabled: bool,

    /// Initial value of the `custom_login_slug` setting.
    #[serde(default = "LoginConfig::default_slug")]
    pub slug: String,

    /// Where anonymous requests for the admin area are sent, relative to the home URL.
    #[serde(default = "LoginConfig::default_not_found_location")]
    pub not_found_location: String,

    /// HTML file rendered for blocked legacy login requests.
    #[serde(default)]
    pub not_found_template: Option<PathBuf>,

    /// Federated login domains whose links are never rewritten. Subdomains match too.
    #[serde(default = "LoginConfig::default_trusted_auth_domains")]
    pub trusted_auth_domains: Vec<String>,

    /// Additional words a login slug may not take.
    #[serde(default)]
    pub reserved_slugs: Vec<String>,

    #[serde(default)]
    pub exemptions: ExemptionConfig,
}

impl LoginConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_slug() -> String {
        crate::shield::DEFAULT_SLUG.into()
    }

    fn default_not_found_location() -> String {
        "/404/".into()
    }

    fn default_trusted_auth_domains() -> Vec<String> {
        vec!["wordpress.com".into()]
    }

    pub fn validate(&self) -> Result<()> {
        if self.not_found_location.trim().is_empty() {
            return Err(Error::config("[login] not_found_location must not be empty"));
        }

        if let Some(template) = &self.not_found_template
            && template.as_os_str().is_empty()
        {
            return Err(Error::config("[login] not_found_template must not be empty when set"));
        }

        self.exemptions.validate()
    }
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            slug: Self::default_slug(),
            not_found_location: Self::default_not_found_location(),
            not_found_template: None,
            trusted_auth_domains: Self::default_trusted_auth_domains(),
            reserved_slugs: Vec::new(),
            exemptions: ExemptionConfig::default(),
        }
    }
}

///
/// How non-interactive callers are recognised on the wire.
///
/// Anonymous requests for the admin area are let through when they match one
/// of these; everything else is treated as browser traffic.
///
#[derive(Debug, Clone, Deserialize)]
pub struct ExemptionConfig {
    #[serde(default = "ExemptionConfig::default_background_job_path")]
    pub background_job_path: String,

    #[serde(default = "ExemptionConfig::default_scheduled_task_path")]
    pub scheduled_task_path: String,

    #[serde(default = "ExemptionConfig::default_rest_prefix")]
    pub rest_prefix: String,

    /// Query parameter that addresses the REST API on sites without clean URLs.
    #[serde(default = "ExemptionConfig::default_rest_route_param")]
    pub rest_route_param: String,

    #[serde(default = "ExemptionConfig::default_form_post_path")]
    pub form_post_path: String,

    #[serde(default = "ExemptionConfig::default_third_party_ajax_param")]
    pub third_party_ajax_param: String,
}

impl ExemptionConfig {
    fn default_background_job_path() -> String {
        "/wp-admin/admin-ajax.php".into()
    }

    fn default_scheduled_task_path() -> String {
        "/wp-cron.php".into()
    }

    fn default_rest_prefix() -> String {
        "/wp-json/".into()
    }

    fn default_rest_route_param() -> String {
        "rest_route".into()
    }

    fn default_form_post_path() -> String {
        "/wp-admin/admin-post.php".into()
    }

    fn default_third_party_ajax_param() -> String {
        "wc-ajax".into()
    }

    pub fn validate(&self) -> Result<()> {
        for (name, path) in [
            ("background_job_path", &self.background_job_path),
            ("scheduled_task_path", &self.scheduled_task_path),
            ("rest_prefix", &self.rest_prefix),
            ("form_post_path", &self.form_post_path),
        ] {
            if !path.starts_with('/') {
                return Err(Error::config(format!(
                    "[login.exemptions] {name} must start with '/', got '{path}'"
                )));
            }
        }
        Ok(())
    }
}

impl Default for ExemptionConfig {
    fn default() -> Self {
        Self {
            background_job_path: Self::default_background_job_path(),
            scheduled_task_path: Self::default_scheduled_task_path(),
            rest_prefix: Self::default_rest_prefix(),
            rest_route_param: Self::default_rest_route_param(),
            form_post_path: Self::default_form_post_path(),
            third_party_ajax_param: Self::default_third_party_ajax_param(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let login = LoginConfig::default();
        assert!(login.enabled);
        assert_eq!(login.slug, "secure-login");
        assert_eq!(login.trusted_auth_domains, vec!["wordpress.com"]);
        assert!(login.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_relative_exemption_path() {
        let mut login = LoginConfig::default();
        login.exemptions.scheduled_task_path = "wp-cron.php".into();
        let err = login.validate().unwrap_err();
        assert!(err.to_string().contains("scheduled_task_path"));
    }

    #[test]
    fn test_validate_rejects_empty_not_found_location() {
        let login = LoginConfig {
            not_found_location: " ".into(),
            ..LoginConfig::default()
        };
        assert!(login.validate().is_err());
    }
}
