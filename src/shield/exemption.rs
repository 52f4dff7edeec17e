//! Non-interactive callers that may reach the admin area without a session.

use {
    super::classify::query_has_key,
    crate::{config::ExemptionConfig, utils::untrailing_slash_it},
};

/// Caller categories the host can declare in-process by inserting this as a
/// request extension. `CommandLine` has no wire marker and can only be set
/// this way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerKind {
    CommandLine,
    BackgroundJob,
    ScheduledTask,
    RestApi,
}

/// Snapshot of the exemption flags for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExemptionContext {
    pub background_job: bool,
    pub scheduled_task: bool,
    pub command_line: bool,
    pub rest_api: bool,
    pub form_post: bool,
    pub third_party_ajax: bool,
}

impl ExemptionContext {
    pub fn is_exempt(&self) -> bool {
        self.reason().is_some()
    }

    /// The first matching exemption, for logging.
    pub fn reason(&self) -> Option<&'static str> {
        [
            (self.background_job, "background-job"),
            (self.scheduled_task, "scheduled-task"),
            (self.command_line, "command-line"),
            (self.rest_api, "rest-api"),
            (self.form_post, "form-post"),
            (self.third_party_ajax, "third-party-ajax"),
        ]
        .into_iter()
        .find_map(|(set, name)| set.then_some(name))
    }
}

/// Derives an [`ExemptionContext`] from the request. This is an allowlist:
/// anything that does not match is treated as browser traffic.
///
/// Query markers (`rest_route`, `wc-ajax`) only count on the home path, where
/// the host dispatches them. Appending one to an admin URL exempts nothing.
#[derive(Debug, Clone)]
pub struct ExemptionDetector {
    config: ExemptionConfig,
    home_path: String,
}

impl ExemptionDetector {
    /// `home_path` is the untrailed path of the site home, `""` for a root install.
    pub fn new(config: ExemptionConfig, home_path: impl Into<String>) -> Self {
        Self {
            config,
            home_path: untrailing_slash_it(&home_path.into()).to_string(),
        }
    }

    pub fn detect(
        &self,
        decoded_path: &str,
        raw_query: Option<&str>,
        caller: Option<CallerKind>,
    ) -> ExemptionContext {
        let path = untrailing_slash_it(decoded_path);
        let is_path = |configured: &str| path.eq_ignore_ascii_case(untrailing_slash_it(configured));

        let rest_prefix = untrailing_slash_it(&self.config.rest_prefix);
        let under_rest_prefix = path
            .get(..rest_prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(rest_prefix))
            && matches!(path.as_bytes().get(rest_prefix.len()), None | Some(b'/'));
        let at_home = path == self.home_path;

        ExemptionContext {
            background_job: caller == Some(CallerKind::BackgroundJob)
                || is_path(&self.config.background_job_path),
            scheduled_task: caller == Some(CallerKind::ScheduledTask)
                || is_path(&self.config.scheduled_task_path),
            command_line: caller == Some(CallerKind::CommandLine),
            rest_api: caller == Some(CallerKind::RestApi)
                || under_rest_prefix
                || (at_home && query_has_key(raw_query, &self.config.rest_route_param)),
            form_post: is_path(&self.config.form_post_path),
            third_party_ajax: at_home
                && query_has_key(raw_query, &self.config.third_party_ajax_param),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> ExemptionDetector {
        ExemptionDetector::new(ExemptionConfig::default(), "")
    }

    #[test]
    fn test_interactive_admin_request_is_not_exempt() {
        let ctx = detector().detect("/wp-admin/options.php", Some("page=general"), None);
        assert_eq!(ctx, ExemptionContext::default());
        assert!(!ctx.is_exempt());
        assert_eq!(ctx.reason(), None);
    }

    #[test]
    fn test_path_based_exemptions() {
        let d = detector();
        assert!(d.detect("/wp-admin/admin-ajax.php", None, None).background_job);
        assert!(d.detect("/wp-cron.php", Some("doing_wp_cron=1"), None).scheduled_task);
        assert!(d.detect("/wp-admin/admin-post.php", None, None).form_post);
        assert!(d.detect("/wp-json/wp/v2/posts", None, None).rest_api);
        assert!(d.detect("/wp-json", None, None).rest_api);
        assert!(!d.detect("/wp-jsonx/posts", None, None).rest_api);
    }

    #[test]
    fn test_query_based_exemptions() {
        let d = detector();
        assert!(d.detect("/", Some("rest_route=/wp/v2/posts"), None).rest_api);
        let ctx = d.detect("/", Some("wc-ajax=get_refreshed_fragments"), None);
        assert!(ctx.third_party_ajax);
        assert_eq!(ctx.reason(), Some("third-party-ajax"));
    }

    #[test]
    fn test_query_markers_on_admin_paths_are_ignored() {
        let d = detector();
        for query in ["rest_route=x", "rest_route=/wp/v2/users", "wc-ajax=1", "rest_route&wc-ajax"] {
            let ctx = d.detect("/wp-admin/settings", Some(query), None);
            assert!(!ctx.is_exempt(), "query {query} exempted an admin path");
        }
        assert!(!d.detect("/wp-admin/", Some("rest_route=/"), None).rest_api);
    }

    #[test]
    fn test_query_markers_under_subdirectory_home() {
        let d = ExemptionDetector::new(ExemptionConfig::default(), "/blog/");
        assert!(d.detect("/blog/", Some("rest_route=/wp/v2/posts"), None).rest_api);
        assert!(d.detect("/blog", Some("wc-ajax=cart"), None).third_party_ajax);
        assert!(!d.detect("/", Some("rest_route=/wp/v2/posts"), None).rest_api);
        assert!(!d.detect("/blog/wp-admin/", Some("rest_route=x"), None).is_exempt());
    }

    #[test]
    fn test_caller_kind_extension() {
        let d = detector();
        let ctx = d.detect("/wp-admin/", None, Some(CallerKind::CommandLine));
        assert!(ctx.command_line);
        assert_eq!(ctx.reason(), Some("command-line"));
        assert!(d.detect("/wp-admin/", None, Some(CallerKind::BackgroundJob)).is_exempt());
        assert!(d.detect("/wp-admin/", None, Some(CallerKind::ScheduledTask)).is_exempt());
        assert!(d.detect("/wp-admin/", None, Some(CallerKind::RestApi)).is_exempt());
    }
}
