//! The host's route table as seen by the shield: which words are taken and
//! which paths belong to the administrative area.

use {
    super::slug::normalize_slug,
    crate::{
        config::{LoginConfig, SiteConfig},
        utils::untrailing_slash_it,
    },
    dashmap::DashSet,
    std::{collections::HashSet, sync::Arc},
};

/// Words owned by the host platform that can never be a login slug.
pub const SYSTEM_RESERVED: &[&str] = &[
    "wp-admin",
    "wp-content",
    "wp-includes",
    "admin",
    "login",
    "wp-login",
    "xmlrpc",
    "wp-cron",
];

/// A point-in-time snapshot of every reserved word.
#[derive(Debug, Clone, Default)]
pub struct ReservedPathSet {
    entries: HashSet<String>,
}

impl ReservedPathSet {
    pub fn contains(&self, slug: &str) -> bool {
        self.entries.contains(slug)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    fn insert_word(&mut self, word: &str) {
        let lowered = word.trim().to_lowercase();
        let normalized = normalize_slug(&lowered);
        if !lowered.is_empty() {
            self.entries.insert(lowered);
        }
        if !normalized.is_empty() {
            self.entries.insert(normalized);
        }
    }

    // "wp-login.php" reserves both "wp-login-php" and "wp-login".
    fn insert_path(&mut self, path: &str) {
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            self.insert_word(segment);
            if let Some((stem, _)) = segment.rsplit_once('.') {
                self.insert_word(stem);
            }
        }
    }
}

/// Reserved words plus the admin-area predicate.
///
/// Clones share the set of dynamically registered routes, so a route
/// registered through any clone is seen by every resolver.
#[derive(Debug, Clone)]
pub struct RouteTable {
    admin_path: String,
    fixed: Arc<Vec<String>>,
    registered: Arc<DashSet<String>>,
}

impl RouteTable {
    pub fn new(admin_path: &str) -> Self {
        let admin_path = untrailing_slash_it(admin_path).to_ascii_lowercase();
        let mut fixed: Vec<String> = SYSTEM_RESERVED.iter().map(|s| s.to_string()).collect();
        fixed.push(admin_path.clone());
        Self {
            admin_path,
            fixed: Arc::new(fixed),
            registered: Arc::new(DashSet::new()),
        }
    }

    /// Builds the table from the `[site]` and `[login]` sections.
    pub fn from_config(site: &SiteConfig, login: &LoginConfig) -> Self {
        Self::new(&site.admin_path)
            .with_reserved([
                site.legacy_login_path.as_str(),
                site.legacy_register_path.as_str(),
                login.not_found_location.as_str(),
            ])
            .with_reserved(login.reserved_slugs.iter().map(String::as_str))
            .with_registered(site.registered_routes.iter().map(String::as_str))
    }

    /// Adds words or paths that are reserved for the lifetime of the table.
    #[must_use]
    pub fn with_reserved<'a>(mut self, words: impl IntoIterator<Item = &'a str>) -> Self {
        Arc::make_mut(&mut self.fixed).extend(words.into_iter().map(String::from));
        self
    }

    #[must_use]
    pub fn with_registered<'a>(self, routes: impl IntoIterator<Item = &'a str>) -> Self {
        for route in routes {
            self.register_route(route);
        }
        self
    }

    /// Records a route keyword the host registered at runtime.
    pub fn register_route(&self, keyword: &str) {
        self.registered.insert(keyword.to_string());
    }

    pub fn unregister_route(&self, keyword: &str) -> bool {
        self.registered.remove(keyword).is_some()
    }

    /// Snapshot of the fixed words unioned with the currently registered routes.
    pub fn reserved_set(&self) -> ReservedPathSet {
        let mut set = ReservedPathSet::default();
        for path in self.fixed.iter() {
            set.insert_path(path);
        }
        for route in self.registered.iter() {
            set.insert_word(route.key());
        }
        set
    }

    pub fn admin_path(&self) -> &str {
        &self.admin_path
    }

    /// Whether a decoded request path lies inside the administrative area.
    pub fn is_admin_area(&self, decoded_path: &str) -> bool {
        let path = decoded_path.to_ascii_lowercase();
        match path.strip_prefix(&self.admin_path) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_set_from_defaults() {
        let table = RouteTable::from_config(&SiteConfig::default(), &LoginConfig::default());
        let set = table.reserved_set();
        for word in SYSTEM_RESERVED {
            assert!(set.contains(word), "{word} missing");
        }
        assert!(set.contains("wp-login-php"));
        assert!(set.contains("wp-register"));
        assert!(set.contains("404"));
        assert!(set.contains("feed"));
        assert!(set.contains("category_name"));
        assert!(set.contains("category-name"));
        assert!(!set.contains("secure-login"));
    }

    #[test]
    fn test_registered_routes_are_shared_between_clones() {
        let table = RouteTable::new("/wp-admin");
        let clone = table.clone();
        clone.register_route("Events");
        assert!(table.reserved_set().contains("events"));
    }

    #[test]
    fn test_extra_reserved_words() {
        let table = RouteTable::new("/wp-admin").with_reserved(["Members Area"]);
        assert!(table.reserved_set().contains("members-area"));
    }

    #[test]
    fn test_is_admin_area() {
        let table = RouteTable::new("/wp-admin/");
        assert_eq!(table.admin_path(), "/wp-admin");
        assert!(table.is_admin_area("/wp-admin"));
        assert!(table.is_admin_area("/wp-admin/"));
        assert!(table.is_admin_area("/WP-Admin/options.php"));
        assert!(!table.is_admin_area("/wp-administrator"));
        assert!(!table.is_admin_area("/blog/wp-admin"));
        assert!(!table.is_admin_area("/"));
    }
}
