//!
//! Settings storage shared between the login shield and the administrator.
//!
//! The shield only ever reads two keys ([`SLUG_KEY`] and [`ENABLED_KEY`]) and
//! writes [`SLUG_KEY`] through the explicit administrative update. Hosts that
//! keep their settings elsewhere implement [`ConfigurationStore`] over it.
//!

use {
    crate::{Result, config::LoginConfig},
    dashmap::DashMap,
    std::sync::Arc,
};

/// Key holding the active custom login slug.
pub const SLUG_KEY: &str = "custom_login_slug";

/// Feature toggle for the custom login URL.
pub const ENABLED_KEY: &str = "custom_login_url_enabled";

/// Key/value settings store read on every request.
///
/// Implementations must be cheap to read and safe to share between request
/// tasks; an update becomes visible to the next request that reads it.
pub trait ConfigurationStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Returns the stored value or `default` when the key is absent.
    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Reads a feature toggle. Unrecognised values yield `default`.
    fn flag(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(value) => parse_flag(&value).unwrap_or(default),
            None => default,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// In-process settings store backed by a concurrent map.
///
/// ```
/// use axum_login_shield::{ConfigurationStore, MemoryStore, SLUG_KEY};
///
/// let store = MemoryStore::default();
/// store.set(SLUG_KEY, "back-office").unwrap();
/// assert_eq!(store.get_or(SLUG_KEY, "secure-login"), "back-office");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    /// Creates a store seeded from the `[login]` section.
    pub fn from_login_config(config: &LoginConfig) -> Self {
        let store = Self::default();
        store.values.insert(SLUG_KEY.into(), config.slug.clone());
        store
            .values
            .insert(ENABLED_KEY.into(), config.enabled.to_string());
        store
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl ConfigurationStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|entry| entry.value().clone())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

impl<S: ConfigurationStore> ConfigurationStore for Arc<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}
