//! Host-provided settings as a key/value provider.

use dashmap::DashMap;
use std::collections::HashMap;

/// Read access to host settings plus a cache for values derived from them
/// at runtime (decoded keys and the like).
pub trait ConfigProvider: Send + Sync {
    fn try_get(&self, key: &str) -> Option<String>;

    /// Stores a derived value; later `try_get` calls for `key` return it.
    fn add_derived(&self, key: &str, value: String);

    /// Case-insensitive `true`/`false`; anything else reads as unset.
    fn get_bool(&self, key: &str) -> Option<bool> {
        self.try_get(key)
            .and_then(|v| v.trim().to_ascii_lowercase().parse::<bool>().ok())
    }
}

/// [`ConfigProvider`] over the `gateway.settings` map.
#[derive(Debug, Default)]
pub struct HostSettings {
    base: HashMap<String, String>,
    derived: DashMap<String, String>,
}

impl HostSettings {
    pub fn new(base: HashMap<String, String>) -> Self {
        Self {
            base,
            derived: DashMap::new(),
        }
    }
}

impl ConfigProvider for HostSettings {
    fn try_get(&self, key: &str) -> Option<String> {
        if let Some(v) = self.derived.get(key) {
            return Some(v.value().clone());
        }
        self.base.get(key).cloned()
    }

    fn add_derived(&self, key: &str, value: String) {
        self.derived.insert(key.to_string(), value);
    }
}
