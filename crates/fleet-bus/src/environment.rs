//! # Environment Store
//!
//! Process configuration that remote environment-change events write into.
//! The bus only ever calls [`EnvironmentStore::set`]; who owns the store and
//! what reads it is up to the host application.

use std::collections::BTreeMap;

use parking_lot::RwLock;

/// Key/value configuration written by environment-change events.
pub trait EnvironmentStore: Send + Sync {
    fn set(&self, key: &str, value: &str);

    fn get(&self, key: &str) -> Option<String>;
}

/// Map-backed store.
#[derive(Debug, Default)]
pub struct InMemoryEnvironment {
    values: RwLock<BTreeMap<String, String>>,
}

impl InMemoryEnvironment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply every entry of `values`. Returns how many were written.
    pub fn apply(&self, values: &BTreeMap<String, String>) -> usize {
        let mut current = self.values.write();
        for (key, value) in values {
            current.insert(key.clone(), value.clone());
        }
        values.len()
    }

    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values.read().clone()
    }
}

impl EnvironmentStore for InMemoryEnvironment {
    fn set(&self, key: &str, value: &str) {
        self.values.write().insert(key.to_string(), value.to_string());
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }
}
