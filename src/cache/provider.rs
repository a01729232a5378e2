//! Cache provider contract and the stock providers.

use crate::error::DbResult;
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Opaque value stored in a cache provider.
pub type CacheValue = JsonValue;

/// A cache provider shared between the cache context, proxies and callers.
pub type SharedCache = Arc<dyn CacheProvider>;

/// Key/value store backing cached database entities.
///
/// Methods take `&self`: providers are shared behind an [`Arc`] and must
/// handle their own interior mutability.
pub trait CacheProvider: Send + Sync {
    /// Fetch the value stored under `key`.
    fn get(&self, key: &str) -> DbResult<Option<CacheValue>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: CacheValue) -> DbResult<()>;

    /// Remove `key`.
    fn delete(&self, key: &str) -> DbResult<()>;

    /// Remove every key.
    fn delete_all(&self) -> DbResult<()>;

    /// True for the sentinel provider that caches nothing.
    ///
    /// The transaction coordinator never installs a proxy over such a provider.
    fn is_no_cache(&self) -> bool {
        false
    }

    /// Build a cache key from its parts.
    fn create_key(&self, parts: &[&str]) -> String {
        parts.join(":")
    }
}

/// Process-local cache backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheValue>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty cache already wrapped for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Copy of the current contents, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, CacheValue> {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl CacheProvider for MemoryCache {
    fn get(&self, key: &str) -> DbResult<Option<CacheValue>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: CacheValue) -> DbResult<()> {
        self.entries.write().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> DbResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn delete_all(&self) -> DbResult<()> {
        self.entries.write().clear();
        Ok(())
    }
}

/// Sentinel provider that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl CacheProvider for NoCache {
    fn get(&self, _key: &str) -> DbResult<Option<CacheValue>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: CacheValue) -> DbResult<()> {
        Ok(())
    }

    fn delete(&self, _key: &str) -> DbResult<()> {
        Ok(())
    }

    fn delete_all(&self) -> DbResult<()> {
        Ok(())
    }

    fn is_no_cache(&self) -> bool {
        true
    }
}
