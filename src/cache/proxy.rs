//! Transaction-scoped cache proxy.
//!
//! A [`CacheProxy`] shadows a "super" cache for the lifetime of one outer
//! transaction frame. Writes land in a local overlay and an ordered action
//! log; the super cache is only touched when the log is replayed on commit.
//! Readers holding the proxy see their own writes, readers holding the super
//! cache keep seeing the pre-transaction state.

use crate::cache::action::CacheAction;
use crate::cache::provider::{CacheProvider, CacheValue, SharedCache};
use crate::error::DbResult;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Default)]
struct ProxyState {
    additions: HashMap<String, CacheValue>,
    removals: HashSet<String>,
    log: Vec<CacheAction>,
}

/// Cache provider that records every mutation for later replay.
pub struct CacheProxy {
    super_cache: Option<SharedCache>,
    state: Mutex<ProxyState>,
}

impl CacheProxy {
    /// Create a proxy reading through to `super_cache`.
    pub fn new(super_cache: SharedCache) -> Self {
        Self {
            super_cache: Some(super_cache),
            state: Mutex::new(ProxyState::default()),
        }
    }

    /// Create a proxy with nothing underneath; unknown keys read as absent.
    pub fn detached() -> Self {
        Self {
            super_cache: None,
            state: Mutex::new(ProxyState::default()),
        }
    }

    /// The provider this proxy shadows.
    pub fn super_cache(&self) -> Option<&SharedCache> {
        self.super_cache.as_ref()
    }

    /// Apply every recorded action, in order, to `target` and clear the log.
    ///
    /// The log is drained before the first action runs, so a second call is
    /// a no-op even if the first one failed part way.
    pub fn replay(&self, target: &dyn CacheProvider) -> DbResult<()> {
        let actions = std::mem::take(&mut self.state.lock().log);
        debug!(actions = actions.len(), "Replaying cache actions");
        for action in &actions {
            action.apply(target)?;
        }
        Ok(())
    }

    /// Copy of the action log, oldest first.
    pub fn actions(&self) -> Vec<CacheAction> {
        self.state.lock().log.clone()
    }

    /// Number of actions waiting for replay.
    pub fn pending(&self) -> usize {
        self.state.lock().log.len()
    }
}

impl std::fmt::Debug for CacheProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CacheProxy")
            .field("has_super_cache", &self.super_cache.is_some())
            .field("additions", &state.additions.len())
            .field("removals", &state.removals.len())
            .field("pending", &state.log.len())
            .finish()
    }
}

impl CacheProvider for CacheProxy {
    fn get(&self, key: &str) -> DbResult<Option<CacheValue>> {
        {
            let state = self.state.lock();
            if let Some(value) = state.additions.get(key) {
                return Ok(Some(value.clone()));
            }
            // A local removal masks the super cache even though it has not been told yet.
            if state.removals.contains(key) {
                return Ok(None);
            }
        }
        match &self.super_cache {
            Some(cache) => cache.get(key),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: CacheValue) -> DbResult<()> {
        let mut state = self.state.lock();
        state.removals.remove(key);
        state.additions.insert(key.to_string(), value.clone());
        state.log.push(CacheAction::set(key, value));
        Ok(())
    }

    fn delete(&self, key: &str) -> DbResult<()> {
        let mut state = self.state.lock();
        state.additions.remove(key);
        state.removals.insert(key.to_string());
        state.log.push(CacheAction::delete(key));
        Ok(())
    }

    fn delete_all(&self) -> DbResult<()> {
        let mut state = self.state.lock();
        state.additions.clear();
        state.removals.clear();
        state.log.push(CacheAction::DeleteAll);
        Ok(())
    }

    fn create_key(&self, parts: &[&str]) -> String {
        match &self.super_cache {
            Some(cache) => cache.create_key(parts),
            None => parts.join(":"),
        }
    }
}
