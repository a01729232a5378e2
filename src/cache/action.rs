//! Replayable cache mutations.

use crate::cache::provider::{CacheProvider, CacheValue};
use crate::error::DbResult;

/// A single recorded cache mutation.
///
/// Actions are immutable once recorded and are applied to a target provider
/// exactly as they were issued.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheAction {
    /// Store a value under a key.
    Set { key: String, value: CacheValue },
    /// Remove one key.
    Delete { key: String },
    /// Remove every key.
    DeleteAll,
}

impl CacheAction {
    pub fn set(key: impl Into<String>, value: CacheValue) -> Self {
        Self::Set {
            key: key.into(),
            value,
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }

    /// Apply the recorded mutation to `target`.
    ///
    /// Errors raised by the target are returned unchanged.
    pub fn apply(&self, target: &dyn CacheProvider) -> DbResult<()> {
        match self {
            Self::Set { key, value } => target.set(key, value.clone()),
            Self::Delete { key } => target.delete(key),
            Self::DeleteAll => target.delete_all(),
        }
    }

    /// Key touched by this action, `None` for [`CacheAction::DeleteAll`].
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Set { key, .. } | Self::Delete { key } => Some(key),
            Self::DeleteAll => None,
        }
    }
}
