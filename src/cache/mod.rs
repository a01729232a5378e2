//! Object cache layer.
//!
//! This module provides the cache provider contract used by generated
//! data-access code, plus the pieces the transaction coordinator builds on:
//! - `provider`: the [`CacheProvider`] trait, an in-memory provider and the no-op sentinel
//! - `action`: replayable [`CacheAction`] records
//! - `proxy`: the [`CacheProxy`] that buffers writes for the duration of a transaction

pub mod action;
pub mod provider;
pub mod proxy;

pub use action::CacheAction;
pub use provider::{CacheProvider, CacheValue, MemoryCache, NoCache, SharedCache};
pub use proxy::CacheProxy;
