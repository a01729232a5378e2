//! Shared cache context for cooperating database adapters.
//!
//! The context owns the "active" cache provider slot and the stack of cache
//! frames pushed by outer transaction boundaries. Every adapter that should
//! see a consistent cache holds an `Arc` to the same context; the transaction
//! coordinator is the only writer of the slot and the stack.

use crate::cache::{CacheProxy, CacheValue, SharedCache};
use crate::error::{DbError, DbResult};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Handle to a pushed frame: its stack level plus an id unique within the
/// context, so a discarded frame is never mistaken for a newer one at the
/// same level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheFrameId {
    level: usize,
    id: u64,
}

impl CacheFrameId {
    /// 1-based stack height at which the frame was pushed.
    pub fn level(&self) -> usize {
        self.level
    }
}

/// Where a frame currently sits on the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FrameState {
    Top,
    /// Open, with newer frames above it.
    Buried,
    /// Already removed by a rollback further down the stack.
    Discarded,
}

/// One outer transaction boundary: the provider it displaced and the proxy
/// installed in its place.
#[derive(Clone)]
struct CacheFrame {
    id: u64,
    saved: SharedCache,
    proxy: Arc<CacheProxy>,
}

#[derive(Default)]
struct ContextState {
    active: Option<SharedCache>,
    frames: Vec<CacheFrame>,
    next_id: u64,
}

/// Active cache provider plus the transaction frame stack.
#[derive(Default)]
pub struct CacheContext {
    state: Mutex<ContextState>,
}

impl CacheContext {
    /// Create a context with no cache provider configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context whose active provider is `provider`.
    pub fn with_provider(provider: SharedCache) -> Self {
        Self {
            state: Mutex::new(ContextState {
                active: Some(provider),
                frames: Vec::new(),
                next_id: 0,
            }),
        }
    }

    /// Replace the configured provider.
    ///
    /// Only allowed while no transaction frame is open.
    pub fn set_provider(&self, provider: Option<SharedCache>) -> DbResult<()> {
        let mut state = self.state.lock();
        if !state.frames.is_empty() {
            return Err(DbError::invalid_input(format!(
                "Cannot replace the cache provider while {} transaction frame(s) are open",
                state.frames.len()
            )));
        }
        state.active = provider;
        Ok(())
    }

    /// The provider application code should read and write through.
    ///
    /// Inside a caching transaction this is the innermost proxy.
    pub fn provider(&self) -> Option<SharedCache> {
        self.state.lock().active.clone()
    }

    /// Number of open transaction frames.
    pub fn depth(&self) -> usize {
        self.state.lock().frames.len()
    }

    /// Check if the active provider is a transaction proxy.
    pub fn is_proxied(&self) -> bool {
        !self.state.lock().frames.is_empty()
    }

    /// Read through the active provider; absent when none is configured.
    pub fn get(&self, key: &str) -> DbResult<Option<CacheValue>> {
        match self.provider() {
            Some(cache) => cache.get(key),
            None => Ok(None),
        }
    }

    /// Write through the active provider; a no-op when none is configured.
    pub fn set(&self, key: &str, value: CacheValue) -> DbResult<()> {
        match self.provider() {
            Some(cache) => cache.set(key, value),
            None => Ok(()),
        }
    }

    /// Delete through the active provider; a no-op when none is configured.
    pub fn delete(&self, key: &str) -> DbResult<()> {
        match self.provider() {
            Some(cache) => cache.delete(key),
            None => Ok(()),
        }
    }

    /// Clear through the active provider; a no-op when none is configured.
    pub fn delete_all(&self) -> DbResult<()> {
        match self.provider() {
            Some(cache) => cache.delete_all(),
            None => Ok(()),
        }
    }

    /// Push the active provider and install a proxy over it.
    ///
    /// Returns the new frame, or `None` when there is nothing worth
    /// proxying: no provider, or the no-op sentinel.
    pub(crate) fn push_proxy(&self) -> Option<CacheFrameId> {
        let mut state = self.state.lock();
        let saved = state.active.clone().filter(|cache| !cache.is_no_cache())?;
        let proxy = Arc::new(CacheProxy::new(saved.clone()));
        let id = state.next_id;
        state.next_id += 1;
        state.active = Some(proxy.clone() as SharedCache);
        state.frames.push(CacheFrame { id, saved, proxy });
        let frame = CacheFrameId {
            level: state.frames.len(),
            id,
        };
        debug!(frame = frame.level, "Installed transaction cache proxy");
        Some(frame)
    }

    /// Replay the proxy of `frame` into the provider it displaced.
    ///
    /// The frame stays on the stack; call [`CacheContext::restore`] next.
    pub(crate) fn flush(&self, frame: CacheFrameId, database_index: u32) -> DbResult<()> {
        let top = self.top_frame(frame, database_index)?;
        // Lock released: the target may itself be a proxy or a remote cache.
        top.proxy.replay(top.saved.as_ref())?;
        debug!(frame = frame.level, "Flushed transaction cache proxy");
        Ok(())
    }

    /// Pop `frame` and make the provider it displaced active again.
    pub(crate) fn restore(&self, frame: CacheFrameId, database_index: u32) -> DbResult<()> {
        let mut state = self.state.lock();
        if state.frames.last().map(|top| top.id) != Some(frame.id) {
            return Err(DbError::transaction_order(
                database_index,
                frame.level,
                state.frames.len(),
            ));
        }
        if let Some(top) = state.frames.pop() {
            state.active = Some(top.saved);
        }
        debug!(frame = frame.level, "Restored cache provider");
        Ok(())
    }

    /// Drop `frame` and every frame above it without replaying anything,
    /// making the provider `frame` displaced active again.
    ///
    /// Returns the number of frames dropped; 0 when `frame` is already gone.
    pub(crate) fn discard_from(&self, frame: CacheFrameId) -> usize {
        let mut state = self.state.lock();
        let Some(pos) = state.frames.iter().position(|f| f.id == frame.id) else {
            return 0;
        };
        let dropped = state.frames.len() - pos;
        let saved = state.frames[pos].saved.clone();
        state.frames.truncate(pos);
        state.active = Some(saved);
        debug!(frame = frame.level, dropped, "Discarded transaction cache proxy");
        dropped
    }

    pub(crate) fn frame_state(&self, frame: CacheFrameId) -> FrameState {
        let state = self.state.lock();
        match state.frames.iter().position(|f| f.id == frame.id) {
            Some(pos) if pos + 1 == state.frames.len() => FrameState::Top,
            Some(_) => FrameState::Buried,
            None => FrameState::Discarded,
        }
    }

    fn top_frame(&self, frame: CacheFrameId, database_index: u32) -> DbResult<CacheFrame> {
        let state = self.state.lock();
        match state.frames.last() {
            Some(top) if top.id == frame.id => Ok(top.clone()),
            _ => Err(DbError::transaction_order(
                database_index,
                frame.level,
                state.frames.len(),
            )),
        }
    }
}

impl std::fmt::Debug for CacheContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CacheContext")
            .field("has_provider", &state.active.is_some())
            .field("frames", &state.frames.len())
            .finish()
    }
}
