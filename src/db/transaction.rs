//! Nested transaction coordination with cache proxy management.
//!
//! Each database wrapper owns one [`TransactionCoordinator`]. The coordinator
//! counts nested `begin` calls and, on the outermost boundary only, asks the
//! shared [`CacheContext`] to install a proxy over the active cache provider.
//! The outermost `commit` replays the proxy into the provider it displaced;
//! `rollback` discards it.
//!
//! Because all coordinators bound to one context push onto the same frame
//! stack, a transaction started on a second adapter while the first is open
//! gets its own proxy layered on top of the first one, and its commit flushes
//! into that outer proxy rather than into the base cache.

use crate::db::adapter::TransactionExecutor;
use crate::db::context::{CacheContext, CacheFrameId, FrameState};
use crate::error::{DbError, DbResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Transaction state of one adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Idle,
    Active { depth: u32 },
}

/// Per-adapter transaction depth plus the cache frame it owns.
#[derive(Debug)]
pub struct TransactionCoordinator {
    database_index: u32,
    depth: u32,
    /// Frame pushed by this adapter's outermost begin, if caching was on.
    frame: Option<CacheFrameId>,
    context: Arc<CacheContext>,
}

impl TransactionCoordinator {
    /// Create an idle coordinator bound to `context`.
    pub fn new(database_index: u32, context: Arc<CacheContext>) -> Self {
        Self {
            database_index,
            depth: 0,
            frame: None,
            context,
        }
    }

    /// Current nesting depth.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn state(&self) -> TransactionState {
        match self.depth {
            0 => TransactionState::Idle,
            depth => TransactionState::Active { depth },
        }
    }

    pub fn is_active(&self) -> bool {
        self.depth > 0
    }

    /// True when this adapter's outer transaction installed a cache proxy.
    pub fn owns_cache_frame(&self) -> bool {
        self.frame.is_some()
    }

    /// The cache context shared with other adapters.
    pub fn context(&self) -> &Arc<CacheContext> {
        &self.context
    }

    /// Begin a transaction, or enter one more nesting level.
    ///
    /// Only the outermost call reaches the database and, when `caching` is
    /// enabled, installs a cache proxy. A failed database begin leaves the
    /// coordinator idle.
    pub async fn begin<E>(&mut self, executor: &mut E, caching: bool) -> DbResult<()>
    where
        E: TransactionExecutor,
    {
        if self.depth == 0 {
            executor.execute_transaction_begin().await?;
            if caching {
                self.frame = self.context.push_proxy();
            }
            info!(
                database_index = self.database_index,
                cache_frame = ?self.frame.map(|f| f.level()),
                "Transaction started"
            );
        } else {
            debug!(
                database_index = self.database_index,
                depth = self.depth + 1,
                "Nested transaction begin"
            );
        }
        self.depth += 1;
        Ok(())
    }

    /// Commit one nesting level.
    ///
    /// The outermost commit runs the database commit, then flushes this
    /// adapter's cache proxy into the provider beneath it and restores that
    /// provider. Committing with no open transaction fails with
    /// [`DbError::UnbalancedTransaction`] and leaves the cache untouched.
    pub async fn commit<E>(&mut self, executor: &mut E) -> DbResult<()>
    where
        E: TransactionExecutor,
    {
        match self.depth {
            0 => {
                warn!(
                    database_index = self.database_index,
                    "Commit called without a matching begin"
                );
                Err(DbError::unbalanced_transaction(self.database_index))
            }
            1 => {
                if let Some(frame) = self.frame {
                    match self.context.frame_state(frame) {
                        FrameState::Top => {}
                        FrameState::Buried => {
                            return Err(DbError::transaction_order(
                                self.database_index,
                                frame.level(),
                                self.context.depth(),
                            ));
                        }
                        FrameState::Discarded => {
                            warn!(
                                database_index = self.database_index,
                                frame = frame.level(),
                                "Cache frame was discarded by an earlier rollback; nothing to publish"
                            );
                            self.frame = None;
                        }
                    }
                }
                executor.execute_transaction_commit().await?;

                // The database transaction is committed at this point, so the
                // frame is unwound even if replaying into the cache fails.
                let resolved = match self.frame.take() {
                    Some(frame) => {
                        let flushed = self.context.flush(frame, self.database_index);
                        let restored = self.context.restore(frame, self.database_index);
                        flushed.and(restored)
                    }
                    None => Ok(()),
                };
                self.depth = 0;
                info!(database_index = self.database_index, "Transaction committed");
                resolved
            }
            _ => {
                self.depth -= 1;
                debug!(
                    database_index = self.database_index,
                    depth = self.depth,
                    "Nested transaction commit"
                );
                Ok(())
            }
        }
    }

    /// Roll back the whole transaction, whatever the nesting depth.
    ///
    /// The database rollback always runs and the depth always drops to 0,
    /// even when the SQL rollback fails. The cache proxy is discarded without
    /// replay, together with any frame other adapters pushed above it, and
    /// the provider it displaced becomes active again. Rolling back while
    /// idle sends no SQL and does nothing.
    pub async fn rollback<E>(&mut self, executor: &mut E) -> DbResult<()>
    where
        E: TransactionExecutor,
    {
        if self.depth == 0 {
            warn!(
                database_index = self.database_index,
                "Rollback called with no open transaction"
            );
            return Ok(());
        }

        let executed = executor.execute_transaction_rollback().await;
        let discarded_depth = self.depth;
        self.depth = 0;
        if let Some(frame) = self.frame.take() {
            let dropped = self.context.discard_from(frame);
            if dropped > 1 {
                warn!(
                    database_index = self.database_index,
                    frame = frame.level(),
                    newer_frames = dropped - 1,
                    "Rollback discarded cache frames of transactions opened after this one"
                );
            }
        }
        info!(
            database_index = self.database_index,
            depth = discarded_depth,
            "Transaction rolled back"
        );
        executed
    }
}
