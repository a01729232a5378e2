//! Integration tests for transaction-scoped caching on SQLite.
//!
//! Tests verify that:
//! - Cached writes made inside a transaction reach the shared cache on commit
//! - Rollback discards cached writes and the SQL changes together
//! - Transactions on two databases sharing one cache context nest correctly
//! - Committing the outer transaction before the inner one is rejected
//! - Rolling back the outer transaction first always rolls back and drops newer cache frames
//! - Cache faults during publication propagate after the transaction unwinds

use db_orm_layer::cache::{CacheProvider, CacheValue, MemoryCache, NoCache, SharedCache};
use db_orm_layer::db::{CacheContext, Database, SqliteAdapter, TransactionState};
use db_orm_layer::error::{DbError, DbResult};
use db_orm_layer::models::AdapterConfig;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

/// Open a caching SQLite database in `dir` with a `users` table.
async fn setup_db(
    dir: &TempDir,
    name: &str,
    index: u32,
    context: Arc<CacheContext>,
) -> Database<SqliteAdapter> {
    let path = dir.path().join(format!("{}.db", name));
    let url = format!("sqlite:{}?caching=true", path.display());
    let config = AdapterConfig::parse(&url).unwrap();

    let mut db = Database::new(index, config, context);
    db.non_query("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
        .await
        .unwrap();
    db
}

async fn user_count(db: &mut Database<SqliteAdapter>) -> i64 {
    let result = db.query("SELECT COUNT(*) AS n FROM users").await.unwrap();
    result.rows[0].get_column("n").unwrap().as_i64().unwrap()
}

/// Provider that rejects every write.
#[derive(Debug)]
struct FailingCache;

impl CacheProvider for FailingCache {
    fn get(&self, _key: &str) -> DbResult<Option<CacheValue>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: CacheValue) -> DbResult<()> {
        Err(DbError::cache("cache backend is down"))
    }

    fn delete(&self, _key: &str) -> DbResult<()> {
        Ok(())
    }

    fn delete_all(&self) -> DbResult<()> {
        Ok(())
    }
}

fn shared_context() -> (Arc<MemoryCache>, Arc<CacheContext>) {
    let base = MemoryCache::shared();
    let context = Arc::new(CacheContext::with_provider(base.clone()));
    (base, context)
}

#[tokio::test]
async fn test_commit_replays_cache_history() {
    let dir = TempDir::new().unwrap();
    let (base, context) = shared_context();
    let mut db = setup_db(&dir, "app", 0, context.clone()).await;

    db.transaction_begin().await.unwrap();
    assert!(context.is_proxied());

    context.set("k", json!("v1")).unwrap();
    context.delete("k").unwrap();
    context.set("k", json!("v2")).unwrap();
    db.non_query("INSERT INTO users (name) VALUES ('alice')")
        .await
        .unwrap();

    // The base cache only changes on commit.
    assert_eq!(base.get("k").unwrap(), None);
    assert_eq!(context.get("k").unwrap(), Some(json!("v2")));

    db.transaction_commit().await.unwrap();
    assert_eq!(base.get("k").unwrap(), Some(json!("v2")));
    assert!(!context.is_proxied());
    assert_eq!(db.transaction_state(), TransactionState::Idle);
    assert_eq!(user_count(&mut db).await, 1);
}

#[tokio::test]
async fn test_rollback_discards_cache_and_rows() {
    let dir = TempDir::new().unwrap();
    let (base, context) = shared_context();
    let mut db = setup_db(&dir, "app", 0, context.clone()).await;

    db.transaction_begin().await.unwrap();
    db.transaction_begin().await.unwrap();
    assert_eq!(db.transaction_state(), TransactionState::Active { depth: 2 });

    context.set("k", json!("v1")).unwrap();
    context.delete("k").unwrap();
    context.set("k", json!("v2")).unwrap();
    db.non_query("INSERT INTO users (name) VALUES ('alice')")
        .await
        .unwrap();

    // Rollback at depth 2 ends the whole transaction.
    db.transaction_rollback().await.unwrap();
    assert_eq!(db.transaction_state(), TransactionState::Idle);
    assert_eq!(base.get("k").unwrap(), None);
    assert!(base.is_empty());
    assert!(!context.is_proxied());
    assert_eq!(user_count(&mut db).await, 0);
}

#[tokio::test]
async fn test_commit_without_begin_is_unbalanced() {
    let dir = TempDir::new().unwrap();
    let (base, context) = shared_context();
    let mut db = setup_db(&dir, "app", 3, context.clone()).await;
    base.set("kept", json!(1)).unwrap();

    let err = db.transaction_commit().await.unwrap_err();
    assert!(matches!(
        err,
        DbError::UnbalancedTransaction { database_index: 3 }
    ));
    assert!(!context.is_proxied());
    assert_eq!(base.get("kept").unwrap(), Some(json!(1)));
}

#[tokio::test]
async fn test_cross_database_nesting() {
    let dir = TempDir::new().unwrap();
    let (base, context) = shared_context();
    let mut a = setup_db(&dir, "first", 0, context.clone()).await;
    let mut b = setup_db(&dir, "second", 1, context.clone()).await;

    a.transaction_begin().await.unwrap();
    context.set("a", json!(1)).unwrap();

    b.transaction_begin().await.unwrap();
    assert_eq!(context.depth(), 2);
    context.set("b", json!(2)).unwrap();
    context.delete("a").unwrap();

    b.transaction_commit().await.unwrap();
    // B flushed into A's proxy, not into the base cache.
    assert_eq!(context.depth(), 1);
    assert!(base.is_empty());
    assert_eq!(context.get("b").unwrap(), Some(json!(2)));
    assert_eq!(context.get("a").unwrap(), None);

    a.transaction_commit().await.unwrap();
    assert_eq!(context.depth(), 0);
    assert_eq!(base.get("a").unwrap(), None);
    assert_eq!(base.get("b").unwrap(), Some(json!(2)));
}

#[tokio::test]
async fn test_inner_rollback_keeps_outer_writes() {
    let dir = TempDir::new().unwrap();
    let (base, context) = shared_context();
    let mut a = setup_db(&dir, "first", 0, context.clone()).await;
    let mut b = setup_db(&dir, "second", 1, context.clone()).await;

    a.transaction_begin().await.unwrap();
    context.set("outer", json!("a")).unwrap();
    b.transaction_begin().await.unwrap();
    context.set("inner", json!("b")).unwrap();

    b.transaction_rollback().await.unwrap();
    assert_eq!(context.depth(), 1);
    assert_eq!(context.get("inner").unwrap(), None);

    a.transaction_commit().await.unwrap();
    assert_eq!(base.get("outer").unwrap(), Some(json!("a")));
    assert_eq!(base.get("inner").unwrap(), None);
}

#[tokio::test]
async fn test_outer_commit_before_inner_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (base, context) = shared_context();
    let mut a = setup_db(&dir, "first", 0, context.clone()).await;
    let mut b = setup_db(&dir, "second", 1, context.clone()).await;

    a.transaction_begin().await.unwrap();
    b.transaction_begin().await.unwrap();
    a.non_query("INSERT INTO users (name) VALUES ('alice')")
        .await
        .unwrap();
    context.set("k", json!(1)).unwrap();

    let err = a.transaction_commit().await.unwrap_err();
    assert!(matches!(
        err,
        DbError::TransactionOrder {
            database_index: 0,
            frame: 1,
            stack_depth: 2
        }
    ));
    // Nothing was resolved: A is still open and its SQL still pending.
    assert_eq!(a.transaction_state(), TransactionState::Active { depth: 1 });
    assert_eq!(context.depth(), 2);

    b.transaction_commit().await.unwrap();
    a.transaction_commit().await.unwrap();
    assert_eq!(base.get("k").unwrap(), Some(json!(1)));
    assert_eq!(user_count(&mut a).await, 1);
}

#[tokio::test]
async fn test_outer_rollback_before_inner_always_rolls_back() {
    let dir = TempDir::new().unwrap();
    let (base, context) = shared_context();
    let mut a = setup_db(&dir, "first", 0, context.clone()).await;
    let mut b = setup_db(&dir, "second", 1, context.clone()).await;

    a.transaction_begin().await.unwrap();
    a.non_query("INSERT INTO users (name) VALUES ('alice')")
        .await
        .unwrap();
    context.set("a", json!(1)).unwrap();
    b.transaction_begin().await.unwrap();
    b.non_query("INSERT INTO users (name) VALUES ('bob')")
        .await
        .unwrap();
    context.set("b", json!(2)).unwrap();

    a.transaction_rollback().await.unwrap();
    assert_eq!(a.transaction_state(), TransactionState::Idle);
    assert_eq!(context.depth(), 0);
    assert_eq!(context.get("b").unwrap(), None);
    // The SQL rollback ran: the row is gone and A accepts a new transaction.
    assert_eq!(user_count(&mut a).await, 0);
    a.transaction_begin().await.unwrap();
    a.transaction_commit().await.unwrap();

    // B commits its own rows; its cache writes were dropped with A's frame.
    b.transaction_commit().await.unwrap();
    assert_eq!(b.transaction_state(), TransactionState::Idle);
    assert_eq!(user_count(&mut b).await, 1);
    assert!(base.is_empty());
}

#[tokio::test]
async fn test_faulted_cache_on_commit() {
    let dir = TempDir::new().unwrap();
    let failing: SharedCache = Arc::new(FailingCache);
    let context = Arc::new(CacheContext::with_provider(failing.clone()));
    let mut db = setup_db(&dir, "app", 0, context.clone()).await;

    db.transaction_begin().await.unwrap();
    db.non_query("INSERT INTO users (name) VALUES ('alice')")
        .await
        .unwrap();
    context.set("k", json!(1)).unwrap();

    let err = db.transaction_commit().await.unwrap_err();
    assert!(matches!(err, DbError::Cache { .. }));
    assert_eq!(db.transaction_state(), TransactionState::Idle);
    assert_eq!(context.depth(), 0);
    assert!(Arc::ptr_eq(&context.provider().unwrap(), &failing));
    // The database commit happened before the cache fault.
    assert_eq!(user_count(&mut db).await, 1);
}

#[tokio::test]
async fn test_caching_disabled_database_skips_proxy() {
    let dir = TempDir::new().unwrap();
    let (base, context) = shared_context();
    let mut db = setup_db(&dir, "app", 0, context.clone()).await;
    db.set_caching(false);

    db.transaction_begin().await.unwrap();
    assert!(!context.is_proxied());
    context.set("k", json!(1)).unwrap();
    // Without a proxy, writes go straight to the base cache.
    assert_eq!(base.get("k").unwrap(), Some(json!(1)));
    db.transaction_rollback().await.unwrap();
    assert_eq!(base.get("k").unwrap(), Some(json!(1)));
}

#[tokio::test]
async fn test_caching_toggled_off_mid_transaction_keeps_proxy() {
    let dir = TempDir::new().unwrap();
    let (base, context) = shared_context();
    let mut db = setup_db(&dir, "app", 0, context.clone()).await;

    db.transaction_begin().await.unwrap();
    db.set_caching(false);
    context.set("k", json!(1)).unwrap();
    assert!(context.is_proxied());
    assert!(base.is_empty());

    db.transaction_commit().await.unwrap();
    assert_eq!(base.get("k").unwrap(), Some(json!(1)));
}

#[tokio::test]
async fn test_no_cache_provider_skips_proxy() {
    let dir = TempDir::new().unwrap();
    let context = Arc::new(CacheContext::with_provider(Arc::new(NoCache)));
    let mut db = setup_db(&dir, "app", 0, context.clone()).await;

    db.transaction_begin().await.unwrap();
    assert!(!context.is_proxied());
    db.transaction_commit().await.unwrap();

    let empty = Arc::new(CacheContext::new());
    let mut other = setup_db(&dir, "other", 1, empty.clone()).await;
    other.transaction_begin().await.unwrap();
    assert_eq!(empty.depth(), 0);
    other.transaction_commit().await.unwrap();
}

#[tokio::test]
async fn test_failed_begin_leaves_cache_untouched() {
    let dir = TempDir::new().unwrap();
    let (_base, context) = shared_context();
    let mut db = setup_db(&dir, "app", 0, context.clone()).await;

    // A transaction opened behind the wrapper's back makes BEGIN fail.
    db.non_query("BEGIN").await.unwrap();
    assert!(db.transaction_begin().await.is_err());
    assert_eq!(db.transaction_state(), TransactionState::Idle);
    assert!(!context.is_proxied());
    db.non_query("ROLLBACK").await.unwrap();
}
