//! The database wrapper application code talks to.
//!
//! [`Database`] pairs one adapter with its configuration, connects on first
//! use, optionally profiles every statement, and routes transaction calls
//! through a [`TransactionCoordinator`] so that cache writes made during a
//! transaction only reach the shared cache when it commits.

use crate::db::adapter::DatabaseAdapter;
use crate::db::context::CacheContext;
use crate::db::row::QueryResult;
use crate::db::sql::{self, SqlValue};
use crate::db::transaction::{TransactionCoordinator, TransactionState};
use crate::error::{DbError, DbResult};
use crate::models::AdapterConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One profiled statement.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileEntry {
    pub sql: String,
    pub duration: Duration,
    pub recorded_at: DateTime<Utc>,
}

pub struct Database<A: DatabaseAdapter> {
    index: u32,
    config: AdapterConfig,
    adapter: Option<A>,
    coordinator: TransactionCoordinator,
    caching: bool,
    /// `Some` once profiling is enabled.
    profile: Option<Vec<ProfileEntry>>,
}

impl<A: DatabaseAdapter> Database<A> {
    /// Create a disconnected wrapper. The adapter connects on first use.
    pub fn new(index: u32, config: AdapterConfig, context: Arc<CacheContext>) -> Self {
        let caching = config.caching;
        let profile = config.profiling.then(Vec::new);
        Self {
            index,
            config,
            adapter: None,
            coordinator: TransactionCoordinator::new(index, context),
            caching,
            profile,
        }
    }

    /// Connect now instead of on first use. Does nothing if already connected.
    pub async fn connect(&mut self) -> DbResult<()> {
        connected(&mut self.adapter, &self.config).await?;
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.adapter.is_some()
    }

    /// Run a statement that returns rows.
    pub async fn query(&mut self, sql: &str) -> DbResult<QueryResult> {
        let adapter = connected(&mut self.adapter, &self.config).await?;
        let start = Instant::now();
        let result = adapter.execute_query(sql).await;
        self.record(sql, start.elapsed());
        result
    }

    /// Run a statement and return the number of affected rows.
    pub async fn non_query(&mut self, sql: &str) -> DbResult<u64> {
        let adapter = connected(&mut self.adapter, &self.config).await?;
        let start = Instant::now();
        let result = adapter.execute_non_query(sql).await;
        self.record(sql, start.elapsed());
        result
    }

    pub async fn insert_id(&mut self) -> DbResult<Option<i64>> {
        connected(&mut self.adapter, &self.config)
            .await?
            .insert_id()
            .await
    }

    /// Insert a row, or update it when a row with the same key exists.
    pub async fn insert_or_update(
        &mut self,
        table: &str,
        values: &[(&str, SqlValue)],
        pk_names: &[&str],
    ) -> DbResult<u64> {
        let sql = A::insert_or_update_sql(table, values, pk_names)?;
        self.non_query(&sql).await
    }

    /// Inline named `\x03` parameters using this adapter's string escaping.
    pub fn prepare_statement(&self, sql: &str, params: &[(&str, SqlValue)]) -> String {
        sql::prepare_statement_with(sql, params, A::text_escaper())
    }

    pub fn sql_variable(
        &self,
        value: &SqlValue,
        include_equality: bool,
        reverse_equality: bool,
    ) -> String {
        A::sql_variable(value, include_equality, reverse_equality)
    }

    pub fn escape_identifier(&self, identifier: &str) -> String {
        A::escape_identifier(identifier)
    }

    pub fn escape_identifiers(&self, identifiers: &[&str]) -> Vec<String> {
        A::escape_identifiers(identifiers)
    }

    pub fn escape_values(&self, values: &[SqlValue]) -> Vec<String> {
        A::escape_values(values)
    }

    pub fn escape_identifiers_and_values(
        &self,
        values: &[(&str, SqlValue)],
    ) -> Vec<(String, String)> {
        A::escape_identifiers_and_values(values)
    }

    /// EXPLAIN output, or `None` when the adapter cannot explain.
    pub async fn explain_statement(&mut self, sql: &str) -> DbResult<Option<QueryResult>> {
        connected(&mut self.adapter, &self.config)
            .await?
            .explain_statement(sql)
            .await
    }

    /// Close the connection. The next statement reconnects.
    pub async fn close(&mut self) -> DbResult<()> {
        if self.coordinator.is_active() {
            return Err(DbError::invalid_input(format!(
                "Cannot close database #{} inside a transaction",
                self.index
            )));
        }
        if let Some(adapter) = self.adapter.take() {
            adapter.close().await?;
            info!(database_index = self.index, "Connection closed");
        }
        Ok(())
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Begin a transaction, or enter a nested level of the current one.
    pub async fn transaction_begin(&mut self) -> DbResult<()> {
        let adapter = connected(&mut self.adapter, &self.config).await?;
        self.coordinator.begin(adapter, self.caching).await
    }

    /// Commit one level; the outermost commit also publishes cached writes.
    pub async fn transaction_commit(&mut self) -> DbResult<()> {
        match self.adapter.as_mut() {
            Some(adapter) => self.coordinator.commit(adapter).await,
            // An open transaction implies a connection.
            None => {
                warn!(
                    database_index = self.index,
                    "Commit called without a matching begin"
                );
                Err(DbError::unbalanced_transaction(self.index))
            }
        }
    }

    /// Roll back the whole transaction and discard cached writes.
    pub async fn transaction_rollback(&mut self) -> DbResult<()> {
        match self.adapter.as_mut() {
            Some(adapter) => self.coordinator.rollback(adapter).await,
            None => {
                debug!(database_index = self.index, "Rollback on a closed connection");
                Ok(())
            }
        }
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.coordinator.state()
    }

    pub fn transaction_depth(&self) -> u32 {
        self.coordinator.depth()
    }

    /// Cache context shared with the other databases of the application.
    pub fn cache(&self) -> &Arc<CacheContext> {
        self.coordinator.context()
    }

    // =========================================================================
    // Profiling
    // =========================================================================

    /// Start profiling. Calling it again keeps the entries recorded so far.
    pub fn enable_profiling(&mut self) {
        if self.profile.is_none() {
            self.profile = Some(Vec::new());
            info!(database_index = self.index, "Profiling enabled");
        }
    }

    pub fn is_profiling(&self) -> bool {
        self.profile.is_some()
    }

    /// Statements recorded since profiling was enabled.
    pub fn profile(&self) -> &[ProfileEntry] {
        self.profile.as_deref().unwrap_or_default()
    }

    /// Drain the recorded statements, leaving profiling enabled.
    pub fn take_profile(&mut self) -> Vec<ProfileEntry> {
        self.profile.as_mut().map(std::mem::take).unwrap_or_default()
    }

    fn record(&mut self, sql: &str, duration: Duration) {
        debug!(
            database_index = self.index,
            elapsed_ms = duration.as_millis() as u64,
            "Statement executed"
        );
        if let Some(profile) = self.profile.as_mut() {
            profile.push(ProfileEntry {
                sql: sql.to_string(),
                duration,
                recorded_at: Utc::now(),
            });
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn database_index(&self) -> u32 {
        self.index
    }

    /// `"<ADAPTER> (<scheme>)"`, e.g. `SQLite (sqlite)`.
    pub fn adapter_name(&self) -> String {
        format!("{} ({})", A::ADAPTER, self.config.adapter)
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn server(&self) -> Option<&str> {
        self.config.server.as_deref()
    }

    pub fn port(&self) -> Option<u16> {
        self.config.port
    }

    pub fn database(&self) -> Option<&str> {
        self.config.database.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.config.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.config.password.as_deref()
    }

    pub fn caching(&self) -> bool {
        self.caching
    }

    /// Takes effect at the next outermost begin; an installed proxy stays.
    pub fn set_caching(&mut self, caching: bool) {
        self.caching = caching;
    }

    pub fn date_format(&self) -> &str {
        self.config.date_format_or_default()
    }

    pub fn escape_identifier_begin(&self) -> &'static str {
        A::ESCAPE_IDENTIFIER_BEGIN
    }

    pub fn escape_identifier_end(&self) -> &'static str {
        A::ESCAPE_IDENTIFIER_END
    }

    /// False until connected.
    pub fn only_full_group_by(&self) -> bool {
        self.adapter.as_ref().is_some_and(|a| a.only_full_group_by())
    }
}

/// Borrow the adapter, connecting first if needed.
async fn connected<'a, A: DatabaseAdapter>(
    slot: &'a mut Option<A>,
    config: &AdapterConfig,
) -> DbResult<&'a mut A> {
    if slot.is_none() {
        let adapter = A::connect(config).await?;
        info!(
            id = %config.id,
            adapter = A::ADAPTER,
            "Connected"
        );
        *slot = Some(adapter);
    }
    slot.as_mut()
        .ok_or_else(|| DbError::internal("adapter missing after connect"))
}

impl<A: DatabaseAdapter> std::fmt::Debug for Database<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("index", &self.index)
            .field("adapter", &self.adapter_name())
            .field("connected", &self.is_connected())
            .field("caching", &self.caching)
            .field("transaction", &self.coordinator.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheProvider, MemoryCache};
    use crate::db::SqliteAdapter;
    use serde_json::json;

    fn memory_db(url: &str, context: Arc<CacheContext>) -> Database<SqliteAdapter> {
        Database::new(1, AdapterConfig::parse(url).unwrap(), context)
    }

    #[tokio::test]
    async fn test_connects_on_first_query() {
        let mut db = memory_db("sqlite::memory:", Arc::new(CacheContext::new()));
        assert!(!db.is_connected());
        db.query("SELECT 1 AS one").await.unwrap();
        assert!(db.is_connected());

        db.close().await.unwrap();
        assert!(!db.is_connected());
    }

    #[tokio::test]
    async fn test_profiling() {
        let mut db = memory_db("sqlite::memory:", Arc::new(CacheContext::new()));
        db.non_query("CREATE TABLE t (v INTEGER)").await.unwrap();
        assert!(db.profile().is_empty());

        db.enable_profiling();
        db.non_query("INSERT INTO t (v) VALUES (1)").await.unwrap();
        db.query("SELECT v FROM t").await.unwrap();
        db.enable_profiling();

        let sqls: Vec<&str> = db.profile().iter().map(|e| e.sql.as_str()).collect();
        assert_eq!(sqls, vec!["INSERT INTO t (v) VALUES (1)", "SELECT v FROM t"]);
        assert_eq!(db.take_profile().len(), 2);
        assert!(db.profile().is_empty());
        assert!(db.is_profiling());
    }

    #[tokio::test]
    async fn test_profiling_from_config() {
        let mut db = memory_db("sqlite::memory:?profiling=true", Arc::new(CacheContext::new()));
        db.query("SELECT 1").await.unwrap();
        assert_eq!(db.profile().len(), 1);
    }

    #[test]
    fn test_accessors() {
        let db = memory_db(
            "sqlite:data/app.db?caching=true&date_format=%25d.%25m.%25Y",
            Arc::new(CacheContext::new()),
        );
        assert_eq!(db.adapter_name(), "SQLite (sqlite)");
        assert_eq!(db.database_index(), 1);
        assert_eq!(db.database(), Some("app"));
        assert_eq!(db.server(), None);
        assert!(db.caching());
        assert_eq!(db.date_format(), "%d.%m.%Y");
        assert_eq!(db.escape_identifier("name"), "\"name\"");
        assert!(!db.only_full_group_by());
    }

    #[test]
    fn test_prepare_statement_uses_sqlite_quoting() {
        let db = memory_db("sqlite::memory:", Arc::new(CacheContext::new()));
        let sql = db.prepare_statement(
            "SELECT * FROM person WHERE name \x03{=name=}",
            &[("name", SqlValue::from("O'Brien"))],
        );
        assert_eq!(sql, "SELECT * FROM person WHERE name = 'O''Brien'");
    }

    #[tokio::test]
    async fn test_commit_before_connect_is_unbalanced() {
        let mut db = memory_db("sqlite::memory:", Arc::new(CacheContext::new()));
        assert!(matches!(
            db.transaction_commit().await,
            Err(DbError::UnbalancedTransaction { database_index: 1 })
        ));
        db.transaction_rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_transaction_publishes_cache_on_commit() {
        let base = MemoryCache::shared();
        let context = Arc::new(CacheContext::with_provider(base.clone()));
        let mut db = memory_db("sqlite::memory:?caching=true", context.clone());

        db.non_query("CREATE TABLE person (id INTEGER PRIMARY KEY, name TEXT)")
            .await
            .unwrap();

        db.transaction_begin().await.unwrap();
        db.non_query("INSERT INTO person (name) VALUES ('alice')")
            .await
            .unwrap();
        let id = db.insert_id().await.unwrap().unwrap();
        let id_text = id.to_string();
        let key = base.create_key(&["1", "person", id_text.as_str()]);
        db.cache().set(&key, json!({"id": id, "name": "alice"})).unwrap();
        assert!(base.is_empty());

        db.transaction_commit().await.unwrap();
        assert_eq!(base.get(&key).unwrap(), Some(json!({"id": 1, "name": "alice"})));
    }

    #[tokio::test]
    async fn test_close_inside_transaction_fails() {
        let mut db = memory_db("sqlite::memory:", Arc::new(CacheContext::new()));
        db.transaction_begin().await.unwrap();
        assert!(db.close().await.is_err());
        db.transaction_rollback().await.unwrap();
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_or_update() {
        let mut db = memory_db("sqlite::memory:", Arc::new(CacheContext::new()));
        db.non_query("CREATE TABLE kv (k TEXT PRIMARY KEY, v INTEGER)")
            .await
            .unwrap();
        db.insert_or_update("kv", &[("k", "a".into()), ("v", 1.into())], &["k"])
            .await
            .unwrap();
        db.insert_or_update("kv", &[("k", "a".into()), ("v", 2.into())], &["k"])
            .await
            .unwrap();

        let mut result = db.query("SELECT v FROM kv WHERE k = 'a'").await.unwrap();
        assert_eq!(result.count_rows(), 1);
        assert_eq!(result.next_row().unwrap().get_column("v"), Some(&json!(2)));
    }
}
