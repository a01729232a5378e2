//! SQLite adapter over a single sqlx connection.
//!
//! A single connection rather than a pool: transactions are started with
//! plain `BEGIN`/`COMMIT` statements, so every statement of a transaction
//! must run on the same connection.

use crate::db::adapter::{self, DatabaseAdapter, TransactionExecutor};
use crate::db::row::QueryResult;
use crate::db::sql::{self, SqlValue, TextEscaper};
use crate::db::types;
use crate::error::{DbError, DbResult};
use crate::models::{AdapterConfig, DatabaseType};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection, Executor};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

pub struct SqliteAdapter {
    conn: SqliteConnection,
    query_timeout: Duration,
}

impl SqliteAdapter {
    async fn run_statement(&mut self, sql: &str, operation: &str) -> DbResult<u64> {
        match timeout(self.query_timeout, (&mut self.conn).execute(sql)).await {
            Ok(Ok(r)) => Ok(r.rows_affected()),
            Ok(Err(e)) => Err(DbError::from(e)),
            Err(_) => Err(timeout_error(operation, self.query_timeout)),
        }
    }
}

fn timeout_error(operation: &str, timeout: Duration) -> DbError {
    DbError::timeout(operation, timeout.as_secs() as u32)
}

impl TransactionExecutor for SqliteAdapter {
    async fn execute_transaction_begin(&mut self) -> DbResult<()> {
        self.run_statement("BEGIN", "transaction begin").await?;
        Ok(())
    }

    async fn execute_transaction_commit(&mut self) -> DbResult<()> {
        self.run_statement("COMMIT", "transaction commit").await?;
        Ok(())
    }

    async fn execute_transaction_rollback(&mut self) -> DbResult<()> {
        self.run_statement("ROLLBACK", "transaction rollback").await?;
        Ok(())
    }
}

impl DatabaseAdapter for SqliteAdapter {
    const ADAPTER: &'static str = "SQLite";

    async fn connect(config: &AdapterConfig) -> DbResult<Self> {
        if config.db_type != DatabaseType::SQLite {
            return Err(DbError::config(format!(
                "SQLite adapter cannot open a {} connection",
                config.db_type
            )));
        }

        let options = SqliteConnectOptions::from_str(&config.connection_string)
            .map_err(|e| {
                DbError::connection(
                    format!("Invalid SQLite connection string: {}", e),
                    "Check the connection URL format: sqlite:path/to/db.sqlite",
                )
            })?
            .create_if_missing(true);

        let conn = options.connect().await.map_err(|e| {
            DbError::connection(
                format!("Failed to connect: {}", e),
                "Verify the file path exists and is accessible: sqlite:path/to/db.sqlite",
            )
        })?;
        debug!(id = %config.id, "Opened SQLite connection");

        Ok(Self {
            conn,
            query_timeout: Duration::from_secs(config.query_timeout_or_default().into()),
        })
    }

    async fn execute_query(&mut self, sql: &str) -> DbResult<QueryResult> {
        match timeout(self.query_timeout, (&mut self.conn).fetch_all(sql)).await {
            Ok(Ok(rows)) => Ok(types::decode_rows(&rows, false)),
            Ok(Err(e)) => Err(DbError::from(e)),
            Err(_) => Err(timeout_error("query execution", self.query_timeout)),
        }
    }

    async fn execute_non_query(&mut self, sql: &str) -> DbResult<u64> {
        self.run_statement(sql, "write operation").await
    }

    async fn insert_id(&mut self) -> DbResult<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>("SELECT last_insert_rowid()")
            .fetch_one(&mut self.conn)
            .await?;
        // 0 means no row was ever inserted on this connection
        Ok(Some(id).filter(|&id| id != 0))
    }

    async fn close(self) -> DbResult<()> {
        self.conn.close().await?;
        Ok(())
    }

    fn text_escaper() -> TextEscaper {
        sql::double_quotes
    }

    async fn explain_statement(&mut self, sql: &str) -> DbResult<Option<QueryResult>> {
        let plan = self
            .execute_query(&format!("EXPLAIN QUERY PLAN {}", sql))
            .await?;
        Ok(Some(plan))
    }

    fn insert_or_update_sql(
        table: &str,
        values: &[(&str, SqlValue)],
        pk_names: &[&str],
    ) -> DbResult<String> {
        let escaped = Self::escape_identifiers_and_values(values);
        let conflict_columns = adapter::match_columns::<Self>(&escaped, pk_names, table)?;
        Ok(sql::on_conflict_upsert(
            &Self::escape_identifier(table),
            &escaped,
            &conflict_columns,
        ))
    }
}

impl std::fmt::Debug for SqliteAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAdapter")
            .field("query_timeout", &self.query_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn memory_adapter() -> SqliteAdapter {
        let config = AdapterConfig::parse("sqlite::memory:").unwrap();
        SqliteAdapter::connect(&config).await.unwrap()
    }

    #[tokio::test]
    async fn test_query_and_insert_id() {
        let mut adapter = memory_adapter().await;
        adapter
            .execute_non_query("CREATE TABLE person (id INTEGER PRIMARY KEY, name TEXT, active BOOLEAN)")
            .await
            .unwrap();
        assert_eq!(adapter.insert_id().await.unwrap(), None);

        let affected = adapter
            .execute_non_query("INSERT INTO person (name, active) VALUES ('alice', 1)")
            .await
            .unwrap();
        assert_eq!(affected, 1);
        assert_eq!(adapter.insert_id().await.unwrap(), Some(1));

        let mut result = adapter
            .execute_query("SELECT id, name, active FROM person")
            .await
            .unwrap();
        assert_eq!(result.count_rows(), 1);
        let row = result.next_row().unwrap();
        assert_eq!(row.get_column("name"), Some(&json!("alice")));
        assert_eq!(row.get_column("active"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_transaction_rollback_discards_rows() {
        let mut adapter = memory_adapter().await;
        adapter
            .execute_non_query("CREATE TABLE t (v INTEGER)")
            .await
            .unwrap();
        adapter.execute_transaction_begin().await.unwrap();
        adapter
            .execute_non_query("INSERT INTO t (v) VALUES (1)")
            .await
            .unwrap();
        adapter.execute_transaction_rollback().await.unwrap();

        let result = adapter.execute_query("SELECT v FROM t").await.unwrap();
        assert_eq!(result.count_rows(), 0);
    }

    #[tokio::test]
    async fn test_commit_without_begin_fails() {
        let mut adapter = memory_adapter().await;
        assert!(adapter.execute_transaction_commit().await.is_err());
    }

    #[tokio::test]
    async fn test_upsert_sql() {
        let mut adapter = memory_adapter().await;
        adapter
            .execute_non_query("CREATE TABLE kv (k TEXT PRIMARY KEY, v TEXT)")
            .await
            .unwrap();

        for value in ["first", "it's second"] {
            let sql = SqliteAdapter::insert_or_update_sql(
                "kv",
                &[("k", "a".into()), ("v", value.into())],
                &[],
            )
            .unwrap();
            adapter.execute_non_query(&sql).await.unwrap();
        }

        let mut result = adapter.execute_query("SELECT k, v FROM kv").await.unwrap();
        assert_eq!(result.count_rows(), 1);
        assert_eq!(
            result.next_row().unwrap().get_column("v"),
            Some(&json!("it's second"))
        );
    }

    #[tokio::test]
    async fn test_explain_statement() {
        let mut adapter = memory_adapter().await;
        adapter
            .execute_non_query("CREATE TABLE t (v INTEGER)")
            .await
            .unwrap();
        let plan = adapter
            .explain_statement("SELECT * FROM t")
            .await
            .unwrap()
            .unwrap();
        assert!(plan.count_rows() >= 1);
    }

    #[tokio::test]
    async fn test_connect_rejects_other_database_types() {
        let config = AdapterConfig::parse("postgres://localhost/db").unwrap();
        assert!(matches!(
            SqliteAdapter::connect(&config).await,
            Err(DbError::Config { .. })
        ));
    }
}
