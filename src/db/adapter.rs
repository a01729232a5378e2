//! The contract every concrete database adapter fulfils.
//!
//! Adapters only supply the primitive operations; connect-on-demand,
//! profiling, and nested transaction handling live in
//! [`Database`](crate::db::Database).

use crate::db::row::QueryResult;
use crate::db::sql::{self, SqlValue, TextEscaper};
use crate::error::{DbError, DbResult};
use crate::models::AdapterConfig;
use std::future::Future;

/// The three raw transaction primitives.
///
/// Split out of [`DatabaseAdapter`] so the transaction coordinator can be
/// driven by anything that can begin, commit, and roll back.
pub trait TransactionExecutor: Send {
    fn execute_transaction_begin(&mut self) -> impl Future<Output = DbResult<()>> + Send;

    fn execute_transaction_commit(&mut self) -> impl Future<Output = DbResult<()>> + Send;

    fn execute_transaction_rollback(&mut self) -> impl Future<Output = DbResult<()>> + Send;
}

/// A concrete database driver.
pub trait DatabaseAdapter: TransactionExecutor + Sized {
    /// Short adapter name, e.g. `SQLite`.
    const ADAPTER: &'static str;

    /// Opening identifier quote.
    const ESCAPE_IDENTIFIER_BEGIN: &'static str = "\"";

    /// Closing identifier quote.
    const ESCAPE_IDENTIFIER_END: &'static str = "\"";

    /// Open a connection for `config`.
    fn connect(config: &AdapterConfig) -> impl Future<Output = DbResult<Self>> + Send;

    fn execute_query(&mut self, sql: &str) -> impl Future<Output = DbResult<QueryResult>> + Send;

    /// Run a statement and return the number of affected rows.
    fn execute_non_query(&mut self, sql: &str) -> impl Future<Output = DbResult<u64>> + Send;

    /// Row id generated by the last insert on this connection.
    fn insert_id(&mut self) -> impl Future<Output = DbResult<Option<i64>>> + Send;

    fn close(self) -> impl Future<Output = DbResult<()>> + Send;

    /// Whether the server rejects non-aggregated columns outside GROUP BY.
    fn only_full_group_by(&self) -> bool {
        false
    }

    /// EXPLAIN output for `sql`, or `None` when the adapter has no support.
    fn explain_statement(
        &mut self,
        _sql: &str,
    ) -> impl Future<Output = DbResult<Option<QueryResult>>> + Send {
        async { Ok(None) }
    }

    /// String escaper used for text literals.
    fn text_escaper() -> TextEscaper {
        sql::add_slashes
    }

    fn escape_identifier(identifier: &str) -> String {
        format!(
            "{}{}{}",
            Self::ESCAPE_IDENTIFIER_BEGIN,
            identifier,
            Self::ESCAPE_IDENTIFIER_END
        )
    }

    fn escape_identifiers(identifiers: &[&str]) -> Vec<String> {
        identifiers
            .iter()
            .map(|identifier| Self::escape_identifier(identifier))
            .collect()
    }

    fn sql_variable(value: &SqlValue, include_equality: bool, reverse_equality: bool) -> String {
        sql::sql_variable_with(value, include_equality, reverse_equality, Self::text_escaper())
    }

    fn escape_values(values: &[SqlValue]) -> Vec<String> {
        sql::escape_values_with(values, Self::text_escaper())
    }

    /// Escaped `(column, literal)` pairs.
    fn escape_identifiers_and_values(values: &[(&str, SqlValue)]) -> Vec<(String, String)> {
        values
            .iter()
            .map(|(column, value)| {
                (
                    Self::escape_identifier(column),
                    Self::sql_variable(value, false, false),
                )
            })
            .collect()
    }

    /// SQL that inserts `values` into `table` or updates the row matching
    /// `pk_names`. With no key names the first column is the match column.
    fn insert_or_update_sql(
        table: &str,
        values: &[(&str, SqlValue)],
        pk_names: &[&str],
    ) -> DbResult<String> {
        let escaped = Self::escape_identifiers_and_values(values);
        let match_columns = match_columns::<Self>(&escaped, pk_names, table)?;
        Ok(sql::merge_upsert(
            &Self::escape_identifier(table),
            &escaped,
            &match_columns,
        ))
    }
}

/// Escaped key columns for an upsert, defaulting to the first value column.
pub(crate) fn match_columns<A: DatabaseAdapter>(
    escaped: &[(String, String)],
    pk_names: &[&str],
    table: &str,
) -> DbResult<Vec<String>> {
    if !pk_names.is_empty() {
        return Ok(A::escape_identifiers(pk_names));
    }
    escaped
        .first()
        .map(|(column, _)| vec![column.clone()])
        .ok_or_else(|| {
            DbError::invalid_input(format!("insert_or_update on '{}' needs at least one column", table))
        })
}
