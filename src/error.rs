//! Error types for the ORM database layer.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Adapter failures and cache faults are propagated unmodified through the
//! transaction coordinator; nothing in this crate logs-and-swallows an error.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Cache error: {message}")]
    Cache { message: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error(
        "Unbalanced transaction: commit called on database #{database_index} before a matching begin"
    )]
    UnbalancedTransaction { database_index: u32 },

    #[error(
        "Transaction order violated on database #{database_index}: cache frame {frame} resolved while {stack_depth} frames are active"
    )]
    TransactionOrder {
        database_index: u32,
        frame: usize,
        stack_depth: usize,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Code generation failed for '{table}': {message}")]
    Codegen { table: String, message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Create a cache provider error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an unbalanced transaction error.
    pub fn unbalanced_transaction(database_index: u32) -> Self {
        Self::UnbalancedTransaction { database_index }
    }

    /// Create a transaction ordering error.
    pub fn transaction_order(database_index: u32, frame: usize, stack_depth: usize) -> Self {
        Self::TransactionOrder {
            database_index,
            frame,
            stack_depth,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a code generation error.
    pub fn codegen(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Codegen {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            Self::UnbalancedTransaction { .. } => {
                Some("Every transaction_commit must be preceded by a transaction_begin")
            }
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }

    /// True for failures raised by an adapter or a cache provider.
    pub fn is_execution_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::Database { .. }
                | Self::Cache { .. }
                | Self::Timeout { .. }
        )
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(
                    db_err.message(),
                    code,
                    "Check the SQL syntax and referenced objects",
                )
            }
            sqlx::Error::RowNotFound => DbError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => DbError::timeout("connection acquire", 30),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Reconnect to the database")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check the database file path and permissions",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => DbError::database(
                format!("Column not found: {}", col),
                None,
                "Check the selected column names",
            ),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::connection("Failed to connect", "Check credentials");
        assert!(err.to_string().contains("Connection failed"));
    }

    #[test]
    fn test_error_suggestion() {
        let err = DbError::database(
            "Syntax error",
            Some("42601".to_string()),
            "Check SQL syntax",
        );
        assert_eq!(err.suggestion(), Some("Check SQL syntax"));
    }

    #[test]
    fn test_unbalanced_transaction_message() {
        let err = DbError::unbalanced_transaction(2);
        assert!(err.to_string().contains("database #2"));
        assert!(err.suggestion().is_some());
        assert!(!err.is_execution_error());
    }

    #[test]
    fn test_execution_errors() {
        assert!(DbError::cache("backend down").is_execution_error());
        assert!(DbError::database("boom", None, "retry").is_execution_error());
        assert!(!DbError::invalid_input("bad").is_execution_error());
    }

    #[test]
    fn test_error_retryable() {
        assert!(DbError::connection("err", "sugg").is_retryable());
        assert!(!DbError::cache("err").is_retryable());
        assert!(!DbError::unbalanced_transaction(0).is_retryable());
    }

    #[test]
    fn test_transaction_order_message() {
        let err = DbError::transaction_order(1, 1, 2);
        let msg = err.to_string();
        assert!(msg.contains("frame 1"));
        assert!(msg.contains("2 frames"));
    }
}
