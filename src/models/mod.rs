//! Data models for the ORM database layer.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod schema;

// Re-export commonly used types
pub use connection::{
    AdapterConfig, ConnectionConfigError, DEFAULT_DATE_FORMAT, DEFAULT_QUERY_TIMEOUT_SECS,
    DatabaseType,
};
pub use schema::{
    ColumnModel, CommentOptions, DatabaseFieldType, DatabaseForeignKey, DatabaseIndex,
    TableModel, extract_comment_options,
};
