//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - The adapter contract and the SQLite adapter
//! - The `Database` wrapper with connect-on-demand and profiling
//! - Nested transactions coordinated with the shared cache
//! - SQL literal formatting and statement preparation
//! - Result rows and SQLite type decoding

pub mod adapter;
pub mod context;
pub mod database;
pub mod row;
pub mod sql;
pub mod sqlite;
pub mod transaction;
pub mod types;

pub use adapter::{DatabaseAdapter, TransactionExecutor};
pub use context::CacheContext;
pub use database::{Database, ProfileEntry};
pub use row::{ColumnMetadata, DbRow, QueryResult};
pub use sql::SqlValue;
pub use sqlite::SqliteAdapter;
pub use transaction::{TransactionCoordinator, TransactionState};
