//! Database abstraction layer with transaction-aware caching.
//!
//! - [`cache`]: cache providers and the per-transaction proxy
//! - [`db`]: adapters, the [`Database`](db::Database) wrapper and the
//!   transaction coordinator
//! - [`orm`] and [`codegen`]: generated data-access types and their runtime

pub mod cache;
pub mod codegen;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod orm;

pub use cache::{CacheProvider, MemoryCache, NoCache};
pub use config::Config;
pub use db::{CacheContext, Database, DatabaseAdapter, SqliteAdapter};
pub use error::{DbError, DbResult};
pub use models::AdapterConfig;
