//! Data-access code generation.
//!
//! Turns a schema description into one Rust module per table:
//! - `table`: the struct, its column list and its [`FromDbRow`](crate::orm::FromDbRow) impl
//! - `pk_support`: the [`PrimaryKey`](crate::orm::PrimaryKey) impl
//! - `generator`: writes the modules and their `mod.rs`

pub mod generator;
pub mod pk_support;
pub mod table;

pub use generator::{CodeGenerator, SchemaFile};
pub use pk_support::render_pk_support;
pub use table::render_table;

/// Default path generated code uses to reach this crate.
pub const DEFAULT_CRATE_PATH: &str = "db_orm_layer";

/// Rendering options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenOptions {
    /// Path of this crate as seen from the generated code.
    pub crate_path: String,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            crate_path: DEFAULT_CRATE_PATH.to_string(),
        }
    }
}
