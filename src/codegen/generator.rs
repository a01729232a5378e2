//! Writes generated modules to disk.

use crate::codegen::CodegenOptions;
use crate::codegen::table::render_table;
use crate::error::{DbError, DbResult};
use crate::models::{TableModel, schema::snake_case};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Schema description read by the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaFile {
    pub tables: Vec<TableModel>,
}

impl SchemaFile {
    /// Parse a schema from JSON text.
    pub fn from_json(text: &str) -> DbResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| DbError::invalid_input(format!("Invalid schema file: {}", e)))
    }

    /// Read and parse a schema file.
    pub fn load(path: &Path) -> DbResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            DbError::config(format!("Cannot read schema file {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }
}

/// Generates one module per table into an output directory.
#[derive(Debug, Clone)]
pub struct CodeGenerator {
    out_dir: PathBuf,
    options: CodegenOptions,
}

impl CodeGenerator {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            options: CodegenOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CodegenOptions) -> Self {
        self.options = options;
        self
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Render every table without touching the filesystem.
    ///
    /// Returns `(module name, source)` pairs in input order, followed by
    /// the `mod` entry listing them.
    pub fn render(&self, tables: &[TableModel]) -> DbResult<Vec<(String, String)>> {
        let mut modules = Vec::with_capacity(tables.len() + 1);
        let mut owners: HashMap<String, String> = HashMap::new();

        for table in tables {
            let mut table = table.clone();
            table.normalize();

            let module = snake_case(&table.struct_name);
            if let Some(other) = owners.insert(module.clone(), table.name.clone()) {
                return Err(DbError::codegen(
                    &table.name,
                    format!("module '{}' is also generated for table '{}'", module, other),
                ));
            }

            let source = render_table(&table, &self.options)?;
            debug!(table = %table.name, module = %module, "Rendered table");
            modules.push((module, source));
        }

        let mod_rs = render_mod(
            tables,
            &modules
                .iter()
                .map(|(module, _)| module.as_str())
                .collect::<Vec<_>>(),
        );
        modules.push(("mod".to_string(), mod_rs));
        Ok(modules)
    }

    /// Render and write every table plus `mod.rs`. Returns the written paths.
    pub fn generate(&self, tables: &[TableModel]) -> DbResult<Vec<PathBuf>> {
        let modules = self.render(tables)?;

        fs::create_dir_all(&self.out_dir).map_err(|e| {
            DbError::config(format!(
                "Cannot create output directory {}: {}",
                self.out_dir.display(),
                e
            ))
        })?;

        let mut written = Vec::with_capacity(modules.len());
        for (module, source) in modules {
            let path = self.out_dir.join(format!("{}.rs", module));
            fs::write(&path, source).map_err(|e| {
                DbError::internal(format!("Cannot write {}: {}", path.display(), e))
            })?;
            written.push(path);
        }

        info!(
            out_dir = %self.out_dir.display(),
            tables = tables.len(),
            "Generated data-access modules"
        );
        Ok(written)
    }
}

fn render_mod(tables: &[TableModel], modules: &[&str]) -> String {
    let mut out = String::from("//! Generated data-access types. Do not edit.\n\n");
    for module in modules {
        out.push_str(&format!("pub mod {};\n", module));
    }
    if !modules.is_empty() {
        out.push('\n');
    }
    for (table, module) in tables.iter().zip(modules) {
        let mut table = table.clone();
        table.normalize();
        out.push_str(&format!("pub use {}::{};\n", module, table.struct_name));
    }
    out
}
