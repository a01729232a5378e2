//! Configuration for the code-generation CLI.
//!
//! Values come from CLI arguments with environment variable fallbacks.

use crate::codegen::{CodegenOptions, DEFAULT_CRATE_PATH};
use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_OUT_DIR: &str = "src/generated";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration for `db-orm-codegen`.
#[derive(Debug, Clone, Parser)]
#[command(name = "db-orm-codegen")]
#[command(about = "Generate data-access types from a schema description")]
#[command(version)]
pub struct Config {
    /// Schema description (JSON) to generate from
    #[arg(long, short = 's', value_name = "FILE", env = "DB_ORM_SCHEMA")]
    pub schema: PathBuf,

    /// Directory the generated modules are written to
    #[arg(
        long,
        short = 'o',
        value_name = "DIR",
        default_value = DEFAULT_OUT_DIR,
        env = "DB_ORM_OUT_DIR"
    )]
    pub out_dir: PathBuf,

    /// Path generated code uses to reach the runtime crate
    #[arg(long, default_value = DEFAULT_CRATE_PATH, env = "DB_ORM_CRATE_PATH")]
    pub crate_path: String,

    /// Render and report the modules without writing them
    #[arg(long)]
    pub dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = DEFAULT_LOG_LEVEL, env = "DB_ORM_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "DB_ORM_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Rendering options derived from the arguments.
    pub fn codegen_options(&self) -> CodegenOptions {
        CodegenOptions {
            crate_path: self.crate_path.clone(),
        }
    }
}
