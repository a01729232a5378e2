//! Integration tests for data-access code generation.
//!
//! Tests verify that:
//! - A schema file on disk produces one module per table plus `mod.rs`
//! - Generated key support matches the table's primary key shape
//! - Invalid schemas fail before anything is written

use db_orm_layer::codegen::{CodeGenerator, CodegenOptions, SchemaFile};
use db_orm_layer::error::DbError;
use std::fs;
use tempfile::TempDir;

const SCHEMA: &str = r#"{
    "tables": [
        {
            "name": "person",
            "comment": "People known to the system",
            "columns": [
                {"name": "id", "field_type": "Integer", "primary_key": true, "identity": true},
                {"name": "first_name", "field_type": "VarChar", "not_null": true},
                {"name": "type", "field_type": "Integer"}
            ]
        },
        {
            "name": "team_member_project_assn",
            "columns": [
                {"name": "team_member_id", "field_type": "Integer", "primary_key": true},
                {"name": "project_id", "field_type": "Integer", "primary_key": true}
            ]
        },
        {
            "name": "audit_log",
            "columns": [
                {"name": "message", "field_type": "VarChar"}
            ]
        }
    ]
}"#;

fn write_schema(dir: &TempDir, text: &str) -> std::path::PathBuf {
    let path = dir.path().join("schema.json");
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn test_generate_from_schema_file() {
    let dir = TempDir::new().unwrap();
    let schema = SchemaFile::load(&write_schema(&dir, SCHEMA)).unwrap();
    assert_eq!(schema.tables.len(), 3);

    let out_dir = dir.path().join("generated");
    let generator = CodeGenerator::new(&out_dir);
    let written = generator.generate(&schema.tables).unwrap();

    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "person.rs",
            "team_member_project_assn.rs",
            "audit_log.rs",
            "mod.rs"
        ]
    );

    let person = fs::read_to_string(out_dir.join("person.rs")).unwrap();
    assert!(person.contains("pub struct Person {"));
    assert!(person.contains("pub r#type: Option<i64>,"));
    assert!(person.contains("const TABLE: &'static str = \"person\";"));
    assert!(person.contains("type Key = i64;"));

    let assn = fs::read_to_string(out_dir.join("team_member_project_assn.rs")).unwrap();
    assert!(assn.contains("type Key = String;"));
    assert!(assn.contains("orm::make_multi_key(values)"));

    let audit = fs::read_to_string(out_dir.join("audit_log.rs")).unwrap();
    assert!(audit.contains("fn primary_key(&self) -> Option<Self::Key> {\n        None\n"));

    let mod_rs = fs::read_to_string(out_dir.join("mod.rs")).unwrap();
    assert!(mod_rs.contains("pub mod audit_log;"));
    assert!(mod_rs.contains("pub use person::Person;"));
}

#[test]
fn test_crate_path_option() {
    let schema = SchemaFile::from_json(SCHEMA).unwrap();
    let generator = CodeGenerator::new("unused").with_options(CodegenOptions {
        crate_path: "crate".to_string(),
    });

    let modules = generator.render(&schema.tables).unwrap();
    assert!(
        modules
            .iter()
            .filter(|(name, _)| name != "mod")
            .all(|(_, source)| source.contains("use crate::orm::{self, ColumnAliases, FromDbRow, PrimaryKey};"))
    );
}

#[test]
fn test_invalid_schema_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let text = r#"{
        "tables": [
            {"name": "ok", "columns": [{"name": "id", "field_type": "Integer"}]},
            {"name": "files", "columns": [{"name": "digest", "field_type": "Blob", "primary_key": true}]}
        ]
    }"#;
    let schema = SchemaFile::load(&write_schema(&dir, text)).unwrap();

    let out_dir = dir.path().join("generated");
    let result = CodeGenerator::new(&out_dir).generate(&schema.tables);
    assert!(matches!(result, Err(DbError::Codegen { ref table, .. }) if table == "files"));
    assert!(!out_dir.exists());
}

#[test]
fn test_missing_schema_file() {
    let dir = TempDir::new().unwrap();
    let result = SchemaFile::load(&dir.path().join("absent.json"));
    assert!(matches!(result, Err(DbError::Config { .. })));
}
