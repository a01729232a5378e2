//! Rust source for one table: the struct, its row loader, and its key.

use crate::codegen::CodegenOptions;
use crate::codegen::pk_support::render_pk_support;
use crate::error::{DbError, DbResult};
use crate::models::{TableModel, extract_comment_options};
use std::collections::HashSet;
use std::fmt::Write as _;

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod",
    "move", "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait",
    "true", "type", "unsafe", "use", "where", "while", "abstract", "become", "box", "do",
    "final", "macro", "override", "priv", "try", "typeof", "unsized", "virtual", "yield",
];

/// Keywords that cannot be written as raw identifiers.
const RESERVED: &[&str] = &["self", "Self", "crate", "super"];

/// `type` → `r#type`; other names unchanged.
pub fn field_ident(name: &str) -> String {
    if KEYWORDS.contains(&name) {
        format!("r#{}", name)
    } else {
        name.to_string()
    }
}

/// Check that `table` can be rendered as valid Rust.
pub fn validate(table: &TableModel) -> DbResult<()> {
    if table.columns.is_empty() {
        return Err(DbError::codegen(&table.name, "table has no columns"));
    }
    if !is_identifier(&table.struct_name) {
        return Err(DbError::codegen(
            &table.name,
            format!("'{}' is not a valid type name", table.struct_name),
        ));
    }

    let mut seen = HashSet::new();
    for column in &table.columns {
        if !is_identifier(&column.variable_name) {
            return Err(DbError::codegen(
                &table.name,
                format!("'{}' is not a valid field name", column.variable_name),
            ));
        }
        if !seen.insert(column.variable_name.as_str()) {
            return Err(DbError::codegen(
                &table.name,
                format!("duplicate field '{}'", column.variable_name),
            ));
        }
    }
    Ok(())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name != "_"
        && !RESERVED.contains(&name)
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Render the complete source file for `table`.
pub fn render_table(table: &TableModel, options: &CodegenOptions) -> DbResult<String> {
    validate(table)?;

    let mut out = String::new();
    let _ = writeln!(out, "//! Generated from table `{}`. Do not edit.", table.name);
    out.push('\n');
    let _ = writeln!(out, "use {}::db::DbRow;", options.crate_path);
    let _ = writeln!(out, "use {}::error::DbResult;", options.crate_path);
    let _ = writeln!(
        out,
        "use {}::orm::{{self, ColumnAliases, FromDbRow, PrimaryKey}};",
        options.crate_path
    );
    out.push('\n');

    out.push_str(&render_struct(table));
    out.push('\n');
    out.push_str(&render_columns(table));
    out.push('\n');
    out.push_str(&render_from_row(table));
    out.push('\n');
    out.push_str(&render_pk_support(table)?);
    Ok(out)
}

fn render_struct(table: &TableModel) -> String {
    let mut out = String::new();
    if let Some(comment) = table
        .comment
        .as_deref()
        .map(|c| extract_comment_options(c).comment)
        .filter(|c| !c.trim().is_empty())
    {
        write_doc(&mut out, "", &comment);
    }
    out.push_str("#[derive(Debug, Clone, PartialEq)]\n");
    let _ = writeln!(out, "pub struct {} {{", table.struct_name);
    for column in &table.columns {
        if let Some(description) = column.description() {
            write_doc(&mut out, "    ", &description);
        }
        let _ = writeln!(
            out,
            "    pub {}: {},",
            field_ident(&column.variable_name),
            column.rust_type()
        );
    }
    out.push_str("}\n");
    out
}

fn render_columns(table: &TableModel) -> String {
    let names = table
        .columns
        .iter()
        .map(|c| format!("{:?}", c.name))
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = String::new();
    let _ = writeln!(out, "impl {} {{", table.struct_name);
    out.push_str("    /// Column names in declaration order.\n");
    let _ = writeln!(out, "    pub const COLUMNS: &'static [&'static str] = &[{}];", names);
    out.push_str("}\n");
    out
}

fn render_from_row(table: &TableModel) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "impl FromDbRow for {} {{", table.struct_name);
    out.push_str(
        "    fn from_db_row(row: &DbRow, alias_prefix: &str, aliases: &ColumnAliases) -> DbResult<Self> {\n",
    );
    out.push_str("        Ok(Self {\n");
    for column in &table.columns {
        let loader = if column.not_null || column.primary_key {
            "row_required"
        } else {
            "row_column"
        };
        let _ = writeln!(
            out,
            "            {}: orm::{}::<{}>(row, alias_prefix, aliases, {:?})?,",
            field_ident(&column.variable_name),
            loader,
            column.field_type.rust_type(),
            column.name
        );
    }
    out.push_str("        })\n");
    out.push_str("    }\n");
    out.push_str("}\n");
    out
}

fn write_doc(out: &mut String, indent: &str, text: &str) {
    for line in text.trim().lines() {
        let line = line.trim_end();
        if line.is_empty() {
            let _ = writeln!(out, "{}///", indent);
        } else {
            let _ = writeln!(out, "{}/// {}", indent, line.trim_start());
        }
    }
}
