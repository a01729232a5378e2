//! Primary key support emitted for every generated type.
//!
//! Three shapes, chosen by the number of key columns:
//! - one column: the key is that field
//! - several columns: the key is the parts joined by `make_multi_key`, and
//!   reading it from a row yields `None` as soon as one part is NULL
//! - none: both accessors return `None`

use crate::codegen::table::field_ident;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnModel, DatabaseFieldType, TableModel};
use std::fmt::Write as _;

/// Render the `impl PrimaryKey` block for `table`.
pub fn render_pk_support(table: &TableModel) -> DbResult<String> {
    let pk_columns = table.primary_key_columns();
    if let Some(blob) = pk_columns
        .iter()
        .find(|c| c.field_type == DatabaseFieldType::Blob)
    {
        return Err(DbError::codegen(
            &table.name,
            format!("blob column '{}' cannot be part of a primary key", blob.name),
        ));
    }

    let body = match pk_columns.as_slice() {
        [] => render_none(),
        [column] => render_single(column),
        columns => render_composite(columns),
    };

    let mut out = String::new();
    let _ = writeln!(out, "impl PrimaryKey for {} {{", table.struct_name);
    let _ = writeln!(out, "    const TABLE: &'static str = {:?};", table.name);
    out.push_str(&body);
    out.push_str("}\n");
    Ok(out)
}

fn render_single(column: &ColumnModel) -> String {
    let field = field_ident(&column.variable_name);
    let value = if column.field_type.is_copy() {
        format!("self.{}", field)
    } else {
        format!("self.{}.clone()", field)
    };

    let mut out = String::new();
    let _ = writeln!(out, "    type Key = {};", column.field_type.rust_type());
    out.push('\n');
    out.push_str("    /// Returns a single unique value representing the primary key.\n");
    out.push_str("    fn primary_key(&self) -> Option<Self::Key> {\n");
    let _ = writeln!(out, "        Some({})", value);
    out.push_str("    }\n\n");
    out.push_str(ROW_PK_SIGNATURE);
    let _ = writeln!(
        out,
        "        orm::row_column::<{}>(row, alias_prefix, aliases, {:?})",
        column.field_type.rust_type(),
        column.name
    );
    out.push_str("    }\n");
    out
}

fn render_composite(columns: &[&ColumnModel]) -> String {
    let parts = columns
        .iter()
        .map(|c| format!("self.{}.to_string()", field_ident(&c.variable_name)))
        .collect::<Vec<_>>()
        .join(", ");

    let mut out = String::new();
    out.push_str("    type Key = String;\n\n");
    out.push_str("    /// Returns a single unique value representing the composite primary key.\n");
    out.push_str("    fn primary_key(&self) -> Option<Self::Key> {\n");
    let _ = writeln!(out, "        Some(orm::make_multi_key([{}]))", parts);
    out.push_str("    }\n\n");
    out.push_str(ROW_PK_SIGNATURE);
    let _ = writeln!(
        out,
        "        let mut values = Vec::with_capacity({});",
        columns.len()
    );
    for column in columns {
        let _ = writeln!(
            out,
            "        let Some(value) = orm::row_column::<{}>(row, alias_prefix, aliases, {:?})? else {{",
            column.field_type.rust_type(),
            column.name
        );
        out.push_str("            return Ok(None);\n");
        out.push_str("        };\n");
        out.push_str("        values.push(value.to_string());\n");
    }
    out.push_str("        Ok(Some(orm::make_multi_key(values)))\n");
    out.push_str("    }\n");
    out
}

fn render_none() -> String {
    let mut out = String::new();
    out.push_str("    type Key = String;\n\n");
    out.push_str("    /// The table has no primary key.\n");
    out.push_str("    fn primary_key(&self) -> Option<Self::Key> {\n");
    out.push_str("        None\n");
    out.push_str("    }\n\n");
    out.push_str("    fn row_primary_key(\n");
    out.push_str("        _row: &DbRow,\n");
    out.push_str("        _alias_prefix: &str,\n");
    out.push_str("        _aliases: &ColumnAliases,\n");
    out.push_str("    ) -> DbResult<Option<Self::Key>> {\n");
    out.push_str("        Ok(None)\n");
    out.push_str("    }\n");
    out
}

const ROW_PK_SIGNATURE: &str = "    /// Returns the primary key directly from a database row.
    fn row_primary_key(
        row: &DbRow,
        alias_prefix: &str,
        aliases: &ColumnAliases,
    ) -> DbResult<Option<Self::Key>> {
";
