//! SQL literal formatting and statement preparation.
//!
//! Generated data-access code builds statements as text with named
//! placeholders and lets [`prepare_statement`] inline the escaped values.
//! Placeholders are delimited by the `\x03` control character so they can
//! never collide with user SQL:
//!
//! - `\x03{name}` - the value itself
//! - `\x03{=name=}` - the value with an equality operator (`= 1`, `IS NULL`)
//! - `\x03{!name!}` - the value with an inequality operator (`!= 1`, `IS NOT NULL`)
//!
//! A list parameter replaces `\x03{name}` with its comma-joined values
//! followed by `)`, which closes the `IN (` written by the caller.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Placeholder delimiter.
pub const PLACEHOLDER_DELIMITER: char = '\x03';

/// Escapes the body of a quoted string literal.
pub type TextEscaper = fn(&str) -> String;

/// A value that can be inlined into SQL text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    List(Vec<SqlValue>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<NaiveTime> for SqlValue {
    fn from(v: NaiveTime) -> Self {
        Self::Time(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

impl<T: Into<SqlValue>> From<Vec<T>> for SqlValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

/// Format `value` as a SQL literal, backslash-escaping strings.
///
/// With `include_equality` the literal is prefixed by the comparison
/// operator appropriate for the value: `IS` / `IS NOT` for NULL, `=` / `!=`
/// otherwise. Booleans compare against zero so that any non-zero integer
/// column reads as true.
pub fn sql_variable(value: &SqlValue, include_equality: bool, reverse_equality: bool) -> String {
    sql_variable_with(value, include_equality, reverse_equality, add_slashes)
}

/// [`sql_variable`] with a dialect-specific string escaper.
pub fn sql_variable_with(
    value: &SqlValue,
    include_equality: bool,
    reverse_equality: bool,
    escape_text: TextEscaper,
) -> String {
    if let SqlValue::Bool(b) = value {
        return match (include_equality, reverse_equality, b) {
            (false, _, true) => "1".to_string(),
            (false, _, false) => "0".to_string(),
            (true, false, true) | (true, true, false) => "!= 0".to_string(),
            (true, false, false) | (true, true, true) => "= 0".to_string(),
        };
    }

    let operator = match (include_equality, reverse_equality, value.is_null()) {
        (false, _, _) => "",
        (true, false, true) => "IS ",
        (true, false, false) => "= ",
        (true, true, true) => "IS NOT ",
        (true, true, false) => "!= ",
    };

    let literal = match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        SqlValue::Int(v) => v.to_string(),
        // NaN and infinities have no SQL literal
        SqlValue::Float(v) if !v.is_finite() => "NULL".to_string(),
        SqlValue::Float(v) => v.to_string(),
        SqlValue::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
        SqlValue::Time(t) => format!("'{}'", t.format("%H:%M:%S")),
        SqlValue::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S")),
        SqlValue::Text(s) => format!("'{}'", escape_text(s)),
        SqlValue::List(items) => escape_values_with(items, escape_text).join(","),
    };

    format!("{}{}", operator, literal)
}

/// Backslash-escape quotes, backslashes and NUL bytes.
pub fn add_slashes(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '\'' | '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\0' => out.push_str("\\0"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape a string the standard SQL way, by doubling single quotes.
pub fn double_quotes(s: &str) -> String {
    s.replace('\'', "''")
}

/// Format every value as a plain SQL literal.
pub fn escape_values(values: &[SqlValue]) -> Vec<String> {
    escape_values_with(values, add_slashes)
}

pub fn escape_values_with(values: &[SqlValue], escape_text: TextEscaper) -> Vec<String> {
    values
        .iter()
        .map(|v| sql_variable_with(v, false, false, escape_text))
        .collect()
}

/// Substitute named `\x03` placeholders in `sql` with escaped values.
///
/// Parameters are applied in order; unknown placeholders are left in place.
pub fn prepare_statement(sql: &str, params: &[(&str, SqlValue)]) -> String {
    prepare_statement_with(sql, params, add_slashes)
}

/// [`prepare_statement`] with a dialect-specific string escaper.
pub fn prepare_statement_with(
    sql: &str,
    params: &[(&str, SqlValue)],
    escape_text: TextEscaper,
) -> String {
    let mut query = sql.to_string();
    for (name, value) in params {
        match value {
            SqlValue::List(items) => {
                let joined = escape_values_with(items, escape_text).join(",");
                query = query.replace(&placeholder(name), &format!("{})", joined));
            }
            _ => {
                query = query.replace(
                    &format!("{}{{={}=}}", PLACEHOLDER_DELIMITER, name),
                    &sql_variable_with(value, true, false, escape_text),
                );
                query = query.replace(
                    &format!("{}{{!{}!}}", PLACEHOLDER_DELIMITER, name),
                    &sql_variable_with(value, true, true, escape_text),
                );
                query = query.replace(
                    &placeholder(name),
                    &sql_variable_with(value, false, false, escape_text),
                );
            }
        }
    }
    query
}

/// The plain `\x03{name}` placeholder.
pub fn placeholder(name: &str) -> String {
    format!("{}{{{}}}", PLACEHOLDER_DELIMITER, name)
}

/// Build a standard `MERGE` upsert.
///
/// `table` and every column in `escaped` and `match_columns` must already be
/// escaped identifiers; values must already be SQL literals.
pub fn merge_upsert(table: &str, escaped: &[(String, String)], match_columns: &[String]) -> String {
    let match_condition = match_columns
        .iter()
        .map(|column| format!("target_.{0} = source_.{0}", column))
        .collect::<Vec<_>>()
        .join(" AND ");
    let update = escaped
        .iter()
        .map(|(column, value)| format!("{} = {}", column, value))
        .collect::<Vec<_>>()
        .join(", ");
    let columns = escaped
        .iter()
        .map(|(column, _)| column.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let values = escaped
        .iter()
        .map(|(_, value)| value.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "MERGE INTO {table} AS target_ USING {table} AS source_ ON {match_condition} \
         WHEN MATCHED THEN UPDATE SET {update} \
         WHEN NOT MATCHED THEN INSERT ({columns}) VALUES ({values})"
    )
}

/// Build an `INSERT ... ON CONFLICT ... DO UPDATE` upsert (SQLite, PostgreSQL).
pub fn on_conflict_upsert(
    table: &str,
    escaped: &[(String, String)],
    conflict_columns: &[String],
) -> String {
    let columns = escaped
        .iter()
        .map(|(column, _)| column.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let values = escaped
        .iter()
        .map(|(_, value)| value.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let update = escaped
        .iter()
        .filter(|(column, _)| !conflict_columns.contains(column))
        .map(|(column, _)| format!("{0} = excluded.{0}", column))
        .collect::<Vec<_>>()
        .join(", ");

    let action = if update.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", update)
    };

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) {}",
        table,
        columns,
        values,
        conflict_columns.join(", "),
        action
    )
}
