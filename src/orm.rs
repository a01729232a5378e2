//! Runtime support for generated data-access types.
//!
//! Generated structs implement [`FromDbRow`] and [`PrimaryKey`]; both are
//! written against the helpers here so that the emitted code stays short.

use crate::db::DbRow;
use crate::error::{DbError, DbResult};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt::Display;

/// Maps `alias_prefix + column name` to the name actually selected.
pub type ColumnAliases = HashMap<String, String>;

/// Separator between the parts of a composite key.
pub const MULTI_KEY_SEPARATOR: &str = ":";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Conversion from a decoded column value.
pub trait FromColumn: Sized {
    /// Convert a non-null value.
    fn from_column(value: &JsonValue) -> Option<Self>;
}

impl FromColumn for i64 {
    fn from_column(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Number(n) => n.as_i64(),
            JsonValue::Bool(b) => Some(i64::from(*b)),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromColumn for f64 {
    fn from_column(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Number(n) => n.as_f64(),
            JsonValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromColumn for bool {
    fn from_column(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::Bool(b) => Some(*b),
            JsonValue::Number(n) => n.as_f64().map(|v| v != 0.0),
            JsonValue::String(s) => match s.to_ascii_lowercase().as_str() {
                "1" | "true" | "t" | "yes" => Some(true),
                "0" | "false" | "f" | "no" | "" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl FromColumn for String {
    fn from_column(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Number(n) => Some(n.to_string()),
            JsonValue::Bool(b) => Some(b.to_string()),
            JsonValue::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl FromColumn for Vec<u8> {
    /// Blobs arrive base64 encoded.
    fn from_column(value: &JsonValue) -> Option<Self> {
        use base64::{Engine as _, engine::general_purpose::STANDARD};

        match value {
            JsonValue::String(s) => STANDARD.decode(s).ok(),
            _ => None,
        }
    }
}

impl FromColumn for NaiveDateTime {
    fn from_column(value: &JsonValue) -> Option<Self> {
        let s = value.as_str()?;
        DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
    }
}

impl FromColumn for NaiveDate {
    fn from_column(value: &JsonValue) -> Option<Self> {
        let s = value.as_str()?;
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .or_else(|| NaiveDateTime::from_column(value).map(|dt| dt.date()))
    }
}

impl FromColumn for NaiveTime {
    fn from_column(value: &JsonValue) -> Option<Self> {
        let s = value.as_str()?;
        NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S%.f"))
            .ok()
            .or_else(|| NaiveDateTime::from_column(value).map(|dt| dt.time()))
    }
}

/// Name under which `column` was selected, honouring prefix and aliases.
pub fn column_alias(alias_prefix: &str, aliases: &ColumnAliases, column: &str) -> String {
    let alias = format!("{}{}", alias_prefix, column);
    match aliases.get(&alias) {
        Some(name) if !name.is_empty() => name.clone(),
        _ => alias,
    }
}

/// Read `column` from `row`.
///
/// Returns `Ok(None)` when the column was not selected or is NULL, and an
/// error when the value cannot be converted to `T`.
pub fn row_column<T: FromColumn>(
    row: &DbRow,
    alias_prefix: &str,
    aliases: &ColumnAliases,
    column: &str,
) -> DbResult<Option<T>> {
    let name = column_alias(alias_prefix, aliases, column);
    match row.get_column(&name) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(value) => T::from_column(value).map(Some).ok_or_else(|| {
            DbError::invalid_input(format!(
                "Column '{}' holds {} which cannot be converted to {}",
                name,
                value,
                std::any::type_name::<T>()
            ))
        }),
    }
}

/// Like [`row_column`] but fails when the value is missing or NULL.
pub fn row_required<T: FromColumn>(
    row: &DbRow,
    alias_prefix: &str,
    aliases: &ColumnAliases,
    column: &str,
) -> DbResult<T> {
    row_column(row, alias_prefix, aliases, column)?.ok_or_else(|| {
        DbError::invalid_input(format!(
            "Column '{}' is missing or NULL",
            column_alias(alias_prefix, aliases, column)
        ))
    })
}

/// Combine the parts of a composite key into one cache-friendly value.
pub fn make_multi_key<I>(parts: I) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    parts
        .into_iter()
        .map(|part| part.to_string())
        .collect::<Vec<_>>()
        .join(MULTI_KEY_SEPARATOR)
}

/// Cache key of one object: database index, table, and primary key.
pub fn cache_key(database_index: u32, table: &str, primary_key: impl Display) -> String {
    format!(
        "{}{sep}{}{sep}{}",
        database_index,
        table,
        primary_key,
        sep = MULTI_KEY_SEPARATOR
    )
}

/// A type loaded from a result row.
pub trait FromDbRow: Sized {
    fn from_db_row(row: &DbRow, alias_prefix: &str, aliases: &ColumnAliases) -> DbResult<Self>;
}

/// A type with a single value identifying its row.
///
/// Composite keys are combined with [`make_multi_key`]. Types whose table
/// has no primary key always return `None`.
pub trait PrimaryKey {
    type Key: Display;

    /// Table the type is stored in.
    const TABLE: &'static str;

    fn primary_key(&self) -> Option<Self::Key>;

    /// Primary key read straight from a row, before the object is built.
    fn row_primary_key(
        row: &DbRow,
        alias_prefix: &str,
        aliases: &ColumnAliases,
    ) -> DbResult<Option<Self::Key>>;

    /// Key under which the object is cached.
    fn cache_key(&self, database_index: u32) -> Option<String> {
        self.primary_key()
            .map(|pk| cache_key(database_index, Self::TABLE, pk))
    }
}
