//! SQLite row decoding.
//!
//! SQLite is dynamically typed: a column declared `BOOLEAN` may hold an
//! integer, and expression columns have no declared type at all. Decoding
//! therefore looks at the storage class of each value first and only uses
//! the declared type to refine it (integers in `BOOLEAN` columns become
//! booleans, text in `JSON` columns is parsed).

use crate::db::row::{ColumnMetadata, DbRow, QueryResult};
use crate::models::DatabaseFieldType;
use serde_json::Value as JsonValue;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

/// Storage class of a single SQLite value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Null,
    Integer,
    Real,
    Text,
    Blob,
}

impl StorageClass {
    pub fn from_type_name(name: &str) -> Self {
        match name.to_uppercase().as_str() {
            "NULL" => Self::Null,
            "INTEGER" | "INT" | "BIGINT" | "BOOLEAN" => Self::Integer,
            "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => Self::Real,
            "BLOB" => Self::Blob,
            _ => Self::Text,
        }
    }
}

/// Decode binary data to JSON value.
///
/// If `decode_binary` is true, attempts to decode as UTF-8 text first.
/// Falls back to base64 encoding if not valid UTF-8 or if `decode_binary` is false.
pub fn decode_binary_value(bytes: &[u8], decode_binary: bool) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    if decode_binary {
        match std::str::from_utf8(bytes) {
            Ok(s) => JsonValue::String(s.to_string()),
            Err(_) => JsonValue::String(STANDARD.encode(bytes)),
        }
    } else {
        JsonValue::String(STANDARD.encode(bytes))
    }
}

/// Column metadata from the declared column types.
pub fn column_metadata(row: &SqliteRow) -> Vec<ColumnMetadata> {
    row.columns()
        .iter()
        .map(|col| {
            let type_name = col.type_info().name();
            ColumnMetadata::new(
                col.name(),
                type_name,
                DatabaseFieldType::from_sql_type(type_name),
            )
        })
        .collect()
}

/// Convert one row into a [`DbRow`].
pub fn decode_row(row: &SqliteRow, decode_binary: bool) -> DbRow {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let declared = col.type_info().name().to_string();
            (col.name().to_string(), decode_column(row, idx, &declared, decode_binary))
        })
        .collect()
}

/// Convert a fetched result set into a [`QueryResult`].
pub fn decode_rows(rows: &[SqliteRow], decode_binary: bool) -> QueryResult {
    let columns = rows.first().map(column_metadata).unwrap_or_default();
    let rows = rows.iter().map(|row| decode_row(row, decode_binary)).collect();
    QueryResult::new(columns, rows)
}

fn decode_column(row: &SqliteRow, idx: usize, declared: &str, decode_binary: bool) -> JsonValue {
    let storage = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => StorageClass::Null,
        Ok(raw) => StorageClass::from_type_name(raw.type_info().name()),
        Err(e) => {
            tracing::error!("Failed to read column {}: {:?}", idx, e);
            return JsonValue::Null;
        }
    };

    match storage {
        StorageClass::Null => JsonValue::Null,
        StorageClass::Integer => decode_integer(row, idx, declared),
        StorageClass::Real => decode_float(row, idx),
        StorageClass::Blob => decode_binary_col(row, idx, decode_binary),
        StorageClass::Text => decode_text(row, idx, declared),
    }
}

fn decode_integer(row: &SqliteRow, idx: usize, declared: &str) -> JsonValue {
    let Ok(v) = row.try_get_unchecked::<i64, _>(idx) else {
        return JsonValue::Null;
    };
    if DatabaseFieldType::from_sql_type(declared) == DatabaseFieldType::Bit {
        return JsonValue::Bool(v != 0);
    }
    JsonValue::Number(v.into())
}

fn decode_float(row: &SqliteRow, idx: usize) -> JsonValue {
    if let Ok(v) = row.try_get_unchecked::<f64, _>(idx) {
        return serde_json::Number::from_f64(v)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(v.to_string()));
    }
    JsonValue::Null
}

fn decode_binary_col(row: &SqliteRow, idx: usize, decode_binary: bool) -> JsonValue {
    row.try_get_unchecked::<Vec<u8>, _>(idx)
        .map(|v| decode_binary_value(&v, decode_binary))
        .unwrap_or(JsonValue::Null)
}

fn decode_text(row: &SqliteRow, idx: usize, declared: &str) -> JsonValue {
    if let Ok(v) = row.try_get_unchecked::<String, _>(idx) {
        if declared.to_lowercase().contains("json") {
            if let Ok(json) = serde_json::from_str::<JsonValue>(&v) {
                return json;
            }
        }
        return JsonValue::String(v);
    }
    JsonValue::Null
}
