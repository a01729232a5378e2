//! Result rows and result sets returned by adapters.

use crate::models::DatabaseFieldType;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Metadata for a result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// Type name as reported by the driver
    pub type_name: String,
    pub field_type: DatabaseFieldType,
}

impl ColumnMetadata {
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        field_type: DatabaseFieldType,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            field_type,
        }
    }
}

/// One result row with its columns in select order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DbRow {
    columns: Vec<(String, JsonValue)>,
}

impl DbRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column; a later column with the same name shadows earlier ones.
    pub fn push(&mut self, name: impl Into<String>, value: JsonValue) {
        self.columns.push((name.into(), value));
    }

    /// Builder form of [`DbRow::push`].
    pub fn with(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.push(name, value);
        self
    }

    /// Value of the named column. SQL NULL is returned as `Some(JsonValue::Null)`.
    pub fn get_column(&self, name: &str) -> Option<&JsonValue> {
        self.columns
            .iter()
            .rev()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn column_exists(&self, name: &str) -> bool {
        self.columns.iter().any(|(column, _)| column == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JsonValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn to_json_map(&self) -> serde_json::Map<String, JsonValue> {
        self.columns.iter().cloned().collect()
    }
}

impl FromIterator<(String, JsonValue)> for DbRow {
    fn from_iter<I: IntoIterator<Item = (String, JsonValue)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

/// Rows returned by a query, with a forward-only cursor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<DbRow>,
    #[serde(skip)]
    cursor: usize,
}

impl QueryResult {
    pub fn new(columns: Vec<ColumnMetadata>, rows: Vec<DbRow>) -> Self {
        Self {
            columns,
            rows,
            cursor: 0,
        }
    }

    pub fn count_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn count_fields(&self) -> usize {
        self.columns.len()
    }

    /// Next row under the cursor, `None` once the result is exhausted.
    pub fn next_row(&mut self) -> Option<&DbRow> {
        let row = self.rows.get(self.cursor)?;
        self.cursor += 1;
        Some(row)
    }

    /// Move the cursor back to the first row.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn into_rows(self) -> Vec<DbRow> {
        self.rows
    }
}
