//! Schema model consumed by the code generator.
//!
//! Tables and columns are described here rather than introspected; the CLI
//! loads them from a JSON file.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Logical column type shared by all adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatabaseFieldType {
    Blob,
    VarChar,
    Char,
    Integer,
    DateTime,
    Date,
    Time,
    Float,
    Bit,
}

impl DatabaseFieldType {
    /// Map a driver type name (e.g. `varchar(30)`, `BIGINT`) to a field type.
    pub fn from_sql_type(type_name: &str) -> Self {
        let lower = type_name.to_lowercase();
        let base = lower.split('(').next().unwrap_or("").trim();

        match base {
            "bool" | "boolean" | "bit" => Self::Bit,
            "date" => Self::Date,
            "time" | "timetz" => Self::Time,
            "datetime" | "timestamp" | "timestamptz" => Self::DateTime,
            "char" | "character" | "bpchar" | "nchar" => Self::Char,
            _ if base.contains("int") || base.contains("serial") => Self::Integer,
            _ if base.contains("float")
                || base.contains("double")
                || base.contains("real")
                || base.contains("decimal")
                || base.contains("numeric") =>
            {
                Self::Float
            }
            _ if base.contains("blob") || base.contains("binary") || base == "bytea" => {
                Self::Blob
            }
            _ => Self::VarChar,
        }
    }

    /// Rust type used for a non-null column of this type.
    pub fn rust_type(&self) -> &'static str {
        match self {
            Self::Blob => "Vec<u8>",
            Self::VarChar | Self::Char => "String",
            Self::Integer => "i64",
            Self::DateTime => "chrono::NaiveDateTime",
            Self::Date => "chrono::NaiveDate",
            Self::Time => "chrono::NaiveTime",
            Self::Float => "f64",
            Self::Bit => "bool",
        }
    }

    /// Whether the Rust type is `Copy`.
    pub fn is_copy(&self) -> bool {
        !matches!(self, Self::Blob | Self::VarChar | Self::Char)
    }
}

impl std::fmt::Display for DatabaseFieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Blob => "Blob",
            Self::VarChar => "VarChar",
            Self::Char => "Char",
            Self::Integer => "Integer",
            Self::DateTime => "DateTime",
            Self::Date => "Date",
            Self::Time => "Time",
            Self::Float => "Float",
            Self::Bit => "Bit",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseIndex {
    pub key_name: String,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    pub column_names: Vec<String>,
}

impl DatabaseIndex {
    pub fn new(key_name: impl Into<String>, column_names: Vec<String>) -> Self {
        Self {
            key_name: key_name.into(),
            primary_key: false,
            unique: false,
            column_names,
        }
    }

    pub fn with_primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = primary_key;
        self
    }

    pub fn with_unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseForeignKey {
    pub key_name: String,
    pub column_names: Vec<String>,
    pub reference_table_name: String,
    pub reference_column_names: Vec<String>,
}

impl DatabaseForeignKey {
    pub fn new(
        key_name: impl Into<String>,
        column_names: Vec<String>,
        reference_table_name: impl Into<String>,
        reference_column_names: Vec<String>,
    ) -> Self {
        Self {
            key_name: key_name.into(),
            column_names,
            reference_table_name: reference_table_name.into(),
            reference_column_names,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnModel {
    pub name: String,
    /// Field name in generated code. Derived from `name` when empty.
    #[serde(default)]
    pub variable_name: String,
    pub field_type: DatabaseFieldType,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub identity: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ColumnModel {
    pub fn new(name: impl Into<String>, field_type: DatabaseFieldType) -> Self {
        let name = name.into();
        Self {
            variable_name: snake_case(&name),
            name,
            field_type,
            not_null: false,
            primary_key: false,
            identity: false,
            unique: false,
            max_length: None,
            default: None,
            comment: None,
        }
    }

    /// Mark the column as part of the primary key (which implies NOT NULL).
    pub fn with_primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = primary_key;
        if primary_key {
            self.not_null = true;
        }
        self
    }

    pub fn with_not_null(mut self, not_null: bool) -> Self {
        self.not_null = not_null;
        self
    }

    pub fn with_identity(mut self, identity: bool) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Rust type of the generated field, `Option<_>` for nullable columns.
    pub fn rust_type(&self) -> String {
        let base = self.field_type.rust_type();
        if self.not_null || self.primary_key {
            base.to_string()
        } else {
            format!("Option<{}>", base)
        }
    }

    /// Comment text with any embedded JSON options removed.
    pub fn description(&self) -> Option<String> {
        self.comment
            .as_deref()
            .map(|c| extract_comment_options(c).comment)
            .filter(|c| !c.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableModel {
    pub name: String,
    /// Generated type name. Derived from `name` when empty.
    #[serde(default)]
    pub struct_name: String,
    pub columns: Vec<ColumnModel>,
    #[serde(default)]
    pub indexes: Vec<DatabaseIndex>,
    #[serde(default)]
    pub foreign_keys: Vec<DatabaseForeignKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl TableModel {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            struct_name: pascal_case(&name),
            name,
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            comment: None,
        }
    }

    pub fn with_column(mut self, column: ColumnModel) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_index(mut self, index: DatabaseIndex) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn with_foreign_key(mut self, foreign_key: DatabaseForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    /// Fill in derived names left empty by a hand-written schema file.
    pub fn normalize(&mut self) {
        if self.struct_name.is_empty() {
            self.struct_name = pascal_case(&self.name);
        }
        for column in &mut self.columns {
            if column.variable_name.is_empty() {
                column.variable_name = snake_case(&column.name);
            }
        }
        // Columns named by a primary index count as key columns.
        let pk_names: Vec<String> = self
            .indexes
            .iter()
            .filter(|idx| idx.primary_key)
            .flat_map(|idx| idx.column_names.iter().cloned())
            .collect();
        for column in &mut self.columns {
            if pk_names.contains(&column.name) {
                column.primary_key = true;
                column.not_null = true;
            }
        }
    }

    /// Primary key columns in declaration order.
    pub fn primary_key_columns(&self) -> Vec<&ColumnModel> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnModel> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// A column comment split into its text and embedded JSON options.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentOptions {
    /// Comment text with the options object removed.
    pub comment: String,
    pub options: Option<serde_json::Map<String, JsonValue>>,
}

/// Split a JSON options object out of a column comment.
///
/// The object spans from the first `{` to the last `}`. If that text is not
/// a non-empty JSON object the comment is returned unchanged.
pub fn extract_comment_options(comment: &str) -> CommentOptions {
    let unchanged = || CommentOptions {
        comment: comment.to_string(),
        options: None,
    };

    let Some(start) = comment.find('{') else {
        return unchanged();
    };
    let Some(end) = comment.rfind('}').filter(|&end| end > start) else {
        return unchanged();
    };

    match serde_json::from_str::<JsonValue>(&comment[start..=end]) {
        Ok(JsonValue::Object(map)) if !map.is_empty() => CommentOptions {
            comment: format!("{}{}", &comment[..start], &comment[end + 1..]),
            options: Some(map),
        },
        _ => unchanged(),
    }
}

/// `person_address` / `PersonAddress` → `PersonAddress`.
pub fn pascal_case(name: &str) -> String {
    name.split(|c: char| c == '_' || c == '-' || c == ' ' || c == '.')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// `PersonID` / `person-id` → `person_id`.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == ' ' || c == '.' {
            if !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if !out.is_empty() && !out.ends_with('_') && (prev_lower || (prev_upper && next_lower))
            {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
