//! Schema representation types.
//!
//! These types describe the structure of database tables and are produced
//! both by the schema builder (what the declarations expect) and by live
//! introspection (what the database currently has). Two schemas are always
//! compared structurally.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical column types understood by the builder and the dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColumnType {
    /// Small integer (16-bit).
    SmallInt,
    /// Integer (32-bit).
    Integer,
    /// Big integer (64-bit).
    BigInt,
    /// Exact decimal with precision and scale.
    Decimal,
    /// Double precision floating point.
    Float,
    /// Variable (or fixed) length character string.
    String,
    /// Unbounded text.
    Text,
    /// UUID.
    Guid,
    /// Variable-length binary data.
    Binary,
    /// Binary large object.
    Blob,
    /// Boolean.
    Boolean,
    /// Date only.
    Date,
    /// Date and time without time zone.
    DateTime,
    /// Date and time with time zone.
    DateTimeTz,
    /// Time only.
    Time,
    /// JSON document.
    Json,
}

impl ColumnType {
    /// Parses a logical type name case-insensitively.
    ///
    /// The `_immutable` variants map onto their mutable counterparts since
    /// mutability is not a storage property.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let base = lower.strip_suffix("_immutable").unwrap_or(&lower);
        let column_type = match base {
            "smallint" => Self::SmallInt,
            "integer" | "int" => Self::Integer,
            "bigint" => Self::BigInt,
            "decimal" | "numeric" => Self::Decimal,
            "float" | "double" => Self::Float,
            "string" | "varchar" => Self::String,
            "text" => Self::Text,
            "guid" | "uuid" => Self::Guid,
            "binary" => Self::Binary,
            "blob" => Self::Blob,
            "boolean" | "bool" => Self::Boolean,
            "date" => Self::Date,
            "datetime" => Self::DateTime,
            "datetimetz" => Self::DateTimeTz,
            "time" => Self::Time,
            "json" | "json_array" => Self::Json,
            _ => return None,
        };
        Some(column_type)
    }

    /// Returns the canonical logical name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SmallInt => "smallint",
            Self::Integer => "integer",
            Self::BigInt => "bigint",
            Self::Decimal => "decimal",
            Self::Float => "float",
            Self::String => "string",
            Self::Text => "text",
            Self::Guid => "guid",
            Self::Binary => "binary",
            Self::Blob => "blob",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::DateTimeTz => "datetimetz",
            Self::Time => "time",
            Self::Json => "json",
        }
    }

    /// Returns the kind of "current time" default this type accepts.
    #[must_use]
    pub fn temporal_default(&self) -> Option<TemporalDefault> {
        match self {
            Self::DateTime | Self::DateTimeTz => Some(TemporalDefault::Timestamp),
            Self::Date => Some(TemporalDefault::Date),
            Self::Time => Some(TemporalDefault::Time),
            _ => None,
        }
    }

    /// Returns whether this is one of the integer types.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::SmallInt | Self::Integer | Self::BigInt)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for ColumnType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown column type '{value}'"))
    }
}

impl From<ColumnType> for String {
    fn from(value: ColumnType) -> Self {
        value.name().to_string()
    }
}

/// The kind of "current time" a column default can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemporalDefault {
    /// Current date and time.
    Timestamp,
    /// Current date.
    Date,
    /// Current time of day.
    Time,
}

impl TemporalDefault {
    /// Returns the SQL-standard keyword for this kind.
    #[must_use]
    pub fn standard_sql(&self) -> &'static str {
        match self {
            Self::Timestamp => "CURRENT_TIMESTAMP",
            Self::Date => "CURRENT_DATE",
            Self::Time => "CURRENT_TIME",
        }
    }
}

impl fmt::Display for TemporalDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timestamp => f.write_str("current timestamp default"),
            Self::Date => f.write_str("current date default"),
            Self::Time => f.write_str("current time default"),
        }
    }
}

/// Default value for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    /// No default value.
    None,
    /// NULL default.
    Null,
    /// Boolean default.
    Bool(bool),
    /// Integer default.
    Integer(i64),
    /// Float default.
    Float(f64),
    /// String default.
    String(String),
    /// SQL expression (e.g. a dialect's current-timestamp function).
    Expression(String),
    /// Current time sentinel not yet resolved against a dialect.
    CurrentTime(TemporalDefault),
}

impl DefaultValue {
    /// Returns the SQL representation of this default value.
    #[must_use]
    pub fn to_sql(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Null => Some("NULL".to_string()),
            Self::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
            Self::Expression(expr) => Some(expr.clone()),
            Self::CurrentTime(kind) => Some(kind.standard_sql().to_string()),
        }
    }

    /// Parses a default as reported by the database catalog.
    ///
    /// Quoted literals become strings, bare numbers become numbers, `NULL`
    /// means no default and anything else is kept as an expression.
    #[must_use]
    pub fn from_catalog(raw: &str) -> Self {
        let trimmed = strip_cast(raw.trim());
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
            return Self::None;
        }
        if let Some(inner) = trimmed
            .strip_prefix('\'')
            .and_then(|rest| rest.strip_suffix('\''))
        {
            return Self::String(inner.replace("''", "'"));
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Self::Integer(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return Self::Float(f);
        }
        Self::Expression(trimmed.to_string())
    }
}

/// Strips a trailing PostgreSQL `::type` cast that sits outside quotes.
fn strip_cast(raw: &str) -> &str {
    let mut in_quotes = false;
    let bytes = raw.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        match b {
            b'\'' => in_quotes = !in_quotes,
            b':' if !in_quotes && bytes.get(i + 1) == Some(&b':') => {
                let head = raw[..i].trim();
                return head
                    .strip_prefix('(')
                    .and_then(|h| h.strip_suffix(')'))
                    .unwrap_or(head);
            }
            _ => {}
        }
    }
    raw
}

/// Foreign key action (ON DELETE, ON UPDATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ForeignKeyAction {
    /// No action (error if referenced row is deleted/updated).
    #[default]
    NoAction,
    /// Restrict (same as NoAction but checked immediately).
    Restrict,
    /// Cascade the delete/update to referencing rows.
    Cascade,
    /// Set the foreign key column to NULL.
    SetNull,
    /// Set the foreign key column to its default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of this action.
    #[must_use]
    pub fn to_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    /// Parses an action name such as `"CASCADE"` or `"set null"`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_uppercase().replace(['_', '-'], " ");
        match normalized.as_str() {
            "NO ACTION" | "" => Some(Self::NoAction),
            "RESTRICT" => Some(Self::Restrict),
            "CASCADE" => Some(Self::Cascade),
            "SET NULL" => Some(Self::SetNull),
            "SET DEFAULT" => Some(Self::SetDefault),
            _ => None,
        }
    }
}

/// Schema definition for a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name.
    pub name: String,
    /// Logical data type.
    pub column_type: ColumnType,
    /// Whether the column allows NULL values.
    pub nullable: bool,
    /// Maximum length for string and binary types.
    pub length: Option<u32>,
    /// Precision for decimal types.
    pub precision: Option<u8>,
    /// Scale for decimal types.
    pub scale: Option<u8>,
    /// Unsigned integer (MySQL only).
    pub unsigned: bool,
    /// Fixed-length string (`CHAR` instead of `VARCHAR`).
    pub fixed: bool,
    /// Default value.
    pub default: DefaultValue,
    /// Whether this column auto-increments.
    pub auto_increment: bool,
    /// Column comment.
    pub comment: Option<String>,
}

impl ColumnSchema {
    /// Creates a nullable column without default.
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            length: None,
            precision: None,
            scale: None,
            unsigned: false,
            fixed: false,
            default: DefaultValue::None,
            auto_increment: false,
            comment: None,
        }
    }

    /// Sets the column as NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Sets the maximum length.
    #[must_use]
    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Sets precision and scale.
    #[must_use]
    pub fn precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default(mut self, value: DefaultValue) -> Self {
        self.default = value;
        self
    }

    /// Sets the column to auto-increment.
    #[must_use]
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Sets a comment.
    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// The primary key of a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrimaryKey {
    /// Constraint name, when one was declared or introspected.
    pub name: Option<String>,
    /// Key columns in order.
    pub columns: Vec<String>,
}

/// Schema definition for a foreign key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeySchema {
    /// Constraint name.
    pub name: String,
    /// Column(s) in the referencing table.
    pub columns: Vec<String>,
    /// Referenced table name.
    pub references_table: String,
    /// Referenced column(s).
    pub references_columns: Vec<String>,
    /// Action on delete.
    pub on_delete: ForeignKeyAction,
    /// Action on update.
    pub on_update: ForeignKeyAction,
}

impl ForeignKeySchema {
    /// Returns whether both constraints enforce the same reference.
    #[must_use]
    pub fn same_reference(&self, other: &Self) -> bool {
        self.columns == other.columns
            && self.references_table == other.references_table
            && self.references_columns == other.references_columns
            && self.on_delete == other.on_delete
            && self.on_update == other.on_update
    }
}

/// Schema definition for an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSchema {
    /// Index name.
    pub name: String,
    /// Columns included in the index.
    pub columns: Vec<String>,
    /// Whether this is a unique index.
    pub unique: bool,
    /// Platform flags such as `fulltext` or `spatial`.
    pub flags: Vec<String>,
    /// Free-form options; `where` holds a partial index condition.
    pub options: BTreeMap<String, String>,
}

impl IndexSchema {
    /// Creates a plain index.
    #[must_use]
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: false,
            flags: Vec::new(),
            options: BTreeMap::new(),
        }
    }

    /// Marks the index as unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Returns the partial index condition, if any.
    #[must_use]
    pub fn condition(&self) -> Option<&str> {
        self.options.get("where").map(String::as_str)
    }

    /// Returns whether `other` covers the same columns with the same
    /// uniqueness, regardless of the name.
    #[must_use]
    pub fn is_fulfilled_by(&self, other: &Self) -> bool {
        self.columns == other.columns
            && self.unique == other.unique
            && self.condition() == other.condition()
    }
}

/// A sequence (PostgreSQL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceSchema {
    /// Sequence name.
    pub name: String,
    /// First value.
    pub start: i64,
    /// Increment.
    pub increment: i64,
}

/// Complete schema definition for a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name, optionally qualified as `namespace.table`.
    pub name: String,
    /// Column definitions in declaration order.
    pub columns: Vec<ColumnSchema>,
    /// Primary key.
    pub primary_key: Option<PrimaryKey>,
    /// Index definitions (plain and unique).
    pub indexes: Vec<IndexSchema>,
    /// Foreign key definitions.
    pub foreign_keys: Vec<ForeignKeySchema>,
    /// Table options such as `engine`, `charset` or `comment`.
    pub options: BTreeMap<String, String>,
}

impl TableSchema {
    /// Creates a new table schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            options: BTreeMap::new(),
        }
    }

    /// Adds a column to the table.
    #[must_use]
    pub fn column(mut self, column: ColumnSchema) -> Self {
        self.columns.push(column);
        self
    }

    /// Sets the primary key columns.
    #[must_use]
    pub fn primary_key(mut self, columns: Vec<String>) -> Self {
        self.primary_key = Some(PrimaryKey {
            name: None,
            columns,
        });
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: IndexSchema) -> Self {
        self.indexes.push(index);
        self
    }

    /// Adds a foreign key.
    #[must_use]
    pub fn foreign_key(mut self, fk: ForeignKeySchema) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Gets a column by name.
    #[must_use]
    pub fn get_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Gets a mutable column by name.
    #[must_use]
    pub fn get_column_mut(&mut self, name: &str) -> Option<&mut ColumnSchema> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    /// Returns whether the table has a column with this name.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.get_column(name).is_some()
    }

    /// Returns the primary key columns (empty when there is none).
    #[must_use]
    pub fn primary_key_columns(&self) -> &[String] {
        self.primary_key
            .as_ref()
            .map(|pk| pk.columns.as_slice())
            .unwrap_or_default()
    }

    /// Returns the namespace part of a qualified table name.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.name.split_once('.').map(|(ns, _)| ns)
    }

    /// Returns the table name without its namespace.
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.name
            .split_once('.')
            .map_or(self.name.as_str(), |(_, name)| name)
    }
}

/// The complete database schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    /// All tables, in the order they were added.
    pub tables: Vec<TableSchema>,
    /// Sequences.
    pub sequences: Vec<SequenceSchema>,
    /// Namespaces (PostgreSQL schemas).
    pub namespaces: Vec<String>,
}

impl DatabaseSchema {
    /// Creates a new empty database schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty schema carrying existing sequences and namespaces.
    #[must_use]
    pub fn seeded(sequences: Vec<SequenceSchema>, namespaces: Vec<String>) -> Self {
        Self {
            tables: Vec::new(),
            sequences,
            namespaces,
        }
    }

    /// Adds a table to the schema.
    #[must_use]
    pub fn table(mut self, table: TableSchema) -> Self {
        self.insert_table(table);
        self
    }

    /// Adds a table and registers its namespace. Returns `false` (leaving
    /// the schema untouched) when a table with that name already exists.
    pub fn insert_table(&mut self, table: TableSchema) -> bool {
        if self.has_table(&table.name) {
            return false;
        }
        if let Some(ns) = table.namespace() {
            if !self.namespaces.iter().any(|n| n == ns) {
                self.namespaces.push(ns.to_string());
            }
        }
        self.tables.push(table);
        true
    }

    /// Gets a table by name.
    #[must_use]
    pub fn get_table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Returns whether a table with this name exists.
    #[must_use]
    pub fn has_table(&self, name: &str) -> bool {
        self.get_table(name).is_some()
    }

    /// Gets a sequence by name.
    #[must_use]
    pub fn get_sequence(&self, name: &str) -> Option<&SequenceSchema> {
        self.sequences.iter().find(|s| s.name == name)
    }

    /// Returns table names.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_type_parse() {
        assert_eq!(ColumnType::parse("BigInt"), Some(ColumnType::BigInt));
        assert_eq!(
            ColumnType::parse("datetime_immutable"),
            Some(ColumnType::DateTime)
        );
        assert_eq!(ColumnType::parse("datetimetz"), Some(ColumnType::DateTimeTz));
        assert_eq!(ColumnType::parse("money"), None);
    }

    #[test]
    fn test_temporal_default_by_type() {
        assert_eq!(
            ColumnType::DateTimeTz.temporal_default(),
            Some(TemporalDefault::Timestamp)
        );
        assert_eq!(ColumnType::Date.temporal_default(), Some(TemporalDefault::Date));
        assert_eq!(ColumnType::Time.temporal_default(), Some(TemporalDefault::Time));
        assert_eq!(ColumnType::Integer.temporal_default(), None);
    }

    #[test]
    fn test_default_value_to_sql() {
        assert_eq!(DefaultValue::None.to_sql(), None);
        assert_eq!(DefaultValue::Null.to_sql(), Some("NULL".to_string()));
        assert_eq!(DefaultValue::Bool(true).to_sql(), Some("1".to_string()));
        assert_eq!(DefaultValue::Integer(42).to_sql(), Some("42".to_string()));
        assert_eq!(
            DefaultValue::String("it's".to_string()).to_sql(),
            Some("'it''s'".to_string())
        );
        assert_eq!(
            DefaultValue::CurrentTime(TemporalDefault::Date).to_sql(),
            Some("CURRENT_DATE".to_string())
        );
    }

    #[test]
    fn test_default_from_catalog() {
        assert_eq!(DefaultValue::from_catalog("NULL"), DefaultValue::None);
        assert_eq!(
            DefaultValue::from_catalog("'it''s'"),
            DefaultValue::String("it's".to_string())
        );
        assert_eq!(
            DefaultValue::from_catalog("'active'::character varying"),
            DefaultValue::String("active".to_string())
        );
        assert_eq!(DefaultValue::from_catalog("0"), DefaultValue::Integer(0));
        assert_eq!(DefaultValue::from_catalog("true"), DefaultValue::Bool(true));
        assert_eq!(
            DefaultValue::from_catalog("now()"),
            DefaultValue::Expression("now()".to_string())
        );
        assert_eq!(
            DefaultValue::from_catalog("'1970-01-01 00:00:00'::timestamp without time zone"),
            DefaultValue::String("1970-01-01 00:00:00".to_string())
        );
    }

    #[test]
    fn test_foreign_key_action_parse() {
        assert_eq!(ForeignKeyAction::parse("cascade"), Some(ForeignKeyAction::Cascade));
        assert_eq!(ForeignKeyAction::parse("SET_NULL"), Some(ForeignKeyAction::SetNull));
        assert_eq!(ForeignKeyAction::parse("explode"), None);
    }

    #[test]
    fn test_table_schema_builder() {
        let table = TableSchema::new("users")
            .column(ColumnSchema::new("id", ColumnType::BigInt).not_null())
            .column(ColumnSchema::new("name", ColumnType::String).length(255))
            .primary_key(vec!["id".to_string()]);

        assert_eq!(table.columns.len(), 2);
        assert_eq!(table.primary_key_columns(), ["id".to_string()]);
        assert!(table.has_column("name"));
        assert!(!table.has_column("email"));
    }

    #[test]
    fn test_namespaced_table_registers_namespace() {
        let mut schema = DatabaseSchema::new();
        assert!(schema.insert_table(TableSchema::new("market.tickers")));
        assert!(!schema.insert_table(TableSchema::new("market.tickers")));

        assert_eq!(schema.namespaces, vec!["market".to_string()]);
        let table = schema.get_table("market.tickers").unwrap();
        assert_eq!(table.short_name(), "tickers");
        assert_eq!(table.namespace(), Some("market"));
    }
}
