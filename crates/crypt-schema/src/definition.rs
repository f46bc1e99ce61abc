//! Declarative table definitions.
//!
//! A [`TableDefinition`] is the raw material a schema provider hands to the
//! builder: a table name, an ordered column map and a list of table-level
//! properties. Definitions can be written in Rust or loaded from JSON files:
//!
//! ```json
//! {
//!   "table": "users",
//!   "columns": {
//!     "id": { "type": "bigint", "autoIncrement": true },
//!     "user_email": { "type": "string", "length": 255 },
//!     "created_at": { "type": "datetime", "default": "CURRENT" }
//!   },
//!   "properties": {
//!     "primaryKey": "id",
//!     "unique": ["user_email"]
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::schema::{ColumnType, ForeignKeyAction};

/// Marker for the `"CURRENT"` default sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurrentTimeMarker {
    /// The literal string `CURRENT`.
    #[serde(rename = "CURRENT")]
    Current,
}

/// A declared column default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnDefault {
    /// Current date, time or timestamp, depending on the column type.
    CurrentTime(CurrentTimeMarker),
    /// Boolean literal.
    Bool(bool),
    /// Integer literal.
    Integer(i64),
    /// Float literal.
    Float(f64),
    /// String literal.
    Text(String),
}

/// Attributes of a single declared column. Unknown keys in JSON input are
/// ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColumnAttributes {
    /// Logical type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Whether NULL is rejected. Columns are NOT NULL unless told otherwise.
    pub not_null: bool,
    /// Length for string and binary types.
    pub length: Option<u32>,
    /// Precision for decimals.
    pub precision: Option<u8>,
    /// Scale for decimals.
    pub scale: Option<u8>,
    /// Unsigned integer.
    pub unsigned: bool,
    /// Fixed length string.
    pub fixed: bool,
    /// Default value.
    pub default: Option<ColumnDefault>,
    /// Auto-increment.
    pub auto_increment: bool,
    /// Comment.
    pub comment: Option<String>,
}

impl Default for ColumnAttributes {
    fn default() -> Self {
        Self::new(ColumnType::String)
    }
}

impl ColumnAttributes {
    /// Creates a NOT NULL column of the given type.
    #[must_use]
    pub fn new(column_type: ColumnType) -> Self {
        Self {
            column_type,
            not_null: true,
            length: None,
            precision: None,
            scale: None,
            unsigned: false,
            fixed: false,
            default: None,
            auto_increment: false,
            comment: None,
        }
    }

    /// Allows NULL.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.not_null = false;
        self
    }

    /// Sets the length.
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

    /// Marks an integer column as unsigned.
    #[must_use]
    pub fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    /// Sets a default.
    #[must_use]
    pub fn default_value(mut self, value: ColumnDefault) -> Self {
        self.default = Some(value);
        self
    }

    /// Defaults to the current date, time or timestamp.
    #[must_use]
    pub fn default_current_time(self) -> Self {
        self.default_value(ColumnDefault::CurrentTime(CurrentTimeMarker::Current))
    }

    /// Enables auto-increment.
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

/// An index declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexDefinition {
    /// Indexed columns.
    pub columns: Vec<String>,
    /// Explicit name; generated when absent.
    pub name: Option<String>,
    /// Platform flags.
    pub flags: Vec<String>,
    /// Options such as `where`.
    pub options: BTreeMap<String, String>,
}

impl IndexDefinition {
    /// An unnamed index over `columns`.
    #[must_use]
    pub fn on<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets the name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A foreign key declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDefinition {
    /// Local columns.
    pub columns: Vec<String>,
    /// Referenced table, without the deployment prefix.
    pub foreign_table: String,
    /// Referenced columns.
    pub foreign_columns: Vec<String>,
    /// Explicit name; generated when absent.
    pub name: Option<String>,
    /// ON DELETE action.
    pub on_delete: ForeignKeyAction,
    /// ON UPDATE action.
    pub on_update: ForeignKeyAction,
}

/// A table-level property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableProperty {
    /// The primary key.
    PrimaryKey {
        /// Key columns.
        columns: Vec<String>,
        /// Constraint name.
        name: Option<String>,
    },
    /// A unique index.
    UniqueIndex(IndexDefinition),
    /// A plain index.
    Index(IndexDefinition),
    /// A foreign key.
    ForeignKey(ForeignKeyDefinition),
    /// A table option such as `engine` or `comment`.
    TableOption {
        /// Option name.
        name: String,
        /// Option value.
        value: String,
    },
}

impl TableProperty {
    /// Parses one raw property entry. Keys are matched case-insensitively
    /// and some produce several properties (an array of indexes, an
    /// options object).
    pub fn parse(table: &str, key: &str, value: &Value) -> Result<Vec<Self>> {
        let normalized: String = key
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "primarykey" | "primary" => {
                let index = parse_index(table, key, value)?;
                Ok(vec![Self::PrimaryKey {
                    columns: index.columns,
                    name: index.name,
                }])
            }
            "uniqueindex" | "unique" => Ok(parse_indexes(table, key, value)?
                .into_iter()
                .map(Self::UniqueIndex)
                .collect()),
            "index" | "indexes" => Ok(parse_indexes(table, key, value)?
                .into_iter()
                .map(Self::Index)
                .collect()),
            "constraint" | "foreignkey" | "foreignkeyconstraint" => {
                let values = match value {
                    Value::Array(items) if items.iter().all(Value::is_object) && !items.is_empty() => {
                        items.iter().collect()
                    }
                    other => vec![other],
                };
                values
                    .into_iter()
                    .map(|v| parse_foreign_key(table, key, v).map(Self::ForeignKey))
                    .collect()
            }
            "option" | "options" => match value {
                Value::Object(map) => map
                    .iter()
                    .map(|(name, v)| {
                        Ok(Self::TableOption {
                            name: name.to_ascii_lowercase(),
                            value: scalar_string(table, key, v)?,
                        })
                    })
                    .collect(),
                _ => Err(SchemaError::configuration(
                    table,
                    format!("property '{key}' must be an object of option names to values"),
                )),
            },
            _ => Err(SchemaError::configuration(
                table,
                format!("unknown table property '{key}'"),
            )),
        }
    }
}

fn scalar_string(table: &str, key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(SchemaError::configuration(
            table,
            format!("property '{key}' expects a scalar value"),
        )),
    }
}

fn column_list(table: &str, key: &str, value: &Value) -> Result<Vec<String>> {
    let columns = match value {
        Value::String(column) => vec![column.clone()],
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(column) => Ok(column.clone()),
                _ => Err(SchemaError::configuration(
                    table,
                    format!("property '{key}' column names must be strings"),
                )),
            })
            .collect::<Result<Vec<_>>>()?,
        _ => {
            return Err(SchemaError::configuration(
                table,
                format!("property '{key}' requires a column name or a list of column names"),
            ))
        }
    };
    if columns.is_empty() || columns.iter().any(|c| c.trim().is_empty()) {
        return Err(SchemaError::configuration(
            table,
            format!("property '{key}' requires at least one column"),
        ));
    }
    Ok(columns)
}

fn string_map(table: &str, key: &str, value: Option<&Value>) -> Result<BTreeMap<String, String>> {
    match value {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| Ok((k.to_ascii_lowercase(), scalar_string(table, key, v)?)))
            .collect(),
        Some(_) => Err(SchemaError::configuration(
            table,
            format!("property '{key}' options must be an object"),
        )),
    }
}

fn optional_string(table: &str, key: &str, map: &Map<String, Value>, names: &[&str]) -> Result<Option<String>> {
    for name in names {
        match map.get(*name) {
            Some(Value::String(s)) => return Ok(Some(s.clone())),
            Some(Value::Null) | None => {}
            Some(_) => {
                return Err(SchemaError::configuration(
                    table,
                    format!("property '{key}' field '{name}' must be a string"),
                ))
            }
        }
    }
    Ok(None)
}

fn parse_index(table: &str, key: &str, value: &Value) -> Result<IndexDefinition> {
    match value {
        Value::Object(map) => {
            let columns = map
                .get("columns")
                .or_else(|| map.get("columnNames"))
                .ok_or_else(|| {
                    SchemaError::configuration(table, format!("property '{key}' is missing 'columns'"))
                })?;
            let flags = match map.get("flags") {
                None | Some(Value::Null) => Vec::new(),
                Some(v) => column_list(table, key, v)?,
            };
            Ok(IndexDefinition {
                columns: column_list(table, key, columns)?,
                name: optional_string(table, key, map, &["name", "indexName"])?,
                flags,
                options: string_map(table, key, map.get("options"))?,
            })
        }
        other => Ok(IndexDefinition::on(column_list(table, key, other)?)),
    }
}

/// A single column, a flat column list, or a list of index definitions.
fn parse_indexes(table: &str, key: &str, value: &Value) -> Result<Vec<IndexDefinition>> {
    match value {
        Value::Array(items) if !items.is_empty() && items.iter().all(|i| !i.is_string()) => items
            .iter()
            .map(|item| parse_index(table, key, item))
            .collect(),
        other => Ok(vec![parse_index(table, key, other)?]),
    }
}

fn parse_action(table: &str, key: &str, map: &Map<String, Value>, field: &str) -> Result<ForeignKeyAction> {
    match optional_string(table, key, map, &[field])? {
        None => Ok(ForeignKeyAction::NoAction),
        Some(action) => ForeignKeyAction::parse(&action).ok_or_else(|| {
            SchemaError::configuration(
                table,
                format!("property '{key}' has unknown {field} action '{action}'"),
            )
        }),
    }
}

fn required<'a>(
    table: &str,
    key: &str,
    map: &'a Map<String, Value>,
    names: &[&str],
) -> Result<&'a Value> {
    names
        .iter()
        .find_map(|name| map.get(*name))
        .ok_or_else(|| {
            SchemaError::configuration(table, format!("property '{key}' is missing '{}'", names[0]))
        })
}

fn parse_foreign_key(table: &str, key: &str, value: &Value) -> Result<ForeignKeyDefinition> {
    let Value::Object(map) = value else {
        return Err(SchemaError::configuration(
            table,
            format!("property '{key}' must be an object with columns, foreignTable and foreignColumns"),
        ));
    };
    let columns = column_list(table, key, required(table, key, map, &["columns", "localColumns"])?)?;
    let foreign_table = match required(table, key, map, &["foreignTable", "table"])? {
        Value::String(name) if !name.trim().is_empty() => name.clone(),
        _ => {
            return Err(SchemaError::configuration(
                table,
                format!("property '{key}' foreignTable must be a table name"),
            ))
        }
    };
    let foreign_columns =
        column_list(table, key, required(table, key, map, &["foreignColumns", "references"])?)?;
    if foreign_columns.len() != columns.len() {
        return Err(SchemaError::configuration(
            table,
            format!("property '{key}' must reference as many columns as it declares"),
        ));
    }

    Ok(ForeignKeyDefinition {
        columns,
        foreign_table,
        foreign_columns,
        name: optional_string(table, key, map, &["name", "constraintName"])?,
        on_delete: parse_action(table, key, map, "onDelete")?,
        on_update: parse_action(table, key, map, "onUpdate")?,
    })
}

/// A complete declarative table definition.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableDefinition {
    /// Table name without the deployment prefix.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<(String, ColumnAttributes)>,
    /// Table-level properties in declaration order.
    pub properties: Vec<TableProperty>,
}

#[derive(Debug, Deserialize)]
struct RawTableDefinition {
    table: String,
    #[serde(default)]
    columns: Map<String, Value>,
    #[serde(default)]
    properties: Map<String, Value>,
}

impl TableDefinition {
    /// Creates an empty definition.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Adds a column.
    #[must_use]
    pub fn column(mut self, name: impl Into<String>, attributes: ColumnAttributes) -> Self {
        self.columns.push((name.into(), attributes));
        self
    }

    /// Adds a property.
    #[must_use]
    pub fn property(mut self, property: TableProperty) -> Self {
        self.properties.push(property);
        self
    }

    /// Sets the primary key.
    #[must_use]
    pub fn primary_key<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.property(TableProperty::PrimaryKey {
            columns: columns.into_iter().map(Into::into).collect(),
            name: None,
        })
    }

    /// Adds a unique index.
    #[must_use]
    pub fn unique(self, index: IndexDefinition) -> Self {
        self.property(TableProperty::UniqueIndex(index))
    }

    /// Adds a plain index.
    #[must_use]
    pub fn index(self, index: IndexDefinition) -> Self {
        self.property(TableProperty::Index(index))
    }

    /// Parses a single table object from JSON text.
    pub fn from_json(source: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(source).map_err(parse_error)?;
        Self::from_value(value)
    }

    fn from_value(value: Value) -> Result<Self> {
        let raw: RawTableDefinition = serde_json::from_value(value).map_err(parse_error)?;

        let mut definition = Self::new(raw.table.clone());
        for (column, value) in raw.columns {
            if !value.is_object() {
                return Err(SchemaError::configuration(
                    &raw.table,
                    format!("definition of column '{column}' must be an object"),
                ));
            }
            let attributes: ColumnAttributes = serde_json::from_value(value).map_err(|e| {
                SchemaError::configuration(&raw.table, format!("column '{column}': {e}"))
            })?;
            definition.columns.push((column, attributes));
        }
        for (key, value) in &raw.properties {
            definition
                .properties
                .extend(TableProperty::parse(&raw.table, key, value)?);
        }
        Ok(definition)
    }
}

fn parse_error(e: serde_json::Error) -> SchemaError {
    SchemaError::DefinitionFile {
        path: PathBuf::new(),
        message: e.to_string(),
    }
}

/// Loads a definition file holding one table object or an array of them.
pub fn load_file(path: &Path) -> Result<Vec<TableDefinition>> {
    let source = fs::read_to_string(path)?;
    let with_path = |e: SchemaError| match e {
        SchemaError::DefinitionFile { message, .. } => SchemaError::DefinitionFile {
            path: path.to_path_buf(),
            message,
        },
        SchemaError::Configuration { table, message } => SchemaError::Configuration {
            table,
            message: format!("{message} (in {})", path.display()),
        },
        other => other,
    };

    let value: Value = serde_json::from_str(&source)
        .map_err(parse_error)
        .map_err(with_path)?;
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| TableDefinition::from_value(item).map_err(with_path))
            .collect(),
        single => Ok(vec![TableDefinition::from_value(single).map_err(with_path)?]),
    }
}

/// Loads every `*.json` definition in a directory, sorted by file name.
pub fn load_dir(dir: &Path) -> Result<Vec<TableDefinition>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut definitions = Vec::new();
    for path in &paths {
        debug!(path = %path.display(), "Loading table definitions");
        definitions.extend(load_file(path)?);
    }
    Ok(definitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_attributes_defaults() {
        let attrs: ColumnAttributes =
            serde_json::from_value(json!({"type": "string", "length": 64, "whatever": 1})).unwrap();
        assert_eq!(attrs.column_type, ColumnType::String);
        assert_eq!(attrs.length, Some(64));
        assert!(attrs.not_null);
        assert_eq!(attrs.default, None);
    }

    #[test]
    fn test_column_default_variants() {
        let parse = |v: Value| serde_json::from_value::<ColumnDefault>(v).unwrap();
        assert_eq!(
            parse(json!("CURRENT")),
            ColumnDefault::CurrentTime(CurrentTimeMarker::Current)
        );
        assert_eq!(parse(json!("current")), ColumnDefault::Text("current".to_string()));
        assert_eq!(parse(json!(true)), ColumnDefault::Bool(true));
        assert_eq!(parse(json!(7)), ColumnDefault::Integer(7));
        assert_eq!(parse(json!(1.5)), ColumnDefault::Float(1.5));
    }

    #[test]
    fn test_unknown_column_type_is_rejected() {
        let err = TableDefinition::from_json(
            r#"{"table": "t", "columns": {"a": {"type": "money"}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::Configuration { .. }));
        assert!(err.to_string().contains("money"));
    }

    #[test]
    fn test_property_synonyms() {
        let unique = TableProperty::parse("users", "unique", &json!("email")).unwrap();
        let unique_index = TableProperty::parse("users", "UniqueIndex", &json!(["email"])).unwrap();
        assert_eq!(unique, unique_index);

        let fk = TableProperty::parse(
            "orders",
            "constraint",
            &json!({"columns": "user_id", "foreignTable": "users", "foreignColumns": "id", "onDelete": "cascade"}),
        )
        .unwrap();
        match &fk[0] {
            TableProperty::ForeignKey(def) => {
                assert_eq!(def.foreign_table, "users");
                assert_eq!(def.on_delete, ForeignKeyAction::Cascade);
            }
            other => panic!("unexpected property {other:?}"),
        }
    }

    #[test]
    fn test_multiple_indexes() {
        let props =
            TableProperty::parse("t", "index", &json!([["a"], {"columns": ["b", "c"], "name": "by_bc"}]))
                .unwrap();
        assert_eq!(props.len(), 2);
        assert_eq!(
            props[1],
            TableProperty::Index(IndexDefinition::on(["b", "c"]).named("by_bc"))
        );
    }

    #[test]
    fn test_invalid_properties() {
        let cases = [
            ("primaryKey", json!([])),
            ("index", json!(42)),
            ("unique", json!({"name": "no_columns"})),
            ("partition", json!("a")),
            ("options", json!("InnoDB")),
        ];
        for (key, value) in cases {
            let err = TableProperty::parse("t", key, &value).unwrap_err();
            assert!(
                matches!(err, SchemaError::Configuration { ref table, .. } if table == "t"),
                "{key}: {err}"
            );
        }
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("b_orders.json"),
            r#"{"table": "orders", "columns": {"id": {"type": "integer"}}, "properties": {"primaryKey": "id"}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("a_users.json"),
            r#"[{"table": "users", "columns": {"id": {"type": "integer"}}},
                {"table": "groups", "columns": {"id": {"type": "integer"}}}]"#,
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let definitions = load_dir(dir.path()).unwrap();
        let names: Vec<_> = definitions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["users", "groups", "orders"]);
        assert_eq!(definitions[2].properties.len(), 1);
    }

    #[test]
    fn test_malformed_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load_file(&path).unwrap_err();
        match err {
            SchemaError::DefinitionFile { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error {other}"),
        }
    }
}
