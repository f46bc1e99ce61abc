//! Turns a declarative definition into a [`TableSchema`].

use crate::definition::{ColumnAttributes, ColumnDefault, IndexDefinition, TableProperty};
use crate::error::{Result, SchemaError};
use crate::provider::BuildContext;
use crate::schema::{
    ColumnSchema, ColumnType, DefaultValue, ForeignKeySchema, IndexSchema, PrimaryKey, TableSchema,
};

/// Longest generated identifier (PostgreSQL's limit).
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Builds one table from its declaration.
#[derive(Debug)]
pub struct TableBuilder<'a> {
    name: &'a str,
    columns: &'a [(String, ColumnAttributes)],
    properties: &'a [TableProperty],
    ctx: BuildContext<'a>,
}

impl<'a> TableBuilder<'a> {
    /// Creates a builder.
    #[must_use]
    pub fn new(
        name: &'a str,
        columns: &'a [(String, ColumnAttributes)],
        properties: &'a [TableProperty],
        ctx: BuildContext<'a>,
    ) -> Self {
        Self {
            name,
            columns,
            properties,
            ctx,
        }
    }

    /// Materializes columns in order, then applies table properties.
    pub fn build(&self) -> Result<TableSchema> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::configuration(
                self.name,
                "table name must not be empty",
            ));
        }
        let mut table = TableSchema::new(self.ctx.table_name(self.name));

        for (column_name, attributes) in self.columns {
            if column_name.trim().is_empty() {
                return Err(self.error("column name must not be empty"));
            }
            if table.has_column(column_name) {
                return Err(self.error(format!("column '{column_name}' is declared more than once")));
            }
            let column = self.build_column(column_name, attributes)?;
            table.columns.push(column);
        }

        for property in self.properties {
            self.apply_property(&mut table, property)?;
        }

        Ok(table)
    }

    fn error(&self, message: impl Into<String>) -> SchemaError {
        SchemaError::configuration(self.name, message)
    }

    fn build_column(&self, name: &str, attributes: &ColumnAttributes) -> Result<ColumnSchema> {
        if attributes.auto_increment && !attributes.column_type.is_integer() {
            return Err(self.error(format!(
                "column '{name}' is auto-increment but has type {}",
                attributes.column_type
            )));
        }
        let default = match &attributes.default {
            None => DefaultValue::None,
            Some(default) => self.resolve_default(name, attributes.column_type, default)?,
        };

        Ok(ColumnSchema {
            name: name.to_string(),
            column_type: attributes.column_type,
            nullable: !attributes.not_null,
            length: attributes.length,
            precision: attributes.precision,
            scale: attributes.scale,
            unsigned: attributes.unsigned,
            fixed: attributes.fixed,
            default,
            auto_increment: attributes.auto_increment,
            comment: attributes.comment.clone(),
        })
    }

    fn resolve_default(
        &self,
        column: &str,
        column_type: ColumnType,
        default: &ColumnDefault,
    ) -> Result<DefaultValue> {
        let value = match default {
            ColumnDefault::CurrentTime(_) => {
                let kind = column_type.temporal_default().ok_or_else(|| {
                    self.error(format!(
                        "column '{column}' of type {column_type} cannot default to the current time"
                    ))
                })?;
                match self.ctx.dialect() {
                    None => DefaultValue::CurrentTime(kind),
                    Some(dialect) => {
                        let sql = dialect.current_time_sql(kind).ok_or_else(|| {
                            SchemaError::DialectUnsupported {
                                dialect: dialect.name().to_string(),
                                feature: format!("a {kind} on column '{}.{column}'", self.name),
                            }
                        })?;
                        DefaultValue::Expression(sql.to_string())
                    }
                }
            }
            ColumnDefault::Bool(b) => DefaultValue::Bool(*b),
            ColumnDefault::Integer(i) => DefaultValue::Integer(*i),
            ColumnDefault::Float(f) => DefaultValue::Float(*f),
            ColumnDefault::Text(s) => DefaultValue::String(s.clone()),
        };
        Ok(value)
    }

    fn require_columns(&self, table: &TableSchema, kind: &str, columns: &[String]) -> Result<()> {
        if columns.is_empty() {
            return Err(self.error(format!("{kind} requires at least one column")));
        }
        match columns.iter().find(|c| !table.has_column(c)) {
            Some(missing) => Err(self.error(format!(
                "{kind} references column '{missing}' which is not declared"
            ))),
            None => Ok(()),
        }
    }

    fn apply_property(&self, table: &mut TableSchema, property: &TableProperty) -> Result<()> {
        match property {
            TableProperty::PrimaryKey { columns, name } => {
                if table.primary_key.is_some() {
                    return Err(self.error("primary key is declared more than once"));
                }
                self.require_columns(table, "primary key", columns)?;
                for column in columns {
                    if let Some(column) = table.get_column_mut(column) {
                        column.nullable = false;
                    }
                }
                table.primary_key = Some(PrimaryKey {
                    name: name.clone(),
                    columns: columns.clone(),
                });
            }
            TableProperty::UniqueIndex(index) => self.add_index(table, index, true)?,
            TableProperty::Index(index) => self.add_index(table, index, false)?,
            TableProperty::ForeignKey(fk) => {
                self.require_columns(table, "foreign key", &fk.columns)?;
                let name = fk
                    .name
                    .clone()
                    .unwrap_or_else(|| generate_identifier("FK", &table.name, &fk.columns));
                table.foreign_keys.push(ForeignKeySchema {
                    name,
                    columns: fk.columns.clone(),
                    references_table: self.ctx.table_name(&fk.foreign_table),
                    references_columns: fk.foreign_columns.clone(),
                    on_delete: fk.on_delete,
                    on_update: fk.on_update,
                });
            }
            TableProperty::TableOption { name, value } => {
                table.options.insert(name.to_ascii_lowercase(), value.clone());
            }
        }
        Ok(())
    }

    fn add_index(&self, table: &mut TableSchema, index: &IndexDefinition, unique: bool) -> Result<()> {
        let kind = if unique { "unique index" } else { "index" };
        self.require_columns(table, kind, &index.columns)?;
        let name = index.name.clone().unwrap_or_else(|| {
            generate_identifier(if unique { "UNIQ" } else { "IDX" }, &table.name, &index.columns)
        });
        if table.indexes.iter().any(|i| i.name == name) {
            return Err(self.error(format!("index '{name}' is declared more than once")));
        }
        table.indexes.push(IndexSchema {
            name,
            columns: index.columns.clone(),
            unique,
            flags: index.flags.clone(),
            options: index.options.clone(),
        });
        Ok(())
    }
}

/// `<PREFIX>_<TABLE>_<COLUMNS>`, upper-cased, limited to 63 characters.
pub(crate) fn generate_identifier(prefix: &str, table: &str, columns: &[String]) -> String {
    let short_table = table.rsplit('.').next().unwrap_or(table);
    let mut name: String = format!("{prefix}_{short_table}_{}", columns.join("_"))
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    name.truncate(MAX_IDENTIFIER_LENGTH);
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{ForeignKeyDefinition, TableDefinition};
    use crate::dialect::{MySqlDialect, PostgresDialect};
    use crate::provider::SchemaProvider;
    use crate::schema::{ForeignKeyAction, TemporalDefault};

    fn build(definition: &TableDefinition) -> Result<TableSchema> {
        definition.build_table(&BuildContext::unbound())
    }

    #[test]
    fn test_columns_keep_declaration_order() {
        let definition = TableDefinition::new("indodax")
            .column("id", ColumnAttributes::new(ColumnType::BigInt).auto_increment())
            .column("pair", ColumnAttributes::new(ColumnType::String).length(16))
            .column("last", ColumnAttributes::new(ColumnType::Decimal).precision(20, 8))
            .primary_key(["id"]);

        let table = build(&definition).unwrap();
        let names: Vec<_> = table.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "pair", "last"]);
        assert_eq!(table.primary_key_columns(), ["id".to_string()]);
    }

    #[test]
    fn test_primary_key_forces_not_null() {
        let definition = TableDefinition::new("t")
            .column("code", ColumnAttributes::new(ColumnType::String).nullable())
            .primary_key(["code"]);
        let table = build(&definition).unwrap();
        assert!(!table.get_column("code").unwrap().nullable);
    }

    #[test]
    fn test_missing_primary_key_column() {
        let definition = TableDefinition::new("t")
            .column("id", ColumnAttributes::new(ColumnType::Integer))
            .primary_key(["uuid"]);
        let err = build(&definition).unwrap_err();
        assert!(err.to_string().contains("uuid"), "{err}");
        assert!(matches!(err, SchemaError::Configuration { ref table, .. } if table == "t"));
    }

    #[test]
    fn test_second_primary_key_is_rejected() {
        let definition = TableDefinition::new("t")
            .column("a", ColumnAttributes::new(ColumnType::Integer))
            .column("b", ColumnAttributes::new(ColumnType::Integer))
            .primary_key(["a"])
            .primary_key(["b"]);
        assert!(build(&definition).is_err());
    }

    #[test]
    fn test_duplicate_column_is_rejected() {
        let definition = TableDefinition::new("t")
            .column("a", ColumnAttributes::new(ColumnType::Integer))
            .column("a", ColumnAttributes::new(ColumnType::Text));
        assert!(build(&definition).is_err());
    }

    #[test]
    fn test_current_time_on_non_temporal_column() {
        let definition = TableDefinition::new("t").column(
            "n",
            ColumnAttributes::new(ColumnType::Integer).default_current_time(),
        );
        let err = build(&definition).unwrap_err();
        assert!(matches!(err, SchemaError::Configuration { .. }));
    }

    #[test]
    fn test_current_time_resolution_by_dialect() {
        let definition = TableDefinition::new("events").column(
            "happened_on",
            ColumnAttributes::new(ColumnType::Date).default_current_time(),
        );

        let unbound = build(&definition).unwrap();
        assert_eq!(
            unbound.columns[0].default,
            DefaultValue::CurrentTime(TemporalDefault::Date)
        );

        let postgres = PostgresDialect::new();
        let bound = definition
            .build_table(&BuildContext::bound(&postgres, ""))
            .unwrap();
        assert_eq!(
            bound.columns[0].default,
            DefaultValue::Expression("CURRENT_DATE".to_string())
        );

        let mysql = MySqlDialect::new();
        let err = definition
            .build_table(&BuildContext::bound(&mysql, ""))
            .unwrap_err();
        assert!(matches!(err, SchemaError::DialectUnsupported { ref dialect, .. } if dialect == "mysql"));
    }

    #[test]
    fn test_generated_names_and_prefixed_reference() {
        let definition = TableDefinition::new("orders")
            .column("id", ColumnAttributes::new(ColumnType::Integer))
            .column("user_id", ColumnAttributes::new(ColumnType::Integer))
            .index(IndexDefinition::on(["user_id"]))
            .property(TableProperty::ForeignKey(ForeignKeyDefinition {
                columns: vec!["user_id".to_string()],
                foreign_table: "users".to_string(),
                foreign_columns: vec!["id".to_string()],
                name: None,
                on_delete: ForeignKeyAction::Cascade,
                on_update: ForeignKeyAction::NoAction,
            }));

        let postgres = PostgresDialect::new();
        let table = definition
            .build_table(&BuildContext::bound(&postgres, "app_"))
            .unwrap();
        assert_eq!(table.indexes[0].name, "IDX_APP_ORDERS_USER_ID");
        assert_eq!(table.foreign_keys[0].name, "FK_APP_ORDERS_USER_ID");
        assert_eq!(table.foreign_keys[0].references_table, "app_users");
    }

    #[test]
    fn test_generated_name_is_truncated() {
        let columns: Vec<String> = (0..10).map(|i| format!("very_long_column_{i}")).collect();
        let name = generate_identifier("IDX", "market.tickers", &columns);
        assert_eq!(name.len(), MAX_IDENTIFIER_LENGTH);
        assert!(name.starts_with("IDX_TICKERS_VERY_LONG_COLUMN_0"));
    }

    #[test]
    fn test_table_options() {
        let definition = TableDefinition::new("t")
            .column("a", ColumnAttributes::new(ColumnType::Integer))
            .property(TableProperty::TableOption {
                name: "Engine".to_string(),
                value: "InnoDB".to_string(),
            });
        let table = build(&definition).unwrap();
        assert_eq!(table.options.get("engine").map(String::as_str), Some("InnoDB"));
    }
}
