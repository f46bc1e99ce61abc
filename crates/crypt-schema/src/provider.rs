//! Schema providers.
//!
//! A provider declares exactly one table. Providers are registered with the
//! [`SchemaMerger`](crate::merger::SchemaMerger) and asked to contribute
//! their table to an aggregate schema, either unbound (no dialect, no
//! prefix) or bound to a live database.

use crate::builder::TableBuilder;
use crate::config::prefix_table;
use crate::definition::{ColumnAttributes, TableDefinition, TableProperty};
use crate::dialect::MigrationDialect;
use crate::error::{Result, SchemaError};
use crate::schema::{DatabaseSchema, TableSchema};

/// What a provider builds against.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildContext<'a> {
    dialect: Option<&'a dyn MigrationDialect>,
    prefix: &'a str,
}

impl<'a> BuildContext<'a> {
    /// No dialect and no prefix; current-time defaults stay symbolic.
    #[must_use]
    pub fn unbound() -> Self {
        Self::default()
    }

    /// Bound to a dialect and a table prefix.
    #[must_use]
    pub fn bound(dialect: &'a dyn MigrationDialect, prefix: &'a str) -> Self {
        Self {
            dialect: Some(dialect),
            prefix,
        }
    }

    /// The bound dialect, if any.
    #[must_use]
    pub fn dialect(&self) -> Option<&'a dyn MigrationDialect> {
        self.dialect
    }

    /// The table prefix (empty when unbound).
    #[must_use]
    pub fn prefix(&self) -> &'a str {
        self.prefix
    }

    /// Applies the prefix to a declared table name.
    #[must_use]
    pub fn table_name(&self, name: &str) -> String {
        prefix_table(self.prefix, name)
    }
}

/// Contract for a declarative table definition.
pub trait SchemaProvider: Send + Sync {
    /// Declared table name, without the deployment prefix.
    fn table_name(&self) -> &str;

    /// Declared columns in order.
    fn columns(&self) -> &[(String, ColumnAttributes)];

    /// Table-level properties in order.
    fn properties(&self) -> &[TableProperty] {
        &[]
    }

    /// Builds this provider's table.
    fn build_table(&self, ctx: &BuildContext<'_>) -> Result<TableSchema> {
        TableBuilder::new(self.table_name(), self.columns(), self.properties(), *ctx).build()
    }

    /// Adds this provider's table to `schema`.
    fn build_schema(&self, schema: &mut DatabaseSchema, ctx: &BuildContext<'_>) -> Result<()> {
        let table = self.build_table(ctx)?;
        let name = table.name.clone();
        if schema.insert_table(table) {
            Ok(())
        } else {
            Err(SchemaError::configuration(
                name,
                "table is declared by more than one provider",
            ))
        }
    }

    /// A fresh schema holding only this provider's table.
    fn create_schema(&self, ctx: &BuildContext<'_>) -> Result<DatabaseSchema> {
        let mut schema = DatabaseSchema::new();
        self.build_schema(&mut schema, ctx)?;
        Ok(schema)
    }

    /// The CREATE statements for this provider's table.
    fn to_sql(&self, dialect: &dyn MigrationDialect, prefix: &str) -> Result<Vec<String>> {
        let table = self.build_table(&BuildContext::bound(dialect, prefix))?;
        Ok(dialect.create_table_sql(&table))
    }
}

impl SchemaProvider for TableDefinition {
    fn table_name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> &[(String, ColumnAttributes)] {
        &self.columns
    }

    fn properties(&self) -> &[TableProperty] {
        &self.properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::IndexDefinition;
    use crate::dialect::{MySqlDialect, SqliteDialect};
    use crate::schema::{ColumnType, DefaultValue, TemporalDefault};

    fn users() -> TableDefinition {
        TableDefinition::new("users")
            .column("id", ColumnAttributes::new(ColumnType::BigInt).auto_increment())
            .column("email", ColumnAttributes::new(ColumnType::String).length(255))
            .column(
                "created_at",
                ColumnAttributes::new(ColumnType::DateTime).default_current_time(),
            )
            .primary_key(["id"])
            .unique(IndexDefinition::on(["email"]))
    }

    #[test]
    fn test_build_twice_is_equal() {
        let ctx = BuildContext::unbound();
        assert_eq!(users().create_schema(&ctx).unwrap(), users().create_schema(&ctx).unwrap());
    }

    #[test]
    fn test_unbound_keeps_current_time_sentinel() {
        let table = users().build_table(&BuildContext::unbound()).unwrap();
        assert_eq!(table.name, "users");
        assert_eq!(
            table.get_column("created_at").unwrap().default,
            DefaultValue::CurrentTime(TemporalDefault::Timestamp)
        );
    }

    #[test]
    fn test_bound_applies_prefix_and_dialect() {
        let dialect = SqliteDialect::new();
        let table = users()
            .build_table(&BuildContext::bound(&dialect, "app_"))
            .unwrap();
        assert_eq!(table.name, "app_users");
        assert_eq!(
            table.get_column("created_at").unwrap().default,
            DefaultValue::Expression("CURRENT_TIMESTAMP".to_string())
        );
        assert_eq!(table.indexes[0].name, "UNIQ_APP_USERS_EMAIL");
    }

    #[test]
    fn test_duplicate_table_is_rejected() {
        let ctx = BuildContext::unbound();
        let mut schema = users().create_schema(&ctx).unwrap();
        let err = users().build_schema(&mut schema, &ctx).unwrap_err();
        assert!(matches!(err, SchemaError::Configuration { ref table, .. } if table == "users"));
    }

    #[test]
    fn test_to_sql() {
        let sql = users().to_sql(&MySqlDialect::new(), "").unwrap();
        assert_eq!(sql.len(), 2);
        assert!(sql[0].starts_with("CREATE TABLE `users`"));
        assert!(sql[0].contains("`created_at` DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP"));
        assert_eq!(
            sql[1],
            "CREATE UNIQUE INDEX `UNIQ_USERS_EMAIL` ON `users` (`email`)"
        );
    }
}
