//! MySQL / MariaDB dialect for migrations.
//!
//! DDL is not transactional on MySQL: every statement commits implicitly.

use crate::operations::ColumnChanges;
use crate::schema::{ColumnSchema, ColumnType, IndexSchema, PrimaryKey, TableSchema, TemporalDefault};

use super::{DialectKind, MigrationDialect};

/// MySQL dialect for migration SQL generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    /// Creates a new MySQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn quote_literal(value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }
}

impl MigrationDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn kind(&self) -> DialectKind {
        DialectKind::MySql
    }

    fn type_name(&self, column: &ColumnSchema) -> String {
        let unsigned = if column.unsigned { " UNSIGNED" } else { "" };
        match column.column_type {
            ColumnType::SmallInt => format!("SMALLINT{unsigned}"),
            ColumnType::Integer => format!("INT{unsigned}"),
            ColumnType::BigInt => format!("BIGINT{unsigned}"),
            ColumnType::Decimal => format!(
                "NUMERIC({}, {}){unsigned}",
                column.precision.unwrap_or(10),
                column.scale.unwrap_or(0)
            ),
            ColumnType::Float => format!("DOUBLE PRECISION{unsigned}"),
            ColumnType::String => {
                let length = column.length.unwrap_or(255);
                if column.fixed {
                    format!("CHAR({length})")
                } else {
                    format!("VARCHAR({length})")
                }
            }
            ColumnType::Text => "LONGTEXT".to_string(),
            ColumnType::Guid => "CHAR(36)".to_string(),
            ColumnType::Binary => format!("VARBINARY({})", column.length.unwrap_or(255)),
            ColumnType::Blob => "LONGBLOB".to_string(),
            ColumnType::Boolean => "TINYINT(1)".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::DateTime | ColumnType::DateTimeTz => "DATETIME".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::Json => "JSON".to_string(),
        }
    }

    fn current_time_sql(&self, kind: TemporalDefault) -> Option<&'static str> {
        // DATE and TIME columns cannot default to an expression.
        match kind {
            TemporalDefault::Timestamp => Some("CURRENT_TIMESTAMP"),
            TemporalDefault::Date | TemporalDefault::Time => None,
        }
    }

    fn auto_increment_keyword(&self) -> &'static str {
        "AUTO_INCREMENT"
    }

    fn supports_alter_column(&self) -> bool {
        true
    }

    fn supports_foreign_key_changes(&self) -> bool {
        true
    }

    fn supports_comments(&self) -> bool {
        true
    }

    fn cast_to_text(&self, expr: &str) -> String {
        format!("CAST({expr} AS CHAR)")
    }

    fn session_setup_sql(&self) -> Vec<String> {
        vec!["SET time_zone = '+00:00'".to_string()]
    }

    fn quote_identifier(&self, name: &str) -> String {
        name.split('.')
            .map(|part| format!("`{}`", part.replace('`', "``")))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn inline_comment(&self, column: &ColumnSchema) -> Option<String> {
        column
            .comment
            .as_deref()
            .map(|comment| format!("COMMENT {}", Self::quote_literal(comment)))
    }

    fn table_options_sql(&self, table: &TableSchema) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(engine) = table.options.get("engine") {
            parts.push(format!("ENGINE = {engine}"));
        }
        if let Some(charset) = table.options.get("charset") {
            parts.push(format!("DEFAULT CHARACTER SET {charset}"));
        }
        if let Some(collate) = table.options.get("collate") {
            parts.push(format!("COLLATE {collate}"));
        }
        if let Some(comment) = table.options.get("comment") {
            parts.push(format!("COMMENT = {}", Self::quote_literal(comment)));
        }
        (!parts.is_empty()).then(|| parts.join(" "))
    }

    fn create_index_sql(&self, table: &str, index: &IndexSchema) -> String {
        let kind = if index.unique {
            "UNIQUE "
        } else if index.flags.iter().any(|f| f.eq_ignore_ascii_case("fulltext")) {
            "FULLTEXT "
        } else if index.flags.iter().any(|f| f.eq_ignore_ascii_case("spatial")) {
            "SPATIAL "
        } else {
            ""
        };
        format!(
            "CREATE {kind}INDEX {} ON {} ({})",
            self.quote_identifier(&index.name),
            self.quote_identifier(table),
            self.quote_list(&index.columns)
        )
    }

    fn drop_index_sql(&self, table: &str, name: &str) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(name),
            self.quote_identifier(table)
        )
    }

    fn drop_foreign_key_sql(&self, table: &str, name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            self.quote_identifier(table),
            self.quote_identifier(name)
        )
    }

    fn alter_column_sql(
        &self,
        table: &str,
        column: &ColumnSchema,
        _changes: &ColumnChanges,
    ) -> Vec<String> {
        // MODIFY restates the whole column.
        vec![format!(
            "ALTER TABLE {} MODIFY {}",
            self.quote_identifier(table),
            self.column_definition(column, false)
        )]
    }

    fn alter_primary_key_sql(
        &self,
        table: &str,
        from: Option<&PrimaryKey>,
        to: Option<&PrimaryKey>,
    ) -> Vec<String> {
        let quoted_table = self.quote_identifier(table);
        let mut statements = Vec::new();
        if from.is_some() {
            statements.push(format!("ALTER TABLE {quoted_table} DROP PRIMARY KEY"));
        }
        if let Some(pk) = to {
            statements.push(format!(
                "ALTER TABLE {quoted_table} ADD PRIMARY KEY ({})",
                self.quote_list(&pk.columns)
            ));
        }
        statements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DefaultValue;

    fn dialect() -> MySqlDialect {
        MySqlDialect::new()
    }

    #[test]
    fn test_create_table_with_options() {
        let mut table = TableSchema::new("indodax")
            .column(
                ColumnSchema::new("id", ColumnType::BigInt)
                    .not_null()
                    .auto_increment(),
            )
            .column(
                ColumnSchema::new("pair", ColumnType::String)
                    .length(32)
                    .not_null()
                    .comment("trading pair"),
            )
            .primary_key(vec!["id".to_string()]);
        table.options.insert("engine".to_string(), "InnoDB".to_string());

        let sql = dialect().create_table_sql(&table);
        assert_eq!(
            sql[0],
            "CREATE TABLE `indodax` (\n  `id` BIGINT NOT NULL AUTO_INCREMENT,\n  \
             `pair` VARCHAR(32) NOT NULL COMMENT 'trading pair',\n  PRIMARY KEY (`id`)\n) \
             ENGINE = InnoDB"
        );
    }

    #[test]
    fn test_no_current_date_default() {
        assert_eq!(dialect().current_time_sql(TemporalDefault::Date), None);
        assert_eq!(dialect().current_time_sql(TemporalDefault::Time), None);
        assert_eq!(
            dialect().current_time_sql(TemporalDefault::Timestamp),
            Some("CURRENT_TIMESTAMP")
        );
    }

    #[test]
    fn test_modify_column() {
        let column = ColumnSchema::new("price", ColumnType::Decimal)
            .precision(18, 8)
            .not_null()
            .default(DefaultValue::Integer(0));
        let sql = dialect().alter_column_sql("indodax", &column, &ColumnChanges::default());
        assert_eq!(
            sql,
            vec!["ALTER TABLE `indodax` MODIFY `price` NUMERIC(18, 8) NOT NULL DEFAULT 0"]
        );
    }

    #[test]
    fn test_drop_index_and_foreign_key() {
        let d = dialect();
        assert_eq!(
            d.drop_index_sql("users", "UNIQ_USERS_EMAIL"),
            "DROP INDEX `UNIQ_USERS_EMAIL` ON `users`"
        );
        assert_eq!(
            d.drop_foreign_key_sql("orders", "FK_ORDERS_USER_ID"),
            "ALTER TABLE `orders` DROP FOREIGN KEY `FK_ORDERS_USER_ID`"
        );
    }

    #[test]
    fn test_unsigned_and_boolean_types() {
        let d = dialect();
        let mut id = ColumnSchema::new("id", ColumnType::Integer);
        id.unsigned = true;
        assert_eq!(d.type_name(&id), "INT UNSIGNED");
        assert_eq!(
            d.type_name(&ColumnSchema::new("flag", ColumnType::Boolean)),
            "TINYINT(1)"
        );
    }
}
