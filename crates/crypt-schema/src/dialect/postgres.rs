//! PostgreSQL dialect for migrations.

use crate::operations::ColumnChanges;
use crate::schema::{
    ColumnSchema, ColumnType, DefaultValue, PrimaryKey, SequenceSchema, TableSchema,
    TemporalDefault,
};

use super::{DialectKind, MigrationDialect};

/// PostgreSQL dialect for migration SQL generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Creates a new PostgreSQL dialect.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// The type without the SERIAL shorthand, usable in `ALTER ... TYPE`.
    fn storage_type(&self, column: &ColumnSchema) -> String {
        let mut plain = column.clone();
        plain.auto_increment = false;
        self.type_name(&plain)
    }

    fn quote_literal(value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }
}

impl MigrationDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn type_name(&self, column: &ColumnSchema) -> String {
        if column.auto_increment {
            match column.column_type {
                ColumnType::SmallInt => return "SMALLSERIAL".to_string(),
                ColumnType::Integer => return "SERIAL".to_string(),
                ColumnType::BigInt => return "BIGSERIAL".to_string(),
                _ => {}
            }
        }
        match column.column_type {
            ColumnType::SmallInt => "SMALLINT".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Decimal => format!(
                "NUMERIC({}, {})",
                column.precision.unwrap_or(10),
                column.scale.unwrap_or(0)
            ),
            ColumnType::Float => "DOUBLE PRECISION".to_string(),
            ColumnType::String => {
                let length = column.length.unwrap_or(255);
                if column.fixed {
                    format!("CHAR({length})")
                } else {
                    format!("VARCHAR({length})")
                }
            }
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Guid => "UUID".to_string(),
            ColumnType::Binary | ColumnType::Blob => "BYTEA".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::DateTime => "TIMESTAMP(0) WITHOUT TIME ZONE".to_string(),
            ColumnType::DateTimeTz => "TIMESTAMP(0) WITH TIME ZONE".to_string(),
            ColumnType::Time => "TIME(0) WITHOUT TIME ZONE".to_string(),
            ColumnType::Json => "JSON".to_string(),
        }
    }

    fn current_time_sql(&self, kind: TemporalDefault) -> Option<&'static str> {
        Some(match kind {
            TemporalDefault::Timestamp => "CURRENT_TIMESTAMP",
            TemporalDefault::Date => "CURRENT_DATE",
            TemporalDefault::Time => "CURRENT_TIME",
        })
    }

    fn auto_increment_keyword(&self) -> &'static str {
        // SERIAL types carry auto-increment.
        ""
    }

    fn supports_alter_column(&self) -> bool {
        true
    }

    fn supports_foreign_key_changes(&self) -> bool {
        true
    }

    fn supports_sequences(&self) -> bool {
        true
    }

    fn supports_namespaces(&self) -> bool {
        true
    }

    fn supports_comments(&self) -> bool {
        true
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
    }

    fn cast_to_text(&self, expr: &str) -> String {
        format!("({expr})::text")
    }

    fn session_setup_sql(&self) -> Vec<String> {
        vec!["SET TIME ZONE 'UTC'".to_string()]
    }

    fn render_default(&self, column: &ColumnSchema) -> Option<String> {
        match &column.default {
            DefaultValue::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
            DefaultValue::CurrentTime(kind) => self.current_time_sql(*kind).map(str::to_string),
            other => other.to_sql(),
        }
    }

    fn comment_sql(&self, table: &TableSchema) -> Vec<String> {
        let mut statements = Vec::new();
        if let Some(comment) = table.options.get("comment") {
            statements.push(format!(
                "COMMENT ON TABLE {} IS {}",
                self.quote_identifier(&table.name),
                Self::quote_literal(comment)
            ));
        }
        for column in &table.columns {
            if let Some(comment) = &column.comment {
                statements.push(format!(
                    "COMMENT ON COLUMN {}.{} IS {}",
                    self.quote_identifier(&table.name),
                    self.quote_identifier(&column.name),
                    Self::quote_literal(comment)
                ));
            }
        }
        statements
    }

    fn alter_column_sql(
        &self,
        table: &str,
        column: &ColumnSchema,
        changes: &ColumnChanges,
    ) -> Vec<String> {
        let quoted_table = self.quote_identifier(table);
        let quoted_column = self.quote_identifier(&column.name);
        let prefix = format!("ALTER TABLE {quoted_table} ALTER COLUMN {quoted_column}");
        let mut statements = Vec::new();

        if changes.column_type {
            statements.push(format!("{prefix} TYPE {}", self.storage_type(column)));
        }
        if changes.default {
            match self.render_default(column) {
                Some(default) if !column.auto_increment => {
                    statements.push(format!("{prefix} SET DEFAULT {default}"));
                }
                _ if !column.auto_increment => statements.push(format!("{prefix} DROP DEFAULT")),
                _ => {}
            }
        }
        if changes.nullable {
            if column.nullable {
                statements.push(format!("{prefix} DROP NOT NULL"));
            } else {
                statements.push(format!("{prefix} SET NOT NULL"));
            }
        }
        if changes.comment {
            let comment = column
                .comment
                .as_deref()
                .map_or_else(|| "NULL".to_string(), Self::quote_literal);
            statements.push(format!(
                "COMMENT ON COLUMN {quoted_table}.{quoted_column} IS {comment}"
            ));
        }
        statements
    }

    fn alter_primary_key_sql(
        &self,
        table: &str,
        from: Option<&PrimaryKey>,
        to: Option<&PrimaryKey>,
    ) -> Vec<String> {
        let quoted_table = self.quote_identifier(table);
        let mut statements = Vec::new();
        if let Some(pk) = from {
            let short = table.rsplit('.').next().unwrap_or(table);
            let name = pk.name.clone().unwrap_or_else(|| format!("{short}_pkey"));
            statements.push(format!(
                "ALTER TABLE {quoted_table} DROP CONSTRAINT {}",
                self.quote_identifier(&name)
            ));
        }
        if let Some(pk) = to {
            statements.push(format!(
                "ALTER TABLE {quoted_table} ADD PRIMARY KEY ({})",
                self.quote_list(&pk.columns)
            ));
        }
        statements
    }

    fn create_sequence_sql(&self, sequence: &SequenceSchema) -> String {
        format!(
            "CREATE SEQUENCE {} INCREMENT BY {} MINVALUE {} START {}",
            self.quote_identifier(&sequence.name),
            sequence.increment,
            sequence.start,
            sequence.start
        )
    }

    fn drop_sequence_sql(&self, name: &str) -> String {
        format!("DROP SEQUENCE {}", self.quote_identifier(name))
    }

    fn create_namespace_sql(&self, name: &str) -> String {
        format!("CREATE SCHEMA {}", self.quote_identifier(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::MigrationOperation;

    fn dialect() -> PostgresDialect {
        PostgresDialect::new()
    }

    #[test]
    fn test_serial_primary_key() {
        let table = TableSchema::new("widgets")
            .column(
                ColumnSchema::new("id", ColumnType::Integer)
                    .not_null()
                    .auto_increment(),
            )
            .column(
                ColumnSchema::new("name", ColumnType::String)
                    .length(255)
                    .not_null(),
            )
            .primary_key(vec!["id".to_string()]);

        let sql = dialect().create_table_sql(&table);
        assert_eq!(
            sql,
            vec![
                "CREATE TABLE \"widgets\" (\n  \"id\" SERIAL NOT NULL,\n  \
                 \"name\" VARCHAR(255) NOT NULL,\n  PRIMARY KEY (\"id\")\n)"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_boolean_default() {
        let column = ColumnSchema::new("is_active", ColumnType::Boolean)
            .not_null()
            .default(DefaultValue::Bool(false));
        assert_eq!(
            dialect().column_definition(&column, false),
            "\"is_active\" BOOLEAN NOT NULL DEFAULT FALSE"
        );
    }

    #[test]
    fn test_alter_column() {
        let column = ColumnSchema::new("created_at", ColumnType::DateTime)
            .default(DefaultValue::Expression("CURRENT_TIMESTAMP".to_string()));
        let changes = ColumnChanges {
            column_type: true,
            nullable: true,
            default: true,
            comment: false,
        };

        let sql = dialect().alter_column_sql("users", &column, &changes);
        assert_eq!(
            sql,
            vec![
                "ALTER TABLE \"users\" ALTER COLUMN \"created_at\" TYPE TIMESTAMP(0) WITHOUT TIME ZONE",
                "ALTER TABLE \"users\" ALTER COLUMN \"created_at\" SET DEFAULT CURRENT_TIMESTAMP",
                "ALTER TABLE \"users\" ALTER COLUMN \"created_at\" DROP NOT NULL",
            ]
        );
    }

    #[test]
    fn test_alter_serial_uses_storage_type() {
        let column = ColumnSchema::new("id", ColumnType::BigInt)
            .not_null()
            .auto_increment();
        let changes = ColumnChanges {
            column_type: true,
            ..ColumnChanges::default()
        };

        let sql = dialect().alter_column_sql("widgets", &column, &changes);
        assert_eq!(sql, vec!["ALTER TABLE \"widgets\" ALTER COLUMN \"id\" TYPE BIGINT"]);
    }

    #[test]
    fn test_comments() {
        let table = TableSchema::new("users")
            .column(ColumnSchema::new("email", ColumnType::String).comment("login e-mail"));
        let sql = dialect().create_table_sql(&table);
        assert_eq!(
            sql.last().unwrap(),
            "COMMENT ON COLUMN \"users\".\"email\" IS 'login e-mail'"
        );
    }

    #[test]
    fn test_sequences_and_namespaces() {
        let d = dialect();
        let create = d.generate_sql(&MigrationOperation::CreateSequence(SequenceSchema {
            name: "orders_id_seq".to_string(),
            start: 1,
            increment: 1,
        }));
        assert_eq!(
            create[0],
            "CREATE SEQUENCE \"orders_id_seq\" INCREMENT BY 1 MINVALUE 1 START 1"
        );
        let ns = d.generate_sql(&MigrationOperation::CreateNamespace {
            name: "market".to_string(),
        });
        assert_eq!(ns[0], "CREATE SCHEMA \"market\"");
    }

    #[test]
    fn test_replace_primary_key() {
        let from = PrimaryKey {
            name: None,
            columns: vec!["id".to_string()],
        };
        let to = PrimaryKey {
            name: None,
            columns: vec!["id".to_string(), "pair".to_string()],
        };
        let sql = dialect().alter_primary_key_sql("market.tickers", Some(&from), Some(&to));
        assert_eq!(
            sql,
            vec![
                "ALTER TABLE \"market\".\"tickers\" DROP CONSTRAINT \"tickers_pkey\"",
                "ALTER TABLE \"market\".\"tickers\" ADD PRIMARY KEY (\"id\", \"pair\")",
            ]
        );
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(dialect().placeholder(2), "$2");
        assert_eq!(dialect().cast_to_text("executed_at"), "(executed_at)::text");
    }
}
