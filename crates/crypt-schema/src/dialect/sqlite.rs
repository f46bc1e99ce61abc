//! SQLite dialect for migrations.
//!
//! SQLite has limited ALTER TABLE support: columns cannot be altered and
//! foreign keys must be declared at table creation time. Those operations
//! render as SQL comments so they show up in diffs without being executed.

use crate::operations::ColumnChanges;
use crate::schema::{ColumnSchema, ColumnType, PrimaryKey, TemporalDefault};

use super::{DialectKind, MigrationDialect};

/// SQLite migration dialect.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    /// Creates a new SQLite dialect.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl MigrationDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn type_name(&self, column: &ColumnSchema) -> String {
        if column.auto_increment && column.column_type.is_integer() {
            // Only INTEGER may carry AUTOINCREMENT.
            return "INTEGER".to_string();
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
            ColumnType::Text | ColumnType::Json => "CLOB".to_string(),
            ColumnType::Guid => "CHAR(36)".to_string(),
            ColumnType::Binary | ColumnType::Blob => "BLOB".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::DateTime | ColumnType::DateTimeTz => "DATETIME".to_string(),
            ColumnType::Time => "TIME".to_string(),
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
        ""
    }

    fn supports_alter_column(&self) -> bool {
        false
    }

    fn supports_foreign_key_changes(&self) -> bool {
        false
    }

    fn inlines_auto_increment_primary_key(&self) -> bool {
        true
    }

    fn alter_column_sql(
        &self,
        table: &str,
        column: &ColumnSchema,
        changes: &ColumnChanges,
    ) -> Vec<String> {
        vec![format!(
            "-- ALTER COLUMN not directly supported in SQLite. \
             Table recreation required for: {}.{} ({})",
            table,
            column.name,
            changes.changed_properties().join(", ")
        )]
    }

    fn alter_primary_key_sql(
        &self,
        table: &str,
        _from: Option<&PrimaryKey>,
        _to: Option<&PrimaryKey>,
    ) -> Vec<String> {
        vec![format!(
            "-- Primary key of {table} cannot be changed in SQLite. Table recreation required."
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::MigrationOperation;
    use crate::schema::{DefaultValue, ForeignKeySchema, ForeignKeyAction, IndexSchema, TableSchema};

    fn dialect() -> SqliteDialect {
        SqliteDialect::new()
    }

    #[test]
    fn test_create_table_simple() {
        let table = TableSchema::new("users")
            .column(
                ColumnSchema::new("id", ColumnType::BigInt)
                    .not_null()
                    .auto_increment(),
            )
            .column(
                ColumnSchema::new("name", ColumnType::String)
                    .length(255)
                    .not_null(),
            )
            .primary_key(vec!["id".to_string()]);

        let sql = dialect().generate_sql(&MigrationOperation::CreateTable(table));
        assert_eq!(sql.len(), 1);
        assert_eq!(
            sql[0],
            "CREATE TABLE \"users\" (\n  \"id\" INTEGER PRIMARY KEY AUTOINCREMENT,\n  \
             \"name\" VARCHAR(255) NOT NULL\n)"
        );
    }

    #[test]
    fn test_composite_primary_key_and_inline_foreign_key() {
        let table = TableSchema::new("memberships")
            .column(ColumnSchema::new("user_id", ColumnType::Integer).not_null())
            .column(ColumnSchema::new("group_id", ColumnType::Integer).not_null())
            .primary_key(vec!["user_id".to_string(), "group_id".to_string()])
            .foreign_key(ForeignKeySchema {
                name: "FK_MEMBERSHIPS_USER_ID".to_string(),
                columns: vec!["user_id".to_string()],
                references_table: "users".to_string(),
                references_columns: vec!["id".to_string()],
                on_delete: ForeignKeyAction::Cascade,
                on_update: ForeignKeyAction::NoAction,
            })
            .index(IndexSchema::new("IDX_MEMBERSHIPS_GROUP_ID", vec!["group_id".to_string()]));

        let sql = dialect().create_table_sql(&table);
        assert_eq!(sql.len(), 2);
        assert!(sql[0].contains("PRIMARY KEY (\"user_id\", \"group_id\")"));
        assert!(sql[0].contains(
            "CONSTRAINT \"FK_MEMBERSHIPS_USER_ID\" FOREIGN KEY (\"user_id\") \
             REFERENCES \"users\" (\"id\") ON DELETE CASCADE"
        ));
        assert_eq!(
            sql[1],
            "CREATE INDEX \"IDX_MEMBERSHIPS_GROUP_ID\" ON \"memberships\" (\"group_id\")"
        );
    }

    #[test]
    fn test_add_column_with_default() {
        let op = MigrationOperation::AddColumn {
            table: "users".to_string(),
            column: ColumnSchema::new("is_active", ColumnType::Boolean)
                .not_null()
                .default(DefaultValue::Bool(true)),
        };

        let sql = dialect().generate_sql(&op);
        assert_eq!(
            sql[0],
            "ALTER TABLE \"users\" ADD COLUMN \"is_active\" BOOLEAN NOT NULL DEFAULT 1"
        );
    }

    #[test]
    fn test_current_time_default_resolves() {
        let column = ColumnSchema::new("created_at", ColumnType::DateTime)
            .default(DefaultValue::CurrentTime(TemporalDefault::Timestamp));
        assert_eq!(
            dialect().column_definition(&column, false),
            "\"created_at\" DATETIME DEFAULT CURRENT_TIMESTAMP"
        );
    }

    #[test]
    fn test_drop_column() {
        let op = MigrationOperation::DropColumn {
            table: "users".to_string(),
            column_name: "email".to_string(),
        };

        let sql = dialect().generate_sql(&op);
        assert_eq!(sql[0], "ALTER TABLE \"users\" DROP COLUMN \"email\"");
    }

    #[test]
    fn test_unsupported_operations_render_as_comments() {
        let alter = MigrationOperation::AlterColumn {
            table: "users".to_string(),
            column: ColumnSchema::new("name", ColumnType::Text),
            changes: ColumnChanges {
                column_type: true,
                ..ColumnChanges::default()
            },
        };
        let drop_fk = MigrationOperation::DropForeignKey {
            table: "users".to_string(),
            constraint_name: "FK_USERS_GROUP_ID".to_string(),
        };

        for op in [alter, drop_fk] {
            let sql = dialect().generate_sql(&op);
            assert!(super::super::is_comment(&sql[0]), "{}", sql[0]);
        }
    }

    #[test]
    fn test_drop_index() {
        let op = MigrationOperation::DropIndex {
            table: "users".to_string(),
            name: "IDX_USERS_EMAIL".to_string(),
        };

        let sql = dialect().generate_sql(&op);
        assert_eq!(sql[0], "DROP INDEX \"IDX_USERS_EMAIL\"");
    }

    #[test]
    fn test_type_names() {
        let d = dialect();
        let col = |t| ColumnSchema::new("c", t);
        assert_eq!(d.type_name(&col(ColumnType::BigInt)), "BIGINT");
        assert_eq!(d.type_name(&col(ColumnType::String)), "VARCHAR(255)");
        assert_eq!(d.type_name(&col(ColumnType::Guid)), "CHAR(36)");
        assert_eq!(d.type_name(&col(ColumnType::Json)), "CLOB");
        assert_eq!(d.type_name(&col(ColumnType::DateTimeTz)), "DATETIME");
        assert_eq!(
            d.type_name(&col(ColumnType::Decimal).precision(18, 8)),
            "NUMERIC(18, 8)"
        );
    }
}
