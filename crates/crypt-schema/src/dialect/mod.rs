//! Database dialect implementations.
//!
//! Each dialect knows how to render column types and defaults for its
//! database and how to generate SQL for migration operations. The
//! comparator also goes through the dialect, so two columns count as equal
//! when they render to the same SQL.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use std::fmt;

use crate::error::{Result, SchemaError};
use crate::operations::{ColumnChanges, MigrationOperation};
use crate::schema::{
    ColumnSchema, DefaultValue, ForeignKeyAction, ForeignKeySchema, IndexSchema, PrimaryKey,
    SequenceSchema, TableSchema, TemporalDefault,
};

/// The database families we can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialectKind {
    /// SQLite.
    Sqlite,
    /// PostgreSQL.
    Postgres,
    /// MySQL and MariaDB.
    MySql,
}

impl DialectKind {
    /// Detects the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url.split(':').next().unwrap_or_default().to_ascii_lowercase();
        match scheme.as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "mysql" | "mariadb" => Ok(Self::MySql),
            _ => Err(SchemaError::DialectUnsupported {
                dialect: scheme,
                feature: "schema reconciliation".to_string(),
            }),
        }
    }

    /// Returns the dialect implementation.
    #[must_use]
    pub fn dialect(self) -> Box<dyn MigrationDialect> {
        match self {
            Self::Sqlite => Box::new(SqliteDialect::new()),
            Self::Postgres => Box::new(PostgresDialect::new()),
            Self::MySql => Box::new(MySqlDialect::new()),
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => f.write_str("sqlite"),
            Self::Postgres => f.write_str("postgresql"),
            Self::MySql => f.write_str("mysql"),
        }
    }
}

/// Trait for database-specific SQL generation.
pub trait MigrationDialect: Send + Sync + fmt::Debug {
    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns the dialect family.
    fn kind(&self) -> DialectKind;

    /// Returns the SQL type for the given column.
    fn type_name(&self, column: &ColumnSchema) -> String;

    /// Returns this dialect's expression for a "current time" default, or
    /// `None` when the dialect cannot express it as a column default.
    fn current_time_sql(&self, kind: TemporalDefault) -> Option<&'static str>;

    /// Keyword appended to auto-increment columns (empty when the dialect
    /// encodes auto-increment in the type).
    fn auto_increment_keyword(&self) -> &'static str;

    /// Returns whether this dialect supports ALTER COLUMN.
    fn supports_alter_column(&self) -> bool;

    /// Returns whether foreign keys can be added and dropped after table
    /// creation. When `false` they are written inline in CREATE TABLE.
    fn supports_foreign_key_changes(&self) -> bool;

    /// Returns whether this dialect has sequences.
    fn supports_sequences(&self) -> bool {
        false
    }

    /// Returns whether this dialect has namespaces.
    fn supports_namespaces(&self) -> bool {
        false
    }

    /// Returns whether column comments are stored and introspectable.
    fn supports_comments(&self) -> bool {
        false
    }

    /// Returns whether a single auto-increment primary key is declared
    /// inline on the column (`INTEGER PRIMARY KEY AUTOINCREMENT`).
    fn inlines_auto_increment_primary_key(&self) -> bool {
        false
    }

    /// Bind parameter placeholder for the 1-based `index`.
    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    /// Wraps an expression so the driver decodes it as text.
    fn cast_to_text(&self, expr: &str) -> String {
        format!("CAST({expr} AS TEXT)")
    }

    /// Statements run at the start of an install session.
    fn session_setup_sql(&self) -> Vec<String> {
        Vec::new()
    }

    /// Quote an identifier (table name, column name, etc.). Qualified names
    /// are quoted part by part.
    fn quote_identifier(&self, name: &str) -> String {
        name.split('.')
            .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Renders a column default, or `None` for no default clause.
    fn render_default(&self, column: &ColumnSchema) -> Option<String> {
        match &column.default {
            DefaultValue::CurrentTime(kind) => Some(
                self.current_time_sql(*kind)
                    .unwrap_or(kind.standard_sql())
                    .to_string(),
            ),
            other => other.to_sql(),
        }
    }

    /// Generates column definition SQL.
    fn column_definition(&self, column: &ColumnSchema, inline_primary_key: bool) -> String {
        let mut parts = vec![self.quote_identifier(&column.name), self.type_name(column)];

        if inline_primary_key {
            parts.push("PRIMARY KEY AUTOINCREMENT".to_string());
        } else {
            if !column.nullable {
                parts.push("NOT NULL".to_string());
            }
            let keyword = self.auto_increment_keyword();
            if column.auto_increment && !keyword.is_empty() {
                parts.push(keyword.to_string());
            }
        }

        if !column.auto_increment {
            if let Some(default_sql) = self.render_default(column) {
                parts.push(format!("DEFAULT {default_sql}"));
            }
        }

        if let Some(comment) = self.inline_comment(column) {
            parts.push(comment);
        }

        parts.join(" ")
    }

    /// Comment clause written inside the column definition, if any.
    fn inline_comment(&self, _column: &ColumnSchema) -> Option<String> {
        None
    }

    /// Separate statements that attach comments to a table and its columns.
    fn comment_sql(&self, _table: &TableSchema) -> Vec<String> {
        Vec::new()
    }

    /// Clause appended after the closing parenthesis of CREATE TABLE.
    fn table_options_sql(&self, _table: &TableSchema) -> Option<String> {
        None
    }

    /// Renders a `CONSTRAINT ... FOREIGN KEY` clause.
    fn foreign_key_clause(&self, fk: &ForeignKeySchema) -> String {
        let mut sql = format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.quote_identifier(&fk.name),
            self.quote_list(&fk.columns),
            self.quote_identifier(&fk.references_table),
            self.quote_list(&fk.references_columns)
        );
        if fk.on_delete != ForeignKeyAction::NoAction {
            sql.push_str(" ON DELETE ");
            sql.push_str(fk.on_delete.to_sql());
        }
        if fk.on_update != ForeignKeyAction::NoAction {
            sql.push_str(" ON UPDATE ");
            sql.push_str(fk.on_update.to_sql());
        }
        sql
    }

    /// Quotes and joins a column list.
    fn quote_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Generates SQL for creating a table together with its indexes.
    fn create_table_sql(&self, table: &TableSchema) -> Vec<String> {
        let pk_columns = table.primary_key_columns();
        let inline_pk = self.inlines_auto_increment_primary_key()
            && pk_columns.len() == 1
            && table
                .get_column(&pk_columns[0])
                .is_some_and(|c| c.auto_increment);

        let mut lines: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c, inline_pk && pk_columns[0] == c.name))
            .collect();

        if !pk_columns.is_empty() && !inline_pk {
            lines.push(format!("PRIMARY KEY ({})", self.quote_list(pk_columns)));
        }

        if !self.supports_foreign_key_changes() {
            lines.extend(table.foreign_keys.iter().map(|fk| self.foreign_key_clause(fk)));
        }

        let mut sql = format!(
            "CREATE TABLE {} (\n  {}\n)",
            self.quote_identifier(&table.name),
            lines.join(",\n  ")
        );
        if let Some(options) = self.table_options_sql(table) {
            sql.push(' ');
            sql.push_str(&options);
        }

        let mut statements = vec![sql];
        statements.extend(
            table
                .indexes
                .iter()
                .map(|index| self.create_index_sql(&table.name, index)),
        );
        statements.extend(self.comment_sql(table));
        statements
    }

    /// Generates SQL for dropping a table.
    fn drop_table_sql(&self, name: &str) -> String {
        format!("DROP TABLE {}", self.quote_identifier(name))
    }

    /// Generates SQL for adding a column.
    fn add_column_sql(&self, table: &str, column: &ColumnSchema) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column, false)
        )
    }

    /// Generates SQL for dropping a column.
    fn drop_column_sql(&self, table: &str, column_name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column_name)
        )
    }

    /// Generates SQL for changing an existing column.
    fn alter_column_sql(
        &self,
        table: &str,
        column: &ColumnSchema,
        changes: &ColumnChanges,
    ) -> Vec<String>;

    /// Generates SQL for replacing a primary key.
    fn alter_primary_key_sql(
        &self,
        table: &str,
        from: Option<&PrimaryKey>,
        to: Option<&PrimaryKey>,
    ) -> Vec<String>;

    /// Generates SQL for creating an index.
    fn create_index_sql(&self, table: &str, index: &IndexSchema) -> String {
        let mut sql = String::from("CREATE ");
        if index.unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        sql.push_str(&self.quote_identifier(&index.name));
        sql.push_str(" ON ");
        sql.push_str(&self.quote_identifier(table));
        sql.push_str(" (");
        sql.push_str(&self.quote_list(&index.columns));
        sql.push(')');

        if let Some(cond) = index.condition() {
            sql.push_str(" WHERE ");
            sql.push_str(cond);
        }

        sql
    }

    /// Generates SQL for dropping an index. Indexes live in the namespace
    /// of their table.
    fn drop_index_sql(&self, table: &str, name: &str) -> String {
        match table.split_once('.') {
            Some((namespace, _)) => format!(
                "DROP INDEX {}.{}",
                self.quote_identifier(namespace),
                self.quote_identifier(name)
            ),
            None => format!("DROP INDEX {}", self.quote_identifier(name)),
        }
    }

    /// Generates SQL for adding a foreign key.
    fn add_foreign_key_sql(&self, table: &str, fk: &ForeignKeySchema) -> String {
        format!(
            "ALTER TABLE {} ADD {}",
            self.quote_identifier(table),
            self.foreign_key_clause(fk)
        )
    }

    /// Generates SQL for dropping a foreign key.
    fn drop_foreign_key_sql(&self, table: &str, name: &str) -> String {
        format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.quote_identifier(table),
            self.quote_identifier(name)
        )
    }

    /// Generates SQL for creating a sequence.
    fn create_sequence_sql(&self, sequence: &SequenceSchema) -> String {
        format!(
            "-- Sequence {} is not supported by {}",
            sequence.name,
            self.name()
        )
    }

    /// Generates SQL for dropping a sequence.
    fn drop_sequence_sql(&self, name: &str) -> String {
        format!("-- Sequence {name} is not supported by {}", self.name())
    }

    /// Generates SQL for creating a namespace.
    fn create_namespace_sql(&self, name: &str) -> String {
        format!("-- Namespace {name} is not supported by {}", self.name())
    }

    /// Generates SQL for a migration operation.
    fn generate_sql(&self, operation: &MigrationOperation) -> Vec<String> {
        match operation {
            MigrationOperation::CreateNamespace { name } => {
                vec![self.create_namespace_sql(name)]
            }
            MigrationOperation::CreateSequence(sequence) => {
                vec![self.create_sequence_sql(sequence)]
            }
            MigrationOperation::DropSequence { name } => vec![self.drop_sequence_sql(name)],
            MigrationOperation::CreateTable(table) => self.create_table_sql(table),
            MigrationOperation::DropTable { name } => vec![self.drop_table_sql(name)],
            MigrationOperation::AddColumn { table, column } => {
                vec![self.add_column_sql(table, column)]
            }
            MigrationOperation::DropColumn { table, column_name } => {
                vec![self.drop_column_sql(table, column_name)]
            }
            MigrationOperation::AlterColumn {
                table,
                column,
                changes,
            } => self.alter_column_sql(table, column, changes),
            MigrationOperation::AlterPrimaryKey { table, from, to } => {
                self.alter_primary_key_sql(table, from.as_ref(), to.as_ref())
            }
            MigrationOperation::CreateIndex { table, index } => {
                vec![self.create_index_sql(table, index)]
            }
            MigrationOperation::DropIndex { table, name } => {
                vec![self.drop_index_sql(table, name)]
            }
            MigrationOperation::AddForeignKey { table, foreign_key } => {
                if self.supports_foreign_key_changes() {
                    vec![self.add_foreign_key_sql(table, foreign_key)]
                } else {
                    vec![format!(
                        "-- Foreign key {} cannot be added after table creation in {}. \
                         Table recreation required.",
                        foreign_key.name,
                        self.name()
                    )]
                }
            }
            MigrationOperation::DropForeignKey {
                table,
                constraint_name,
            } => {
                if self.supports_foreign_key_changes() {
                    vec![self.drop_foreign_key_sql(table, constraint_name)]
                } else {
                    vec![format!(
                        "-- Foreign key {} cannot be dropped in {}. \
                         Table recreation required.",
                        constraint_name,
                        self.name()
                    )]
                }
            }
        }
    }
}

/// Returns whether a generated statement is an explanatory comment rather
/// than executable SQL.
#[must_use]
pub fn is_comment(sql: &str) -> bool {
    sql.trim_start().starts_with("--")
}
