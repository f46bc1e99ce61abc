//! Migration operations.
//!
//! A schema diff is flattened into an ordered list of these operations,
//! which a dialect then renders into DDL statements.

use serde::{Deserialize, Serialize};

use crate::schema::{ColumnSchema, ForeignKeySchema, IndexSchema, PrimaryKey, SequenceSchema, TableSchema};

/// The properties that differ between a live column and its declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ColumnChanges {
    /// The rendered type differs (type, length, precision, signedness).
    pub column_type: bool,
    /// Nullability differs.
    pub nullable: bool,
    /// The rendered default differs.
    pub default: bool,
    /// The comment differs.
    pub comment: bool,
}

impl ColumnChanges {
    /// Creates empty column changes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no changes are specified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !(self.column_type || self.nullable || self.default || self.comment)
    }

    /// Names of the changed properties, for logging.
    #[must_use]
    pub fn changed_properties(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.column_type {
            names.push("type");
        }
        if self.nullable {
            names.push("nullable");
        }
        if self.default {
            names.push("default");
        }
        if self.comment {
            names.push("comment");
        }
        names
    }
}

/// A single migration operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MigrationOperation {
    /// Create a namespace (PostgreSQL schema).
    CreateNamespace {
        /// Namespace name.
        name: String,
    },

    /// Create a sequence.
    CreateSequence(SequenceSchema),

    /// Drop a sequence.
    DropSequence {
        /// Sequence name.
        name: String,
    },

    /// Create a new table with its indexes.
    CreateTable(TableSchema),

    /// Drop a table.
    DropTable {
        /// Table name.
        name: String,
    },

    /// Add a column to a table.
    AddColumn {
        /// Table name.
        table: String,
        /// Column definition.
        column: ColumnSchema,
    },

    /// Drop a column from a table.
    DropColumn {
        /// Table name.
        table: String,
        /// Column name.
        column_name: String,
    },

    /// Alter a column's properties.
    AlterColumn {
        /// Table name.
        table: String,
        /// Declared column definition.
        column: ColumnSchema,
        /// Changes to apply.
        changes: ColumnChanges,
    },

    /// Replace the primary key of a table.
    AlterPrimaryKey {
        /// Table name.
        table: String,
        /// Live primary key, if any.
        from: Option<PrimaryKey>,
        /// Declared primary key, if any.
        to: Option<PrimaryKey>,
    },

    /// Create an index.
    CreateIndex {
        /// Table name.
        table: String,
        /// Index definition.
        index: IndexSchema,
    },

    /// Drop an index.
    DropIndex {
        /// Table name.
        table: String,
        /// Index name.
        name: String,
    },

    /// Add a foreign key constraint.
    AddForeignKey {
        /// Table name.
        table: String,
        /// Foreign key definition.
        foreign_key: ForeignKeySchema,
    },

    /// Drop a foreign key constraint.
    DropForeignKey {
        /// Table name.
        table: String,
        /// Constraint name.
        constraint_name: String,
    },
}

impl MigrationOperation {
    /// Returns the table this operation touches, if any.
    #[must_use]
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::CreateNamespace { .. } | Self::CreateSequence(_) | Self::DropSequence { .. } => {
                None
            }
            Self::CreateTable(table) => Some(&table.name),
            Self::DropTable { name } => Some(name),
            Self::AddColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::AlterColumn { table, .. }
            | Self::AlterPrimaryKey { table, .. }
            | Self::CreateIndex { table, .. }
            | Self::DropIndex { table, .. }
            | Self::AddForeignKey { table, .. }
            | Self::DropForeignKey { table, .. } => Some(table),
        }
    }

    /// Returns whether this operation discards existing structure.
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            Self::DropTable { .. } | Self::DropColumn { .. } | Self::DropSequence { .. }
        )
    }

    /// Short human readable description.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::CreateNamespace { name } => format!("create namespace {name}"),
            Self::CreateSequence(seq) => format!("create sequence {}", seq.name),
            Self::DropSequence { name } => format!("drop sequence {name}"),
            Self::CreateTable(table) => format!("create table {}", table.name),
            Self::DropTable { name } => format!("drop table {name}"),
            Self::AddColumn { table, column } => format!("add column {table}.{}", column.name),
            Self::DropColumn { table, column_name } => {
                format!("drop column {table}.{column_name}")
            }
            Self::AlterColumn {
                table,
                column,
                changes,
            } => format!(
                "alter column {table}.{} ({})",
                column.name,
                changes.changed_properties().join(", ")
            ),
            Self::AlterPrimaryKey { table, .. } => format!("replace primary key of {table}"),
            Self::CreateIndex { table, index } => format!("create index {} on {table}", index.name),
            Self::DropIndex { table, name } => format!("drop index {name} on {table}"),
            Self::AddForeignKey { table, foreign_key } => {
                format!("add foreign key {} on {table}", foreign_key.name)
            }
            Self::DropForeignKey {
                table,
                constraint_name,
            } => format!("drop foreign key {constraint_name} on {table}"),
        }
    }
}
