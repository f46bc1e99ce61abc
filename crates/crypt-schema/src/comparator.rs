//! Schema comparison.
//!
//! Compares a live schema with a target schema and produces a
//! [`SchemaDiff`]. Tables are visited in declaration order so the same pair
//! of schemas always yields the same statements in the same order.

use tracing::warn;

use crate::dialect::MigrationDialect;
use crate::operations::{ColumnChanges, MigrationOperation};
use crate::schema::{
    ColumnSchema, DatabaseSchema, ForeignKeySchema, IndexSchema, PrimaryKey, SequenceSchema,
    TableSchema,
};

/// A changed column: the declared definition and what differs from live.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDiff {
    /// Declared column.
    pub column: ColumnSchema,
    /// Live column.
    pub from: ColumnSchema,
    /// Differing properties.
    pub changes: ColumnChanges,
}

/// Differences within a table present on both sides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableDiff {
    /// Table name.
    pub name: String,
    /// Columns missing live.
    pub added_columns: Vec<ColumnSchema>,
    /// Columns present on both sides but different.
    pub changed_columns: Vec<ColumnDiff>,
    /// Columns only present live.
    pub removed_columns: Vec<ColumnSchema>,
    /// Indexes missing live.
    pub added_indexes: Vec<IndexSchema>,
    /// Live indexes not declared.
    pub removed_indexes: Vec<IndexSchema>,
    /// Foreign keys missing live.
    pub added_foreign_keys: Vec<ForeignKeySchema>,
    /// Live foreign keys not declared.
    pub removed_foreign_keys: Vec<ForeignKeySchema>,
    /// `(live, declared)` primary keys when they differ.
    pub primary_key: Option<(Option<PrimaryKey>, Option<PrimaryKey>)>,
}

impl TableDiff {
    /// Returns true if the table is unchanged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added_columns.is_empty()
            && self.changed_columns.is_empty()
            && self.removed_columns.is_empty()
            && self.added_indexes.is_empty()
            && self.removed_indexes.is_empty()
            && self.added_foreign_keys.is_empty()
            && self.removed_foreign_keys.is_empty()
            && self.primary_key.is_none()
    }
}

/// Everything that separates a live schema from a target schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDiff {
    /// Namespaces to create.
    pub new_namespaces: Vec<String>,
    /// Sequences to create.
    pub new_sequences: Vec<SequenceSchema>,
    /// Sequences to drop.
    pub removed_sequences: Vec<SequenceSchema>,
    /// Tables to create, in declaration order.
    pub new_tables: Vec<TableSchema>,
    /// Tables to alter, in declaration order.
    pub changed_tables: Vec<TableDiff>,
    /// Tables to drop, in live order.
    pub removed_tables: Vec<TableSchema>,
}

impl SchemaDiff {
    /// Returns true if both schemas are equivalent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new_namespaces.is_empty()
            && self.new_sequences.is_empty()
            && self.removed_sequences.is_empty()
            && self.new_tables.is_empty()
            && self.changed_tables.is_empty()
            && self.removed_tables.is_empty()
    }

    /// Flattens the diff into ordered operations for `dialect`.
    ///
    /// Order: namespaces, sequences, dropped foreign keys, new tables,
    /// column and index changes, new foreign keys, dropped tables, dropped
    /// sequences.
    #[must_use]
    pub fn operations(&self, dialect: &dyn MigrationDialect) -> Vec<MigrationOperation> {
        let mut operations = Vec::new();

        if dialect.supports_namespaces() {
            for name in &self.new_namespaces {
                operations.push(MigrationOperation::CreateNamespace { name: name.clone() });
            }
        }

        if dialect.supports_sequences() {
            for sequence in &self.new_sequences {
                operations.push(MigrationOperation::CreateSequence(sequence.clone()));
            }
        }

        for table in &self.changed_tables {
            for fk in &table.removed_foreign_keys {
                operations.push(MigrationOperation::DropForeignKey {
                    table: table.name.clone(),
                    constraint_name: fk.name.clone(),
                });
            }
        }

        for table in &self.new_tables {
            operations.push(MigrationOperation::CreateTable(table.clone()));
        }

        for table in &self.changed_tables {
            let name = &table.name;
            for index in &table.removed_indexes {
                operations.push(MigrationOperation::DropIndex {
                    table: name.clone(),
                    name: index.name.clone(),
                });
            }
            for column in &table.added_columns {
                operations.push(MigrationOperation::AddColumn {
                    table: name.clone(),
                    column: column.clone(),
                });
            }
            for diff in &table.changed_columns {
                operations.push(MigrationOperation::AlterColumn {
                    table: name.clone(),
                    column: diff.column.clone(),
                    changes: diff.changes,
                });
            }
            for column in &table.removed_columns {
                operations.push(MigrationOperation::DropColumn {
                    table: name.clone(),
                    column_name: column.name.clone(),
                });
            }
            if let Some((from, to)) = &table.primary_key {
                operations.push(MigrationOperation::AlterPrimaryKey {
                    table: name.clone(),
                    from: from.clone(),
                    to: to.clone(),
                });
            }
            for index in &table.added_indexes {
                operations.push(MigrationOperation::CreateIndex {
                    table: name.clone(),
                    index: index.clone(),
                });
            }
        }

        // Foreign keys of new tables are inline when they cannot be added later.
        if dialect.supports_foreign_key_changes() {
            for table in &self.new_tables {
                for fk in &table.foreign_keys {
                    operations.push(MigrationOperation::AddForeignKey {
                        table: table.name.clone(),
                        foreign_key: fk.clone(),
                    });
                }
            }
        }
        for table in &self.changed_tables {
            for fk in &table.added_foreign_keys {
                operations.push(MigrationOperation::AddForeignKey {
                    table: table.name.clone(),
                    foreign_key: fk.clone(),
                });
            }
        }

        for table in &self.removed_tables {
            operations.push(MigrationOperation::DropTable {
                name: table.name.clone(),
            });
        }

        if dialect.supports_sequences() {
            for sequence in &self.removed_sequences {
                operations.push(MigrationOperation::DropSequence {
                    name: sequence.name.clone(),
                });
            }
        }

        operations
    }

    /// Renders the diff as ordered DDL statements.
    #[must_use]
    pub fn to_sql(&self, dialect: &dyn MigrationDialect) -> Vec<String> {
        let operations = self.operations(dialect);
        if !dialect.supports_alter_column()
            && operations
                .iter()
                .any(|op| matches!(op, MigrationOperation::AlterColumn { .. }))
        {
            warn!(
                dialect = dialect.name(),
                "Column changes detected that this dialect cannot apply in place"
            );
        }
        operations
            .iter()
            .flat_map(|op| dialect.generate_sql(op))
            .collect()
    }
}

/// Compares schemas, optionally through a dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Comparator<'a> {
    dialect: Option<&'a dyn MigrationDialect>,
}

impl<'a> Comparator<'a> {
    /// A structural comparator: column types are compared as declared.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A comparator that treats columns as equal when the dialect renders
    /// them the same way.
    #[must_use]
    pub fn with_dialect(dialect: &'a dyn MigrationDialect) -> Self {
        Self {
            dialect: Some(dialect),
        }
    }

    /// Compares two schemas and returns what it takes to turn `from` into
    /// `to`.
    #[must_use]
    pub fn compare(&self, from: &DatabaseSchema, to: &DatabaseSchema) -> SchemaDiff {
        let mut diff = SchemaDiff {
            new_namespaces: to
                .namespaces
                .iter()
                .filter(|ns| !from.namespaces.contains(ns))
                .cloned()
                .collect(),
            new_sequences: to
                .sequences
                .iter()
                .filter(|s| from.get_sequence(&s.name).is_none())
                .cloned()
                .collect(),
            removed_sequences: from
                .sequences
                .iter()
                .filter(|s| to.get_sequence(&s.name).is_none())
                .cloned()
                .collect(),
            ..SchemaDiff::default()
        };

        for table in &to.tables {
            match from.get_table(&table.name) {
                None => diff.new_tables.push(table.clone()),
                Some(live) => {
                    if let Some(table_diff) = self.diff_table(live, table) {
                        diff.changed_tables.push(table_diff);
                    }
                }
            }
        }

        diff.removed_tables = from
            .tables
            .iter()
            .filter(|t| !to.has_table(&t.name))
            .cloned()
            .collect();

        diff
    }

    /// Compares one table on both sides. Returns `None` when they match.
    #[must_use]
    pub fn diff_table(&self, from: &TableSchema, to: &TableSchema) -> Option<TableDiff> {
        let mut diff = TableDiff {
            name: to.name.clone(),
            ..TableDiff::default()
        };

        for column in &to.columns {
            match from.get_column(&column.name) {
                None => diff.added_columns.push(column.clone()),
                Some(live) => {
                    let changes = self.diff_column(live, column);
                    if !changes.is_empty() {
                        diff.changed_columns.push(ColumnDiff {
                            column: column.clone(),
                            from: live.clone(),
                            changes,
                        });
                    }
                }
            }
        }
        diff.removed_columns = from
            .columns
            .iter()
            .filter(|c| !to.has_column(&c.name))
            .cloned()
            .collect();

        if from.primary_key_columns() != to.primary_key_columns() {
            diff.primary_key = Some((from.primary_key.clone(), to.primary_key.clone()));
        }

        let (added, removed) = match_items(
            &from.indexes,
            &to.indexes,
            |live, declared| live.name == declared.name,
            |live, declared| declared.is_fulfilled_by(live),
        );
        diff.added_indexes = added;
        diff.removed_indexes = removed;

        let (added, removed) = match_items(
            &from.foreign_keys,
            &to.foreign_keys,
            |live, declared| live.name == declared.name,
            |live, declared| declared.same_reference(live),
        );
        diff.added_foreign_keys = added;
        diff.removed_foreign_keys = removed;

        (!diff.is_empty()).then_some(diff)
    }

    /// Compares two versions of a column.
    #[must_use]
    pub fn diff_column(&self, from: &ColumnSchema, to: &ColumnSchema) -> ColumnChanges {
        let mut changes = ColumnChanges::new();

        match self.dialect {
            Some(dialect) => {
                changes.column_type = dialect.type_name(from) != dialect.type_name(to);
                if !(from.auto_increment && to.auto_increment) {
                    changes.default = normalize_default(dialect.render_default(from))
                        != normalize_default(dialect.render_default(to));
                }
                changes.comment = dialect.supports_comments() && from.comment != to.comment;
            }
            None => {
                changes.column_type = from.column_type != to.column_type
                    || from.length != to.length
                    || from.precision != to.precision
                    || from.scale != to.scale
                    || from.unsigned != to.unsigned
                    || from.fixed != to.fixed
                    || from.auto_increment != to.auto_increment;
                changes.default =
                    normalize_default(from.default.to_sql()) != normalize_default(to.default.to_sql());
                changes.comment = from.comment != to.comment;
            }
        }
        changes.nullable = from.nullable != to.nullable;

        changes
    }
}

/// `NULL` and no default are the same thing; keyword case does not matter.
fn normalize_default(sql: Option<String>) -> Option<String> {
    sql.filter(|s| !s.eq_ignore_ascii_case("null"))
        .map(|s| {
            if s.starts_with('\'') {
                s
            } else {
                s.to_ascii_uppercase()
            }
        })
}

/// Pairs live and declared items, first by name, then by an equivalence
/// check for unnamed or renamed items. Returns `(added, removed)`.
fn match_items<T: Clone>(
    live: &[T],
    declared: &[T],
    same_name: impl Fn(&T, &T) -> bool,
    equivalent: impl Fn(&T, &T) -> bool,
) -> (Vec<T>, Vec<T>) {
    let mut claimed = vec![false; live.len()];
    let mut added = Vec::new();
    let mut replaced = Vec::new();

    for item in declared {
        if let Some(i) = live.iter().position(|l| same_name(l, item)) {
            claimed[i] = true;
            if !equivalent(&live[i], item) {
                replaced.push(i);
                added.push(item.clone());
            }
            continue;
        }
        match (0..live.len()).find(|&i| !claimed[i] && equivalent(&live[i], item)) {
            Some(i) => claimed[i] = true,
            None => added.push(item.clone()),
        }
    }

    let removed = live
        .iter()
        .enumerate()
        .filter(|(i, _)| !claimed[*i] || replaced.contains(i))
        .map(|(_, item)| item.clone())
        .collect();
    (added, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{PostgresDialect, SqliteDialect};
    use crate::schema::{ColumnType, DefaultValue};

    fn users() -> TableSchema {
        TableSchema::new("users")
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
            .primary_key(vec!["id".to_string()])
    }

    #[test]
    fn test_no_changes() {
        let schema = DatabaseSchema::new().table(users());
        let diff = Comparator::new().compare(&schema, &schema);
        assert!(diff.is_empty());
        assert!(diff.to_sql(&SqliteDialect::new()).is_empty());
    }

    #[test]
    fn test_new_and_dropped_tables() {
        let from = DatabaseSchema::new().table(TableSchema::new("legacy"));
        let to = DatabaseSchema::new().table(users());

        let diff = Comparator::new().compare(&from, &to);
        let ops = diff.operations(&SqliteDialect::new());
        assert!(matches!(&ops[0], MigrationOperation::CreateTable(t) if t.name == "users"));
        assert!(matches!(&ops[1], MigrationOperation::DropTable { name } if name == "legacy"));
    }

    #[test]
    fn test_column_changes() {
        let from = DatabaseSchema::new().table(users());
        let mut to = DatabaseSchema::new().table(
            users()
                .column(ColumnSchema::new("email", ColumnType::String).length(255))
                .column(ColumnSchema::new("bio", ColumnType::Text)),
        );
        to.tables[0].get_column_mut("name").unwrap().nullable = true;

        let diff = Comparator::new().compare(&from, &to);
        assert_eq!(diff.changed_tables.len(), 1);
        let table = &diff.changed_tables[0];
        let added: Vec<_> = table.added_columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(added, vec!["email", "bio"]);
        assert_eq!(table.changed_columns[0].column.name, "name");
        assert!(table.changed_columns[0].changes.nullable);
    }

    #[test]
    fn test_dialect_widening_is_not_a_change() {
        // SQLite reports every auto-increment integer as INTEGER.
        let live = ColumnSchema::new("id", ColumnType::Integer)
            .not_null()
            .auto_increment();
        let declared = ColumnSchema::new("id", ColumnType::BigInt)
            .not_null()
            .auto_increment();

        let sqlite = SqliteDialect::new();
        assert!(Comparator::with_dialect(&sqlite)
            .diff_column(&live, &declared)
            .is_empty());
        assert!(Comparator::new().diff_column(&live, &declared).column_type);
    }

    #[test]
    fn test_default_comparison_is_rendered() {
        let postgres = PostgresDialect::new();
        let live = ColumnSchema::new("active", ColumnType::Boolean)
            .default(DefaultValue::Expression("true".to_string()));
        let declared = ColumnSchema::new("active", ColumnType::Boolean).default(DefaultValue::Bool(true));
        assert!(Comparator::with_dialect(&postgres)
            .diff_column(&live, &declared)
            .is_empty());

        let null_default = ColumnSchema::new("note", ColumnType::Text).default(DefaultValue::Null);
        let no_default = ColumnSchema::new("note", ColumnType::Text);
        assert!(Comparator::new().diff_column(&null_default, &no_default).is_empty());
    }

    #[test]
    fn test_index_matched_by_columns_when_renamed() {
        let live = users().index(IndexSchema::new("sqlite_autoindex_users_1", vec!["name".to_string()]).unique());
        let declared = users().index(IndexSchema::new("UNIQ_USERS_NAME", vec!["name".to_string()]).unique());
        assert!(Comparator::new().diff_table(&live, &declared).is_none());

        let changed = users().index(IndexSchema::new("sqlite_autoindex_users_1", vec!["name".to_string()]));
        let diff = Comparator::new().diff_table(&changed, &declared).unwrap();
        assert_eq!(diff.added_indexes.len(), 1);
        assert_eq!(diff.removed_indexes.len(), 1);
    }

    #[test]
    fn test_operation_order() {
        let fk = ForeignKeySchema {
            name: "FK_ORDERS_USER_ID".to_string(),
            columns: vec!["user_id".to_string()],
            references_table: "users".to_string(),
            references_columns: vec!["id".to_string()],
            on_delete: Default::default(),
            on_update: Default::default(),
        };
        let stale_fk = ForeignKeySchema {
            name: "FK_PAYMENTS_OLD".to_string(),
            columns: vec!["order_id".to_string()],
            ..fk.clone()
        };
        let payments = |fks: Vec<ForeignKeySchema>| {
            let mut t = TableSchema::new("payments")
                .column(ColumnSchema::new("order_id", ColumnType::Integer));
            t.foreign_keys = fks;
            t
        };

        let from = DatabaseSchema {
            sequences: vec![SequenceSchema {
                name: "old_seq".to_string(),
                start: 1,
                increment: 1,
            }],
            ..DatabaseSchema::new()
        }
        .table(payments(vec![stale_fk]))
        .table(TableSchema::new("legacy"));
        let to = DatabaseSchema::new()
            .table(users())
            .table(
                TableSchema::new("market.orders")
                    .column(ColumnSchema::new("user_id", ColumnType::BigInt))
                    .foreign_key(fk),
            )
            .table(payments(vec![]).column(ColumnSchema::new("amount", ColumnType::Decimal)));

        let postgres = PostgresDialect::new();
        let kinds: Vec<String> = Comparator::with_dialect(&postgres)
            .compare(&from, &to)
            .operations(&postgres)
            .iter()
            .map(MigrationOperation::describe)
            .collect();
        assert_eq!(
            kinds,
            vec![
                "create namespace market",
                "drop foreign key FK_PAYMENTS_OLD on payments",
                "create table users",
                "create table market.orders",
                "add column payments.amount",
                "add foreign key FK_ORDERS_USER_ID on market.orders",
                "drop table legacy",
                "drop sequence old_seq",
            ]
        );
    }
}
