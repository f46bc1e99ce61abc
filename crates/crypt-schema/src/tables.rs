//! Tables shipped with the crate.
//!
//! Register them by name with [`register_builtin`] and pick them with
//! [`SchemaMerger::add_named`].

use crate::definition::{
    ColumnAttributes, ColumnDefault, IndexDefinition, TableDefinition, TableProperty,
};
use crate::merger::SchemaMerger;
use crate::provider::SchemaProvider;
use crate::schema::ColumnType;

/// Account table; its columns match the default
/// [`AdminConfig`](crate::config::AdminConfig).
#[derive(Debug, Clone)]
pub struct UsersSchema {
    definition: TableDefinition,
}

impl Default for UsersSchema {
    fn default() -> Self {
        let definition = TableDefinition::new("users")
            .column("id", ColumnAttributes::new(ColumnType::BigInt).auto_increment())
            .column(
                "user_username",
                ColumnAttributes::new(ColumnType::String).length(64),
            )
            .column(
                "user_email",
                ColumnAttributes::new(ColumnType::String).length(255),
            )
            .column(
                "user_first_name",
                ColumnAttributes::new(ColumnType::String).length(128),
            )
            .column(
                "user_last_name",
                ColumnAttributes::new(ColumnType::String)
                    .length(128)
                    .nullable(),
            )
            .column(
                "user_password",
                ColumnAttributes::new(ColumnType::String).length(255),
            )
            .column(
                "user_role",
                ColumnAttributes::new(ColumnType::SmallInt)
                    .default_value(ColumnDefault::Integer(0)),
            )
            .column(
                "created_at",
                ColumnAttributes::new(ColumnType::DateTime).default_current_time(),
            )
            .column(
                "updated_at",
                ColumnAttributes::new(ColumnType::DateTime).nullable(),
            )
            .primary_key(["id"])
            .unique(IndexDefinition::on(["user_username"]))
            .unique(IndexDefinition::on(["user_email"]))
            .index(IndexDefinition::on(["user_role"]));
        Self { definition }
    }
}

impl SchemaProvider for UsersSchema {
    fn table_name(&self) -> &str {
        &self.definition.name
    }

    fn columns(&self) -> &[(String, ColumnAttributes)] {
        &self.definition.columns
    }

    fn properties(&self) -> &[TableProperty] {
        &self.definition.properties
    }
}

/// Indodax market table.
#[derive(Debug, Clone)]
pub struct IndodaxSchema {
    definition: TableDefinition,
}

impl Default for IndodaxSchema {
    fn default() -> Self {
        Self {
            definition: TableDefinition::new("indodax")
                .column(
                    "id",
                    ColumnAttributes::new(ColumnType::BigInt)
                        .length(50)
                        .auto_increment(),
                )
                .primary_key(["id"]),
        }
    }
}

impl SchemaProvider for IndodaxSchema {
    fn table_name(&self) -> &str {
        &self.definition.name
    }

    fn columns(&self) -> &[(String, ColumnAttributes)] {
        &self.definition.columns
    }

    fn properties(&self) -> &[TableProperty] {
        &self.definition.properties
    }
}

fn users() -> Box<dyn SchemaProvider> {
    Box::new(UsersSchema::default())
}

fn indodax() -> Box<dyn SchemaProvider> {
    Box::new(IndodaxSchema::default())
}

/// Registers the built-in tables as `users` and `indodax`.
pub fn register_builtin(merger: &mut SchemaMerger) {
    merger
        .register_factory("users", users)
        .register_factory("indodax", indodax);
}
