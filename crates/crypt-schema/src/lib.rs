//! Declarative schema reconciliation.
//!
//! `crypt-schema` keeps a relational database in line with tables declared
//! in code or JSON files:
//!
//! - **Providers** declare one table each, as column attribute sets plus
//!   table properties (primary key, indexes, foreign keys, options).
//! - **Builder** turns a declaration into a concrete [`TableSchema`](schema::TableSchema),
//!   optionally bound to a dialect and a table prefix.
//! - **Merger** aggregates every provider into a target schema and pairs it
//!   with the live schema read from the database.
//! - **Comparator** diffs live against target into ordered operations, which
//!   a **dialect** renders as DDL for SQLite, PostgreSQL or MySQL.
//! - **Reconciler** classifies the database and runs check, install or
//!   update, applying DDL in one transaction and making sure an
//!   administrator account exists.
//!
//! # Example
//!
//! ```rust,ignore
//! use crypt_schema::prelude::*;
//!
//! let db = Database::connect("sqlite::memory:").await?;
//!
//! let mut merger = SchemaMerger::new(SchemaConfig::default());
//! merger.add_provider(
//!     TableDefinition::new("widgets")
//!         .column("id", ColumnAttributes::new(ColumnType::Integer).auto_increment())
//!         .column("label", ColumnAttributes::new(ColumnType::String).length(64))
//!         .primary_key(["id"]),
//! );
//!
//! let outcome = Reconciler::new(&db, &merger).install().await?;
//! println!("{}", outcome.message());
//! ```

pub mod admin;
pub mod builder;
pub mod comparator;
pub mod config;
pub mod database;
pub mod definition;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod history;
mod introspect;
pub mod merger;
pub mod operations;
pub mod provider;
pub mod reconcile;
pub mod schema;
pub mod tables;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::admin::{ensure_admin, AdminCredentials, AdminOutcome};
    pub use crate::comparator::{Comparator, SchemaDiff, TableDiff};
    pub use crate::config::{AdminConfig, SchemaConfig};
    pub use crate::database::Database;
    pub use crate::definition::{
        ColumnAttributes, ColumnDefault, ForeignKeyDefinition, IndexDefinition, TableDefinition,
        TableProperty,
    };
    pub use crate::dialect::{
        DialectKind, MigrationDialect, MySqlDialect, PostgresDialect, SqliteDialect,
    };
    pub use crate::error::{Result, SchemaError};
    pub use crate::executor::SchemaExecutor;
    pub use crate::history::{AppliedMigration, MigrationHistory};
    pub use crate::merger::SchemaMerger;
    pub use crate::operations::{ColumnChanges, MigrationOperation};
    pub use crate::provider::{BuildContext, SchemaProvider};
    pub use crate::reconcile::{
        classify, filter_default_noise, CheckReport, InstallOutcome, ReconcileState, Reconciler,
        UpdateOutcome,
    };
    pub use crate::schema::{
        ColumnSchema, ColumnType, DatabaseSchema, DefaultValue, ForeignKeyAction,
        ForeignKeySchema, IndexSchema, PrimaryKey, SequenceSchema, TableSchema, TemporalDefault,
    };
}
