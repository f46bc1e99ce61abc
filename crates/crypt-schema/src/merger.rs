//! Schema merger.
//!
//! Aggregates every registered provider into one target schema and pairs it
//! with the live schema read from the database.

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::comparator::{Comparator, SchemaDiff};
use crate::config::SchemaConfig;
use crate::database::Database;
use crate::error::{Result, SchemaError};
use crate::introspect;
use crate::provider::{BuildContext, SchemaProvider};
use crate::schema::DatabaseSchema;

/// Creates a provider on demand.
pub type ProviderFactory = fn() -> Box<dyn SchemaProvider>;

/// Collects providers and builds the target schema from them.
pub struct SchemaMerger {
    config: SchemaConfig,
    providers: Vec<Box<dyn SchemaProvider>>,
    factories: BTreeMap<String, ProviderFactory>,
    named: Vec<String>,
}

impl fmt::Debug for SchemaMerger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaMerger")
            .field("config", &self.config)
            .field(
                "providers",
                &self
                    .providers
                    .iter()
                    .map(|p| p.table_name())
                    .collect::<Vec<_>>(),
            )
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .field("named", &self.named)
            .finish()
    }
}

impl SchemaMerger {
    /// Creates an empty merger.
    #[must_use]
    pub fn new(config: SchemaConfig) -> Self {
        Self {
            config,
            providers: Vec::new(),
            factories: BTreeMap::new(),
            named: Vec::new(),
        }
    }

    /// The deployment configuration.
    #[must_use]
    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    /// Registers a provider.
    pub fn add_provider(&mut self, provider: impl SchemaProvider + 'static) -> &mut Self {
        self.add_boxed(Box::new(provider))
    }

    /// Registers an already boxed provider.
    pub fn add_boxed(&mut self, provider: Box<dyn SchemaProvider>) -> &mut Self {
        self.providers.push(provider);
        self
    }

    /// Makes a provider available under `name` for [`add_named`](Self::add_named).
    pub fn register_factory(&mut self, name: impl Into<String>, factory: ProviderFactory) -> &mut Self {
        self.factories.insert(name.into(), factory);
        self
    }

    /// Registers a provider by name. The name is resolved when the schema is
    /// built.
    pub fn add_named(&mut self, name: impl Into<String>) -> &mut Self {
        self.named.push(name.into());
        self
    }

    /// Names accepted by [`add_named`](Self::add_named).
    pub fn factory_names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Returns whether any provider is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty() && self.named.is_empty()
    }

    fn resolve_named(&self) -> Result<Vec<Box<dyn SchemaProvider>>> {
        self.named
            .iter()
            .map(|name| {
                self.factories.get(name).map(|factory| factory()).ok_or_else(|| {
                    let known = self.factory_names().collect::<Vec<_>>().join(", ");
                    SchemaError::configuration(
                        name.clone(),
                        format!("no provider is registered under this name (known: {known})"),
                    )
                })
            })
            .collect()
    }

    /// Builds the target schema on top of `seed`.
    pub fn build_schema_with(
        &self,
        ctx: &BuildContext<'_>,
        seed: DatabaseSchema,
    ) -> Result<DatabaseSchema> {
        let mut schema = seed;
        let named = self.resolve_named()?;
        for provider in self.providers.iter().chain(named.iter()) {
            provider.build_schema(&mut schema, ctx)?;
        }
        debug!(tables = schema.tables.len(), "Built target schema");
        Ok(schema)
    }

    /// Builds the target schema.
    ///
    /// With a database the schema is bound to its dialect and seeded with the
    /// live sequences and namespaces; without one it is unbound.
    pub async fn build_schema(&self, db: Option<&Database>) -> Result<DatabaseSchema> {
        match db {
            Some(db) => {
                let seed = DatabaseSchema::seeded(
                    introspect::sequences(db).await?,
                    introspect::namespaces(db).await?,
                );
                self.build_schema_with(&self.bound_context(db), seed)
            }
            None => self.build_schema_with(&BuildContext::unbound(), DatabaseSchema::new()),
        }
    }

    fn bound_context<'a>(&'a self, db: &'a Database) -> BuildContext<'a> {
        BuildContext::bound(db.dialect(), &self.config.table_prefix)
    }

    /// Carries the migration-history table from `live` into `target` so the
    /// diff never drops it.
    #[must_use]
    pub fn separate(&self, live: &DatabaseSchema, target: DatabaseSchema) -> DatabaseSchema {
        preserve_table(live, target, &self.config.prefixed_migrations_table())
    }

    /// Reads the live schema and builds the matching target schema.
    pub async fn get_separate_schema(
        &self,
        db: &Database,
    ) -> Result<(DatabaseSchema, DatabaseSchema)> {
        let live = db.introspect().await?;
        let seed = DatabaseSchema::seeded(live.sequences.clone(), live.namespaces.clone());
        let target = self.build_schema_with(&self.bound_context(db), seed)?;
        let target = self.separate(&live, target);
        Ok((live, target))
    }

    /// The difference between the live and the target schema.
    pub async fn get_schema_diff(&self, db: &Database) -> Result<SchemaDiff> {
        let (live, target) = self.get_separate_schema(db).await?;
        Ok(Comparator::with_dialect(db.dialect()).compare(&live, &target))
    }
}

/// Copies table `name` from `live` into `target` unless the target declares
/// it already.
#[must_use]
pub fn preserve_table(live: &DatabaseSchema, mut target: DatabaseSchema, name: &str) -> DatabaseSchema {
    if let Some(table) = live.get_table(name) {
        if !target.has_table(name) {
            target.insert_table(table.clone());
        }
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{ColumnAttributes, TableDefinition};
    use crate::schema::{ColumnSchema, ColumnType, TableSchema};

    fn widgets() -> Box<dyn SchemaProvider> {
        Box::new(
            TableDefinition::new("widgets")
                .column("id", ColumnAttributes::new(ColumnType::Integer).auto_increment())
                .column("label", ColumnAttributes::new(ColumnType::String).length(64))
                .primary_key(["id"]),
        )
    }

    #[test]
    fn test_build_unbound() {
        let mut merger = SchemaMerger::new(SchemaConfig::default());
        merger.add_boxed(widgets());
        let schema = merger
            .build_schema_with(&BuildContext::unbound(), DatabaseSchema::new())
            .unwrap();
        assert_eq!(schema.table_names().collect::<Vec<_>>(), ["widgets"]);
    }

    #[test]
    fn test_named_providers() {
        let mut merger = SchemaMerger::new(SchemaConfig::default());
        merger.register_factory("widgets", widgets).add_named("widgets");
        let schema = merger
            .build_schema_with(&BuildContext::unbound(), DatabaseSchema::new())
            .unwrap();
        assert!(schema.has_table("widgets"));

        merger.add_named("gadgets");
        let err = merger
            .build_schema_with(&BuildContext::unbound(), DatabaseSchema::new())
            .unwrap_err();
        assert!(matches!(err, SchemaError::Configuration { ref table, .. } if table == "gadgets"));
        assert!(err.to_string().contains("known: widgets"));
    }

    #[test]
    fn test_duplicate_provider() {
        let mut merger = SchemaMerger::new(SchemaConfig::default());
        merger.add_boxed(widgets()).add_boxed(widgets());
        let err = merger
            .build_schema_with(&BuildContext::unbound(), DatabaseSchema::new())
            .unwrap_err();
        assert!(matches!(err, SchemaError::Configuration { .. }));
    }

    #[test]
    fn test_separate_preserves_migrations_table() {
        let merger = SchemaMerger::new(SchemaConfig::default().table_prefix("app_"));
        let history = TableSchema::new("app_schema_migrations")
            .column(ColumnSchema::new("version", ColumnType::String).not_null());
        let live = DatabaseSchema::new()
            .table(history.clone())
            .table(TableSchema::new("legacy"));

        let target = merger.separate(&live, DatabaseSchema::new());
        assert_eq!(target.get_table("app_schema_migrations"), Some(&history));
        assert!(!target.has_table("legacy"));
    }

    #[tokio::test]
    async fn test_schema_diff_against_empty_database() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let mut merger = SchemaMerger::new(SchemaConfig::default());
        merger.add_boxed(widgets());

        let diff = merger.get_schema_diff(&db).await.unwrap();
        assert_eq!(diff.new_tables.len(), 1);
        assert_eq!(diff.new_tables[0].name, "widgets");
        assert!(diff.removed_tables.is_empty());
    }
}
