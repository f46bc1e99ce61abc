//! Live database handle.

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use tracing::debug;

use crate::dialect::{DialectKind, MigrationDialect};
use crate::error::Result;
use crate::introspect;
use crate::schema::DatabaseSchema;

/// A connection pool together with its dialect.
#[derive(Debug)]
pub struct Database {
    pool: AnyPool,
    dialect: Box<dyn MigrationDialect>,
}

impl Database {
    /// Connects to `url`. The dialect is taken from the URL scheme.
    pub async fn connect(url: &str) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let kind = DialectKind::from_url(url)?;
        debug!(dialect = %kind, "Connecting to database");

        // One connection: an in-memory SQLite database lives in it.
        let pool = AnyPoolOptions::new().max_connections(1).connect(url).await?;
        Ok(Self::from_pool(pool, kind))
    }

    /// Wraps an existing pool.
    #[must_use]
    pub fn from_pool(pool: AnyPool, kind: DialectKind) -> Self {
        Self {
            pool,
            dialect: kind.dialect(),
        }
    }

    /// The connection pool.
    #[must_use]
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// The dialect of this connection.
    #[must_use]
    pub fn dialect(&self) -> &dyn MigrationDialect {
        self.dialect.as_ref()
    }

    /// Reads the live schema.
    pub async fn introspect(&self) -> Result<DatabaseSchema> {
        introspect::introspect(self).await
    }

    /// Names of the live tables.
    pub async fn table_names(&self) -> Result<Vec<String>> {
        introspect::table_names(self).await
    }

    /// Returns whether a table exists.
    pub async fn has_table(&self, name: &str) -> Result<bool> {
        Ok(self.table_names().await?.iter().any(|t| t == name))
    }

    /// Closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
