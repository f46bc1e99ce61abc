//! Error types for schema reconciliation.

use std::path::PathBuf;

/// Errors that can occur while building, diffing or applying a schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A declarative table definition is malformed.
    #[error("Invalid definition for table '{table}': {message}")]
    Configuration {
        /// Table the definition belongs to.
        table: String,
        /// What is wrong with it, naming the column or property.
        message: String,
    },

    /// A declared feature has no resolution path on the connected dialect.
    #[error("Dialect '{dialect}' does not support {feature}")]
    DialectUnsupported {
        /// Dialect name.
        dialect: String,
        /// The unsupported feature.
        feature: String,
    },

    /// Listing the live schema failed.
    #[error("Schema introspection failed: {0}")]
    Introspection(#[source] sqlx::Error),

    /// A DDL statement failed; the transaction has been rolled back.
    #[error("Failed to apply statement `{statement}`: {source}")]
    Apply {
        /// The statement that failed.
        statement: String,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },

    /// The operator invoked a command that does not fit the database state.
    #[error("{0}")]
    User(String),

    /// The administrative account could not be created.
    #[error("Failed to create the administrative account: {0}")]
    AdminProvisioning(String),

    /// Database error outside of introspection and DDL application.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error (reading definition files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A definition file could not be parsed.
    #[error("Failed to parse definition file '{path}': {message}")]
    DefinitionFile {
        /// Path to the definition file.
        path: PathBuf,
        /// Error message.
        message: String,
    },
}

impl SchemaError {
    /// Shorthand for a [`SchemaError::Configuration`] error.
    pub fn configuration(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Returns whether this error aborts the run before any DDL executes.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::User(_))
    }
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
