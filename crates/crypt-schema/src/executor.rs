//! Schema executor.
//!
//! Applies generated DDL against a database inside a single transaction.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::database::Database;
use crate::dialect::is_comment;
use crate::error::{Result, SchemaError};

static CREATE_SCHEMA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*CREATE\s+SCHEMA\s+(IF\s+NOT\s+EXISTS\s+)?").expect("valid pattern")
});

/// Makes `CREATE SCHEMA` tolerate an existing namespace.
#[must_use]
pub fn guard_create_schema(sql: &str) -> Cow<'_, str> {
    match CREATE_SCHEMA.captures(sql) {
        Some(caps) if caps.get(1).is_none() => {
            let end = caps.get(0).map_or(0, |m| m.end());
            Cow::Owned(format!("CREATE SCHEMA IF NOT EXISTS {}", &sql[end..]))
        }
        _ => Cow::Borrowed(sql),
    }
}

/// Applies DDL statements to a database.
#[derive(Debug)]
pub struct SchemaExecutor<'a> {
    db: &'a Database,
    dry_run: bool,
    session_setup: bool,
}

impl<'a> SchemaExecutor<'a> {
    /// Creates a new executor.
    #[must_use]
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            dry_run: false,
            session_setup: false,
        }
    }

    /// Enables dry-run mode (SQL is printed but not executed).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Runs the dialect's session setup statements first.
    #[must_use]
    pub fn with_session_setup(mut self, enabled: bool) -> Self {
        self.session_setup = enabled;
        self
    }

    /// Drops comments and rewrites `CREATE SCHEMA` statements.
    #[must_use]
    pub fn prepare(&self, statements: &[String]) -> Vec<String> {
        statements
            .iter()
            .filter(|sql| {
                if is_comment(sql) {
                    warn!(comment = %sql, "Skipping comment (unsupported operation)");
                    false
                } else {
                    true
                }
            })
            .map(|sql| guard_create_schema(sql).into_owned())
            .collect()
    }

    /// Applies `statements` in one transaction and returns how many ran.
    ///
    /// On failure the transaction is rolled back and the failing statement
    /// is reported.
    pub async fn apply(&self, statements: &[String]) -> Result<usize> {
        let prepared = self.prepare(statements);
        if prepared.is_empty() {
            debug!("Nothing to apply");
            return Ok(0);
        }

        let setup = if self.session_setup {
            self.db.dialect().session_setup_sql()
        } else {
            Vec::new()
        };

        if self.dry_run {
            for sql in setup.iter().chain(&prepared) {
                println!("{sql};");
            }
            return Ok(prepared.len());
        }

        let mut tx = self.db.pool().begin().await?;
        for sql in setup.iter().chain(&prepared) {
            debug!(sql = %sql, "Executing SQL");
            if let Err(source) = sqlx::query(sql.as_str()).execute(&mut *tx).await {
                if let Err(err) = tx.rollback().await {
                    warn!(error = %err, "Rollback failed");
                }
                return Err(SchemaError::Apply {
                    statement: sql.clone(),
                    source,
                });
            }
        }
        tx.commit().await?;

        info!(statements = prepared.len(), "Schema changes applied");
        Ok(prepared.len())
    }
}
