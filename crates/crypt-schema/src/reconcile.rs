//! Check, install and update.
//!
//! The database is classified by comparing the live schema with the
//! declared one:
//!
//! - **Empty**: none of the declared tables exist.
//! - **Synchronized**: nothing is left to apply once `now()` default noise
//!   is filtered out.
//! - **Divergent**: anything else.
//!
//! Install only runs against an empty database, update only against a
//! non-empty one. Both apply their statements in one transaction and then
//! make sure an administrator exists.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use crate::admin::{ensure_admin, AdminOutcome};
use crate::comparator::{Comparator, SchemaDiff};
use crate::config::AdminConfig;
use crate::database::Database;
use crate::dialect::{is_comment, MigrationDialect};
use crate::error::{Result, SchemaError};
use crate::executor::SchemaExecutor;
use crate::merger::SchemaMerger;
use crate::schema::DatabaseSchema;

/// Reported after a successful install.
pub const INSTALLATION_DONE: &str = "Installation Done";
/// Reported after a successful update.
pub const STRUCTURES_UPDATED: &str = "Database Structures Updated";
/// Reported when there is nothing to apply.
pub const STRUCTURES_OK: &str = "All Database Structures OK";

static DEFAULT_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^\s*ALTER\s+TABLE\s+\S+\s+ALTER\s+(?:COLUMN\s+)?"?\w+_at"?\s+SET\s+DEFAULT\s+(?:'now\(\)'|now\(\)|CURRENT_TIMESTAMP)"#,
    )
    .expect("valid pattern")
});

/// Removes statements that re-apply a current-time default to an `*_at`
/// column. Some platforms report these defaults in a form that never
/// compares equal.
#[must_use]
pub fn filter_default_noise(statements: Vec<String>) -> Vec<String> {
    statements
        .into_iter()
        .filter(|sql| !DEFAULT_NOISE.is_match(sql))
        .collect()
}

/// Classification of the live database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    /// None of the declared tables exist.
    Empty,
    /// Some declared structure is missing or different.
    Divergent,
    /// Live matches declared.
    Synchronized,
}

impl fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("empty"),
            Self::Divergent => f.write_str("divergent"),
            Self::Synchronized => f.write_str("synchronized"),
        }
    }
}

/// What [`Reconciler::check`] found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    /// Classification.
    pub state: ReconcileState,
    /// Statements an update would apply, noise filtered; for an empty
    /// database, the install statements.
    pub statements: Vec<String>,
    /// Declared tables absent from the database.
    pub missing_tables: Vec<String>,
    /// Present tables lacking declared columns, with those columns.
    pub incomplete_tables: BTreeMap<String, Vec<String>>,
    /// Whether existing tables need changes beyond creating missing ones.
    pub requires_structure_update: bool,
}

/// Result of [`Reconciler::install`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The schema was created.
    Installed {
        /// Statements executed.
        statements: usize,
        /// What happened to the administrator account.
        admin: AdminOutcome,
    },
    /// The database already matched.
    AlreadyInstalled,
}

impl InstallOutcome {
    /// Operator-facing summary.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::Installed { .. } => INSTALLATION_DONE,
            Self::AlreadyInstalled => STRUCTURES_OK,
        }
    }
}

/// Result of [`Reconciler::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Differences were applied.
    Updated {
        /// Statements executed.
        statements: usize,
        /// What happened to the administrator account.
        admin: AdminOutcome,
    },
    /// Nothing to apply.
    Synchronized {
        /// What happened to the administrator account.
        admin: AdminOutcome,
    },
}

impl UpdateOutcome {
    /// Operator-facing summary.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::Updated { .. } => STRUCTURES_UPDATED,
            Self::Synchronized { .. } => STRUCTURES_OK,
        }
    }

    /// The administrator outcome.
    #[must_use]
    pub fn admin(&self) -> &AdminOutcome {
        match self {
            Self::Updated { admin, .. } | Self::Synchronized { admin } => admin,
        }
    }
}

struct Analysis {
    live: DatabaseSchema,
    target: DatabaseSchema,
    report: CheckReport,
}

/// Full DDL for an empty database.
///
/// Tables already present (the migration history) and live sequences are
/// left alone; namespaces are always emitted and made idempotent by the
/// executor.
fn install_statements(
    dialect: &dyn MigrationDialect,
    live: &DatabaseSchema,
    target: &DatabaseSchema,
) -> Vec<String> {
    let base = DatabaseSchema {
        tables: live
            .tables
            .iter()
            .filter(|table| target.has_table(&table.name))
            .cloned()
            .collect(),
        sequences: live.sequences.clone(),
        namespaces: Vec::new(),
    };
    Comparator::with_dialect(dialect)
        .compare(&base, target)
        .to_sql(dialect)
}

/// Classifies `live` against `target`. `history` is the prefixed
/// migration-history table, which never counts as declared.
///
/// An empty database reports the install statements; the others report
/// what an update would apply.
pub fn classify(
    dialect: &dyn MigrationDialect,
    history: &str,
    live: &DatabaseSchema,
    target: &DatabaseSchema,
) -> CheckReport {
    let declared: Vec<&str> = target
        .table_names()
        .filter(|name| *name != history)
        .collect();

    let missing_tables: Vec<String> = declared
        .iter()
        .filter(|name| !live.has_table(name))
        .map(|name| (*name).to_string())
        .collect();

    if !declared.is_empty() && missing_tables.len() == declared.len() {
        return CheckReport {
            state: ReconcileState::Empty,
            statements: install_statements(dialect, live, target),
            missing_tables,
            incomplete_tables: BTreeMap::new(),
            requires_structure_update: false,
        };
    }

    let diff = Comparator::with_dialect(dialect).compare(live, target);
    let statements = filter_default_noise(diff.to_sql(dialect));

    let incomplete_tables = diff
        .changed_tables
        .iter()
        .filter(|table| !table.added_columns.is_empty())
        .map(|table| {
            let columns = table.added_columns.iter().map(|c| c.name.clone()).collect();
            (table.name.clone(), columns)
        })
        .collect();

    let structural = SchemaDiff {
        changed_tables: diff.changed_tables,
        removed_tables: diff.removed_tables,
        ..SchemaDiff::default()
    };
    let requires_structure_update = !filter_default_noise(structural.to_sql(dialect)).is_empty();

    let state = if statements.is_empty() {
        ReconcileState::Synchronized
    } else {
        ReconcileState::Divergent
    };

    CheckReport {
        state,
        statements,
        missing_tables,
        incomplete_tables,
        requires_structure_update,
    }
}

fn empty_database() -> SchemaError {
    SchemaError::User("Database is empty; run install first".to_string())
}

/// Runs check, install and update against one database.
#[derive(Debug)]
pub struct Reconciler<'a> {
    db: &'a Database,
    merger: &'a SchemaMerger,
    admin: AdminConfig,
}

impl<'a> Reconciler<'a> {
    /// Creates a reconciler with the default administrator settings.
    #[must_use]
    pub fn new(db: &'a Database, merger: &'a SchemaMerger) -> Self {
        Self {
            db,
            merger,
            admin: AdminConfig::default(),
        }
    }

    /// Overrides the administrator settings.
    #[must_use]
    pub fn with_admin(mut self, admin: AdminConfig) -> Self {
        self.admin = admin;
        self
    }

    async fn analyze(&self) -> Result<Analysis> {
        let (live, target) = self.merger.get_separate_schema(self.db).await?;
        let history = self.merger.config().prefixed_migrations_table();
        let report = classify(self.db.dialect(), &history, &live, &target);
        Ok(Analysis {
            live,
            target,
            report,
        })
    }

    /// Classifies the database without changing it.
    pub async fn check(&self) -> Result<CheckReport> {
        let report = self.analyze().await?.report;
        info!(
            state = %report.state,
            statements = report.statements.len(),
            missing = report.missing_tables.len(),
            "Schema checked"
        );
        Ok(report)
    }

    /// The statements [`install`](Self::install) would run.
    pub async fn install_sql(&self) -> Result<Vec<String>> {
        let analysis = self.analyze().await?;
        Ok(install_statements(
            self.db.dialect(),
            &analysis.live,
            &analysis.target,
        ))
    }

    /// The statements [`update`](Self::update) would run.
    pub async fn update_sql(&self) -> Result<Vec<String>> {
        let report = self.analyze().await?.report;
        if report.state == ReconcileState::Empty {
            return Err(empty_database());
        }
        Ok(report.statements)
    }

    async fn provision_admin(&self) -> Result<AdminOutcome> {
        match ensure_admin(self.db, self.merger.config(), &self.admin).await? {
            AdminOutcome::Failed(message) => Err(SchemaError::AdminProvisioning(message)),
            outcome => Ok(outcome),
        }
    }

    fn executor(&self) -> SchemaExecutor<'a> {
        SchemaExecutor::new(self.db).with_session_setup(true)
    }

    /// Creates the declared schema in an empty database.
    pub async fn install(&self) -> Result<InstallOutcome> {
        let analysis = self.analyze().await?;
        match analysis.report.state {
            ReconcileState::Synchronized => {
                info!("{STRUCTURES_OK}");
                Ok(InstallOutcome::AlreadyInstalled)
            }
            ReconcileState::Divergent => Err(SchemaError::User(
                "Database is not empty; run update instead".to_string(),
            )),
            ReconcileState::Empty => {
                let statements = self.executor().apply(&analysis.report.statements).await?;
                let admin = self.provision_admin().await?;
                info!(statements, "{INSTALLATION_DONE}");
                Ok(InstallOutcome::Installed { statements, admin })
            }
        }
    }

    /// Brings a non-empty database up to the declared schema.
    pub async fn update(&self) -> Result<UpdateOutcome> {
        let report = self.analyze().await?.report;
        match report.state {
            ReconcileState::Empty => Err(empty_database()),
            ReconcileState::Synchronized => {
                let admin = self.provision_admin().await?;
                info!("{STRUCTURES_OK}");
                Ok(UpdateOutcome::Synchronized { admin })
            }
            ReconcileState::Divergent => {
                if report.statements.iter().all(|sql| is_comment(sql)) {
                    return Err(SchemaError::User(format!(
                        "Pending changes cannot be applied in place on {}; rebuild the affected tables:\n{}",
                        self.db.dialect().name(),
                        report.statements.join("\n")
                    )));
                }
                for sql in report.statements.iter().filter(|sql| is_drop_table(sql)) {
                    warn!(sql = %sql, "Dropping a table that is not declared");
                }
                let statements = self.executor().apply(&report.statements).await?;
                let admin = self.provision_admin().await?;
                info!(statements, "{STRUCTURES_UPDATED}");
                Ok(UpdateOutcome::Updated { statements, admin })
            }
        }
    }
}

fn is_drop_table(sql: &str) -> bool {
    sql.trim_start()
        .get(..10)
        .is_some_and(|head| head.eq_ignore_ascii_case("DROP TABLE"))
}
