//! crypt-database CLI
//!
//! Checks, installs and updates the database schema declared by JSON
//! definition files and built-in tables.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crypt_schema::definition::load_dir;
use crypt_schema::prelude::*;
use crypt_schema::tables::register_builtin;

/// Declarative database schema reconciliation.
#[derive(Parser)]
#[command(name = "crypt-database")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (sqlite:, postgres:// or mysql://).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Prefix prepended to every table name.
    #[arg(short, long, env = "TABLE_PREFIX", default_value = "")]
    prefix: String,

    /// Directory of JSON table definitions.
    #[arg(short, long, env = "SCHEMA_DIR", default_value = "schema")]
    schema_dir: PathBuf,

    /// Migration-history table to preserve, without the prefix.
    #[arg(long, env = "MIGRATIONS_TABLE", default_value = "schema_migrations")]
    migrations_table: String,

    /// Built-in tables to include (e.g. `users`, `indodax`).
    #[arg(short, long = "with", value_delimiter = ',')]
    with: Vec<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare the database with the declared schema.
    Check,

    /// Create the declared schema in an empty database.
    Install {
        /// Show SQL without executing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Apply pending changes to an existing database.
    Update {
        /// Show SQL without executing.
        #[arg(long)]
        dry_run: bool,
    },

    /// List the operations that would bring the database up to date.
    Diff,

    /// Print the SQL for update, or for install with `--install`.
    Sql {
        /// Print the full install SQL instead.
        #[arg(long)]
        install: bool,
    },

    /// Show the recorded migration history.
    Status,
}

fn build_merger(cli: &Cli) -> Result<SchemaMerger> {
    let config = SchemaConfig::default()
        .table_prefix(cli.prefix.clone())
        .migrations_table(cli.migrations_table.clone());
    let mut merger = SchemaMerger::new(config);
    register_builtin(&mut merger);

    if cli.schema_dir.is_dir() {
        for definition in load_dir(&cli.schema_dir)? {
            merger.add_provider(definition);
        }
    } else {
        warn!(dir = %cli.schema_dir.display(), "Schema directory not found");
    }
    for name in &cli.with {
        merger.add_named(name.clone());
    }

    if merger.is_empty() {
        return Err(SchemaError::User(format!(
            "No tables declared; add definitions to {} or pass --with",
            cli.schema_dir.display()
        )));
    }
    Ok(merger)
}

fn print_admin(outcome: &AdminOutcome) {
    if let AdminOutcome::Created(credentials) = outcome {
        println!("\nAdministrator created:");
        println!("{:-<60}", "");
        println!("  Username: {}", credentials.username);
        println!("  Email:    {}", credentials.email);
        println!("  Password: {}", credentials.password);
        println!();
    }
}

fn print_statements(statements: &[String]) {
    for sql in statements {
        println!("{sql};");
    }
}

fn print_report(report: &CheckReport) {
    println!("\nDatabase state: {}", report.state);
    println!("{:-<60}", "");
    for table in &report.missing_tables {
        println!(" [ ] {table} (missing)");
    }
    for (table, columns) in &report.incomplete_tables {
        println!(" [~] {table} (missing columns: {})", columns.join(", "));
    }
    if report.state == ReconcileState::Empty {
        println!("\nNo declared table exists yet; run `install`.");
    } else if report.requires_structure_update {
        println!("\nExisting tables need structure updates; run `update`.");
    }
    if !report.statements.is_empty() {
        println!("\nPending SQL:");
        print_statements(&report.statements);
    }
    println!();
}

async fn run(cli: &Cli) -> Result<()> {
    let merger = build_merger(cli)?;
    let db = Database::connect(&cli.database).await?;
    let reconciler = Reconciler::new(&db, &merger);

    match &cli.command {
        Commands::Check => {
            let report = reconciler.check().await?;
            print_report(&report);
        }

        Commands::Install { dry_run: true } => {
            info!("Dry run mode - SQL will be printed but not executed.");
            print_statements(&reconciler.install_sql().await?);
        }

        Commands::Install { dry_run: false } => {
            let outcome = reconciler.install().await?;
            if let InstallOutcome::Installed { admin, .. } = &outcome {
                print_admin(admin);
            }
            println!("{}", outcome.message());
        }

        Commands::Update { dry_run: true } => {
            info!("Dry run mode - SQL will be printed but not executed.");
            print_statements(&reconciler.update_sql().await?);
        }

        Commands::Update { dry_run: false } => {
            let outcome = reconciler.update().await?;
            print_admin(outcome.admin());
            println!("{}", outcome.message());
        }

        Commands::Diff => {
            let diff = merger.get_schema_diff(&db).await?;
            let operations = diff.operations(db.dialect());
            if operations.is_empty() {
                println!("No changes detected.");
            }
            for operation in &operations {
                let marker = if operation.is_destructive() { "-" } else { "+" };
                println!(" {marker} {}", operation.describe());
            }
        }

        Commands::Sql { install } => {
            let statements = if *install {
                reconciler.install_sql().await?
            } else {
                reconciler.update_sql().await?
            };
            print_statements(&statements);
        }

        Commands::Status => {
            let applied = MigrationHistory::list(&db, merger.config()).await?;
            if applied.is_empty() {
                info!("No migrations have been recorded yet.");
            } else {
                println!("\nRecorded migrations:");
                println!("{:-<60}", "");
                for migration in &applied {
                    let executed_at = migration
                        .executed_at
                        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    println!(" [X] {} ({executed_at})", migration.version);
                }
                println!();
            }
        }
    }

    db.close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match run(&cli).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) if !err.is_fatal() => {
            eprintln!("{err}");
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err.into()),
    }
}
