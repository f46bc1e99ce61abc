//! Migration history.
//!
//! The history table is owned by an external migration tool; this module
//! only reads it so the `status` command can show what has been recorded.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::config::SchemaConfig;
use crate::database::Database;
use crate::error::Result;

/// A recorded migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    /// Migration version.
    pub version: String,
    /// When the migration was recorded, if the value could be parsed.
    pub executed_at: Option<DateTime<Utc>>,
}

/// Reads the migration history table.
#[derive(Debug)]
pub struct MigrationHistory;

impl MigrationHistory {
    /// Lists recorded migrations ordered by execution time. An absent table
    /// yields an empty list.
    pub async fn list(db: &Database, config: &SchemaConfig) -> Result<Vec<AppliedMigration>> {
        let table = config.prefixed_migrations_table();
        if !db.has_table(&table).await? {
            return Ok(Vec::new());
        }

        let dialect = db.dialect();
        let version = dialect.quote_identifier(&config.version_column);
        let executed_at = dialect.quote_identifier(&config.executed_at_column);
        let sql = format!(
            "SELECT {}, {} FROM {} ORDER BY {executed_at}, {version}",
            dialect.cast_to_text(&version),
            dialect.cast_to_text(&executed_at),
            dialect.quote_identifier(&table),
        );

        let rows: Vec<(String, Option<String>)> =
            sqlx::query_as(&sql).fetch_all(db.pool()).await?;

        Ok(rows
            .into_iter()
            .map(|(version, executed_at)| AppliedMigration {
                version,
                executed_at: executed_at.as_deref().and_then(parse_timestamp),
            })
            .collect())
    }
}

/// Parses the timestamp formats drivers report when a datetime is cast to
/// text.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = "2024-03-01T12:30:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(parse_timestamp("2024-03-01T12:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 12:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 12:30:00+00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 14:30:00+02"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[tokio::test]
    async fn test_list_absent_table() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let history = MigrationHistory::list(&db, &SchemaConfig::default())
            .await
            .unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_list_recorded_versions() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            "CREATE TABLE \"app_schema_migrations\" (\"version\" VARCHAR(191) NOT NULL, \"executed_at\" DATETIME)",
        )
        .execute(db.pool())
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO \"app_schema_migrations\" VALUES ('20240302', '2024-03-02 08:00:00'), ('20240301', '2024-03-01 08:00:00')",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let config = SchemaConfig::default().table_prefix("app_");
        let history = MigrationHistory::list(&db, &config).await.unwrap();

        let versions: Vec<&str> = history.iter().map(|m| m.version.as_str()).collect();
        assert_eq!(versions, ["20240301", "20240302"]);
        assert!(history[0].executed_at.is_some());
    }
}
