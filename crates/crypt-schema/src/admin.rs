//! Administrative account provisioning.
//!
//! After install and update the users table must hold at least one account
//! with the administrator role. When none exists, one is created with the
//! first free `admin`, `admin1`, `admin2`... username and a matching email.

use argon2::{password_hash::SaltString, Argon2, PasswordHasher};
use password_hash::rand_core::OsRng;
use tracing::{debug, info, warn};

use crate::config::{AdminConfig, SchemaConfig};
use crate::database::Database;
use crate::error::{Result, SchemaError};

/// Credentials of a freshly created administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    /// Username.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Plain-text initial password.
    pub password: String,
}

/// Result of [`ensure_admin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminOutcome {
    /// An administrator was created.
    Created(AdminCredentials),
    /// The insert failed.
    Failed(String),
    /// The users table is absent or an administrator already exists.
    NotApplicable,
}

/// Hashes a password using Argon2id into a PHC string.
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| SchemaError::AdminProvisioning(format!("password hashing failed: {err}")))?;
    Ok(hash.to_string())
}

fn numbered(base: &str, n: usize) -> String {
    if n == 0 {
        base.to_string()
    } else {
        format!("{base}{n}")
    }
}

/// First candidate for which `column` holds no row.
async fn first_free(
    db: &Database,
    table: &str,
    column: &str,
    candidate: impl Fn(usize) -> String,
) -> Result<String> {
    let dialect = db.dialect();
    let sql = format!(
        "SELECT COUNT(*) FROM {table} WHERE {} = {}",
        dialect.quote_identifier(column),
        dialect.placeholder(1)
    );
    let mut n = 0;
    loop {
        let value = candidate(n);
        let (count,): (i64,) = sqlx::query_as(&sql)
            .bind(value.as_str())
            .fetch_one(db.pool())
            .await?;
        if count == 0 {
            return Ok(value);
        }
        n += 1;
    }
}

/// Creates an administrator unless one exists.
///
/// The users table name gets the prefix of `schema`, the same one the
/// declared tables were built with.
pub async fn ensure_admin(
    db: &Database,
    schema: &SchemaConfig,
    config: &AdminConfig,
) -> Result<AdminOutcome> {
    let table_name = schema.prefixed(&config.users_table);
    if !db.has_table(&table_name).await? {
        debug!(table = %table_name, "Users table absent, skipping administrator");
        return Ok(AdminOutcome::NotApplicable);
    }

    let dialect = db.dialect();
    let table = dialect.quote_identifier(&table_name);
    let role = dialect.quote_identifier(&config.role_column);

    let (admins,): (i64,) = sqlx::query_as(&format!(
        "SELECT COUNT(*) FROM {table} WHERE {role} = {}",
        config.admin_role
    ))
    .fetch_one(db.pool())
    .await?;
    if admins > 0 {
        debug!(table = %table_name, "Administrator already present");
        return Ok(AdminOutcome::NotApplicable);
    }

    let username = first_free(db, &table, &config.username_column, |n| {
        numbered(&config.base_username, n)
    })
    .await?;
    let base_email = format!("{username}@{}", config.email_domain);
    let email = first_free(db, &table, &config.email_column, |n| numbered(&base_email, n)).await?;

    let hash = hash_password(&config.default_password)?;

    let columns = [
        &config.username_column,
        &config.email_column,
        &config.first_name_column,
        &config.last_name_column,
        &config.password_column,
    ]
    .iter()
    .map(|c| dialect.quote_identifier(c))
    .collect::<Vec<_>>()
    .join(", ");
    let placeholders = (1..=5)
        .map(|i| dialect.placeholder(i))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {table} ({columns}, {role}) VALUES ({placeholders}, {})",
        config.admin_role
    );

    let inserted = sqlx::query(&sql)
        .bind(username.as_str())
        .bind(email.as_str())
        .bind(config.first_name.as_str())
        .bind(config.last_name.as_str())
        .bind(hash.as_str())
        .execute(db.pool())
        .await;

    match inserted {
        Ok(_) => {
            info!(username = %username, email = %email, "Administrator created");
            Ok(AdminOutcome::Created(AdminCredentials {
                username,
                email,
                password: config.default_password.clone(),
            }))
        }
        Err(err) => {
            warn!(table = %table_name, error = %err, "Failed to create administrator");
            Ok(AdminOutcome::Failed(err.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::{PasswordHash, PasswordVerifier};

    const USERS_SQL: &str = "CREATE TABLE \"users\" (\
        \"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
        \"user_username\" VARCHAR(64) NOT NULL, \
        \"user_email\" VARCHAR(255) NOT NULL, \
        \"user_first_name\" VARCHAR(64), \
        \"user_last_name\" VARCHAR(64), \
        \"user_password\" VARCHAR(255) NOT NULL, \
        \"user_role\" INTEGER NOT NULL DEFAULT 0)";

    async fn users_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        sqlx::query(USERS_SQL).execute(db.pool()).await.unwrap();
        db
    }

    async fn insert_user(db: &Database, username: &str, email: &str, role: i64) {
        sqlx::query(
            "INSERT INTO \"users\" (\"user_username\", \"user_email\", \"user_password\", \"user_role\") VALUES (?, ?, 'x', ?)",
        )
        .bind(username)
        .bind(email)
        .bind(role)
        .execute(db.pool())
        .await
        .unwrap();
    }

    #[test]
    fn test_numbered_candidates() {
        assert_eq!(numbered("admin", 0), "admin");
        assert_eq!(numbered("admin", 3), "admin3");
        assert_eq!(numbered("admin@example.com", 1), "admin@example.com1");
    }

    #[tokio::test]
    async fn test_absent_table() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        let outcome = ensure_admin(&db, &SchemaConfig::default(), &AdminConfig::default()).await.unwrap();
        assert_eq!(outcome, AdminOutcome::NotApplicable);
    }

    #[tokio::test]
    async fn test_existing_admin() {
        let db = users_db().await;
        insert_user(&db, "root", "root@example.com", 1).await;
        let outcome = ensure_admin(&db, &SchemaConfig::default(), &AdminConfig::default()).await.unwrap();
        assert_eq!(outcome, AdminOutcome::NotApplicable);
    }

    #[tokio::test]
    async fn test_creates_first_free_username() {
        let db = users_db().await;
        insert_user(&db, "admin", "a@example.org", 2).await;
        insert_user(&db, "admin1", "b@example.org", 2).await;
        insert_user(&db, "admin2", "c@example.org", 2).await;
        insert_user(&db, "editor", "admin3@example.com", 2).await;

        let outcome = ensure_admin(&db, &SchemaConfig::default(), &AdminConfig::default()).await.unwrap();
        let AdminOutcome::Created(credentials) = outcome else {
            panic!("expected an administrator to be created");
        };
        assert_eq!(credentials.username, "admin3");
        assert_eq!(credentials.email, "admin3@example.com1");
        assert_eq!(credentials.password, "password");

        let (role, hash): (i64, String) = sqlx::query_as(
            "SELECT \"user_role\", \"user_password\" FROM \"users\" WHERE \"user_username\" = 'admin3'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(role, 1);
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default()
            .verify_password(b"password", &parsed)
            .is_ok());

        let again = ensure_admin(&db, &SchemaConfig::default(), &AdminConfig::default()).await.unwrap();
        assert_eq!(again, AdminOutcome::NotApplicable);
    }

    #[test]
    fn test_hash_password_is_argon2id() {
        let hash = hash_password("s3cret").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert_ne!(hash, hash_password("s3cret").unwrap());
    }

    #[tokio::test]
    async fn test_uses_schema_prefix() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        sqlx::query(&USERS_SQL.replace("\"users\"", "\"app_users\""))
            .execute(db.pool())
            .await
            .unwrap();

        let unprefixed = ensure_admin(&db, &SchemaConfig::default(), &AdminConfig::default())
            .await
            .unwrap();
        assert_eq!(unprefixed, AdminOutcome::NotApplicable);

        let schema = SchemaConfig::default().table_prefix("app_");
        let outcome = ensure_admin(&db, &schema, &AdminConfig::default())
            .await
            .unwrap();
        assert!(matches!(outcome, AdminOutcome::Created(ref c) if c.username == "admin"));
    }

    #[tokio::test]
    async fn test_insert_failure_is_reported() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            "CREATE TABLE \"users\" (\"user_username\" TEXT, \"user_email\" TEXT, \"user_role\" INTEGER)",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let outcome = ensure_admin(&db, &SchemaConfig::default(), &AdminConfig::default()).await.unwrap();
        assert!(matches!(outcome, AdminOutcome::Failed(_)));
    }
}
