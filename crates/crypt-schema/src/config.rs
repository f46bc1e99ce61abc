//! Deployment configuration.

use serde::{Deserialize, Serialize};

/// Names that tie the declared schema to a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Prefix prepended to every declared table name.
    pub table_prefix: String,
    /// Migration-history table, without the prefix.
    pub migrations_table: String,
    /// Version column of the history table.
    pub version_column: String,
    /// Timestamp column of the history table.
    pub executed_at_column: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            table_prefix: String::new(),
            migrations_table: "schema_migrations".to_string(),
            version_column: "version".to_string(),
            executed_at_column: "executed_at".to_string(),
        }
    }
}

impl SchemaConfig {
    /// Sets the table prefix.
    #[must_use]
    pub fn table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Sets the migration-history table name.
    #[must_use]
    pub fn migrations_table(mut self, name: impl Into<String>) -> Self {
        self.migrations_table = name.into();
        self
    }

    /// Sets the `executed_at` column name.
    #[must_use]
    pub fn executed_at_column(mut self, name: impl Into<String>) -> Self {
        self.executed_at_column = name.into();
        self
    }

    /// Applies the table prefix to `name`. For qualified names the prefix
    /// goes on the table part.
    #[must_use]
    pub fn prefixed(&self, name: &str) -> String {
        prefix_table(&self.table_prefix, name)
    }

    /// The prefixed migration-history table name.
    #[must_use]
    pub fn prefixed_migrations_table(&self) -> String {
        self.prefixed(&self.migrations_table)
    }
}

pub(crate) fn prefix_table(prefix: &str, name: &str) -> String {
    match name.split_once('.') {
        Some((namespace, table)) => format!("{namespace}.{prefix}{table}"),
        None => format!("{prefix}{name}"),
    }
}

/// The administrative account created after install and update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Users table, without the prefix.
    pub users_table: String,
    /// Username column.
    pub username_column: String,
    /// Email column.
    pub email_column: String,
    /// First name column.
    pub first_name_column: String,
    /// Last name column.
    pub last_name_column: String,
    /// Password hash column.
    pub password_column: String,
    /// Role column.
    pub role_column: String,
    /// Role value that marks an administrator.
    pub admin_role: i64,
    /// First username candidate; `admin1`, `admin2`... follow.
    pub base_username: String,
    /// Domain of the generated email address.
    pub email_domain: String,
    /// First name of the created account.
    pub first_name: String,
    /// Last name of the created account.
    pub last_name: String,
    /// Initial password, printed once after creation.
    pub default_password: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            users_table: "users".to_string(),
            username_column: "user_username".to_string(),
            email_column: "user_email".to_string(),
            first_name_column: "user_first_name".to_string(),
            last_name_column: "user_last_name".to_string(),
            password_column: "user_password".to_string(),
            role_column: "user_role".to_string(),
            admin_role: 1,
            base_username: "admin".to_string(),
            email_domain: "example.com".to_string(),
            first_name: "Super".to_string(),
            last_name: "Admin".to_string(),
            default_password: "password".to_string(),
        }
    }
}

impl AdminConfig {
    /// Sets the users table name.
    #[must_use]
    pub fn users_table(mut self, name: impl Into<String>) -> Self {
        self.users_table = name.into();
        self
    }

    /// Sets the initial password.
    #[must_use]
    pub fn default_password(mut self, password: impl Into<String>) -> Self {
        self.default_password = password.into();
        self
    }
}
