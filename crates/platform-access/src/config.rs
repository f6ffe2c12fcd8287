//! Engine configuration.
//!
//! Table names are never hard-coded at call sites: the engine receives a
//! [`SchemaConfig`] at construction and hands it to the store with every unit
//! of work. Configuration is loaded from environment variables with defaults
//! matching the standard relation names.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

static IDENTIFIER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Longest table name accepted (the PostgreSQL identifier limit).
const MAX_IDENTIFIER_LEN: usize = 63;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required environment variable.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Names of the five relations backing the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Role definitions (`slug`, `name`, `description`).
    pub role_table: String,

    /// Permission definitions (`slug`, `name`, `description`).
    pub permission_table: String,

    /// Role to permission assignments.
    pub role_permission_table: String,

    /// Subject to role bindings.
    pub subject_role_table: String,

    /// Materialized subject permissions.
    pub subject_permission_table: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            role_table: "roles".to_string(),
            permission_table: "permissions".to_string(),
            role_permission_table: "role_permission_assignment".to_string(),
            subject_role_table: "subject_role_binding".to_string(),
            subject_permission_table: "subject_permission_binding".to_string(),
        }
    }
}

impl SchemaConfig {
    /// Build a schema whose table names all carry `prefix`.
    ///
    /// # Example
    ///
    /// ```
    /// use platform_access::SchemaConfig;
    ///
    /// let schema = SchemaConfig::with_prefix("acme_");
    /// assert_eq!(schema.role_table, "acme_roles");
    /// assert!(schema.validate().is_ok());
    /// ```
    pub fn with_prefix(prefix: &str) -> Self {
        let default = Self::default();
        Self {
            role_table: format!("{}{}", prefix, default.role_table),
            permission_table: format!("{}{}", prefix, default.permission_table),
            role_permission_table: format!("{}{}", prefix, default.role_permission_table),
            subject_role_table: format!("{}{}", prefix, default.subject_role_table),
            subject_permission_table: format!("{}{}", prefix, default.subject_permission_table),
        }
    }

    /// Table names paired with the configuration key each one comes from.
    pub fn tables(&self) -> [(&'static str, &str); 5] {
        [
            ("role_table", &self.role_table),
            ("permission_table", &self.permission_table),
            ("role_permission_table", &self.role_permission_table),
            ("subject_role_table", &self.subject_role_table),
            ("subject_permission_table", &self.subject_permission_table),
        ]
    }

    /// Validate that every table name is a plain SQL identifier and that no
    /// two relations share a table.
    ///
    /// Table names are interpolated into SQL, so this check is what keeps
    /// them safe to splice.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tables = self.tables();
        for (i, (key, name)) in tables.iter().enumerate() {
            if name.len() > MAX_IDENTIFIER_LEN || !IDENTIFIER_REGEX.is_match(name) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!(
                        "'{}' is not a valid table name (letters, digits and '_', at most {} characters)",
                        name, MAX_IDENTIFIER_LEN
                    ),
                });
            }
            if tables[..i].iter().any(|(_, other)| other == name) {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("table '{}' is already used by another relation", name),
                });
            }
        }
        Ok(())
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RbacConfig {
    /// Relation names.
    pub schema: SchemaConfig,

    /// Connection string for SQL-backed stores (e.g. `sqlite:./access.db`).
    pub database_url: Option<String>,
}

impl RbacConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `RBAC_ROLE_TABLE`: role table (default: roles)
    /// - `RBAC_PERMISSION_TABLE`: permission table (default: permissions)
    /// - `RBAC_ROLE_PERMISSION_TABLE`: role/permission assignments
    ///   (default: role_permission_assignment)
    /// - `RBAC_SUBJECT_ROLE_TABLE`: subject/role bindings (default: subject_role_binding)
    /// - `RBAC_SUBJECT_PERMISSION_TABLE`: materialized subject permissions
    ///   (default: subject_permission_binding)
    /// - `RBAC_DATABASE_URL`: connection string for SQL-backed stores
    pub fn from_env() -> Self {
        let default = SchemaConfig::default();

        Self {
            schema: SchemaConfig {
                role_table: std::env::var("RBAC_ROLE_TABLE").unwrap_or(default.role_table),
                permission_table: std::env::var("RBAC_PERMISSION_TABLE")
                    .unwrap_or(default.permission_table),
                role_permission_table: std::env::var("RBAC_ROLE_PERMISSION_TABLE")
                    .unwrap_or(default.role_permission_table),
                subject_role_table: std::env::var("RBAC_SUBJECT_ROLE_TABLE")
                    .unwrap_or(default.subject_role_table),
                subject_permission_table: std::env::var("RBAC_SUBJECT_PERMISSION_TABLE")
                    .unwrap_or(default.subject_permission_table),
            },
            database_url: std::env::var("RBAC_DATABASE_URL").ok(),
        }
    }

    /// Set the schema.
    pub fn with_schema(mut self, schema: SchemaConfig) -> Self {
        self.schema = schema;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.schema.validate()
    }

    /// Get the database URL, failing if none is configured.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("RBAC_DATABASE_URL".to_string()))
    }
}
