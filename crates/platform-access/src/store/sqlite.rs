//! SQLite store
//!
//! Runs every unit of work in a `sqlx` transaction. Writing units of work
//! start with `BEGIN IMMEDIATE` and hold the database write lock from their
//! first read; a deferred `BEGIN` that reads first cannot upgrade once
//! another connection has committed, and fails with `SQLITE_BUSY`.
//!
//! Slug predicates compile to `column IN (...)` plus one
//! `column LIKE ? ESCAPE '\'` per wildcard prefix. Timestamps are stored as
//! RFC 3339 text and the origin flag as 0/1.
//!
//! The crate does not create tables. The expected layout, with the default
//! names:
//!
//! ```sql
//! CREATE TABLE roles (slug TEXT PRIMARY KEY, name TEXT NOT NULL, description TEXT NOT NULL);
//! CREATE TABLE permissions (slug TEXT PRIMARY KEY, name TEXT NOT NULL, description TEXT NOT NULL);
//! CREATE TABLE role_permission_assignment (
//!     role_slug TEXT NOT NULL, permission_slug TEXT NOT NULL,
//!     created_at TEXT NOT NULL, updated_at TEXT NOT NULL,
//!     PRIMARY KEY (role_slug, permission_slug));
//! CREATE TABLE subject_role_binding (
//!     subject_id TEXT NOT NULL, role_slug TEXT NOT NULL,
//!     created_at TEXT NOT NULL, updated_at TEXT NOT NULL,
//!     PRIMARY KEY (subject_id, role_slug));
//! CREATE TABLE subject_permission_binding (
//!     subject_id TEXT NOT NULL, permission_slug TEXT NOT NULL,
//!     added_on_subject INTEGER NOT NULL DEFAULT 0,
//!     created_at TEXT NOT NULL, updated_at TEXT NOT NULL,
//!     PRIMARY KEY (subject_id, permission_slug));
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use sqlx::{FromRow, Sqlite, Transaction};
use std::str::FromStr;

use super::{RbacStore, StoreError, StoreResult, StoreTransaction};
use crate::config::SchemaConfig;
use crate::definition::{Permission, Role};
use crate::slug::{column, SlugPredicate};
use crate::subject::{
    PermissionFilter, RolePermissionAssignment, SubjectId, SubjectPermission,
    SubjectPermissionBinding, SubjectRoleBinding,
};

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool with WAL journaling.
    ///
    /// # Arguments
    /// * `database_url` - SQLite connection string (e.g., "sqlite:./access.db")
    ///
    /// # Errors
    /// Returns `StoreError::Backend` if the URL is invalid, or the driver
    /// error if the connection fails.
    #[tracing::instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::Backend(format!("Invalid database URL: {e}")))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await?;

        tracing::debug!("database pool created");
        Ok(Self { pool })
    }

    /// The underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl RbacStore for SqliteStore {
    async fn begin(&self, schema: &SchemaConfig) -> StoreResult<Box<dyn StoreTransaction>> {
        validate_schema(schema)?;

        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTransaction {
            tx,
            schema: schema.clone(),
        }))
    }

    async fn begin_write(&self, schema: &SchemaConfig) -> StoreResult<Box<dyn StoreTransaction>> {
        validate_schema(schema)?;

        let tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        Ok(Box::new(SqliteTransaction {
            tx,
            schema: schema.clone(),
        }))
    }
}

fn validate_schema(schema: &SchemaConfig) -> StoreResult<()> {
    schema
        .validate()
        .map_err(|e| StoreError::InvalidSchema(e.to_string()))
}

#[derive(FromRow)]
struct DefinitionRow {
    slug: String,
    name: String,
    description: String,
}

impl From<DefinitionRow> for Role {
    fn from(row: DefinitionRow) -> Self {
        Role::new(row.slug, row.name, row.description)
    }
}

impl From<DefinitionRow> for Permission {
    fn from(row: DefinitionRow) -> Self {
        Permission::new(row.slug, row.name, row.description)
    }
}

#[derive(FromRow)]
struct SubjectPermissionRow {
    slug: String,
    name: String,
    description: String,
    added_on_subject: bool,
}

#[derive(FromRow)]
struct BindingRow {
    subject_id: String,
    permission_slug: String,
    added_on_subject: bool,
    created_at: String,
    updated_at: String,
}

impl TryFrom<BindingRow> for SubjectPermissionBinding {
    type Error = StoreError;

    fn try_from(row: BindingRow) -> StoreResult<Self> {
        Ok(Self {
            subject_id: SubjectId::from(row.subject_id),
            permission_slug: row.permission_slug,
            added_on_subject: row.added_on_subject,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
        })
    }
}

fn parse_timestamp(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(format!("Invalid timestamp '{}': {}", value, e)))
}

fn map_unique(e: sqlx::Error, what: String) -> StoreError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            StoreError::UniqueViolation(what)
        }
        _ => StoreError::Sqlx(e),
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Append `predicate` evaluated against `column` to `sql`, pushing its
/// parameters onto `args` in placeholder order.
fn push_predicate(
    sql: &mut String,
    args: &mut Vec<String>,
    column: &str,
    predicate: &SlugPredicate,
) {
    if predicate.is_always_false() {
        sql.push_str("0 = 1");
        return;
    }

    let mut clauses = Vec::new();
    if !predicate.exact().is_empty() {
        clauses.push(format!("{} IN ({})", column, placeholders(predicate.exact().len())));
        args.extend(predicate.exact().iter().cloned());
    }
    for pattern in predicate.like_patterns() {
        clauses.push(format!("{} LIKE ? ESCAPE '\\'", column));
        args.push(pattern);
    }

    sql.push('(');
    sql.push_str(&clauses.join(" OR "));
    sql.push(')');
}

/// A unit of work in a SQLite transaction.
struct SqliteTransaction {
    tx: Transaction<'static, Sqlite>,
    schema: SchemaConfig,
}

impl SqliteTransaction {
    async fn fetch_definitions(
        &mut self,
        sql: &str,
        args: &[String],
    ) -> StoreResult<Vec<DefinitionRow>> {
        let mut query = sqlx::query_as::<_, DefinitionRow>(sql);
        for arg in args {
            query = query.bind(arg.as_str());
        }
        Ok(query.fetch_all(&mut *self.tx).await?)
    }

    async fn fetch_slugs(&mut self, sql: &str, args: &[String]) -> StoreResult<Vec<String>> {
        let mut query = sqlx::query_scalar::<_, String>(sql);
        for arg in args {
            query = query.bind(arg.as_str());
        }
        Ok(query.fetch_all(&mut *self.tx).await?)
    }

    async fn exists(&mut self, condition: &str, table: &str, args: &[String]) -> StoreResult<bool> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE {})", table, condition);
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for arg in args {
            query = query.bind(arg.as_str());
        }
        Ok(query.fetch_one(&mut *self.tx).await? != 0)
    }

    async fn execute(&mut self, sql: &str, args: &[String]) -> StoreResult<u64> {
        let mut query = sqlx::query(sql);
        for arg in args {
            query = query.bind(arg.as_str());
        }
        Ok(query.execute(&mut *self.tx).await?.rows_affected())
    }

    async fn insert_definitions(
        &mut self,
        table: String,
        kind: &str,
        rows: impl Iterator<Item = (&str, &str, &str)> + Send,
    ) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO {} (slug, name, description) VALUES (?, ?, ?)",
            table
        );
        for (slug, name, description) in rows {
            sqlx::query(&sql)
                .bind(slug)
                .bind(name)
                .bind(description)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| map_unique(e, format!("{} '{}'", kind, slug)))?;
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn find_roles(&mut self, filter: Option<&SlugPredicate>) -> StoreResult<Vec<Role>> {
        let mut sql = format!("SELECT slug, name, description FROM {}", self.schema.role_table);
        let mut args = Vec::new();
        if let Some(predicate) = filter {
            sql.push_str(" WHERE ");
            push_predicate(&mut sql, &mut args, column::SLUG, predicate);
        }
        sql.push_str(" ORDER BY slug");

        let rows = self.fetch_definitions(&sql, &args).await?;
        Ok(rows.into_iter().map(Role::from).collect())
    }

    async fn find_permissions(
        &mut self,
        filter: Option<&SlugPredicate>,
    ) -> StoreResult<Vec<Permission>> {
        let mut sql = format!(
            "SELECT slug, name, description FROM {}",
            self.schema.permission_table
        );
        let mut args = Vec::new();
        if let Some(predicate) = filter {
            sql.push_str(" WHERE ");
            push_predicate(&mut sql, &mut args, column::SLUG, predicate);
        }
        sql.push_str(" ORDER BY slug");

        let rows = self.fetch_definitions(&sql, &args).await?;
        Ok(rows.into_iter().map(Permission::from).collect())
    }

    async fn insert_roles(&mut self, roles: &[Role]) -> StoreResult<()> {
        let table = self.schema.role_table.clone();
        let rows = roles
            .iter()
            .map(|r| (r.slug.as_str(), r.name.as_str(), r.description.as_str()));
        self.insert_definitions(table, "role", rows).await
    }

    async fn insert_permissions(&mut self, permissions: &[Permission]) -> StoreResult<()> {
        let table = self.schema.permission_table.clone();
        let rows = permissions
            .iter()
            .map(|p| (p.slug.as_str(), p.name.as_str(), p.description.as_str()));
        self.insert_definitions(table, "permission", rows).await
    }

    async fn delete_role(&mut self, slug: &str) -> StoreResult<bool> {
        let sql = format!("DELETE FROM {} WHERE slug = ?", self.schema.role_table);
        Ok(self.execute(&sql, &[slug.to_string()]).await? > 0)
    }

    async fn delete_permission(&mut self, slug: &str) -> StoreResult<bool> {
        let sql = format!("DELETE FROM {} WHERE slug = ?", self.schema.permission_table);
        Ok(self.execute(&sql, &[slug.to_string()]).await? > 0)
    }

    async fn permission_slugs_for_roles(&mut self, roles: &[String]) -> StoreResult<Vec<String>> {
        if roles.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT DISTINCT permission_slug FROM {} WHERE role_slug IN ({}) ORDER BY permission_slug",
            self.schema.role_permission_table,
            placeholders(roles.len())
        );
        self.fetch_slugs(&sql, roles).await
    }

    async fn role_permissions(&mut self, role: &str) -> StoreResult<Vec<Permission>> {
        let sql = format!(
            r#"
            SELECT p.slug, p.name, p.description
            FROM {} p
            JOIN {} a ON a.permission_slug = p.slug
            WHERE a.role_slug = ?
            ORDER BY p.slug
            "#,
            self.schema.permission_table, self.schema.role_permission_table
        );
        let rows = self.fetch_definitions(&sql, &[role.to_string()]).await?;
        Ok(rows.into_iter().map(Permission::from).collect())
    }

    async fn role_grants_matching(
        &mut self,
        role: &str,
        predicate: &SlugPredicate,
    ) -> StoreResult<bool> {
        let mut condition = "role_slug = ? AND ".to_string();
        let mut args = vec![role.to_string()];
        push_predicate(&mut condition, &mut args, column::PERMISSION_SLUG, predicate);

        let table = self.schema.role_permission_table.clone();
        self.exists(&condition, &table, &args).await
    }

    async fn insert_role_permissions(
        &mut self,
        assignments: &[RolePermissionAssignment],
    ) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO {} (role_slug, permission_slug, created_at, updated_at) VALUES (?, ?, ?, ?)",
            self.schema.role_permission_table
        );
        for assignment in assignments {
            sqlx::query(&sql)
                .bind(&assignment.role_slug)
                .bind(&assignment.permission_slug)
                .bind(assignment.created_at.to_rfc3339())
                .bind(assignment.updated_at.to_rfc3339())
                .execute(&mut *self.tx)
                .await
                .map_err(|e| {
                    map_unique(
                        e,
                        format!(
                            "assignment '{}' -> '{}'",
                            assignment.role_slug, assignment.permission_slug
                        ),
                    )
                })?;
        }
        Ok(())
    }

    async fn delete_role_permissions(
        &mut self,
        role: &str,
        permissions: Option<&[String]>,
    ) -> StoreResult<u64> {
        let mut sql = format!(
            "DELETE FROM {} WHERE role_slug = ?",
            self.schema.role_permission_table
        );
        let mut args = vec![role.to_string()];

        if let Some(permissions) = permissions {
            if permissions.is_empty() {
                return Ok(0);
            }
            sql.push_str(&format!(
                " AND permission_slug IN ({})",
                placeholders(permissions.len())
            ));
            args.extend(permissions.iter().cloned());
        }

        self.execute(&sql, &args).await
    }

    async fn delete_permission_assignments(&mut self, permission: &str) -> StoreResult<u64> {
        let sql = format!(
            "DELETE FROM {} WHERE permission_slug = ?",
            self.schema.role_permission_table
        );
        self.execute(&sql, &[permission.to_string()]).await
    }

    async fn subject_role_slugs(&mut self, subject: &SubjectId) -> StoreResult<Vec<String>> {
        let sql = format!(
            "SELECT role_slug FROM {} WHERE subject_id = ? ORDER BY role_slug",
            self.schema.subject_role_table
        );
        self.fetch_slugs(&sql, &[subject.to_string()]).await
    }

    async fn subject_roles(&mut self, subject: &SubjectId) -> StoreResult<Vec<Role>> {
        let sql = format!(
            r#"
            SELECT r.slug, r.name, r.description
            FROM {} r
            JOIN {} b ON b.role_slug = r.slug
            WHERE b.subject_id = ?
            ORDER BY r.slug
            "#,
            self.schema.role_table, self.schema.subject_role_table
        );
        let rows = self.fetch_definitions(&sql, &[subject.to_string()]).await?;
        Ok(rows.into_iter().map(Role::from).collect())
    }

    async fn subject_has_role(
        &mut self,
        subject: &SubjectId,
        predicate: &SlugPredicate,
    ) -> StoreResult<bool> {
        let mut condition = "subject_id = ? AND ".to_string();
        let mut args = vec![subject.to_string()];
        push_predicate(&mut condition, &mut args, column::ROLE_SLUG, predicate);

        let table = self.schema.subject_role_table.clone();
        self.exists(&condition, &table, &args).await
    }

    async fn insert_subject_role(&mut self, binding: &SubjectRoleBinding) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO {} (subject_id, role_slug, created_at, updated_at) VALUES (?, ?, ?, ?)",
            self.schema.subject_role_table
        );
        sqlx::query(&sql)
            .bind(binding.subject_id.as_str())
            .bind(&binding.role_slug)
            .bind(binding.created_at.to_rfc3339())
            .bind(binding.updated_at.to_rfc3339())
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                map_unique(
                    e,
                    format!(
                        "subject '{}' already holds role '{}'",
                        binding.subject_id, binding.role_slug
                    ),
                )
            })?;
        Ok(())
    }

    async fn delete_subject_role(&mut self, subject: &SubjectId, role: &str) -> StoreResult<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE subject_id = ? AND role_slug = ?",
            self.schema.subject_role_table
        );
        Ok(self
            .execute(&sql, &[subject.to_string(), role.to_string()])
            .await?
            > 0)
    }

    async fn role_subjects(&mut self, role: &str) -> StoreResult<Vec<SubjectId>> {
        let sql = format!(
            "SELECT subject_id FROM {} WHERE role_slug = ? ORDER BY subject_id",
            self.schema.subject_role_table
        );
        let ids = self.fetch_slugs(&sql, &[role.to_string()]).await?;
        Ok(ids.into_iter().map(SubjectId::from).collect())
    }

    async fn subject_permission_bindings(
        &mut self,
        subject: &SubjectId,
    ) -> StoreResult<Vec<SubjectPermissionBinding>> {
        let sql = format!(
            r#"
            SELECT subject_id, permission_slug, added_on_subject, created_at, updated_at
            FROM {}
            WHERE subject_id = ?
            ORDER BY permission_slug
            "#,
            self.schema.subject_permission_table
        );
        let rows = sqlx::query_as::<_, BindingRow>(&sql)
            .bind(subject.as_str())
            .fetch_all(&mut *self.tx)
            .await?;
        rows.into_iter().map(SubjectPermissionBinding::try_from).collect()
    }

    async fn subject_permissions(
        &mut self,
        subject: &SubjectId,
        filter: PermissionFilter,
    ) -> StoreResult<Vec<SubjectPermission>> {
        let origin = match filter {
            PermissionFilter::All => "",
            PermissionFilter::Role => " AND b.added_on_subject = 0",
            PermissionFilter::Explicit => " AND b.added_on_subject = 1",
        };
        let sql = format!(
            r#"
            SELECT p.slug, p.name, p.description, b.added_on_subject
            FROM {} p
            JOIN {} b ON b.permission_slug = p.slug
            WHERE b.subject_id = ?{}
            ORDER BY p.slug
            "#,
            self.schema.permission_table, self.schema.subject_permission_table, origin
        );
        let rows = sqlx::query_as::<_, SubjectPermissionRow>(&sql)
            .bind(subject.as_str())
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| SubjectPermission {
                permission: Permission::new(row.slug, row.name, row.description),
                added_on_subject: row.added_on_subject,
            })
            .collect())
    }

    async fn subject_can(
        &mut self,
        subject: &SubjectId,
        predicate: &SlugPredicate,
    ) -> StoreResult<bool> {
        let mut condition = "subject_id = ? AND ".to_string();
        let mut args = vec![subject.to_string()];
        push_predicate(&mut condition, &mut args, column::PERMISSION_SLUG, predicate);

        let table = self.schema.subject_permission_table.clone();
        self.exists(&condition, &table, &args).await
    }

    async fn insert_subject_permissions(
        &mut self,
        bindings: &[SubjectPermissionBinding],
    ) -> StoreResult<u64> {
        let sql = format!(
            r#"
            INSERT INTO {} (subject_id, permission_slug, added_on_subject, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (subject_id, permission_slug) DO NOTHING
            "#,
            self.schema.subject_permission_table
        );

        let mut inserted = 0;
        for binding in bindings {
            inserted += sqlx::query(&sql)
                .bind(binding.subject_id.as_str())
                .bind(&binding.permission_slug)
                .bind(binding.added_on_subject)
                .bind(binding.created_at.to_rfc3339())
                .bind(binding.updated_at.to_rfc3339())
                .execute(&mut *self.tx)
                .await?
                .rows_affected();
        }
        Ok(inserted)
    }

    async fn update_subject_permission_origin(
        &mut self,
        subject: &SubjectId,
        permission: &str,
        added_on_subject: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let sql = format!(
            "UPDATE {} SET added_on_subject = ?, updated_at = ? WHERE subject_id = ? AND permission_slug = ?",
            self.schema.subject_permission_table
        );
        let result = sqlx::query(&sql)
            .bind(added_on_subject)
            .bind(now.to_rfc3339())
            .bind(subject.as_str())
            .bind(permission)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_subject_permissions(
        &mut self,
        subject: &SubjectId,
        permissions: &[String],
        added_on_subject: bool,
    ) -> StoreResult<u64> {
        if permissions.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "DELETE FROM {} WHERE subject_id = ? AND added_on_subject = ? AND permission_slug IN ({})",
            self.schema.subject_permission_table,
            placeholders(permissions.len())
        );
        let mut query = sqlx::query(&sql)
            .bind(subject.as_str())
            .bind(added_on_subject);
        for permission in permissions {
            query = query.bind(permission.as_str());
        }
        Ok(query.execute(&mut *self.tx).await?.rows_affected())
    }

    async fn delete_permission_bindings(&mut self, permission: &str) -> StoreResult<u64> {
        let sql = format!(
            "DELETE FROM {} WHERE permission_slug = ?",
            self.schema.subject_permission_table
        );
        self.execute(&sql, &[permission.to_string()]).await
    }

    async fn truncate_all(&mut self) -> StoreResult<()> {
        let tables = [
            self.schema.subject_permission_table.clone(),
            self.schema.subject_role_table.clone(),
            self.schema.role_permission_table.clone(),
            self.schema.permission_table.clone(),
            self.schema.role_table.clone(),
        ];
        for table in tables {
            self.execute(&format!("DELETE FROM {}", table), &[]).await?;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slug::SlugExpression;

    #[test]
    fn test_predicate_sql() {
        let predicate = SlugExpression::parse("post.edit|post.publish|blog_post.*")
            .unwrap()
            .build_predicate(column::PERMISSION_SLUG);

        let mut sql = String::new();
        let mut args = Vec::new();
        push_predicate(&mut sql, &mut args, "b.permission_slug", &predicate);

        assert_eq!(
            sql,
            r"(b.permission_slug IN (?, ?) OR b.permission_slug LIKE ? ESCAPE '\')"
        );
        assert_eq!(args, vec!["post.edit", "post.publish", r"blog\_post.%"]);
    }

    #[test]
    fn test_empty_predicate_sql_is_false() {
        let predicate = SlugExpression::parse("")
            .unwrap()
            .build_predicate(column::ROLE_SLUG);

        let mut sql = String::new();
        let mut args = Vec::new();
        push_predicate(&mut sql, &mut args, column::ROLE_SLUG, &predicate);

        assert_eq!(sql, "0 = 1");
        assert!(args.is_empty());
    }

    #[test]
    fn test_parse_timestamp() {
        let now = Utc::now();
        let parsed = parse_timestamp(&now.to_rfc3339()).unwrap();
        assert_eq!(parsed, now);
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(StoreError::Backend(_))
        ));
    }

    #[tokio::test]
    async fn test_begin_rejects_invalid_schema() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let store = SqliteStore::new(pool);
        let mut schema = SchemaConfig::default();
        schema.permission_table = "permissions; --".to_string();

        assert!(matches!(
            store.begin(&schema).await,
            Err(StoreError::InvalidSchema(_))
        ));
        assert!(matches!(
            store.begin_write(&schema).await,
            Err(StoreError::InvalidSchema(_))
        ));
    }
}
