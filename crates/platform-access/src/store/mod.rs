//! Storage collaborator
//!
//! The engine never talks to a database directly. It opens a unit of work
//! with [`RbacStore::begin`] (or [`RbacStore::begin_write`] for a mutation),
//! performs every read and write of one operation through the returned
//! [`StoreTransaction`], and commits. Dropping a
//! transaction without committing rolls it back, so a failed multi-step
//! mutation leaves storage as it was before the call.
//!
//! ## Backends
//!
//! - [`memory::MemoryStore`]: in-process tables, for tests and single-process apps
//! - `sqlite::SqliteStore` (feature `sqlite`): SQLite through `sqlx`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::SchemaConfig;
use crate::definition::{Permission, Role};
use crate::slug::SlugPredicate;
use crate::subject::{
    PermissionFilter, RolePermissionAssignment, SubjectId, SubjectPermission,
    SubjectPermissionBinding, SubjectRoleBinding,
};

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

/// Storage error types.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A primary-key constraint rejected a write.
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The schema handed to the store cannot be used.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// The backend failed.
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// SQL driver error.
    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A store that can open units of work against a schema.
#[async_trait]
pub trait RbacStore: Send + Sync {
    /// Open a unit of work over the relations named by `schema`.
    async fn begin(&self, schema: &SchemaConfig) -> StoreResult<Box<dyn StoreTransaction>>;

    /// Open a unit of work that will write.
    ///
    /// Mutations read the current bindings before deciding what to write, so
    /// the backend must hold its write lock from the first read. Two writers
    /// on the same database then run one after the other and the second sees
    /// what the first committed. Backends whose `begin` already excludes
    /// other units of work keep this default.
    async fn begin_write(&self, schema: &SchemaConfig) -> StoreResult<Box<dyn StoreTransaction>> {
        self.begin(schema).await
    }
}

/// One unit of work.
///
/// List results are ordered by slug (or subject id) so callers see a stable
/// order regardless of backend.
#[async_trait]
pub trait StoreTransaction: Send {
    // =========================================================================
    // Definitions
    // =========================================================================

    /// Roles whose slug matches `filter`, or every role when `None`.
    async fn find_roles(&mut self, filter: Option<&SlugPredicate>) -> StoreResult<Vec<Role>>;

    /// Permissions whose slug matches `filter`, or every permission when `None`.
    async fn find_permissions(
        &mut self,
        filter: Option<&SlugPredicate>,
    ) -> StoreResult<Vec<Permission>>;

    /// Insert roles; fails with [`StoreError::UniqueViolation`] if a slug exists.
    async fn insert_roles(&mut self, roles: &[Role]) -> StoreResult<()>;

    /// Insert permissions; fails with [`StoreError::UniqueViolation`] if a slug exists.
    async fn insert_permissions(&mut self, permissions: &[Permission]) -> StoreResult<()>;

    /// Delete a role definition. Returns whether it existed.
    async fn delete_role(&mut self, slug: &str) -> StoreResult<bool>;

    /// Delete a permission definition. Returns whether it existed.
    async fn delete_permission(&mut self, slug: &str) -> StoreResult<bool>;

    // =========================================================================
    // Role to permission assignments
    // =========================================================================

    /// Distinct permission slugs granted by any of `roles`.
    async fn permission_slugs_for_roles(&mut self, roles: &[String]) -> StoreResult<Vec<String>>;

    /// Permissions granted by `role`, joined with their definitions.
    async fn role_permissions(&mut self, role: &str) -> StoreResult<Vec<Permission>>;

    /// Check if `role` grants a permission matching `predicate`.
    async fn role_grants_matching(
        &mut self,
        role: &str,
        predicate: &SlugPredicate,
    ) -> StoreResult<bool>;

    /// Insert assignments; fails with [`StoreError::UniqueViolation`] on an existing pair.
    async fn insert_role_permissions(
        &mut self,
        assignments: &[RolePermissionAssignment],
    ) -> StoreResult<()>;

    /// Delete `role`'s assignments, restricted to `permissions` when given.
    /// Returns the number of rows removed.
    async fn delete_role_permissions(
        &mut self,
        role: &str,
        permissions: Option<&[String]>,
    ) -> StoreResult<u64>;

    /// Delete every assignment of `permission`. Returns the number of rows removed.
    async fn delete_permission_assignments(&mut self, permission: &str) -> StoreResult<u64>;

    // =========================================================================
    // Subject to role bindings
    // =========================================================================

    /// Slugs of the roles bound to `subject`.
    async fn subject_role_slugs(&mut self, subject: &SubjectId) -> StoreResult<Vec<String>>;

    /// Roles bound to `subject`, joined with their definitions.
    async fn subject_roles(&mut self, subject: &SubjectId) -> StoreResult<Vec<Role>>;

    /// Check if `subject` holds a role matching `predicate`.
    async fn subject_has_role(
        &mut self,
        subject: &SubjectId,
        predicate: &SlugPredicate,
    ) -> StoreResult<bool>;

    /// Insert a binding; fails with [`StoreError::UniqueViolation`] if it exists.
    async fn insert_subject_role(&mut self, binding: &SubjectRoleBinding) -> StoreResult<()>;

    /// Delete a binding. Returns whether it existed.
    async fn delete_subject_role(&mut self, subject: &SubjectId, role: &str) -> StoreResult<bool>;

    /// Subjects holding `role`.
    async fn role_subjects(&mut self, role: &str) -> StoreResult<Vec<SubjectId>>;

    // =========================================================================
    // Materialized subject permissions
    // =========================================================================

    /// Raw materialized rows of `subject`.
    async fn subject_permission_bindings(
        &mut self,
        subject: &SubjectId,
    ) -> StoreResult<Vec<SubjectPermissionBinding>>;

    /// Materialized permissions of `subject` passing `filter`, joined with
    /// their definitions.
    async fn subject_permissions(
        &mut self,
        subject: &SubjectId,
        filter: PermissionFilter,
    ) -> StoreResult<Vec<SubjectPermission>>;

    /// Check if `subject` holds a permission matching `predicate`.
    async fn subject_can(
        &mut self,
        subject: &SubjectId,
        predicate: &SlugPredicate,
    ) -> StoreResult<bool>;

    /// Insert rows, skipping any `(subject, permission)` pair that already
    /// exists. Returns the number of rows inserted.
    async fn insert_subject_permissions(
        &mut self,
        bindings: &[SubjectPermissionBinding],
    ) -> StoreResult<u64>;

    /// Set the origin flag of an existing row. Returns whether the row exists.
    async fn update_subject_permission_origin(
        &mut self,
        subject: &SubjectId,
        permission: &str,
        added_on_subject: bool,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Delete `subject`'s rows for `permissions` carrying the given origin flag.
    /// Returns the number of rows removed.
    async fn delete_subject_permissions(
        &mut self,
        subject: &SubjectId,
        permissions: &[String],
        added_on_subject: bool,
    ) -> StoreResult<u64>;

    /// Delete every materialized row of `permission`, whatever its origin.
    async fn delete_permission_bindings(&mut self, permission: &str) -> StoreResult<u64>;

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Empty all five relations.
    async fn truncate_all(&mut self) -> StoreResult<()>;

    /// Persist the unit of work.
    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
