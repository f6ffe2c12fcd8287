//! Engine facade.

use std::sync::Arc;

use crate::backend::Backend;
use crate::catalog::Catalog;
use crate::config::{RbacConfig, SchemaConfig};
use crate::error::RbacResult;
use crate::permission_binding::PermissionBindingManager;
use crate::query::AuthorizationQuery;
use crate::role_binding::RoleBindingManager;
use crate::session::SubjectSession;
use crate::store::RbacStore;
use crate::subject::{Subject, SubjectId};

/// The access-control engine.
///
/// Cheap to clone; clones share the store.
///
/// # Example
///
/// ```rust,no_run
/// use platform_access::{MemoryStore, Rbac, RbacConfig, SubjectId};
/// use std::sync::Arc;
///
/// async fn example() -> platform_access::RbacResult<()> {
///     let rbac = Rbac::new(Arc::new(MemoryStore::new()), RbacConfig::from_env())?;
///
///     rbac.catalog().create_permission("post.edit").await?;
///     rbac.catalog().create_role("editor").await?;
///     rbac.catalog().attach_role_permissions("editor", ["post.edit"]).await?;
///
///     let user = SubjectId::new("user-1");
///     rbac.role_bindings().attach_role(&user, "editor").await?;
///     assert!(rbac.query().can(&user, "post.edit").await?);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Rbac {
    backend: Backend,
    catalog: Catalog,
    role_bindings: RoleBindingManager,
    permission_bindings: PermissionBindingManager,
    query: AuthorizationQuery,
}

impl Rbac {
    /// Create an engine over `store`.
    ///
    /// # Errors
    ///
    /// `RbacError::Config` if the configured table names are invalid.
    pub fn new(store: Arc<dyn RbacStore>, config: RbacConfig) -> RbacResult<Self> {
        config.validate()?;

        let backend = Backend::new(store, config.schema);
        Ok(Self {
            catalog: Catalog::new(backend.clone()),
            role_bindings: RoleBindingManager::new(backend.clone()),
            permission_bindings: PermissionBindingManager::new(backend.clone()),
            query: AuthorizationQuery::new(backend.clone()),
            backend,
        })
    }

    /// Create an engine over a SQLite database at `config.database_url`.
    ///
    /// # Errors
    ///
    /// `RbacError::Config` if no database URL is configured or the table
    /// names are invalid; a storage error if the connection fails.
    #[cfg(feature = "sqlite")]
    pub async fn connect_sqlite(config: RbacConfig) -> RbacResult<Self> {
        config.validate()?;
        let store =
            crate::store::sqlite::SqliteStore::connect(config.require_database_url()?).await?;
        Self::new(Arc::new(store), config)
    }

    /// Role and permission definitions, and role grants.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Role attach/detach.
    pub fn role_bindings(&self) -> &RoleBindingManager {
        &self.role_bindings
    }

    /// Explicit permission attach/detach.
    pub fn permission_bindings(&self) -> &PermissionBindingManager {
        &self.permission_bindings
    }

    /// `is` / `can` checks.
    pub fn query(&self) -> &AuthorizationQuery {
        &self.query
    }

    /// The relation names in use.
    pub fn schema(&self) -> &SchemaConfig {
        self.backend.schema()
    }

    /// Open a cached session for a subject.
    pub fn session(&self, subject: &impl Subject) -> SubjectSession<'_> {
        SubjectSession::new(self, subject.identity())
    }

    /// Open a cached session for a subject id.
    pub fn session_for(&self, subject: SubjectId) -> SubjectSession<'_> {
        SubjectSession::new(self, subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RbacError;
    use crate::store::memory::MemoryStore;
    use uuid::Uuid;

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = RbacConfig::default();
        config.schema.role_table = "roles-table".to_string();

        let result = Rbac::new(Arc::new(MemoryStore::new()), config);
        assert!(matches!(result, Err(RbacError::Config(_))));
    }

    #[test]
    fn test_schema_is_exposed() {
        let config = RbacConfig::default().with_schema(SchemaConfig::with_prefix("app_"));
        let rbac = Rbac::new(Arc::new(MemoryStore::new()), config).unwrap();
        assert_eq!(rbac.schema().subject_role_table, "app_subject_role_binding");
    }

    #[test]
    fn test_session_uses_subject_identity() {
        let rbac = Rbac::new(Arc::new(MemoryStore::new()), RbacConfig::default()).unwrap();
        let user = Uuid::now_v7();

        let session = rbac.session(&user);
        assert_eq!(session.subject_id(), &SubjectId::from(user));
    }
}
