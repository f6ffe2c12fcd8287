//! Role to subject bindings
//!
//! Attaching or detaching a role changes the subject's materialized
//! permission view by exactly the role's unique grants (see
//! [`PermissionSetCalculator`]). The binding write and the view update run in
//! one unit of work.

use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use crate::backend::Backend;
use crate::calculator::PermissionSetCalculator;
use crate::catalog::find_role;
use crate::definition::{DefinitionKind, Role};
use crate::error::{RbacError, RbacResult};
use crate::slug::{column, validate_or_fail, SlugExpression, SlugKind};
use crate::store::{StoreError, StoreTransaction};
use crate::subject::{SubjectId, SubjectPermissionBinding, SubjectRoleBinding};

/// Attaches and detaches roles.
#[derive(Clone)]
pub struct RoleBindingManager {
    backend: Backend,
}

impl RoleBindingManager {
    pub(crate) fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Attach a role to a subject.
    ///
    /// # Returns
    ///
    /// The attached role. Attaching a role the subject already holds is a
    /// no-op that returns the role.
    ///
    /// # Errors
    ///
    /// `RbacError::Validation` for a malformed slug, `RbacError::NotFound` if
    /// the role does not exist.
    #[instrument(skip(self, subject), fields(subject = %subject))]
    pub async fn attach_role(&self, subject: &SubjectId, role: &str) -> RbacResult<Role> {
        validate_or_fail(role, SlugKind::Slug)?;

        let mut tx = self.backend.begin_write().await?;
        let attached = attach_within(tx.as_mut(), subject, role, Utc::now()).await?;
        tx.commit().await?;

        Ok(attached)
    }

    /// Detach a role from a subject.
    ///
    /// # Returns
    ///
    /// `true` if the subject held the role, `false` otherwise.
    #[instrument(skip(self, subject), fields(subject = %subject))]
    pub async fn detach_role(&self, subject: &SubjectId, role: &str) -> RbacResult<bool> {
        validate_or_fail(role, SlugKind::Slug)?;

        let mut tx = self.backend.begin_write().await?;
        let detached = detach_within(tx.as_mut(), subject, role).await?;
        if detached {
            tx.commit().await?;
        }

        Ok(detached)
    }
}

/// Attach `role` to `subject` inside an open unit of work.
pub(crate) async fn attach_within(
    tx: &mut dyn StoreTransaction,
    subject: &SubjectId,
    role: &str,
    now: DateTime<Utc>,
) -> RbacResult<Role> {
    let found = find_role(tx, role)
        .await?
        .ok_or_else(|| RbacError::not_found(DefinitionKind::Role, role))?;

    let held = SlugExpression::single(role)?.build_predicate(column::ROLE_SLUG);
    if tx.subject_has_role(subject, &held).await? {
        debug!(role = %role, "role already attached");
        return Ok(found);
    }

    match tx
        .insert_subject_role(&SubjectRoleBinding::new(subject.clone(), role, now))
        .await
    {
        Ok(()) => {}
        Err(StoreError::UniqueViolation(detail)) => {
            warn!(
                role = %role,
                detail = %detail,
                "Role binding already exists, treating as attached"
            );
            return Ok(found);
        }
        Err(e) => return Err(e.into()),
    }

    let grants = PermissionSetCalculator::unique_grants(tx, subject, role).await?;
    if !grants.is_empty() {
        let rows: Vec<_> = grants
            .into_iter()
            .map(|permission| {
                SubjectPermissionBinding::new(subject.clone(), permission, false, now)
            })
            .collect();
        let inserted = tx.insert_subject_permissions(&rows).await?;
        debug!(role = %role, count = inserted, "materialized role permissions");
    }

    Ok(found)
}

/// Detach `role` from `subject` inside an open unit of work.
pub(crate) async fn detach_within(
    tx: &mut dyn StoreTransaction,
    subject: &SubjectId,
    role: &str,
) -> RbacResult<bool> {
    if !tx.delete_subject_role(subject, role).await? {
        debug!(role = %role, "role not attached");
        return Ok(false);
    }

    // The binding is gone, so "other roles" is the post-detach role set.
    let grants = PermissionSetCalculator::unique_grants(tx, subject, role).await?;
    if !grants.is_empty() {
        let removed = tx
            .delete_subject_permissions(subject, &grants.into_vec(), false)
            .await?;
        debug!(role = %role, count = removed, "removed role permissions");
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaConfig;
    use crate::definition::Permission;
    use crate::store::memory::MemoryStore;
    use crate::subject::{PermissionFilter, RolePermissionAssignment};
    use std::sync::Arc;

    async fn seeded(roles: &[(&str, &[&str])]) -> Backend {
        let backend = Backend::new(Arc::new(MemoryStore::new()), SchemaConfig::default());
        let now = Utc::now();
        let mut tx = backend.begin().await.unwrap();

        let mut permissions: Vec<&str> = roles
            .iter()
            .flat_map(|(_, p)| p.iter().copied())
            .collect();
        permissions.sort();
        permissions.dedup();
        let permissions: Vec<_> = permissions
            .into_iter()
            .map(|slug| Permission::new(slug, slug, slug))
            .collect();
        tx.insert_permissions(&permissions).await.unwrap();

        for (role, grants) in roles {
            tx.insert_roles(&[Role::new(*role, *role, *role)]).await.unwrap();
            let assignments: Vec<_> = grants
                .iter()
                .map(|p| RolePermissionAssignment::new(*role, *p, now))
                .collect();
            tx.insert_role_permissions(&assignments).await.unwrap();
        }

        tx.commit().await.unwrap();
        backend
    }

    async fn materialized(backend: &Backend, subject: &SubjectId) -> Vec<(String, bool)> {
        let mut tx = backend.begin().await.unwrap();
        tx.subject_permissions(subject, PermissionFilter::All)
            .await
            .unwrap()
            .into_iter()
            .map(|p| (p.permission.slug, p.added_on_subject))
            .collect()
    }

    #[tokio::test]
    async fn test_attach_materializes_role_permissions() {
        let backend = seeded(&[("editor", &["post.edit", "post.publish"])]).await;
        let manager = RoleBindingManager::new(backend.clone());
        let subject = SubjectId::new("user-1");

        let role = manager.attach_role(&subject, "editor").await.unwrap();
        assert_eq!(role.slug, "editor");
        assert_eq!(
            materialized(&backend, &subject).await,
            vec![("post.edit".to_string(), false), ("post.publish".to_string(), false)]
        );
    }

    #[tokio::test]
    async fn test_attach_missing_role_is_not_found() {
        let backend = seeded(&[]).await;
        let manager = RoleBindingManager::new(backend);

        let err = manager
            .attach_role(&SubjectId::new("user-1"), "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, RbacError::NotFound { kind: DefinitionKind::Role, .. }));
    }

    #[tokio::test]
    async fn test_attach_rejects_wildcard_slug() {
        let backend = seeded(&[("editor", &["post.edit"])]).await;
        let manager = RoleBindingManager::new(backend);

        let err = manager
            .attach_role(&SubjectId::new("user-1"), "edit*")
            .await
            .unwrap_err();
        assert!(matches!(err, RbacError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_detach_unbound_role_returns_false() {
        let backend = seeded(&[("editor", &["post.edit"])]).await;
        let manager = RoleBindingManager::new(backend);

        let detached = manager
            .detach_role(&SubjectId::new("user-1"), "editor")
            .await
            .unwrap();
        assert!(!detached);
    }

    #[tokio::test]
    async fn test_detach_keeps_permissions_of_other_roles() {
        let backend = seeded(&[("writer", &["a", "b"]), ("reviewer", &["b", "c"])]).await;
        let manager = RoleBindingManager::new(backend.clone());
        let subject = SubjectId::new("user-1");

        manager.attach_role(&subject, "writer").await.unwrap();
        manager.attach_role(&subject, "reviewer").await.unwrap();
        assert!(manager.detach_role(&subject, "writer").await.unwrap());

        assert_eq!(
            materialized(&backend, &subject).await,
            vec![("b".to_string(), false), ("c".to_string(), false)]
        );
    }
}
