//! Authorization queries
//!
//! `is` checks role bindings and `can` checks the materialized permission
//! view. Neither joins through roles: a permission check is a single-table
//! lookup on the subject's materialized rows.

use crate::backend::Backend;
use crate::definition::{Permission, Role};
use crate::error::RbacResult;
use crate::slug::{column, IntoSlugExpression};
use crate::subject::{PermissionFilter, SubjectId, SubjectPermission};

/// Answers role and permission questions about subjects.
///
/// # Example
///
/// ```rust,no_run
/// use platform_access::{Rbac, SubjectId};
///
/// async fn check(rbac: &Rbac) -> platform_access::RbacResult<()> {
///     let user = SubjectId::new("user-1");
///
///     let is_staff = rbac.query().is(&user, "admin|editor").await?;
///     let can_edit = rbac.query().can(&user, "post.edit.*").await?;
///     let any_of = rbac.query().can(&user, ["post.edit", "post.publish"]).await?;
///     # let _ = (is_staff, can_edit, any_of);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct AuthorizationQuery {
    backend: Backend,
}

impl AuthorizationQuery {
    pub(crate) fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Check if the subject holds at least one role matching `roles`.
    ///
    /// An empty expression matches nothing and returns `false` without
    /// touching storage.
    pub async fn is(
        &self,
        subject: &SubjectId,
        roles: impl IntoSlugExpression,
    ) -> RbacResult<bool> {
        let predicate = roles
            .into_slug_expression()?
            .build_predicate(column::ROLE_SLUG);
        if predicate.is_always_false() {
            return Ok(false);
        }

        let mut tx = self.backend.begin().await?;
        Ok(tx.subject_has_role(subject, &predicate).await?)
    }

    /// Check if the subject holds at least one permission matching
    /// `permissions`, whether through a role or an explicit grant.
    pub async fn can(
        &self,
        subject: &SubjectId,
        permissions: impl IntoSlugExpression,
    ) -> RbacResult<bool> {
        let predicate = permissions
            .into_slug_expression()?
            .build_predicate(column::PERMISSION_SLUG);
        if predicate.is_always_false() {
            return Ok(false);
        }

        let mut tx = self.backend.begin().await?;
        Ok(tx.subject_can(subject, &predicate).await?)
    }

    /// The subject's roles, ordered by slug.
    pub async fn get_roles(&self, subject: &SubjectId) -> RbacResult<Vec<Role>> {
        let mut tx = self.backend.begin().await?;
        Ok(tx.subject_roles(subject).await?)
    }

    /// The subject's permissions narrowed by origin, ordered by slug.
    pub async fn get_permissions(
        &self,
        subject: &SubjectId,
        filter: PermissionFilter,
    ) -> RbacResult<Vec<Permission>> {
        let mut tx = self.backend.begin().await?;
        Ok(tx
            .subject_permissions(subject, filter)
            .await?
            .into_iter()
            .map(|grant| grant.permission)
            .collect())
    }

    /// Every materialized permission of the subject with its origin flag.
    pub async fn get_permission_grants(
        &self,
        subject: &SubjectId,
    ) -> RbacResult<Vec<SubjectPermission>> {
        let mut tx = self.backend.begin().await?;
        Ok(tx.subject_permissions(subject, PermissionFilter::All).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaConfig;
    use crate::store::memory::MemoryStore;
    use crate::subject::{SubjectPermissionBinding, SubjectRoleBinding};
    use chrono::Utc;
    use std::sync::Arc;

    async fn query_with_rows() -> (AuthorizationQuery, SubjectId) {
        let backend = Backend::new(Arc::new(MemoryStore::new()), SchemaConfig::default());
        let subject = SubjectId::new("user-1");
        let now = Utc::now();

        let mut tx = backend.begin().await.unwrap();
        tx.insert_roles(&[Role::new("editor", "Editor", "Editor")])
            .await
            .unwrap();
        tx.insert_permissions(&[
            Permission::new("post.edit.title", "Title", "Title"),
            Permission::new("post.publish", "Publish", "Publish"),
        ])
        .await
        .unwrap();
        tx.insert_subject_role(&SubjectRoleBinding::new(subject.clone(), "editor", now))
            .await
            .unwrap();
        tx.insert_subject_permissions(&[
            SubjectPermissionBinding::new(subject.clone(), "post.edit.title", false, now),
            SubjectPermissionBinding::new(subject.clone(), "post.publish", true, now),
        ])
        .await
        .unwrap();
        tx.commit().await.unwrap();

        (AuthorizationQuery::new(backend), subject)
    }

    #[tokio::test]
    async fn test_is() {
        let (query, subject) = query_with_rows().await;

        assert!(query.is(&subject, "editor").await.unwrap());
        assert!(query.is(&subject, "admin|editor").await.unwrap());
        assert!(!query.is(&subject, "admin").await.unwrap());
        assert!(!query.is(&SubjectId::new("user-2"), "editor").await.unwrap());
        assert!(!query.is(&subject, "").await.unwrap());
    }

    #[tokio::test]
    async fn test_can_with_wildcards() {
        let (query, subject) = query_with_rows().await;

        assert!(query.can(&subject, "post.edit.*").await.unwrap());
        assert!(!query.can(&subject, "post.edit").await.unwrap());
        assert!(query.can(&subject, vec!["post.delete", "post.publish"]).await.unwrap());
        assert!(query.can(&subject, "post.edit,post.publish").await.is_err());
    }

    #[tokio::test]
    async fn test_get_permissions_filters_by_origin() {
        let (query, subject) = query_with_rows().await;

        let slugs = |permissions: Vec<Permission>| {
            permissions.into_iter().map(|p| p.slug).collect::<Vec<_>>()
        };

        assert_eq!(
            slugs(query.get_permissions(&subject, PermissionFilter::All).await.unwrap()),
            vec!["post.edit.title", "post.publish"]
        );
        assert_eq!(
            slugs(query.get_permissions(&subject, PermissionFilter::Role).await.unwrap()),
            vec!["post.edit.title"]
        );
        assert_eq!(
            slugs(query.get_permissions(&subject, PermissionFilter::Explicit).await.unwrap()),
            vec!["post.publish"]
        );

        let roles = query.get_roles(&subject).await.unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].slug, "editor");
    }
}
