//! Per-subject session
//!
//! A [`SubjectSession`] binds the engine to one subject and owns that
//! subject's [`SubjectPermissionCache`]. Reads are served from the cache once
//! it is warm; every mutation made through the session clears the cache
//! before returning, whether or not the mutation succeeded.

use crate::cache::SubjectPermissionCache;
use crate::definition::{Permission, Role};
use crate::engine::Rbac;
use crate::error::RbacResult;
use crate::slug::{column, IntoSlugExpression};
use crate::subject::{PermissionFilter, SubjectId};

/// One subject's view of the engine.
///
/// # Example
///
/// ```rust,no_run
/// use platform_access::{Rbac, SubjectId};
///
/// async fn promote(rbac: &Rbac) -> platform_access::RbacResult<()> {
///     let mut session = rbac.session_for(SubjectId::new("user-1"));
///
///     session.attach_role("editor").await?;
///     if session.can("post.edit").await? {
///         // ...
///     }
///     Ok(())
/// }
/// ```
pub struct SubjectSession<'a> {
    rbac: &'a Rbac,
    subject: SubjectId,
    cache: SubjectPermissionCache,
}

impl<'a> SubjectSession<'a> {
    pub(crate) fn new(rbac: &'a Rbac, subject: SubjectId) -> Self {
        Self {
            rbac,
            subject,
            cache: SubjectPermissionCache::new(),
        }
    }

    /// The subject this session acts for.
    pub fn subject_id(&self) -> &SubjectId {
        &self.subject
    }

    /// The session's cache.
    pub fn cache(&self) -> &SubjectPermissionCache {
        &self.cache
    }

    /// Clear the cache so the next read goes to storage.
    pub fn invalidate(&mut self) {
        self.cache.invalidate();
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Check if the subject holds a role matching `roles`.
    pub async fn is(&mut self, roles: impl IntoSlugExpression) -> RbacResult<bool> {
        let predicate = roles
            .into_slug_expression()?
            .build_predicate(column::ROLE_SLUG);
        if predicate.is_always_false() {
            return Ok(false);
        }

        if let Some(hit) = self.cache.has_role_matching(&predicate) {
            return Ok(hit);
        }
        self.warm_roles().await?;
        Ok(self.cache.has_role_matching(&predicate).unwrap_or(false))
    }

    /// Check if the subject holds a permission matching `permissions`.
    pub async fn can(&mut self, permissions: impl IntoSlugExpression) -> RbacResult<bool> {
        let predicate = permissions
            .into_slug_expression()?
            .build_predicate(column::PERMISSION_SLUG);
        if predicate.is_always_false() {
            return Ok(false);
        }

        if let Some(hit) = self.cache.can_matching(&predicate) {
            return Ok(hit);
        }
        self.warm_permissions().await?;
        Ok(self.cache.can_matching(&predicate).unwrap_or(false))
    }

    /// The subject's roles.
    pub async fn roles(&mut self) -> RbacResult<Vec<Role>> {
        if self.cache.roles().is_none() {
            self.warm_roles().await?;
        }
        Ok(self.cache.roles().map(<[Role]>::to_vec).unwrap_or_default())
    }

    /// The subject's permissions narrowed by origin.
    pub async fn permissions(&mut self, filter: PermissionFilter) -> RbacResult<Vec<Permission>> {
        if self.cache.permissions().is_none() {
            self.warm_permissions().await?;
        }
        Ok(self.cache.filtered_permissions(filter).unwrap_or_default())
    }

    async fn warm_roles(&mut self) -> RbacResult<()> {
        let roles = self.rbac.query().get_roles(&self.subject).await?;
        self.cache.set_roles(roles);
        Ok(())
    }

    async fn warm_permissions(&mut self) -> RbacResult<()> {
        let grants = self
            .rbac
            .query()
            .get_permission_grants(&self.subject)
            .await?;
        self.cache.set_permissions(grants);
        Ok(())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Attach a role. See [`crate::RoleBindingManager::attach_role`].
    pub async fn attach_role(&mut self, role: &str) -> RbacResult<Role> {
        let result = self.rbac.role_bindings().attach_role(&self.subject, role).await;
        self.cache.invalidate();
        result
    }

    /// Detach a role. See [`crate::RoleBindingManager::detach_role`].
    pub async fn detach_role(&mut self, role: &str) -> RbacResult<bool> {
        let result = self.rbac.role_bindings().detach_role(&self.subject, role).await;
        self.cache.invalidate();
        result
    }

    /// Grant a permission explicitly.
    pub async fn attach_permission(&mut self, permission: &str) -> RbacResult<Permission> {
        let result = self
            .rbac
            .permission_bindings()
            .attach_permission(&self.subject, permission)
            .await;
        self.cache.invalidate_permissions();
        result
    }

    /// Revoke an explicit grant.
    pub async fn detach_permission(&mut self, permission: &str) -> RbacResult<bool> {
        let result = self
            .rbac
            .permission_bindings()
            .detach_permission(&self.subject, permission)
            .await;
        self.cache.invalidate_permissions();
        result
    }
}
