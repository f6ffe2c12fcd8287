//! Explicit permission grants
//!
//! An explicit grant is a materialized row with `added_on_subject` set. Role
//! attach/detach never touches such rows; only [`PermissionBindingManager`]
//! creates or removes them.
//!
//! Granting a permission the subject already holds through a role promotes
//! the existing row to explicit. Revoking it again demotes the row back to
//! role-derived while a bound role still grants the permission, and deletes
//! it otherwise.

use chrono::Utc;
use tracing::{debug, instrument, warn};

use crate::backend::Backend;
use crate::catalog::find_permission;
use crate::definition::{DefinitionKind, Permission};
use crate::error::{RbacError, RbacResult};
use crate::slug::{validate_or_fail, SlugKind};
use crate::subject::{SubjectId, SubjectPermissionBinding};

/// Attaches and detaches explicit permission grants.
#[derive(Clone)]
pub struct PermissionBindingManager {
    backend: Backend,
}

impl PermissionBindingManager {
    pub(crate) fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Grant a permission directly to a subject. Idempotent.
    ///
    /// # Errors
    ///
    /// `RbacError::Validation` for a malformed slug, `RbacError::NotFound` if
    /// the permission does not exist.
    #[instrument(skip(self, subject), fields(subject = %subject))]
    pub async fn attach_permission(
        &self,
        subject: &SubjectId,
        permission: &str,
    ) -> RbacResult<Permission> {
        validate_or_fail(permission, SlugKind::Slug)?;

        let mut tx = self.backend.begin_write().await?;
        let found = find_permission(tx.as_mut(), permission)
            .await?
            .ok_or_else(|| RbacError::not_found(DefinitionKind::Permission, permission))?;

        let existing = tx
            .subject_permission_bindings(subject)
            .await?
            .into_iter()
            .find(|binding| binding.permission_slug == permission);
        let now = Utc::now();

        match existing {
            Some(binding) if binding.added_on_subject => {
                debug!(permission = %permission, "permission already granted explicitly");
                return Ok(found);
            }
            Some(_) => {
                tx.update_subject_permission_origin(subject, permission, true, now)
                    .await?;
                debug!(permission = %permission, "promoted role permission to explicit grant");
            }
            None => {
                let inserted = tx
                    .insert_subject_permissions(&[SubjectPermissionBinding::new(
                        subject.clone(),
                        permission,
                        true,
                        now,
                    )])
                    .await?;
                if inserted == 0 {
                    warn!(
                        permission = %permission,
                        "Permission binding already exists, treating as attached"
                    );
                }
            }
        }

        tx.commit().await?;
        Ok(found)
    }

    /// Revoke an explicit grant.
    ///
    /// # Returns
    ///
    /// `true` if an explicit grant was removed. A permission held only
    /// through a role is left alone and reported as `false`.
    #[instrument(skip(self, subject), fields(subject = %subject))]
    pub async fn detach_permission(
        &self,
        subject: &SubjectId,
        permission: &str,
    ) -> RbacResult<bool> {
        validate_or_fail(permission, SlugKind::Slug)?;

        let mut tx = self.backend.begin_write().await?;
        let explicit = tx
            .subject_permission_bindings(subject)
            .await?
            .iter()
            .any(|binding| binding.permission_slug == permission && binding.added_on_subject);
        if !explicit {
            debug!(permission = %permission, "no explicit grant to remove");
            return Ok(false);
        }

        let roles = tx.subject_role_slugs(subject).await?;
        let role_granted = !roles.is_empty()
            && tx
                .permission_slugs_for_roles(&roles)
                .await?
                .iter()
                .any(|slug| slug == permission);

        if role_granted {
            tx.update_subject_permission_origin(subject, permission, false, Utc::now())
                .await?;
            debug!(permission = %permission, "demoted explicit grant to role permission");
        } else {
            tx.delete_subject_permissions(subject, &[permission.to_string()], true)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }
}
