//! # Catalog
//!
//! Role and permission definitions and the permissions each role grants.
//!
//! Changes to a role's grants propagate to every subject holding the role in
//! the same unit of work, so the materialized permission view never lags
//! behind the assignments. Deleting a definition cascades through its
//! assignments and bindings.

use chrono::Utc;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

use crate::backend::Backend;
use crate::calculator::{PermissionSet, PermissionSetCalculator};
use crate::definition::{DefinitionKind, NewDefinition, Permission, Role};
use crate::error::{RbacError, RbacResult};
use crate::role_binding::{attach_within, detach_within};
use crate::slug::{column, validate_or_fail, IntoSlugExpression, SlugExpression, SlugKind};
use crate::store::{StoreError, StoreTransaction};
use crate::subject::{RolePermissionAssignment, SubjectId, SubjectPermissionBinding};

/// Look up one role by exact slug inside a unit of work.
pub(crate) async fn find_role(
    tx: &mut dyn StoreTransaction,
    slug: &str,
) -> RbacResult<Option<Role>> {
    let predicate = SlugExpression::single(slug)?.build_predicate(column::SLUG);
    Ok(tx.find_roles(Some(&predicate)).await?.into_iter().next())
}

/// Look up one permission by exact slug inside a unit of work.
pub(crate) async fn find_permission(
    tx: &mut dyn StoreTransaction,
    slug: &str,
) -> RbacResult<Option<Permission>> {
    let predicate = SlugExpression::single(slug)?.build_predicate(column::SLUG);
    Ok(tx.find_permissions(Some(&predicate)).await?.into_iter().next())
}

/// Slugs that occur more than once, in first-repeat order.
fn repeated<'a>(slugs: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut repeated: Vec<String> = Vec::new();
    for slug in slugs {
        if !seen.insert(slug) && !repeated.iter().any(|r| r == slug) {
            repeated.push(slug.to_string());
        }
    }
    repeated
}

/// Validate and collect permission slugs. Wildcards are not accepted.
fn collect_slugs<I>(slugs: I) -> RbacResult<PermissionSet>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut set = PermissionSet::new();
    for slug in slugs {
        let slug = slug.as_ref();
        validate_or_fail(slug, SlugKind::Slug)?;
        set.add(slug);
    }
    Ok(set)
}

fn duplicate(kind: DefinitionKind, slugs: Vec<String>) -> RbacError {
    RbacError::DuplicateSlug { kind, slugs }
}

/// Manages definitions and role grants.
#[derive(Clone)]
pub struct Catalog {
    backend: Backend,
}

impl Catalog {
    pub(crate) fn new(backend: Backend) -> Self {
        Self { backend }
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Create one role.
    ///
    /// # Arguments
    ///
    /// * `role` - A slug, a `(slug, name)` pair, a `(slug, name, description)`
    ///   triple or a [`NewDefinition`]
    ///
    /// # Errors
    ///
    /// `RbacError::Validation` if a field is malformed, `RbacError::DuplicateSlug`
    /// if the slug is taken.
    pub async fn create_role(&self, role: impl Into<NewDefinition>) -> RbacResult<Role> {
        let role = role.into().into_role()?;
        self.insert_roles(std::slice::from_ref(&role)).await?;
        Ok(role)
    }

    /// Create several roles at once. Either all are created or none.
    ///
    /// An empty input creates nothing and returns an empty list.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use platform_access::{NewDefinition, Rbac};
    ///
    /// async fn seed(rbac: &Rbac) -> platform_access::RbacResult<()> {
    ///     rbac.catalog()
    ///         .create_roles([
    ///             NewDefinition::new("admin"),
    ///             NewDefinition::new("editor").with_description("Edits and publishes posts"),
    ///         ])
    ///         .await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn create_roles<I>(&self, roles: I) -> RbacResult<Vec<Role>>
    where
        I: IntoIterator,
        I::Item: Into<NewDefinition>,
    {
        let roles = roles
            .into_iter()
            .map(|item| item.into().into_role())
            .collect::<RbacResult<Vec<_>>>()?;
        if roles.is_empty() {
            return Ok(roles);
        }

        self.insert_roles(&roles).await?;
        Ok(roles)
    }

    /// Create one permission.
    pub async fn create_permission(
        &self,
        permission: impl Into<NewDefinition>,
    ) -> RbacResult<Permission> {
        let permission = permission.into().into_permission()?;
        self.insert_permissions(std::slice::from_ref(&permission))
            .await?;
        Ok(permission)
    }

    /// Create several permissions at once. Either all are created or none.
    pub async fn create_permissions<I>(&self, permissions: I) -> RbacResult<Vec<Permission>>
    where
        I: IntoIterator,
        I::Item: Into<NewDefinition>,
    {
        let permissions = permissions
            .into_iter()
            .map(|item| item.into().into_permission())
            .collect::<RbacResult<Vec<_>>>()?;
        if permissions.is_empty() {
            return Ok(permissions);
        }

        self.insert_permissions(&permissions).await?;
        Ok(permissions)
    }

    #[instrument(skip_all, fields(count = roles.len()))]
    async fn insert_roles(&self, roles: &[Role]) -> RbacResult<()> {
        let kind = DefinitionKind::Role;
        let repeats = repeated(roles.iter().map(|r| r.slug.as_str()));
        if !repeats.is_empty() {
            return Err(duplicate(kind, repeats));
        }

        let mut tx = self.backend.begin_write().await?;
        let requested = SlugExpression::from_slugs(roles.iter().map(|r| &r.slug))?
            .build_predicate(column::SLUG);
        let existing = tx.find_roles(Some(&requested)).await?;
        if !existing.is_empty() {
            return Err(duplicate(kind, existing.into_iter().map(|r| r.slug).collect()));
        }

        match tx.insert_roles(roles).await {
            Ok(()) => {}
            Err(StoreError::UniqueViolation(_)) => {
                return Err(duplicate(kind, roles.iter().map(|r| r.slug.clone()).collect()));
            }
            Err(e) => return Err(e.into()),
        }
        tx.commit().await?;

        info!(count = roles.len(), "created roles");
        Ok(())
    }

    #[instrument(skip_all, fields(count = permissions.len()))]
    async fn insert_permissions(&self, permissions: &[Permission]) -> RbacResult<()> {
        let kind = DefinitionKind::Permission;
        let repeats = repeated(permissions.iter().map(|p| p.slug.as_str()));
        if !repeats.is_empty() {
            return Err(duplicate(kind, repeats));
        }

        let mut tx = self.backend.begin_write().await?;
        let requested = SlugExpression::from_slugs(permissions.iter().map(|p| &p.slug))?
            .build_predicate(column::SLUG);
        let existing = tx.find_permissions(Some(&requested)).await?;
        if !existing.is_empty() {
            return Err(duplicate(kind, existing.into_iter().map(|p| p.slug).collect()));
        }

        match tx.insert_permissions(permissions).await {
            Ok(()) => {}
            Err(StoreError::UniqueViolation(_)) => {
                return Err(duplicate(
                    kind,
                    permissions.iter().map(|p| p.slug.clone()).collect(),
                ));
            }
            Err(e) => return Err(e.into()),
        }
        tx.commit().await?;

        info!(count = permissions.len(), "created permissions");
        Ok(())
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Find one role by exact slug. Wildcards are rejected.
    pub async fn role(&self, slug: &str) -> RbacResult<Option<Role>> {
        let mut tx = self.backend.begin().await?;
        find_role(tx.as_mut(), slug).await
    }

    /// Find the roles matching an expression, ordered by slug.
    pub async fn roles(&self, roles: impl IntoSlugExpression) -> RbacResult<Vec<Role>> {
        let predicate = roles
            .into_slug_expression()?
            .build_predicate(column::SLUG);
        if predicate.is_always_false() {
            return Ok(Vec::new());
        }

        let mut tx = self.backend.begin().await?;
        Ok(tx.find_roles(Some(&predicate)).await?)
    }

    /// Every role, ordered by slug.
    pub async fn all_roles(&self) -> RbacResult<Vec<Role>> {
        let mut tx = self.backend.begin().await?;
        Ok(tx.find_roles(None).await?)
    }

    /// Find one permission by exact slug. Wildcards are rejected.
    pub async fn permission(&self, slug: &str) -> RbacResult<Option<Permission>> {
        let mut tx = self.backend.begin().await?;
        find_permission(tx.as_mut(), slug).await
    }

    /// Find the permissions matching an expression, ordered by slug.
    pub async fn permissions(
        &self,
        permissions: impl IntoSlugExpression,
    ) -> RbacResult<Vec<Permission>> {
        let predicate = permissions
            .into_slug_expression()?
            .build_predicate(column::SLUG);
        if predicate.is_always_false() {
            return Ok(Vec::new());
        }

        let mut tx = self.backend.begin().await?;
        Ok(tx.find_permissions(Some(&predicate)).await?)
    }

    /// Every permission, ordered by slug.
    pub async fn all_permissions(&self) -> RbacResult<Vec<Permission>> {
        let mut tx = self.backend.begin().await?;
        Ok(tx.find_permissions(None).await?)
    }

    // =========================================================================
    // Role grants
    // =========================================================================

    /// Permissions granted by a role.
    pub async fn role_permissions(&self, role: &str) -> RbacResult<Vec<Permission>> {
        validate_or_fail(role, SlugKind::Slug)?;
        let mut tx = self.backend.begin().await?;
        Ok(tx.role_permissions(role).await?)
    }

    /// Check if a role grants a permission matching the expression.
    pub async fn role_has_permission(
        &self,
        role: &str,
        permissions: impl IntoSlugExpression,
    ) -> RbacResult<bool> {
        validate_or_fail(role, SlugKind::Slug)?;
        let predicate = permissions
            .into_slug_expression()?
            .build_predicate(column::PERMISSION_SLUG);
        if predicate.is_always_false() {
            return Ok(false);
        }

        let mut tx = self.backend.begin().await?;
        Ok(tx.role_grants_matching(role, &predicate).await?)
    }

    /// Subjects holding a role.
    pub async fn role_subjects(&self, role: &str) -> RbacResult<Vec<SubjectId>> {
        validate_or_fail(role, SlugKind::Slug)?;
        let mut tx = self.backend.begin().await?;
        Ok(tx.role_subjects(role).await?)
    }

    /// Grant permissions to a role and to every subject holding it.
    ///
    /// # Returns
    ///
    /// The slugs newly assigned; ones the role already granted are skipped.
    ///
    /// # Errors
    ///
    /// `RbacError::NotFound` if the role or any permission does not exist.
    #[instrument(skip(self, permissions))]
    pub async fn attach_role_permissions<I>(
        &self,
        role: &str,
        permissions: I,
    ) -> RbacResult<Vec<String>>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        validate_or_fail(role, SlugKind::Slug)?;
        let requested = collect_slugs(permissions)?;
        if requested.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.backend.begin_write().await?;
        if find_role(tx.as_mut(), role).await?.is_none() {
            return Err(RbacError::not_found(DefinitionKind::Role, role));
        }

        let predicate = SlugExpression::from_slugs(requested.iter())?.build_predicate(column::SLUG);
        let known: PermissionSet = tx
            .find_permissions(Some(&predicate))
            .await?
            .into_iter()
            .map(|p| p.slug)
            .collect();
        if let Some(missing) = requested.iter().find(|slug| !known.has(slug)) {
            return Err(RbacError::not_found(DefinitionKind::Permission, missing));
        }

        let current: PermissionSet = tx
            .permission_slugs_for_roles(&[role.to_string()])
            .await?
            .into_iter()
            .collect();
        let added = requested.difference(&current);
        if added.is_empty() {
            debug!("role already grants every requested permission");
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let assignments: Vec<_> = added
            .iter()
            .map(|permission| RolePermissionAssignment::new(role, permission, now))
            .collect();
        tx.insert_role_permissions(&assignments).await?;

        let holders = tx.role_subjects(role).await?;
        for subject in &holders {
            let rows: Vec<_> = added
                .iter()
                .map(|permission| {
                    SubjectPermissionBinding::new(subject.clone(), permission, false, now)
                })
                .collect();
            tx.insert_subject_permissions(&rows).await?;
        }
        tx.commit().await?;

        info!(count = added.len(), subjects = holders.len(), "attached permissions to role");
        Ok(added.into_vec())
    }

    /// Revoke permissions from a role and from every subject holding it,
    /// unless another of the subject's roles or an explicit grant still
    /// covers them.
    ///
    /// # Returns
    ///
    /// The number of assignments removed.
    #[instrument(skip(self, permissions))]
    pub async fn detach_role_permissions<I>(&self, role: &str, permissions: I) -> RbacResult<usize>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        validate_or_fail(role, SlugKind::Slug)?;
        let requested = collect_slugs(permissions)?;
        if requested.is_empty() {
            return Ok(0);
        }

        let mut tx = self.backend.begin_write().await?;
        if find_role(tx.as_mut(), role).await?.is_none() {
            return Err(RbacError::not_found(DefinitionKind::Role, role));
        }

        let current: PermissionSet = tx
            .permission_slugs_for_roles(&[role.to_string()])
            .await?
            .into_iter()
            .collect();
        let removed = requested.intersection(&current);
        if removed.is_empty() {
            return Ok(0);
        }

        let removed_slugs: Vec<String> = removed.iter().map(str::to_string).collect();
        tx.delete_role_permissions(role, Some(removed_slugs.as_slice())).await?;

        let holders = tx.role_subjects(role).await?;
        for subject in &holders {
            let state =
                PermissionSetCalculator::load_with(tx.as_mut(), subject, role, removed.clone())
                    .await?;
            let grants = state.unique_grants();
            if !grants.is_empty() {
                tx.delete_subject_permissions(subject, &grants.into_vec(), false)
                    .await?;
            }
        }
        tx.commit().await?;

        info!(count = removed.len(), subjects = holders.len(), "detached permissions from role");
        Ok(removed.len())
    }

    // =========================================================================
    // Deletion
    // =========================================================================

    /// Delete a role, detaching it from every holder first.
    ///
    /// # Returns
    ///
    /// `false` if the role did not exist.
    #[instrument(skip(self))]
    pub async fn delete_role(&self, role: &str) -> RbacResult<bool> {
        validate_or_fail(role, SlugKind::Slug)?;

        let mut tx = self.backend.begin_write().await?;
        if find_role(tx.as_mut(), role).await?.is_none() {
            return Ok(false);
        }

        let holders = tx.role_subjects(role).await?;
        for subject in &holders {
            detach_within(tx.as_mut(), subject, role).await?;
        }
        tx.delete_role_permissions(role, None).await?;
        tx.delete_role(role).await?;
        tx.commit().await?;

        info!(subjects = holders.len(), "deleted role");
        Ok(true)
    }

    /// Delete a role after moving every holder to `replacement`.
    ///
    /// # Returns
    ///
    /// `false` if the role did not exist.
    ///
    /// # Errors
    ///
    /// `RbacError::NotFound` if the replacement role does not exist.
    #[instrument(skip(self))]
    pub async fn delete_role_reassigning(&self, role: &str, replacement: &str) -> RbacResult<bool> {
        validate_or_fail(role, SlugKind::Slug)?;
        validate_or_fail(replacement, SlugKind::Slug)?;
        if role == replacement {
            return Err(RbacError::validation(
                SlugKind::Slug,
                format!("cannot reassign holders of '{}' to itself", role),
            ));
        }

        let mut tx = self.backend.begin_write().await?;
        if find_role(tx.as_mut(), role).await?.is_none() {
            return Ok(false);
        }
        if find_role(tx.as_mut(), replacement).await?.is_none() {
            return Err(RbacError::not_found(DefinitionKind::Role, replacement));
        }

        let now = Utc::now();
        let holders = tx.role_subjects(role).await?;
        for subject in &holders {
            attach_within(tx.as_mut(), subject, replacement, now).await?;
            detach_within(tx.as_mut(), subject, role).await?;
        }
        tx.delete_role_permissions(role, None).await?;
        tx.delete_role(role).await?;
        tx.commit().await?;

        info!(
            subjects = holders.len(),
            replacement = %replacement,
            "deleted role with reassignment"
        );
        Ok(true)
    }

    /// Delete a permission together with every assignment and subject
    /// binding that references it, explicit grants included.
    ///
    /// # Returns
    ///
    /// `false` if the permission did not exist.
    #[instrument(skip(self))]
    pub async fn delete_permission(&self, permission: &str) -> RbacResult<bool> {
        validate_or_fail(permission, SlugKind::Slug)?;

        let mut tx = self.backend.begin_write().await?;
        if find_permission(tx.as_mut(), permission).await?.is_none() {
            return Ok(false);
        }

        let assignments = tx.delete_permission_assignments(permission).await?;
        let bindings = tx.delete_permission_bindings(permission).await?;
        tx.delete_permission(permission).await?;
        tx.commit().await?;

        info!(assignments, bindings, "deleted permission");
        Ok(true)
    }

    /// Empty every relation. Meant for seeding and tests.
    #[instrument(skip(self))]
    pub async fn remove_all(&self) -> RbacResult<()> {
        let mut tx = self.backend.begin_write().await?;
        tx.truncate_all().await?;
        tx.commit().await?;

        info!("removed all roles, permissions and bindings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_slugs() {
        assert!(repeated(["a", "b"].into_iter()).is_empty());
        assert_eq!(repeated(["a", "b", "a", "a", "b"].into_iter()), vec!["a", "b"]);
    }

    #[test]
    fn test_collect_slugs_rejects_wildcards() {
        assert!(collect_slugs(["post.edit", "post.edit"]).unwrap().len() == 1);
        assert!(matches!(
            collect_slugs(["post.*"]),
            Err(RbacError::Validation { .. })
        ));
    }
}
