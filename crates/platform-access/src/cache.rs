//! Per-subject memoization of roles and permissions.
//!
//! A cache belongs to exactly one subject's [`SubjectSession`](crate::SubjectSession)
//! and is never shared. Lookups return `None` while the relevant half is
//! cold; the session warms it from storage and clears it on every mutation.

use crate::definition::{Permission, Role};
use crate::slug::SlugPredicate;
use crate::subject::{PermissionFilter, SubjectPermission};

/// Cached roles and permissions of one subject.
#[derive(Debug, Clone, Default)]
pub struct SubjectPermissionCache {
    roles: Option<Vec<Role>>,
    permissions: Option<Vec<SubjectPermission>>,
}

impl SubjectPermissionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached roles, if loaded.
    pub fn roles(&self) -> Option<&[Role]> {
        self.roles.as_deref()
    }

    /// Store the subject's roles.
    pub fn set_roles(&mut self, roles: Vec<Role>) {
        self.roles = Some(roles);
    }

    /// Cached permissions with their origin, if loaded.
    pub fn permissions(&self) -> Option<&[SubjectPermission]> {
        self.permissions.as_deref()
    }

    /// Store the subject's permissions.
    pub fn set_permissions(&mut self, permissions: Vec<SubjectPermission>) {
        self.permissions = Some(permissions);
    }

    /// Check a role predicate against the cache. `None` when cold.
    pub fn has_role_matching(&self, predicate: &SlugPredicate) -> Option<bool> {
        self.roles
            .as_ref()
            .map(|roles| roles.iter().any(|role| predicate.matches(&role.slug)))
    }

    /// Check a permission predicate against the cache. `None` when cold.
    pub fn can_matching(&self, predicate: &SlugPredicate) -> Option<bool> {
        self.permissions.as_ref().map(|permissions| {
            permissions
                .iter()
                .any(|grant| predicate.matches(&grant.permission.slug))
        })
    }

    /// Cached permissions narrowed by origin. `None` when cold.
    pub fn filtered_permissions(&self, filter: PermissionFilter) -> Option<Vec<Permission>> {
        self.permissions.as_ref().map(|permissions| {
            permissions
                .iter()
                .filter(|grant| filter.admits(grant.added_on_subject))
                .map(|grant| grant.permission.clone())
                .collect()
        })
    }

    /// Drop the cached permissions.
    pub fn invalidate_permissions(&mut self) {
        self.permissions = None;
    }

    /// Drop everything.
    pub fn invalidate(&mut self) {
        self.roles = None;
        self.permissions = None;
    }

    /// Check if nothing is cached.
    pub fn is_cold(&self) -> bool {
        self.roles.is_none() && self.permissions.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slug::{column, SlugExpression};

    fn grant(slug: &str, added_on_subject: bool) -> SubjectPermission {
        SubjectPermission {
            permission: Permission::new(slug, slug, slug),
            added_on_subject,
        }
    }

    #[test]
    fn test_cold_cache_answers_nothing() {
        let cache = SubjectPermissionCache::new();
        let predicate = SlugExpression::parse("editor")
            .unwrap()
            .build_predicate(column::ROLE_SLUG);

        assert!(cache.is_cold());
        assert_eq!(cache.has_role_matching(&predicate), None);
        assert_eq!(cache.can_matching(&predicate), None);
        assert!(cache.filtered_permissions(PermissionFilter::All).is_none());
    }

    #[test]
    fn test_warm_cache_matches_predicates() {
        let mut cache = SubjectPermissionCache::new();
        cache.set_roles(vec![Role::new("editor", "Editor", "Editor")]);
        cache.set_permissions(vec![grant("post.edit.title", false), grant("post.publish", true)]);

        let role = SlugExpression::parse("admin|editor")
            .unwrap()
            .build_predicate(column::ROLE_SLUG);
        let wildcard = SlugExpression::parse("post.edit.*")
            .unwrap()
            .build_predicate(column::PERMISSION_SLUG);
        let missing = SlugExpression::parse("post.delete")
            .unwrap()
            .build_predicate(column::PERMISSION_SLUG);

        assert_eq!(cache.has_role_matching(&role), Some(true));
        assert_eq!(cache.can_matching(&wildcard), Some(true));
        assert_eq!(cache.can_matching(&missing), Some(false));

        let explicit = cache.filtered_permissions(PermissionFilter::Explicit).unwrap();
        assert_eq!(explicit.len(), 1);
        assert_eq!(explicit[0].slug, "post.publish");
    }

    #[test]
    fn test_invalidate() {
        let mut cache = SubjectPermissionCache::new();
        cache.set_roles(Vec::new());
        cache.set_permissions(Vec::new());

        cache.invalidate_permissions();
        assert!(cache.permissions().is_none());
        assert!(cache.roles().is_some());

        cache.invalidate();
        assert!(cache.is_cold());
    }
}
