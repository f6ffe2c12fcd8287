//! # Permission set calculation
//!
//! When a role is attached to or detached from a subject, only the
//! permissions that role contributes *uniquely* may change in the subject's
//! materialized permission view:
//!
//! ```text
//! unique_grants(role, subject) = role_permissions - (other_role_permissions ∪ explicit_permissions)
//! ```
//!
//! Permissions also granted by another bound role, or granted explicitly,
//! are left untouched. Set difference is exact string equality on slugs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::store::{StoreResult, StoreTransaction};
use crate::subject::SubjectId;

/// A set of permission slugs.
///
/// Iteration is in slug order, so writes derived from a set are
/// deterministic.
///
/// # Example
///
/// ```
/// use platform_access::PermissionSet;
///
/// let mut set = PermissionSet::new();
/// set.add("post.edit");
/// set.add("post.publish");
///
/// assert!(set.has("post.edit"));
/// assert_eq!(set.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSet {
    permissions: BTreeSet<String>,
}

impl PermissionSet {
    /// Create a new empty permission set.
    pub fn new() -> Self {
        Self {
            permissions: BTreeSet::new(),
        }
    }

    /// Add a permission slug to the set.
    pub fn add(&mut self, slug: impl Into<String>) {
        self.permissions.insert(slug.into());
    }

    /// Add multiple permission slugs to the set.
    pub fn add_all<I>(&mut self, slugs: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for slug in slugs {
            self.add(slug);
        }
    }

    /// Remove a permission slug from the set.
    ///
    /// # Returns
    ///
    /// `true` if the slug was present, `false` otherwise
    pub fn remove(&mut self, slug: &str) -> bool {
        self.permissions.remove(slug)
    }

    /// Check if the set contains a slug (exact match only).
    pub fn has(&self, slug: &str) -> bool {
        self.permissions.contains(slug)
    }

    /// Merge another permission set into this one.
    pub fn merge(&mut self, other: &PermissionSet) {
        for slug in &other.permissions {
            self.permissions.insert(slug.clone());
        }
    }

    /// Slugs in this set that are not in `other`.
    pub fn difference(&self, other: &PermissionSet) -> PermissionSet {
        self.permissions
            .difference(&other.permissions)
            .cloned()
            .collect()
    }

    /// Slugs present in both sets.
    pub fn intersection(&self, other: &PermissionSet) -> PermissionSet {
        self.permissions
            .intersection(&other.permissions)
            .cloned()
            .collect()
    }

    /// Get the count of permissions.
    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    /// Iterate over the slugs in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.permissions.iter().map(String::as_str)
    }

    /// Consume the set into an ordered vector of slugs.
    pub fn into_vec(self) -> Vec<String> {
        self.permissions.into_iter().collect()
    }
}

impl FromIterator<String> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self {
            permissions: iter.into_iter().collect(),
        }
    }
}

impl<'a> FromIterator<&'a str> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        iter.into_iter().map(str::to_string).collect()
    }
}

impl IntoIterator for PermissionSet {
    type Item = String;
    type IntoIter = std::collections::btree_set::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.permissions.into_iter()
    }
}

/// The three inputs of a unique-grant computation for one (subject, role).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrantState {
    /// Permissions under consideration for the role.
    pub role_permissions: PermissionSet,
    /// Union of the permissions granted by the subject's other bound roles.
    pub other_role_permissions: PermissionSet,
    /// The subject's explicit grants.
    pub explicit_permissions: PermissionSet,
}

impl GrantState {
    /// Permissions the role contributes that nothing else covers.
    ///
    /// # Example
    ///
    /// ```
    /// use platform_access::{GrantState, PermissionSet};
    ///
    /// let state = GrantState {
    ///     role_permissions: ["a", "b"].into_iter().collect(),
    ///     other_role_permissions: ["b", "c"].into_iter().collect(),
    ///     explicit_permissions: PermissionSet::new(),
    /// };
    /// assert_eq!(state.unique_grants().into_vec(), vec!["a".to_string()]);
    /// ```
    pub fn unique_grants(&self) -> PermissionSet {
        let mut covered = self.other_role_permissions.clone();
        covered.merge(&self.explicit_permissions);
        self.role_permissions.difference(&covered)
    }
}

/// Loads grant state from storage inside a unit of work.
///
/// "Other roles" means the subject's bound roles as currently visible in the
/// transaction, excluding the role under consideration; callers detaching a
/// role therefore load after removing its binding, and callers attaching one
/// load before or after inserting it with the same result.
pub struct PermissionSetCalculator;

impl PermissionSetCalculator {
    /// Load the grant state for `role`'s full permission set.
    pub async fn load(
        tx: &mut dyn StoreTransaction,
        subject: &SubjectId,
        role: &str,
    ) -> StoreResult<GrantState> {
        let role_permissions = tx
            .permission_slugs_for_roles(&[role.to_string()])
            .await?
            .into_iter()
            .collect();
        Self::load_with(tx, subject, role, role_permissions).await
    }

    /// Load the grant state for an explicit candidate set attributed to
    /// `role`, e.g. permissions just removed from the role.
    pub async fn load_with(
        tx: &mut dyn StoreTransaction,
        subject: &SubjectId,
        role: &str,
        role_permissions: PermissionSet,
    ) -> StoreResult<GrantState> {
        let other_roles: Vec<String> = tx
            .subject_role_slugs(subject)
            .await?
            .into_iter()
            .filter(|slug| slug != role)
            .collect();

        let other_role_permissions = if other_roles.is_empty() {
            PermissionSet::new()
        } else {
            tx.permission_slugs_for_roles(&other_roles)
                .await?
                .into_iter()
                .collect()
        };

        let explicit_permissions = tx
            .subject_permission_bindings(subject)
            .await?
            .into_iter()
            .filter(|binding| binding.added_on_subject)
            .map(|binding| binding.permission_slug)
            .collect();

        Ok(GrantState {
            role_permissions,
            other_role_permissions,
            explicit_permissions,
        })
    }

    /// Compute the unique grants of `role` for `subject`.
    pub async fn unique_grants(
        tx: &mut dyn StoreTransaction,
        subject: &SubjectId,
        role: &str,
    ) -> StoreResult<PermissionSet> {
        Ok(Self::load(tx, subject, role).await?.unique_grants())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaConfig;
    use crate::store::memory::MemoryStore;
    use crate::store::RbacStore;
    use crate::subject::{RolePermissionAssignment, SubjectPermissionBinding, SubjectRoleBinding};
    use chrono::Utc;
    use proptest::prelude::*;

    fn set(slugs: &[&str]) -> PermissionSet {
        slugs.iter().copied().collect()
    }

    #[test]
    fn test_permission_set_basics() {
        let mut set = PermissionSet::new();
        set.add("post.edit");
        set.add("post.edit");
        set.add_all(["post.publish", "post.delete"]);

        assert_eq!(set.len(), 3);
        assert!(set.has("post.edit"));
        assert!(!set.has("post"));
        assert!(set.remove("post.delete"));
        assert!(!set.remove("post.delete"));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["post.edit", "post.publish"]);
    }

    #[test]
    fn test_permission_set_merge_and_difference() {
        let mut a = set(&["a", "b"]);
        let b = set(&["b", "c"]);

        assert_eq!(a.difference(&b), set(&["a"]));
        assert_eq!(a.intersection(&b), set(&["b"]));
        assert!(b.intersection(&set(&["x"])).is_empty());

        a.merge(&b);
        assert_eq!(a, set(&["a", "b", "c"]));
        assert!(b.difference(&a).is_empty());
    }

    #[test]
    fn test_unique_grants_with_overlap() {
        let state = GrantState {
            role_permissions: set(&["a", "b"]),
            other_role_permissions: set(&["b", "c"]),
            explicit_permissions: PermissionSet::new(),
        };
        assert_eq!(state.unique_grants(), set(&["a"]));
    }

    #[test]
    fn test_unique_grants_excludes_explicit() {
        let state = GrantState {
            role_permissions: set(&["a", "b"]),
            other_role_permissions: PermissionSet::new(),
            explicit_permissions: set(&["a", "z"]),
        };
        assert_eq!(state.unique_grants(), set(&["b"]));
    }

    #[test]
    fn test_unique_grants_empty_is_no_op() {
        let state = GrantState {
            role_permissions: set(&["a"]),
            other_role_permissions: set(&["a"]),
            explicit_permissions: PermissionSet::new(),
        };
        assert!(state.unique_grants().is_empty());
        assert!(GrantState::default().unique_grants().is_empty());
    }

    proptest! {
        #[test]
        fn test_unique_grants_is_set_difference(
            role in proptest::collection::btree_set("[a-e]", 0..5),
            other in proptest::collection::btree_set("[a-e]", 0..5),
            explicit in proptest::collection::btree_set("[a-e]", 0..5),
        ) {
            let state = GrantState {
                role_permissions: role.iter().cloned().collect(),
                other_role_permissions: other.iter().cloned().collect(),
                explicit_permissions: explicit.iter().cloned().collect(),
            };
            let unique = state.unique_grants();

            for slug in unique.iter() {
                prop_assert!(role.contains(slug));
                prop_assert!(!other.contains(slug));
                prop_assert!(!explicit.contains(slug));
            }
            for slug in &role {
                if !other.contains(slug) && !explicit.contains(slug) {
                    prop_assert!(unique.has(slug));
                }
            }
        }
    }

    #[tokio::test]
    async fn test_load_reads_other_roles_and_explicit_grants() {
        let store = MemoryStore::new();
        let schema = SchemaConfig::default();
        let subject = SubjectId::new("user-1");
        let now = Utc::now();

        let mut tx = store.begin(&schema).await.unwrap();
        tx.insert_role_permissions(&[
            RolePermissionAssignment::new("writer", "a", now),
            RolePermissionAssignment::new("writer", "b", now),
            RolePermissionAssignment::new("reviewer", "b", now),
            RolePermissionAssignment::new("reviewer", "c", now),
        ])
        .await
        .unwrap();
        tx.insert_subject_role(&SubjectRoleBinding::new(subject.clone(), "writer", now))
            .await
            .unwrap();
        tx.insert_subject_role(&SubjectRoleBinding::new(subject.clone(), "reviewer", now))
            .await
            .unwrap();
        tx.insert_subject_permissions(&[SubjectPermissionBinding::new(
            subject.clone(),
            "a",
            true,
            now,
        )])
        .await
        .unwrap();

        let state = PermissionSetCalculator::load(tx.as_mut(), &subject, "writer")
            .await
            .unwrap();
        assert_eq!(state.role_permissions, set(&["a", "b"]));
        assert_eq!(state.other_role_permissions, set(&["b", "c"]));
        assert_eq!(state.explicit_permissions, set(&["a"]));
        assert!(state.unique_grants().is_empty());

        let unique = PermissionSetCalculator::unique_grants(tx.as_mut(), &subject, "reviewer")
            .await
            .unwrap();
        assert_eq!(unique, set(&["c"]));
    }
}
