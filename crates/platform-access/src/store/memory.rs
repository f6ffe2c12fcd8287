//! In-memory store
//!
//! Each [`SchemaConfig`] gets its own table set behind a mutex. A
//! transaction holds the lock for its whole lifetime, so units of work on
//! the same schema run one at a time. Writes go to a private copy of the
//! tables that replaces the committed state on commit and is discarded on
//! drop.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::{RbacStore, StoreError, StoreResult, StoreTransaction};
use crate::config::SchemaConfig;
use crate::definition::{Permission, Role};
use crate::slug::SlugPredicate;
use crate::subject::{
    PermissionFilter, RolePermissionAssignment, SubjectId, SubjectPermission,
    SubjectPermissionBinding, SubjectRoleBinding,
};

/// The five relations, keyed by their primary keys.
#[derive(Debug, Clone, Default)]
struct Tables {
    roles: BTreeMap<String, Role>,
    permissions: BTreeMap<String, Permission>,
    role_permissions: BTreeMap<(String, String), RolePermissionAssignment>,
    subject_roles: BTreeMap<(SubjectId, String), SubjectRoleBinding>,
    subject_permissions: BTreeMap<(SubjectId, String), SubjectPermissionBinding>,
}

/// In-memory store for tests and single-process applications.
#[derive(Default)]
pub struct MemoryStore {
    schemas: RwLock<HashMap<SchemaConfig, Arc<Mutex<Tables>>>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    async fn tables(&self, schema: &SchemaConfig) -> Arc<Mutex<Tables>> {
        if let Some(tables) = self.schemas.read().await.get(schema) {
            return tables.clone();
        }

        let mut schemas = self.schemas.write().await;
        schemas.entry(schema.clone()).or_default().clone()
    }
}

#[async_trait]
impl RbacStore for MemoryStore {
    async fn begin(&self, schema: &SchemaConfig) -> StoreResult<Box<dyn StoreTransaction>> {
        schema
            .validate()
            .map_err(|e| StoreError::InvalidSchema(e.to_string()))?;

        let guard = self.tables(schema).await.lock_owned().await;
        Ok(Box::new(MemoryTransaction {
            guard,
            working: None,
        }))
    }
}

/// A unit of work over one schema's tables.
struct MemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    /// Copy-on-write state; `None` until the first write.
    working: Option<Tables>,
}

impl MemoryTransaction {
    fn tables(&self) -> &Tables {
        self.working.as_ref().unwrap_or(&*self.guard)
    }

    fn tables_mut(&mut self) -> &mut Tables {
        let committed = &self.guard;
        self.working.get_or_insert_with(|| Tables::clone(&**committed))
    }
}

fn filter_definitions<T: Clone>(
    table: &BTreeMap<String, T>,
    filter: Option<&SlugPredicate>,
) -> Vec<T> {
    table
        .iter()
        .filter(|(slug, _)| filter.map_or(true, |predicate| predicate.matches(slug)))
        .map(|(_, definition)| definition.clone())
        .collect()
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn find_roles(&mut self, filter: Option<&SlugPredicate>) -> StoreResult<Vec<Role>> {
        Ok(filter_definitions(&self.tables().roles, filter))
    }

    async fn find_permissions(
        &mut self,
        filter: Option<&SlugPredicate>,
    ) -> StoreResult<Vec<Permission>> {
        Ok(filter_definitions(&self.tables().permissions, filter))
    }

    async fn insert_roles(&mut self, roles: &[Role]) -> StoreResult<()> {
        let tables = self.tables_mut();
        for role in roles {
            if tables.roles.contains_key(&role.slug) {
                return Err(StoreError::UniqueViolation(format!("role '{}'", role.slug)));
            }
            tables.roles.insert(role.slug.clone(), role.clone());
        }
        Ok(())
    }

    async fn insert_permissions(&mut self, permissions: &[Permission]) -> StoreResult<()> {
        let tables = self.tables_mut();
        for permission in permissions {
            if tables.permissions.contains_key(&permission.slug) {
                return Err(StoreError::UniqueViolation(format!(
                    "permission '{}'",
                    permission.slug
                )));
            }
            tables
                .permissions
                .insert(permission.slug.clone(), permission.clone());
        }
        Ok(())
    }

    async fn delete_role(&mut self, slug: &str) -> StoreResult<bool> {
        Ok(self.tables_mut().roles.remove(slug).is_some())
    }

    async fn delete_permission(&mut self, slug: &str) -> StoreResult<bool> {
        Ok(self.tables_mut().permissions.remove(slug).is_some())
    }

    async fn permission_slugs_for_roles(&mut self, roles: &[String]) -> StoreResult<Vec<String>> {
        let slugs: BTreeSet<&String> = self
            .tables()
            .role_permissions
            .keys()
            .filter(|(role, _)| roles.contains(role))
            .map(|(_, permission)| permission)
            .collect();
        Ok(slugs.into_iter().cloned().collect())
    }

    async fn role_permissions(&mut self, role: &str) -> StoreResult<Vec<Permission>> {
        let tables = self.tables();
        Ok(tables
            .role_permissions
            .keys()
            .filter(|(r, _)| r == role)
            .filter_map(|(_, permission)| tables.permissions.get(permission).cloned())
            .collect())
    }

    async fn role_grants_matching(
        &mut self,
        role: &str,
        predicate: &SlugPredicate,
    ) -> StoreResult<bool> {
        Ok(self
            .tables()
            .role_permissions
            .keys()
            .any(|(r, permission)| r == role && predicate.matches(permission)))
    }

    async fn insert_role_permissions(
        &mut self,
        assignments: &[RolePermissionAssignment],
    ) -> StoreResult<()> {
        let tables = self.tables_mut();
        for assignment in assignments {
            let key = (
                assignment.role_slug.clone(),
                assignment.permission_slug.clone(),
            );
            if tables.role_permissions.contains_key(&key) {
                return Err(StoreError::UniqueViolation(format!(
                    "assignment '{}' -> '{}'",
                    key.0, key.1
                )));
            }
            tables.role_permissions.insert(key, assignment.clone());
        }
        Ok(())
    }

    async fn delete_role_permissions(
        &mut self,
        role: &str,
        permissions: Option<&[String]>,
    ) -> StoreResult<u64> {
        let table = &mut self.tables_mut().role_permissions;
        let before = table.len();
        table.retain(|(r, permission), _| {
            let selected = permissions.map_or(true, |slugs| slugs.contains(permission));
            !(r == role && selected)
        });
        Ok((before - table.len()) as u64)
    }

    async fn delete_permission_assignments(&mut self, permission: &str) -> StoreResult<u64> {
        let table = &mut self.tables_mut().role_permissions;
        let before = table.len();
        table.retain(|(_, p), _| p != permission);
        Ok((before - table.len()) as u64)
    }

    async fn subject_role_slugs(&mut self, subject: &SubjectId) -> StoreResult<Vec<String>> {
        Ok(self
            .tables()
            .subject_roles
            .keys()
            .filter(|(s, _)| s == subject)
            .map(|(_, role)| role.clone())
            .collect())
    }

    async fn subject_roles(&mut self, subject: &SubjectId) -> StoreResult<Vec<Role>> {
        let tables = self.tables();
        Ok(tables
            .subject_roles
            .keys()
            .filter(|(s, _)| s == subject)
            .filter_map(|(_, role)| tables.roles.get(role).cloned())
            .collect())
    }

    async fn subject_has_role(
        &mut self,
        subject: &SubjectId,
        predicate: &SlugPredicate,
    ) -> StoreResult<bool> {
        Ok(self
            .tables()
            .subject_roles
            .keys()
            .any(|(s, role)| s == subject && predicate.matches(role)))
    }

    async fn insert_subject_role(&mut self, binding: &SubjectRoleBinding) -> StoreResult<()> {
        let key = (binding.subject_id.clone(), binding.role_slug.clone());
        let tables = self.tables_mut();
        if tables.subject_roles.contains_key(&key) {
            return Err(StoreError::UniqueViolation(format!(
                "subject '{}' already holds role '{}'",
                key.0, key.1
            )));
        }
        tables.subject_roles.insert(key, binding.clone());
        Ok(())
    }

    async fn delete_subject_role(&mut self, subject: &SubjectId, role: &str) -> StoreResult<bool> {
        let key = (subject.clone(), role.to_string());
        Ok(self.tables_mut().subject_roles.remove(&key).is_some())
    }

    async fn role_subjects(&mut self, role: &str) -> StoreResult<Vec<SubjectId>> {
        Ok(self
            .tables()
            .subject_roles
            .keys()
            .filter(|(_, r)| r == role)
            .map(|(subject, _)| subject.clone())
            .collect())
    }

    async fn subject_permission_bindings(
        &mut self,
        subject: &SubjectId,
    ) -> StoreResult<Vec<SubjectPermissionBinding>> {
        Ok(self
            .tables()
            .subject_permissions
            .iter()
            .filter(|((s, _), _)| s == subject)
            .map(|(_, binding)| binding.clone())
            .collect())
    }

    async fn subject_permissions(
        &mut self,
        subject: &SubjectId,
        filter: PermissionFilter,
    ) -> StoreResult<Vec<SubjectPermission>> {
        let tables = self.tables();
        Ok(tables
            .subject_permissions
            .iter()
            .filter(|((s, _), binding)| s == subject && filter.admits(binding.added_on_subject))
            .filter_map(|((_, slug), binding)| {
                tables.permissions.get(slug).map(|permission| SubjectPermission {
                    permission: permission.clone(),
                    added_on_subject: binding.added_on_subject,
                })
            })
            .collect())
    }

    async fn subject_can(
        &mut self,
        subject: &SubjectId,
        predicate: &SlugPredicate,
    ) -> StoreResult<bool> {
        Ok(self
            .tables()
            .subject_permissions
            .keys()
            .any(|(s, permission)| s == subject && predicate.matches(permission)))
    }

    async fn insert_subject_permissions(
        &mut self,
        bindings: &[SubjectPermissionBinding],
    ) -> StoreResult<u64> {
        let table = &mut self.tables_mut().subject_permissions;
        let mut inserted = 0;
        for binding in bindings {
            let key = (binding.subject_id.clone(), binding.permission_slug.clone());
            if !table.contains_key(&key) {
                table.insert(key, binding.clone());
                inserted += 1;
            }
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
        let key = (subject.clone(), permission.to_string());
        match self.tables_mut().subject_permissions.get_mut(&key) {
            Some(binding) => {
                binding.added_on_subject = added_on_subject;
                binding.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
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

        let table = &mut self.tables_mut().subject_permissions;
        let before = table.len();
        table.retain(|(s, permission), binding| {
            !(s == subject
                && binding.added_on_subject == added_on_subject
                && permissions.contains(permission))
        });
        Ok((before - table.len()) as u64)
    }

    async fn delete_permission_bindings(&mut self, permission: &str) -> StoreResult<u64> {
        let table = &mut self.tables_mut().subject_permissions;
        let before = table.len();
        table.retain(|(_, p), _| p != permission);
        Ok((before - table.len()) as u64)
    }

    async fn truncate_all(&mut self) -> StoreResult<()> {
        *self.tables_mut() = Tables::default();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTransaction { mut guard, working } = *self;
        if let Some(working) = working {
            *guard = working;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slug::{column, SlugExpression};

    fn role(slug: &str) -> Role {
        Role::new(slug, slug, slug)
    }

    #[tokio::test]
    async fn test_commit_persists_writes() {
        let store = MemoryStore::new();
        let schema = SchemaConfig::default();

        let mut tx = store.begin(&schema).await.unwrap();
        tx.insert_roles(&[role("editor")]).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin(&schema).await.unwrap();
        let roles = tx.find_roles(None).await.unwrap();
        assert_eq!(roles, vec![role("editor")]);
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let store = MemoryStore::new();
        let schema = SchemaConfig::default();

        {
            let mut tx = store.begin(&schema).await.unwrap();
            tx.insert_roles(&[role("editor")]).await.unwrap();
            assert_eq!(tx.find_roles(None).await.unwrap().len(), 1);
        }

        let mut tx = store.begin(&schema).await.unwrap();
        assert!(tx.find_roles(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_schemas_are_isolated() {
        let store = MemoryStore::new();

        let mut tx = store.begin(&SchemaConfig::default()).await.unwrap();
        tx.insert_roles(&[role("editor")]).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin(&SchemaConfig::with_prefix("tenant_")).await.unwrap();
        assert!(tx.find_roles(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_invalid_schema() {
        let store = MemoryStore::new();
        let mut schema = SchemaConfig::default();
        schema.role_table = "bad name".to_string();

        assert!(matches!(
            store.begin(&schema).await,
            Err(StoreError::InvalidSchema(_))
        ));
    }

    #[tokio::test]
    async fn test_unique_violations() {
        let store = MemoryStore::new();
        let mut tx = store.begin(&SchemaConfig::default()).await.unwrap();
        let subject = SubjectId::new("user-1");
        let now = Utc::now();

        tx.insert_roles(&[role("editor")]).await.unwrap();
        assert!(matches!(
            tx.insert_roles(&[role("editor")]).await,
            Err(StoreError::UniqueViolation(_))
        ));

        let binding = SubjectRoleBinding::new(subject.clone(), "editor", now);
        tx.insert_subject_role(&binding).await.unwrap();
        assert!(matches!(
            tx.insert_subject_role(&binding).await,
            Err(StoreError::UniqueViolation(_))
        ));

        let rows = vec![
            SubjectPermissionBinding::new(subject.clone(), "post.edit", false, now),
            SubjectPermissionBinding::new(subject.clone(), "post.edit", true, now),
        ];
        assert_eq!(tx.insert_subject_permissions(&rows).await.unwrap(), 1);
        let stored = tx.subject_permission_bindings(&subject).await.unwrap();
        assert!(!stored[0].added_on_subject);
    }

    #[tokio::test]
    async fn test_predicate_queries() {
        let store = MemoryStore::new();
        let mut tx = store.begin(&SchemaConfig::default()).await.unwrap();
        let subject = SubjectId::new("user-1");
        let now = Utc::now();

        tx.insert_subject_permissions(&[
            SubjectPermissionBinding::new(subject.clone(), "post.edit.title", false, now),
            SubjectPermissionBinding::new(SubjectId::new("user-2"), "post.publish", false, now),
        ])
        .await
        .unwrap();

        let wildcard = SlugExpression::parse("post.edit.*")
            .unwrap()
            .build_predicate(column::PERMISSION_SLUG);
        let other = SlugExpression::parse("post.publish")
            .unwrap()
            .build_predicate(column::PERMISSION_SLUG);

        assert!(tx.subject_can(&subject, &wildcard).await.unwrap());
        assert!(!tx.subject_can(&subject, &other).await.unwrap());
    }

    #[tokio::test]
    async fn test_origin_filtered_delete() {
        let store = MemoryStore::new();
        let mut tx = store.begin(&SchemaConfig::default()).await.unwrap();
        let subject = SubjectId::new("user-1");
        let now = Utc::now();

        tx.insert_subject_permissions(&[
            SubjectPermissionBinding::new(subject.clone(), "a", false, now),
            SubjectPermissionBinding::new(subject.clone(), "b", true, now),
        ])
        .await
        .unwrap();

        let removed = tx
            .delete_subject_permissions(&subject, &["a".to_string(), "b".to_string()], false)
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let remaining = tx.subject_permission_bindings(&subject).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].permission_slug, "b");

        assert!(tx
            .update_subject_permission_origin(&subject, "b", false, now)
            .await
            .unwrap());
        assert!(!tx
            .update_subject_permission_origin(&subject, "a", true, now)
            .await
            .unwrap());
    }
}
