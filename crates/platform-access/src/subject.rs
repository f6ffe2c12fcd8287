//! Subjects and their bindings
//!
//! A subject is whatever the host application authorizes, usually a user. The
//! engine only needs an opaque identity for it; the host resolves identities
//! back to its own user records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::definition::Permission;

/// Opaque subject identifier.
///
/// # Examples
///
/// ```
/// use platform_access::SubjectId;
/// use uuid::Uuid;
///
/// let user_id = Uuid::now_v7();
/// let subject = SubjectId::from(user_id);
/// assert_eq!(subject.as_str(), user_id.to_string());
///
/// assert_eq!(SubjectId::from(42_i64).as_str(), "42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    /// Create an identifier from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Uuid> for SubjectId {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

impl From<i64> for SubjectId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for SubjectId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for SubjectId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SubjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Anything the engine can authorize.
///
/// Host user types implement this to hand the engine their identity.
///
/// ```
/// use platform_access::{Subject, SubjectId};
/// use uuid::Uuid;
///
/// struct User {
///     id: Uuid,
/// }
///
/// impl Subject for User {
///     fn identity(&self) -> SubjectId {
///         SubjectId::from(self.id)
///     }
/// }
/// ```
pub trait Subject {
    /// The subject's identity.
    fn identity(&self) -> SubjectId;
}

impl Subject for SubjectId {
    fn identity(&self) -> SubjectId {
        self.clone()
    }
}

impl Subject for Uuid {
    fn identity(&self) -> SubjectId {
        SubjectId::from(*self)
    }
}

/// Declares that a role grants a permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermissionAssignment {
    /// Granting role.
    pub role_slug: String,
    /// Granted permission.
    pub permission_slug: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl RolePermissionAssignment {
    /// Creates an assignment stamped with `now`.
    pub fn new(
        role_slug: impl Into<String>,
        permission_slug: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            role_slug: role_slug.into(),
            permission_slug: permission_slug.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Declares that a subject holds a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRoleBinding {
    /// Subject holding the role.
    pub subject_id: SubjectId,
    /// Held role.
    pub role_slug: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl SubjectRoleBinding {
    /// Creates a binding stamped with `now`.
    pub fn new(subject_id: SubjectId, role_slug: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            subject_id,
            role_slug: role_slug.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A row of the materialized subject permission view.
///
/// `added_on_subject` marks an explicit grant; such rows are independent of
/// the subject's roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectPermissionBinding {
    /// Subject holding the permission.
    pub subject_id: SubjectId,
    /// Held permission.
    pub permission_slug: String,
    /// Whether the permission was granted directly rather than through a role.
    pub added_on_subject: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl SubjectPermissionBinding {
    /// Creates a row stamped with `now`.
    pub fn new(
        subject_id: SubjectId,
        permission_slug: impl Into<String>,
        added_on_subject: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            subject_id,
            permission_slug: permission_slug.into(),
            added_on_subject,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A permission held by a subject, hydrated with its definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectPermission {
    /// The permission definition.
    pub permission: Permission,
    /// Whether it was granted directly rather than through a role.
    pub added_on_subject: bool,
}

/// Narrows a subject's permissions by origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionFilter {
    /// Every materialized permission.
    #[default]
    All,
    /// Only permissions inherited from roles.
    Role,
    /// Only explicit grants.
    Explicit,
}

impl PermissionFilter {
    /// Check if a row with the given origin passes the filter.
    pub fn admits(&self, added_on_subject: bool) -> bool {
        match self {
            Self::All => true,
            Self::Role => !added_on_subject,
            Self::Explicit => added_on_subject,
        }
    }
}
