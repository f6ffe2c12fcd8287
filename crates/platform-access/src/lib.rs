//! # Platform Access
//!
//! Role and permission bindings for the Relay platform, with a materialized
//! per-subject permission view.
//!
//! ## Overview
//!
//! The platform-access crate handles:
//! - **Definitions**: Roles and permissions, each identified by a slug
//! - **Role grants**: Which permissions each role grants
//! - **Bindings**: Roles and explicit permissions attached to subjects
//! - **Queries**: `is` (role) and `can` (permission) checks with wildcards
//!
//! ## Architecture
//!
//! ```text
//! role ──grants──> permission
//!   │                  │
//!   └── subject_role   └── subject_permission (materialized, origin flag)
//!
//! can(subject, "post.edit.*")  ->  one lookup on subject_permission
//! ```
//!
//! Every subject carries one materialized row per permission it holds,
//! whether the permission came from a role or an explicit grant. Attaching
//! or detaching roles, and changing a role's grants, recompute only the
//! permissions unique to the role so that overlapping roles and explicit
//! grants are never lost.
//!
//! ## Slug Expressions
//!
//! Queries accept one string or a list of strings:
//!
//! ```text
//! "editor"                 - exact slug
//! "admin|editor"           - either slug
//! "post.edit.*"            - any slug starting with "post.edit."
//! ["post.edit", "post.*"]  - list form, one term per element
//! ```
//!
//! ## Features
//!
//! - `sqlite`: SQLite storage via sqlx
//!
//! Without features, [`MemoryStore`] is the only backend.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use platform_access::{MemoryStore, PermissionFilter, Rbac, RbacConfig, SubjectId};
//! use std::sync::Arc;
//!
//! # async fn example() -> platform_access::RbacResult<()> {
//! let rbac = Rbac::new(Arc::new(MemoryStore::new()), RbacConfig::from_env())?;
//!
//! // Define roles and permissions
//! rbac.catalog().create_permissions(["post.edit", "post.publish"]).await?;
//! rbac.catalog().create_role(("editor", "Editor")).await?;
//! rbac.catalog().attach_role_permissions("editor", ["post.edit"]).await?;
//!
//! // Bind them to a subject
//! let user = SubjectId::new("user-1");
//! rbac.role_bindings().attach_role(&user, "editor").await?;
//! rbac.permission_bindings().attach_permission(&user, "post.publish").await?;
//!
//! // Check
//! assert!(rbac.query().is(&user, "admin|editor").await?);
//! assert!(rbac.query().can(&user, "post.*").await?);
//!
//! let explicit = rbac.query().get_permissions(&user, PermissionFilter::Explicit).await?;
//! assert_eq!(explicit.len(), 1);
//! # Ok(())
//! # }
//! ```

mod backend;
pub mod cache;
pub mod calculator;
pub mod catalog;
pub mod config;
pub mod definition;
pub mod engine;
pub mod error;
pub mod permission_binding;
pub mod query;
pub mod role_binding;
pub mod session;
pub mod slug;
pub mod store;
pub mod subject;

// Re-export main types for convenience
pub use cache::SubjectPermissionCache;
pub use calculator::{GrantState, PermissionSet, PermissionSetCalculator};
pub use catalog::Catalog;
pub use config::{ConfigError, RbacConfig, SchemaConfig};
pub use definition::{DefinitionKind, NewDefinition, Permission, Role};
pub use engine::Rbac;
pub use error::{RbacError, RbacResult};
pub use permission_binding::PermissionBindingManager;
pub use query::AuthorizationQuery;
pub use role_binding::RoleBindingManager;
pub use session::SubjectSession;
pub use slug::{IntoSlugExpression, SlugExpression, SlugKind, SlugPredicate};
pub use store::memory::MemoryStore;
pub use store::{RbacStore, StoreError, StoreResult, StoreTransaction};
pub use subject::{
    PermissionFilter, RolePermissionAssignment, Subject, SubjectId, SubjectPermission,
    SubjectPermissionBinding, SubjectRoleBinding,
};

#[cfg(feature = "sqlite")]
pub use store::sqlite::SqliteStore;
