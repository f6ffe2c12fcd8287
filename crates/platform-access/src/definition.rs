//! Role and permission definitions
//!
//! Both are identified by a globally unique slug and carry a display name and
//! a description. When a definition is created from its slug alone, the name
//! is derived from the slug and the description defaults to the name.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RbacResult;
use crate::slug::{validate_or_fail, SlugKind};

/// Which kind of definition an operation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    /// A role.
    Role,
    /// A permission.
    Permission,
}

impl DefinitionKind {
    /// Get a human-readable display name for the kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Role => "Role",
            Self::Permission => "Permission",
        }
    }
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A role: a named bundle of permissions that can be bound to subjects.
///
/// # Examples
///
/// ```
/// use platform_access::Role;
///
/// let role = Role::new("editor", "Editor", "Edits posts");
/// assert_eq!(role.to_string(), "editor");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role {
    /// Unique slug (primary key).
    pub slug: String,

    /// Display name.
    pub name: String,

    /// Description.
    pub description: String,
}

impl Role {
    /// Creates a role value. No validation is performed; use
    /// [`Catalog::create_role`](crate::Catalog::create_role) to persist one.
    pub fn new(
        slug: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.slug)
    }
}

/// A permission: the unit that authorization checks ask about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    /// Unique slug (primary key).
    pub slug: String,

    /// Display name.
    pub name: String,

    /// Description.
    pub description: String,
}

impl Permission {
    /// Creates a permission value. No validation is performed.
    pub fn new(
        slug: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.slug)
    }
}

/// Input for creating a role or permission.
///
/// Converts from a bare slug (`"post.edit"`), a `(slug, name)` pair or a
/// `(slug, name, description)` triple.
///
/// # Examples
///
/// ```
/// use platform_access::NewDefinition;
///
/// let def = NewDefinition::new("post.edit").with_description("Edit any post");
/// assert_eq!(def.slug, "post.edit");
/// assert!(def.name.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDefinition {
    /// Slug (required).
    pub slug: String,

    /// Display name; derived from the slug when absent.
    pub name: Option<String>,

    /// Description; defaults to the name when absent.
    pub description: Option<String>,
}

impl NewDefinition {
    /// Create input from a slug.
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: None,
            description: None,
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Validate and fill in defaults, returning `(slug, name, description)`.
    fn normalize(self) -> RbacResult<(String, String, String)> {
        validate_or_fail(&self.slug, SlugKind::Slug)?;

        let name = match self.name {
            Some(name) => name,
            None => derive_name(&self.slug),
        };
        validate_or_fail(&name, SlugKind::Name)?;

        let description = self.description.unwrap_or_else(|| name.clone());
        validate_or_fail(&description, SlugKind::Description)?;

        Ok((self.slug, name, description))
    }

    pub(crate) fn into_role(self) -> RbacResult<Role> {
        let (slug, name, description) = self.normalize()?;
        Ok(Role {
            slug,
            name,
            description,
        })
    }

    pub(crate) fn into_permission(self) -> RbacResult<Permission> {
        let (slug, name, description) = self.normalize()?;
        Ok(Permission {
            slug,
            name,
            description,
        })
    }
}

impl From<&str> for NewDefinition {
    fn from(slug: &str) -> Self {
        Self::new(slug)
    }
}

impl From<String> for NewDefinition {
    fn from(slug: String) -> Self {
        Self::new(slug)
    }
}

impl From<(&str, &str)> for NewDefinition {
    fn from((slug, name): (&str, &str)) -> Self {
        Self::new(slug).with_name(name)
    }
}

impl From<(&str, &str, &str)> for NewDefinition {
    fn from((slug, name, description): (&str, &str, &str)) -> Self {
        Self::new(slug).with_name(name).with_description(description)
    }
}

/// Derive a display name from a slug.
///
/// A single-segment slug has `_` replaced by spaces and every word
/// capitalised; a dotted slug has every segment capitalised and joined with
/// spaces.
///
/// # Examples
///
/// ```
/// use platform_access::definition::derive_name;
///
/// assert_eq!(derive_name("site_admin"), "Site Admin");
/// assert_eq!(derive_name("post.edit"), "Post Edit");
/// ```
pub fn derive_name(slug: &str) -> String {
    if slug.contains('.') {
        slug.split('.').map(capitalize).collect::<Vec<_>>().join(" ")
    } else {
        slug.replace('_', " ")
            .split(' ')
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RbacError;

    #[test]
    fn test_derive_name() {
        assert_eq!(derive_name("admin"), "Admin");
        assert_eq!(derive_name("site_admin"), "Site Admin");
        assert_eq!(derive_name("post.edit.title"), "Post Edit Title");
        assert_eq!(derive_name("blog_post.edit"), "Blog_post Edit");
        assert_eq!(derive_name("read-only"), "Read-only");
    }

    #[test]
    fn test_normalize_fills_defaults() {
        let role = NewDefinition::new("post.edit").into_role().unwrap();
        assert_eq!(role.slug, "post.edit");
        assert_eq!(role.name, "Post Edit");
        assert_eq!(role.description, "Post Edit");

        let permission = NewDefinition::from(("post.publish", "Publish", "Publish a post."))
            .into_permission()
            .unwrap();
        assert_eq!(permission.name, "Publish");
        assert_eq!(permission.description, "Publish a post.");
    }

    #[test]
    fn test_normalize_validates_each_field() {
        assert!(matches!(
            NewDefinition::new("Post.Edit").into_role(),
            Err(RbacError::Validation { kind: SlugKind::Slug, .. })
        ));
        assert!(matches!(
            NewDefinition::new("post.edit").with_name("Edit 2.0").into_role(),
            Err(RbacError::Validation { kind: SlugKind::Name, .. })
        ));
        assert!(matches!(
            NewDefinition::new("post.edit")
                .with_description("<b>edit</b>")
                .into_role(),
            Err(RbacError::Validation { kind: SlugKind::Description, .. })
        ));
    }

    #[test]
    fn test_display_is_slug() {
        let permission = Permission::new("post.edit", "Post Edit", "Post Edit");
        assert_eq!(permission.to_string(), "post.edit");
        assert_eq!(DefinitionKind::Permission.to_string(), "Permission");
    }

    #[test]
    fn test_role_serialization() {
        let role = Role::new("editor", "Editor", "Edits posts");
        let json = serde_json::to_value(&role).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"slug": "editor", "name": "Editor", "description": "Edits posts"})
        );
    }
}
