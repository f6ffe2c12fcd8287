//! Error types for access-control operations
//!
//! Callers must handle validation, not-found and duplicate errors; storage
//! failures are passed through unchanged. Idempotent outcomes (attaching a
//! role twice, detaching a role the subject does not hold) are not errors and
//! never show up here.

use thiserror::Error;

use crate::config::ConfigError;
use crate::definition::DefinitionKind;
use crate::slug::SlugKind;
use crate::store::StoreError;

/// Access-control error types.
#[derive(Debug, Error)]
pub enum RbacError {
    /// A slug, name or description failed charset or length validation.
    #[error("Invalid {kind}: {message}")]
    Validation {
        /// Which kind of value was rejected.
        kind: SlugKind,
        /// Human-readable explanation, including the allowed charset.
        message: String,
    },

    /// A query expression is malformed or uses unsupported syntax.
    #[error("Invalid slug expression: {0}")]
    InvalidExpression(String),

    /// A referenced role or permission does not exist.
    #[error("{kind} not found: {slug}")]
    NotFound {
        /// Role or permission.
        kind: DefinitionKind,
        /// The slug that was looked up.
        slug: String,
    },

    /// Creation collided with existing (or repeated) slugs.
    #[error("Cannot create {kind}: duplicate slugs {}", .slugs.join(", "))]
    DuplicateSlug {
        /// Role or permission.
        kind: DefinitionKind,
        /// The colliding slugs.
        slugs: Vec<String>,
    },

    /// Engine configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The storage collaborator failed.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Result type for access-control operations.
pub type RbacResult<T> = Result<T, RbacError>;

impl RbacError {
    pub(crate) fn validation(kind: SlugKind, message: impl Into<String>) -> Self {
        RbacError::Validation {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn not_found(kind: DefinitionKind, slug: impl Into<String>) -> Self {
        RbacError::NotFound {
            kind,
            slug: slug.into(),
        }
    }

    /// Check if this error was caused by caller input.
    ///
    /// Client errors are raised before any write reaches storage.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RbacError::Validation { .. }
                | RbacError::InvalidExpression(_)
                | RbacError::NotFound { .. }
                | RbacError::DuplicateSlug { .. }
        )
    }

    /// Check if this error should be logged at error level.
    pub fn is_server_error(&self) -> bool {
        matches!(self, RbacError::Config(_) | RbacError::Storage(_))
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            RbacError::Validation { .. } => "VALIDATION_ERROR",
            RbacError::InvalidExpression(_) => "INVALID_EXPRESSION",
            RbacError::NotFound { .. } => "NOT_FOUND",
            RbacError::DuplicateSlug { .. } => "DUPLICATE_SLUG",
            RbacError::Config(_) => "CONFIG_ERROR",
            RbacError::Storage(_) => "STORAGE_ERROR",
        }
    }
}
