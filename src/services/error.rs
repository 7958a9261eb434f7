//! Service error type
//!
//! Shared by every service. Repository errors are folded in here so handlers
//! only ever see one error type.

use crate::db::RepositoryError;
use crate::models::PostStatus;

/// Errors returned by services
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Requested entity does not exist
    #[error("{0}")]
    NotFound(String),

    /// Input rejected before touching storage
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A unique value (slug, email) is already taken
    #[error("Already exists: {0}")]
    Duplicate(String),

    /// A referenced author, category, tag or post does not exist
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// The status change is not in the transition table
    #[error("Cannot change status from {from} to {to}")]
    InvalidStatusTransition { from: PostStatus, to: PostStatus },

    /// Authors with live posts cannot be deleted
    #[error("Author {author_id} still has {count} published posts")]
    AuthorHasPublishedPosts { author_id: i64, count: i64 },

    /// The row kept changing under a guarded update
    #[error("{0}")]
    Conflict(String),

    /// Feature switched off by a site setting
    #[error("{0}")]
    Disabled(String),

    /// Wrong email or password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { .. } => ServiceError::NotFound(err.to_string()),
            RepositoryError::UniqueViolation(msg) => ServiceError::Duplicate(msg),
            RepositoryError::ForeignKeyViolation(msg) => ServiceError::InvalidReference(msg),
            RepositoryError::Conflict { .. } => ServiceError::Conflict(err.to_string()),
            RepositoryError::Storage(e) => ServiceError::InternalError(e),
        }
    }
}

impl ServiceError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ServiceError::ValidationError(msg.into())
    }

    pub fn not_found(entity: &str, key: impl std::fmt::Display) -> Self {
        ServiceError::NotFound(format!("{} not found: {}", entity, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_errors_map_to_service_errors() {
        let err: ServiceError = RepositoryError::not_found("Tag", 3).into();
        assert!(matches!(err, ServiceError::NotFound(ref m) if m == "Tag not found: 3"));

        let err: ServiceError = RepositoryError::UniqueViolation("slug".into()).into();
        assert!(matches!(err, ServiceError::Duplicate(_)));

        let err: ServiceError = RepositoryError::ForeignKeyViolation("tag".into()).into();
        assert!(matches!(err, ServiceError::InvalidReference(_)));

        let err: ServiceError = RepositoryError::conflict("Post", 1).into();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let err: ServiceError = RepositoryError::Storage(anyhow::anyhow!("disk full")).into();
        assert!(matches!(err, ServiceError::InternalError(_)));
    }

    #[test]
    fn test_transition_message() {
        let err = ServiceError::InvalidStatusTransition {
            from: PostStatus::Draft,
            to: PostStatus::Corrected,
        };
        assert_eq!(err.to_string(), "Cannot change status from DRAFT to CORRECTED");
    }
}
