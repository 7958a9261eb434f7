//! Repository error taxonomy
//!
//! Every repository returns `RepoResult`. sqlx errors are translated exactly
//! once, where they leave the repository: constraint violations the caller can
//! act on become typed variants, everything else is kept as a storage failure
//! with context.

use sqlx::error::DatabaseError;

/// Errors surfaced by repositories
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The requested row does not exist
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// A unique index rejected the write (duplicate slug, email, ...)
    #[error("Duplicate value: {0}")]
    UniqueViolation(String),

    /// A foreign key rejected the write (dangling author, category, tag or post)
    #[error("Invalid reference: {0}")]
    ForeignKeyViolation(String),

    /// A guarded write found the row changed since it was read
    #[error("{entity} {key} changed concurrently")]
    Conflict { entity: &'static str, key: String },

    /// Any other database failure
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Result type for repository operations
pub type RepoResult<T> = std::result::Result<T, RepositoryError>;

impl RepositoryError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn conflict(entity: &'static str, key: impl ToString) -> Self {
        Self::Conflict {
            entity,
            key: key.to_string(),
        }
    }

    /// Translate a sqlx error, attaching `context` to anything that is not a
    /// known constraint violation.
    pub fn from_sqlx(err: sqlx::Error, context: &str) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(translated) = Self::from_constraint(db_err.as_ref(), context) {
                return translated;
            }
        }
        Self::Storage(anyhow::Error::new(err).context(context.to_string()))
    }

    fn from_constraint(db_err: &dyn DatabaseError, context: &str) -> Option<Self> {
        if db_err.is_unique_violation() {
            Some(Self::UniqueViolation(format!("{}: {}", context, db_err.message())))
        } else if db_err.is_foreign_key_violation() {
            Some(Self::ForeignKeyViolation(format!("{}: {}", context, db_err.message())))
        } else {
            None
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// `.db_context(..)` for sqlx results, mirroring `anyhow::Context`.
pub trait DbContext<T> {
    fn db_context(self, context: &str) -> RepoResult<T>;
}

impl<T> DbContext<T> for std::result::Result<T, sqlx::Error> {
    fn db_context(self, context: &str) -> RepoResult<T> {
        self.map_err(|e| RepositoryError::from_sqlx(e, context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations};

    #[tokio::test]
    async fn test_unique_violation_translated() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        let sqlite = pool.sqlite().unwrap();

        sqlx::query("INSERT INTO tags (name, slug) VALUES ('Rust', 'rust')")
            .execute(sqlite)
            .await
            .expect("first insert");
        let err = sqlx::query("INSERT INTO tags (name, slug) VALUES ('Rust 2', 'rust')")
            .execute(sqlite)
            .await
            .db_context("Failed to create tag")
            .unwrap_err();

        assert!(matches!(err, RepositoryError::UniqueViolation(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_foreign_key_violation_translated() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        let sqlite = pool.sqlite().unwrap();

        let err = sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES (404, 404)")
            .execute(sqlite)
            .await
            .db_context("Failed to link tag")
            .unwrap_err();

        assert!(matches!(err, RepositoryError::ForeignKeyViolation(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_other_errors_are_storage() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        let sqlite = pool.sqlite().unwrap();

        let err = sqlx::query("SELECT * FROM no_such_table")
            .fetch_all(sqlite)
            .await
            .map(|_| ())
            .db_context("Failed to list things")
            .unwrap_err();

        match err {
            RepositoryError::Storage(e) => assert!(e.to_string().contains("Failed to list things")),
            other => panic!("expected storage error, got {:?}", other),
        }
    }

    #[test]
    fn test_not_found_message() {
        let err = RepositoryError::not_found("Post", 42);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Post not found: 42");

        let err = RepositoryError::conflict("Post", 7);
        assert!(err.is_conflict());
        assert_eq!(err.to_string(), "Post 7 changed concurrently");
    }
}
