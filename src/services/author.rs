//! Author service
//!
//! Author profiles are bylines, not logins. An author cannot be deleted while
//! any of their posts is live; their drafts and unpublished posts are kept
//! and lose the byline.

use std::sync::Arc;

use crate::db::repositories::{AuthorRepository, PostRepository};
use crate::models::{is_valid_social, Author, CreateAuthorInput, UpdateAuthorInput};

use super::error::{ServiceError, ServiceResult};

pub struct AuthorService {
    authors: Arc<dyn AuthorRepository>,
    posts: Arc<dyn PostRepository>,
}

impl AuthorService {
    pub fn new(authors: Arc<dyn AuthorRepository>, posts: Arc<dyn PostRepository>) -> Self {
        Self { authors, posts }
    }

    pub async fn create(&self, input: CreateAuthorInput) -> ServiceResult<Author> {
        let mut input = input;
        input.name = validate_name(&input.name)?;
        if let Some(social) = &input.social {
            validate_social(social)?;
        }

        let author = self.authors.create(&input).await?;
        tracing::info!("Created author {} ({})", author.id, author.name);
        Ok(author)
    }

    pub async fn get_by_id(&self, id: i64) -> ServiceResult<Author> {
        self.authors
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Author", id))
    }

    pub async fn list(&self) -> ServiceResult<Vec<Author>> {
        Ok(self.authors.list().await?)
    }

    pub async fn update(&self, id: i64, input: UpdateAuthorInput) -> ServiceResult<Author> {
        let mut input = input;
        if let Some(name) = &input.name {
            input.name = Some(validate_name(name)?);
        }
        if let Some(social) = &input.social {
            validate_social(social)?;
        }
        Ok(self.authors.update(id, &input).await?)
    }

    /// Delete an author that has no live posts
    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        // existence first, so a missing author is 404 rather than 409
        self.get_by_id(id).await?;

        let count = self.posts.count_live_by_author(id).await?;
        if count > 0 {
            tracing::warn!("Refusing to delete author {} with {} live posts", id, count);
            return Err(ServiceError::AuthorHasPublishedPosts { author_id: id, count });
        }

        self.authors.delete(id).await?;
        tracing::info!("Deleted author {}", id);
        Ok(())
    }
}

fn validate_name(name: &str) -> ServiceResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::validation("Author name cannot be empty"));
    }
    Ok(name.to_string())
}

fn validate_social(social: &serde_json::Value) -> ServiceResult<()> {
    if !is_valid_social(social) {
        return Err(ServiceError::validation("Social links must be a JSON object"));
    }
    Ok(())
}
