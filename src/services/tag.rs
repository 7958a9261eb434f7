//! Tag service
//!
//! Tag CRUD plus the tag cloud. Post-tag links are managed by the post
//! service.

use std::sync::Arc;

use crate::db::repositories::TagRepository;
use crate::models::{CreateTagInput, Tag, TagWithCount, UpdateTagInput};

use super::error::{ServiceError, ServiceResult};
use super::slug::resolve_slug;

pub struct TagService {
    repo: Arc<dyn TagRepository>,
}

impl TagService {
    pub fn new(repo: Arc<dyn TagRepository>) -> Self {
        Self { repo }
    }

    pub async fn create(&self, input: CreateTagInput) -> ServiceResult<Tag> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::validation("Tag name cannot be empty"));
        }
        let slug = resolve_slug(&input.slug, &name)?;

        let tag = self.repo.create(&CreateTagInput { name, slug }).await?;
        tracing::debug!("Created tag {} ({})", tag.id, tag.slug);
        Ok(tag)
    }

    pub async fn get_by_id(&self, id: i64) -> ServiceResult<Tag> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Tag", id))
    }

    pub async fn find_by_slug(&self, slug: &str) -> ServiceResult<Option<Tag>> {
        Ok(self.repo.get_by_slug(slug).await?)
    }

    pub async fn list(&self) -> ServiceResult<Vec<Tag>> {
        Ok(self.repo.list().await?)
    }

    /// Tag cloud: live post counts, most used first
    pub async fn cloud(&self) -> ServiceResult<Vec<TagWithCount>> {
        let mut tags = self.repo.list_with_counts().await?;
        tags.sort_by(|a, b| {
            b.post_count
                .cmp(&a.post_count)
                .then_with(|| a.tag.name.cmp(&b.tag.name))
        });
        Ok(tags)
    }

    pub async fn update(&self, id: i64, input: UpdateTagInput) -> ServiceResult<Tag> {
        let existing = self.get_by_id(id).await?;

        let name = match input.name {
            Some(name) if name.trim().is_empty() => {
                return Err(ServiceError::validation("Tag name cannot be empty"))
            }
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };
        let slug = match input.slug {
            Some(slug) => Some(resolve_slug(&slug, name.as_deref().unwrap_or(&existing.name))?),
            None => None,
        };

        Ok(self.repo.update(id, &UpdateTagInput { name, slug }).await?)
    }

    /// Delete a tag and, through the schema, its post links
    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        self.repo.delete(id).await?;
        tracing::info!("Deleted tag {}", id);
        Ok(())
    }
}
