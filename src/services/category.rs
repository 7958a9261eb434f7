//! Category service

use std::sync::Arc;

use crate::db::repositories::CategoryRepository;
use crate::models::{Category, CategoryWithCount, CreateCategoryInput, UpdateCategoryInput};

use super::error::{ServiceError, ServiceResult};
use super::slug::resolve_slug;

pub struct CategoryService {
    repo: Arc<dyn CategoryRepository>,
}

impl CategoryService {
    pub fn new(repo: Arc<dyn CategoryRepository>) -> Self {
        Self { repo }
    }

    /// Create a category. The slug is derived from the name when blank.
    pub async fn create(&self, input: CreateCategoryInput) -> ServiceResult<Category> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::validation("Category name cannot be empty"));
        }
        let slug = resolve_slug(&input.slug, &name)?;

        let category = self.repo.create(&CreateCategoryInput { name, slug }).await?;
        tracing::info!("Created category {} ({})", category.id, category.slug);
        Ok(category)
    }

    pub async fn get_by_id(&self, id: i64) -> ServiceResult<Category> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Category", id))
    }

    /// Lookup used by public filters; an unknown slug is not an error
    pub async fn find_by_slug(&self, slug: &str) -> ServiceResult<Option<Category>> {
        Ok(self.repo.get_by_slug(slug).await?)
    }

    pub async fn list(&self) -> ServiceResult<Vec<Category>> {
        Ok(self.repo.list().await?)
    }

    /// Categories with their number of live posts
    pub async fn list_with_counts(&self) -> ServiceResult<Vec<CategoryWithCount>> {
        Ok(self.repo.list_with_counts().await?)
    }

    pub async fn update(&self, id: i64, input: UpdateCategoryInput) -> ServiceResult<Category> {
        let existing = self.get_by_id(id).await?;

        let name = match input.name {
            Some(name) if name.trim().is_empty() => {
                return Err(ServiceError::validation("Category name cannot be empty"))
            }
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };
        let slug = match input.slug {
            Some(slug) => Some(resolve_slug(&slug, name.as_deref().unwrap_or(&existing.name))?),
            None => None,
        };

        Ok(self.repo.update(id, &UpdateCategoryInput { name, slug }).await?)
    }

    /// Delete a category. Its posts stay and become uncategorized.
    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        self.repo.delete(id).await?;
        tracing::info!("Deleted category {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxCategoryRepository;
    use crate::db::{create_test_pool, migrations::run_migrations};

    async fn setup() -> CategoryService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        CategoryService::new(SqlxCategoryRepository::boxed(pool))
    }

    fn input(name: &str, slug: &str) -> CreateCategoryInput {
        CreateCategoryInput {
            name: name.to_string(),
            slug: slug.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_generates_slug() {
        let service = setup().await;
        let category = service.create(input("Release Notes", "")).await.unwrap();
        assert_eq!(category.slug, "release-notes");

        let found = service.find_by_slug("release-notes").await.unwrap();
        assert_eq!(found.map(|c| c.id), Some(category.id));
        assert!(service.find_by_slug("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name_and_duplicates() {
        let service = setup().await;
        assert!(matches!(
            service.create(input(" ", "x")).await.unwrap_err(),
            ServiceError::ValidationError(_)
        ));

        service.create(input("News", "news")).await.unwrap();
        assert!(matches!(
            service.create(input("News again", "news")).await.unwrap_err(),
            ServiceError::Duplicate(_)
        ));
    }

    #[tokio::test]
    async fn test_update() {
        let service = setup().await;
        let category = service.create(input("News", "news")).await.unwrap();

        let updated = service
            .update(
                category.id,
                UpdateCategoryInput {
                    name: Some("World News".into()),
                    slug: Some(String::new()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "World News");
        assert_eq!(updated.slug, "world-news");

        let err = service
            .update(999, UpdateCategoryInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
