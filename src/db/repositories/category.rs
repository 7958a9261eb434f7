//! Category repository
//!
//! Database operations for categories.

use crate::config::DatabaseDriver;
use crate::db::error::{DbContext, RepoResult, RepositoryError};
use crate::db::DynDatabasePool;
use crate::models::{
    Category, CategoryWithCount, CreateCategoryInput, PostStatus, UpdateCategoryInput,
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use super::in_placeholders;

/// Category repository trait
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create(&self, input: &CreateCategoryInput) -> RepoResult<Category>;

    async fn get_by_id(&self, id: i64) -> RepoResult<Option<Category>>;

    async fn get_by_slug(&self, slug: &str) -> RepoResult<Option<Category>>;

    /// Fetch every category whose id is in `ids` with one query
    async fn get_by_ids(&self, ids: &[i64]) -> RepoResult<Vec<Category>>;

    async fn list(&self) -> RepoResult<Vec<Category>>;

    /// Categories with the number of live posts filed under each
    async fn list_with_counts(&self) -> RepoResult<Vec<CategoryWithCount>>;

    async fn update(&self, id: i64, input: &UpdateCategoryInput) -> RepoResult<Category>;

    /// Delete a category. Posts filed under it keep existing with no category.
    async fn delete(&self, id: i64) -> RepoResult<()>;
}

/// SQLx-based category repository
pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_COLUMNS: &str = "SELECT id, name, slug, created_at FROM categories";

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(&self, input: &CreateCategoryInput) -> RepoResult<Category> {
        let now = Utc::now();
        let sql = "INSERT INTO categories (name, slug, created_at) VALUES (?, ?, ?)";
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&input.name)
                .bind(&input.slug)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .db_context("Failed to create category")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(&input.name)
                .bind(&input.slug)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .db_context("Failed to create category")?
                .last_insert_id() as i64,
        };

        Ok(Category {
            id,
            name: input.name.clone(),
            slug: input.slug.clone(),
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> RepoResult<Option<Category>> {
        let sql = format!("{} WHERE id = ?", SELECT_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_one_sqlite(self.pool.sqlite()?, &sql, id).await,
            DatabaseDriver::Mysql => fetch_one_mysql(self.pool.mysql()?, &sql, id).await,
        }
    }

    async fn get_by_slug(&self, slug: &str) -> RepoResult<Option<Category>> {
        let sql = format!("{} WHERE slug = ?", SELECT_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_one_sqlite(self.pool.sqlite()?, &sql, slug).await,
            DatabaseDriver::Mysql => fetch_one_mysql(self.pool.mysql()?, &sql, slug).await,
        }
    }

    async fn get_by_ids(&self, ids: &[i64]) -> RepoResult<Vec<Category>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("{} WHERE id IN ({})", SELECT_COLUMNS, in_placeholders(ids.len()));
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(&sql);
                for id in ids {
                    query = query.bind(id);
                }
                let rows = query
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .db_context("Failed to batch-load categories")?;
                Ok(rows.iter().map(row_to_category_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query(&sql);
                for id in ids {
                    query = query.bind(id);
                }
                let rows = query
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .db_context("Failed to batch-load categories")?;
                Ok(rows.iter().map(row_to_category_mysql).collect())
            }
        }
    }

    async fn list(&self) -> RepoResult<Vec<Category>> {
        let sql = format!("{} ORDER BY name", SELECT_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .db_context("Failed to list categories")?;
                Ok(rows.iter().map(row_to_category_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .db_context("Failed to list categories")?;
                Ok(rows.iter().map(row_to_category_mysql).collect())
            }
        }
    }

    async fn list_with_counts(&self) -> RepoResult<Vec<CategoryWithCount>> {
        let live = PostStatus::live()
            .iter()
            .map(|s| format!("'{}'", s.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            r#"
            SELECT c.id, c.name, c.slug, c.created_at, COUNT(p.id) AS post_count
            FROM categories c
            LEFT JOIN posts p ON p.category_id = c.id AND p.status IN ({})
            GROUP BY c.id, c.name, c.slug, c.created_at
            ORDER BY c.name
            "#,
            live
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .db_context("Failed to list categories with counts")?;
                Ok(rows
                    .iter()
                    .map(|row| CategoryWithCount {
                        category: row_to_category_sqlite(row),
                        post_count: row.get("post_count"),
                    })
                    .collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .db_context("Failed to list categories with counts")?;
                Ok(rows
                    .iter()
                    .map(|row| CategoryWithCount {
                        category: row_to_category_mysql(row),
                        post_count: row.get("post_count"),
                    })
                    .collect())
            }
        }
    }

    async fn update(&self, id: i64, input: &UpdateCategoryInput) -> RepoResult<Category> {
        let existing = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Category", id))?;

        let name = input.name.clone().unwrap_or_else(|| existing.name.clone());
        let slug = input.slug.clone().unwrap_or_else(|| existing.slug.clone());

        let sql = "UPDATE categories SET name = ?, slug = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(&name)
                    .bind(&slug)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .db_context("Failed to update category")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(&name)
                    .bind(&slug)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .db_context("Failed to update category")?;
            }
        }

        Ok(Category {
            name,
            slug,
            ..existing
        })
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        let sql = "DELETE FROM categories WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .db_context("Failed to delete category")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .db_context("Failed to delete category")?
                .rows_affected(),
        };
        if affected == 0 {
            return Err(RepositoryError::not_found("Category", id));
        }
        Ok(())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn fetch_one_sqlite<'q, T>(pool: &SqlitePool, sql: &'q str, key: T) -> RepoResult<Option<Category>>
where
    T: 'q + Send + sqlx::Encode<'q, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    let row = sqlx::query(sql)
        .bind(key)
        .fetch_optional(pool)
        .await
        .db_context("Failed to get category")?;
    Ok(row.as_ref().map(row_to_category_sqlite))
}

fn row_to_category_sqlite(row: &sqlx::sqlite::SqliteRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn fetch_one_mysql<'q, T>(pool: &MySqlPool, sql: &'q str, key: T) -> RepoResult<Option<Category>>
where
    T: 'q + Send + sqlx::Encode<'q, sqlx::MySql> + sqlx::Type<sqlx::MySql>,
{
    let row = sqlx::query(sql)
        .bind(key)
        .fetch_optional(pool)
        .await
        .db_context("Failed to get category")?;
    Ok(row.as_ref().map(row_to_category_mysql))
}

fn row_to_category_mysql(row: &sqlx::mysql::MySqlRow) -> Category {
    Category {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxCategoryRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        let repo = SqlxCategoryRepository::new(pool.clone());
        (pool, repo)
    }

    fn input(name: &str, slug: &str) -> CreateCategoryInput {
        CreateCategoryInput {
            name: name.into(),
            slug: slug.into(),
        }
    }

    #[tokio::test]
    async fn test_create_get_list() {
        let (_pool, repo) = setup_test_repo().await;
        let news = repo.create(&input("News", "news")).await.unwrap();
        repo.create(&input("Essays", "essays")).await.unwrap();

        assert_eq!(repo.get_by_id(news.id).await.unwrap().unwrap().slug, "news");
        assert_eq!(repo.get_by_slug("news").await.unwrap().unwrap().id, news.id);

        let names: Vec<_> = repo.list().await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Essays", "News"]);
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&input("News", "news")).await.unwrap();
        let err = repo.create(&input("More news", "news")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let (_pool, repo) = setup_test_repo().await;
        let cat = repo.create(&input("News", "news")).await.unwrap();
        let updated = repo
            .update(
                cat.id,
                &UpdateCategoryInput {
                    name: None,
                    slug: Some("latest".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "News");
        assert_eq!(updated.slug, "latest");
        assert!(repo.get_by_slug("news").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_detaches_posts() {
        let (pool, repo) = setup_test_repo().await;
        let sqlite = pool.sqlite().unwrap();
        let cat = repo.create(&input("News", "news")).await.unwrap();
        let post_id = sqlx::query(
            "INSERT INTO posts (title, slug, content, status, category_id) VALUES ('t', 't', 'c', 'PUBLISHED', ?)",
        )
        .bind(cat.id)
        .execute(sqlite)
        .await
        .unwrap()
        .last_insert_rowid();

        assert_eq!(repo.list_with_counts().await.unwrap()[0].post_count, 1);

        repo.delete(cat.id).await.unwrap();
        let category_id: Option<i64> = sqlx::query_scalar("SELECT category_id FROM posts WHERE id = ?")
            .bind(post_id)
            .fetch_one(sqlite)
            .await
            .unwrap();
        assert_eq!(category_id, None);
        assert!(repo.delete(cat.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_get_by_ids_empty_and_unknown() {
        let (_pool, repo) = setup_test_repo().await;
        let cat = repo.create(&input("News", "news")).await.unwrap();
        assert!(repo.get_by_ids(&[]).await.unwrap().is_empty());
        let found = repo.get_by_ids(&[cat.id, 12345]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, cat.id);
    }
}
