//! Tag repository
//!
//! Database operations for tags.
//!
//! This module provides:
//! - `TagRepository` trait defining the interface for tag data access
//! - `SqlxTagRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::error::{DbContext, RepoResult, RepositoryError};
use crate::db::DynDatabasePool;
use crate::models::{CreateTagInput, PostStatus, Tag, TagWithCount, UpdateTagInput};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use super::in_placeholders;

/// Tag repository trait
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Create a new tag. `input.slug` must already be resolved.
    async fn create(&self, input: &CreateTagInput) -> RepoResult<Tag>;

    /// Get tag by ID
    async fn get_by_id(&self, id: i64) -> RepoResult<Option<Tag>>;

    /// Get tag by slug
    async fn get_by_slug(&self, slug: &str) -> RepoResult<Option<Tag>>;

    /// Fetch every tag whose id is in `ids` with one query. Unknown ids are skipped.
    async fn get_by_ids(&self, ids: &[i64]) -> RepoResult<Vec<Tag>>;

    /// List all tags ordered by name
    async fn list(&self) -> RepoResult<Vec<Tag>>;

    /// List all tags with the number of live posts carrying each
    async fn list_with_counts(&self) -> RepoResult<Vec<TagWithCount>>;

    /// Update a tag
    async fn update(&self, id: i64, input: &UpdateTagInput) -> RepoResult<Tag>;

    /// Delete a tag. Its junction rows go with it.
    async fn delete(&self, id: i64) -> RepoResult<()>;
}

/// SQLx-based tag repository implementation
pub struct SqlxTagRepository {
    pool: DynDatabasePool,
}

impl SqlxTagRepository {
    /// Create a new SQLx tag repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn create(&self, input: &CreateTagInput) -> RepoResult<Tag> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_tag_sqlite(self.pool.sqlite()?, input).await,
            DatabaseDriver::Mysql => create_tag_mysql(self.pool.mysql()?, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> RepoResult<Option<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_tag_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_tag_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn get_by_slug(&self, slug: &str) -> RepoResult<Option<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_tag_by_slug_sqlite(self.pool.sqlite()?, slug).await,
            DatabaseDriver::Mysql => get_tag_by_slug_mysql(self.pool.mysql()?, slug).await,
        }
    }

    async fn get_by_ids(&self, ids: &[i64]) -> RepoResult<Vec<Tag>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_tags_by_ids_sqlite(self.pool.sqlite()?, ids).await,
            DatabaseDriver::Mysql => get_tags_by_ids_mysql(self.pool.mysql()?, ids).await,
        }
    }

    async fn list(&self) -> RepoResult<Vec<Tag>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_tags_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => list_tags_mysql(self.pool.mysql()?).await,
        }
    }

    async fn list_with_counts(&self) -> RepoResult<Vec<TagWithCount>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_tags_with_counts_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => list_tags_with_counts_mysql(self.pool.mysql()?).await,
        }
    }

    async fn update(&self, id: i64, input: &UpdateTagInput) -> RepoResult<Tag> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_tag_sqlite(self.pool.sqlite()?, id, input).await,
            DatabaseDriver::Mysql => update_tag_mysql(self.pool.mysql()?, id, input).await,
        }
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM tags WHERE id = ?")
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .db_context("Failed to delete tag")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM tags WHERE id = ?")
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .db_context("Failed to delete tag")?
                .rows_affected(),
        };
        if affected == 0 {
            return Err(RepositoryError::not_found("Tag", id));
        }
        Ok(())
    }
}

/// Live statuses rendered as a SQL list, e.g. `'PUBLISHED', 'CORRECTED'`
fn live_status_list() -> String {
    PostStatus::live()
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_tag_sqlite(pool: &SqlitePool, input: &CreateTagInput) -> RepoResult<Tag> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO tags (name, slug, created_at) VALUES (?, ?, ?)")
        .bind(&input.name)
        .bind(&input.slug)
        .bind(now)
        .execute(pool)
        .await
        .db_context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_rowid(),
        name: input.name.clone(),
        slug: input.slug.clone(),
        created_at: now,
    })
}

async fn get_tag_by_id_sqlite(pool: &SqlitePool, id: i64) -> RepoResult<Option<Tag>> {
    let row = sqlx::query("SELECT id, name, slug, created_at FROM tags WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .db_context("Failed to get tag by id")?;
    Ok(row.as_ref().map(row_to_tag_sqlite))
}

async fn get_tag_by_slug_sqlite(pool: &SqlitePool, slug: &str) -> RepoResult<Option<Tag>> {
    let row = sqlx::query("SELECT id, name, slug, created_at FROM tags WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await
        .db_context("Failed to get tag by slug")?;
    Ok(row.as_ref().map(row_to_tag_sqlite))
}

async fn get_tags_by_ids_sqlite(pool: &SqlitePool, ids: &[i64]) -> RepoResult<Vec<Tag>> {
    let sql = format!(
        "SELECT id, name, slug, created_at FROM tags WHERE id IN ({}) ORDER BY name",
        in_placeholders(ids.len())
    );
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .db_context("Failed to batch-load tags")?;
    Ok(rows.iter().map(row_to_tag_sqlite).collect())
}

async fn list_tags_sqlite(pool: &SqlitePool) -> RepoResult<Vec<Tag>> {
    let rows = sqlx::query("SELECT id, name, slug, created_at FROM tags ORDER BY name")
        .fetch_all(pool)
        .await
        .db_context("Failed to list tags")?;
    Ok(rows.iter().map(row_to_tag_sqlite).collect())
}

async fn list_tags_with_counts_sqlite(pool: &SqlitePool) -> RepoResult<Vec<TagWithCount>> {
    let sql = format!(
        r#"
        SELECT t.id, t.name, t.slug, t.created_at, COUNT(p.id) AS post_count
        FROM tags t
        LEFT JOIN post_tags pt ON pt.tag_id = t.id
        LEFT JOIN posts p ON p.id = pt.post_id AND p.status IN ({})
        GROUP BY t.id, t.name, t.slug, t.created_at
        ORDER BY t.name
        "#,
        live_status_list()
    );
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .db_context("Failed to list tags with counts")?;
    Ok(rows
        .iter()
        .map(|row| TagWithCount {
            tag: row_to_tag_sqlite(row),
            post_count: row.get("post_count"),
        })
        .collect())
}

async fn update_tag_sqlite(pool: &SqlitePool, id: i64, input: &UpdateTagInput) -> RepoResult<Tag> {
    let existing = get_tag_by_id_sqlite(pool, id)
        .await?
        .ok_or_else(|| RepositoryError::not_found("Tag", id))?;

    let name = input.name.as_ref().unwrap_or(&existing.name);
    let slug = input.slug.as_ref().unwrap_or(&existing.slug);

    sqlx::query("UPDATE tags SET name = ?, slug = ? WHERE id = ?")
        .bind(name)
        .bind(slug)
        .bind(id)
        .execute(pool)
        .await
        .db_context("Failed to update tag")?;

    Ok(Tag {
        name: name.clone(),
        slug: slug.clone(),
        ..existing
    })
}

fn row_to_tag_sqlite(row: &sqlx::sqlite::SqliteRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_tag_mysql(pool: &MySqlPool, input: &CreateTagInput) -> RepoResult<Tag> {
    let now = Utc::now();
    let result = sqlx::query("INSERT INTO tags (name, slug, created_at) VALUES (?, ?, ?)")
        .bind(&input.name)
        .bind(&input.slug)
        .bind(now)
        .execute(pool)
        .await
        .db_context("Failed to create tag")?;

    Ok(Tag {
        id: result.last_insert_id() as i64,
        name: input.name.clone(),
        slug: input.slug.clone(),
        created_at: now,
    })
}

async fn get_tag_by_id_mysql(pool: &MySqlPool, id: i64) -> RepoResult<Option<Tag>> {
    let row = sqlx::query("SELECT id, name, slug, created_at FROM tags WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .db_context("Failed to get tag by id")?;
    Ok(row.as_ref().map(row_to_tag_mysql))
}

async fn get_tag_by_slug_mysql(pool: &MySqlPool, slug: &str) -> RepoResult<Option<Tag>> {
    let row = sqlx::query("SELECT id, name, slug, created_at FROM tags WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await
        .db_context("Failed to get tag by slug")?;
    Ok(row.as_ref().map(row_to_tag_mysql))
}

async fn get_tags_by_ids_mysql(pool: &MySqlPool, ids: &[i64]) -> RepoResult<Vec<Tag>> {
    let sql = format!(
        "SELECT id, name, slug, created_at FROM tags WHERE id IN ({}) ORDER BY name",
        in_placeholders(ids.len())
    );
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .db_context("Failed to batch-load tags")?;
    Ok(rows.iter().map(row_to_tag_mysql).collect())
}

async fn list_tags_mysql(pool: &MySqlPool) -> RepoResult<Vec<Tag>> {
    let rows = sqlx::query("SELECT id, name, slug, created_at FROM tags ORDER BY name")
        .fetch_all(pool)
        .await
        .db_context("Failed to list tags")?;
    Ok(rows.iter().map(row_to_tag_mysql).collect())
}

async fn list_tags_with_counts_mysql(pool: &MySqlPool) -> RepoResult<Vec<TagWithCount>> {
    let sql = format!(
        r#"
        SELECT t.id, t.name, t.slug, t.created_at, COUNT(p.id) AS post_count
        FROM tags t
        LEFT JOIN post_tags pt ON pt.tag_id = t.id
        LEFT JOIN posts p ON p.id = pt.post_id AND p.status IN ({})
        GROUP BY t.id, t.name, t.slug, t.created_at
        ORDER BY t.name
        "#,
        live_status_list()
    );
    let rows = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .db_context("Failed to list tags with counts")?;
    Ok(rows
        .iter()
        .map(|row| TagWithCount {
            tag: row_to_tag_mysql(row),
            post_count: row.get("post_count"),
        })
        .collect())
}

async fn update_tag_mysql(pool: &MySqlPool, id: i64, input: &UpdateTagInput) -> RepoResult<Tag> {
    let existing = get_tag_by_id_mysql(pool, id)
        .await?
        .ok_or_else(|| RepositoryError::not_found("Tag", id))?;

    let name = input.name.as_ref().unwrap_or(&existing.name);
    let slug = input.slug.as_ref().unwrap_or(&existing.slug);

    sqlx::query("UPDATE tags SET name = ?, slug = ? WHERE id = ?")
        .bind(name)
        .bind(slug)
        .bind(id)
        .execute(pool)
        .await
        .db_context("Failed to update tag")?;

    Ok(Tag {
        name: name.clone(),
        slug: slug.clone(),
        ..existing
    })
}

fn row_to_tag_mysql(row: &sqlx::mysql::MySqlRow) -> Tag {
    Tag {
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

    async fn setup_test_repo() -> (DynDatabasePool, SqlxTagRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        let repo = SqlxTagRepository::new(pool.clone());
        (pool, repo)
    }

    fn tag_input(name: &str, slug: &str) -> CreateTagInput {
        CreateTagInput {
            name: name.to_string(),
            slug: slug.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_tag() {
        let (_pool, repo) = setup_test_repo().await;

        let created = repo.create(&tag_input("Rust", "rust")).await.expect("Failed to create tag");
        assert!(created.id > 0);

        let by_id = repo.get_by_id(created.id).await.unwrap().expect("tag by id");
        let by_slug = repo.get_by_slug("rust").await.unwrap().expect("tag by slug");
        assert_eq!(by_id.name, "Rust");
        assert_eq!(by_slug.id, created.id);
        assert!(repo.get_by_slug("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_unique_violation() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&tag_input("Rust", "rust")).await.unwrap();

        let err = repo.create(&tag_input("Rust again", "rust")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn test_get_by_ids_skips_unknown() {
        let (_pool, repo) = setup_test_repo().await;
        let a = repo.create(&tag_input("Async", "async")).await.unwrap();
        let b = repo.create(&tag_input("Borrowing", "borrowing")).await.unwrap();

        let tags = repo.get_by_ids(&[b.id, 999, a.id]).await.unwrap();
        let names: Vec<_> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Async", "Borrowing"]);

        assert!(repo.get_by_ids(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete_tag() {
        let (_pool, repo) = setup_test_repo().await;
        let tag = repo.create(&tag_input("Rust", "rust")).await.unwrap();

        let updated = repo
            .update(
                tag.id,
                &UpdateTagInput {
                    name: Some("Rust Lang".into()),
                    slug: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Rust Lang");
        assert_eq!(updated.slug, "rust");

        repo.delete(tag.id).await.unwrap();
        assert!(repo.get_by_id(tag.id).await.unwrap().is_none());
        assert!(repo.delete(tag.id).await.unwrap_err().is_not_found());
        assert!(repo
            .update(tag.id, &UpdateTagInput::default())
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_list_with_counts_only_counts_live_posts() {
        let (pool, repo) = setup_test_repo().await;
        let sqlite = pool.sqlite().unwrap();
        let rust = repo.create(&tag_input("Rust", "rust")).await.unwrap();
        repo.create(&tag_input("Unused", "unused")).await.unwrap();

        for (slug, status) in [("a", "PUBLISHED"), ("b", "DRAFT"), ("c", "CORRECTED")] {
            let id = sqlx::query("INSERT INTO posts (title, slug, content, status) VALUES (?, ?, 'x', ?)")
                .bind(slug)
                .bind(slug)
                .bind(status)
                .execute(sqlite)
                .await
                .unwrap()
                .last_insert_rowid();
            sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES (?, ?)")
                .bind(id)
                .bind(rust.id)
                .execute(sqlite)
                .await
                .unwrap();
        }

        let counts = repo.list_with_counts().await.unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].tag.slug, "rust");
        assert_eq!(counts[0].post_count, 2);
        assert_eq!(counts[1].post_count, 0);
    }
}
