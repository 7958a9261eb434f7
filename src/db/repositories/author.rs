//! Author repository
//!
//! Database operations for authors. Social links are stored as JSON text and
//! decoded leniently on read.

use crate::config::DatabaseDriver;
use crate::db::error::{DbContext, RepoResult, RepositoryError};
use crate::db::DynDatabasePool;
use crate::models::{decode_social, Author, CreateAuthorInput, UpdateAuthorInput};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use super::in_placeholders;

/// Author repository trait
#[async_trait]
pub trait AuthorRepository: Send + Sync {
    async fn create(&self, input: &CreateAuthorInput) -> RepoResult<Author>;

    async fn get_by_id(&self, id: i64) -> RepoResult<Option<Author>>;

    /// Fetch every author whose id is in `ids` with one query
    async fn get_by_ids(&self, ids: &[i64]) -> RepoResult<Vec<Author>>;

    /// List all authors ordered by name
    async fn list(&self) -> RepoResult<Vec<Author>>;

    async fn update(&self, id: i64, input: &UpdateAuthorInput) -> RepoResult<Author>;

    /// Delete an author. Posts by the author are detached, not deleted.
    async fn delete(&self, id: i64) -> RepoResult<()>;
}

/// SQLx-based author repository
pub struct SqlxAuthorRepository {
    pool: DynDatabasePool,
}

impl SqlxAuthorRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn AuthorRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl AuthorRepository for SqlxAuthorRepository {
    async fn create(&self, input: &CreateAuthorInput) -> RepoResult<Author> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_author_sqlite(self.pool.sqlite()?, input).await,
            DatabaseDriver::Mysql => create_author_mysql(self.pool.mysql()?, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> RepoResult<Option<Author>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_author_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_author_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn get_by_ids(&self, ids: &[i64]) -> RepoResult<Vec<Author>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_authors_by_ids_sqlite(self.pool.sqlite()?, ids).await,
            DatabaseDriver::Mysql => get_authors_by_ids_mysql(self.pool.mysql()?, ids).await,
        }
    }

    async fn list(&self) -> RepoResult<Vec<Author>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_authors_sqlite(self.pool.sqlite()?).await,
            DatabaseDriver::Mysql => list_authors_mysql(self.pool.mysql()?).await,
        }
    }

    async fn update(&self, id: i64, input: &UpdateAuthorInput) -> RepoResult<Author> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_author_sqlite(self.pool.sqlite()?, id, input).await,
            DatabaseDriver::Mysql => update_author_mysql(self.pool.mysql()?, id, input).await,
        }
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM authors WHERE id = ?")
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .db_context("Failed to delete author")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM authors WHERE id = ?")
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .db_context("Failed to delete author")?
                .rows_affected(),
        };
        if affected == 0 {
            return Err(RepositoryError::not_found("Author", id));
        }
        Ok(())
    }
}

const SELECT_AUTHOR: &str =
    "SELECT id, name, avatar, bio, social, created_at, updated_at FROM authors";

fn encode_social(value: Option<&serde_json::Value>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "{}".to_string())
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_author_sqlite(pool: &SqlitePool, input: &CreateAuthorInput) -> RepoResult<Author> {
    let now = Utc::now();
    let social = encode_social(input.social.as_ref());
    let result = sqlx::query(
        r#"
        INSERT INTO authors (name, avatar, bio, social, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.name)
    .bind(&input.avatar)
    .bind(&input.bio)
    .bind(&social)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .db_context("Failed to create author")?;

    Ok(Author {
        id: result.last_insert_rowid(),
        name: input.name.clone(),
        avatar: input.avatar.clone(),
        bio: input.bio.clone(),
        social: decode_social(Some(social)),
        created_at: now,
        updated_at: now,
    })
}

async fn get_author_by_id_sqlite(pool: &SqlitePool, id: i64) -> RepoResult<Option<Author>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_AUTHOR))
        .bind(id)
        .fetch_optional(pool)
        .await
        .db_context("Failed to get author by id")?;
    Ok(row.as_ref().map(row_to_author_sqlite))
}

async fn get_authors_by_ids_sqlite(pool: &SqlitePool, ids: &[i64]) -> RepoResult<Vec<Author>> {
    let sql = format!("{} WHERE id IN ({})", SELECT_AUTHOR, in_placeholders(ids.len()));
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .db_context("Failed to batch-load authors")?;
    Ok(rows.iter().map(row_to_author_sqlite).collect())
}

async fn list_authors_sqlite(pool: &SqlitePool) -> RepoResult<Vec<Author>> {
    let rows = sqlx::query(&format!("{} ORDER BY name", SELECT_AUTHOR))
        .fetch_all(pool)
        .await
        .db_context("Failed to list authors")?;
    Ok(rows.iter().map(row_to_author_sqlite).collect())
}

async fn update_author_sqlite(
    pool: &SqlitePool,
    id: i64,
    input: &UpdateAuthorInput,
) -> RepoResult<Author> {
    let existing = get_author_by_id_sqlite(pool, id)
        .await?
        .ok_or_else(|| RepositoryError::not_found("Author", id))?;

    let merged = merge_author(existing, input);
    sqlx::query(
        "UPDATE authors SET name = ?, avatar = ?, bio = ?, social = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&merged.name)
    .bind(&merged.avatar)
    .bind(&merged.bio)
    .bind(merged.social.to_string())
    .bind(merged.updated_at)
    .bind(id)
    .execute(pool)
    .await
    .db_context("Failed to update author")?;

    Ok(merged)
}

fn row_to_author_sqlite(row: &sqlx::sqlite::SqliteRow) -> Author {
    Author {
        id: row.get("id"),
        name: row.get("name"),
        avatar: row.get("avatar"),
        bio: row.get("bio"),
        social: decode_social(row.get("social")),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_author_mysql(pool: &MySqlPool, input: &CreateAuthorInput) -> RepoResult<Author> {
    let now = Utc::now();
    let social = encode_social(input.social.as_ref());
    let result = sqlx::query(
        r#"
        INSERT INTO authors (name, avatar, bio, social, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.name)
    .bind(&input.avatar)
    .bind(&input.bio)
    .bind(&social)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .db_context("Failed to create author")?;

    Ok(Author {
        id: result.last_insert_id() as i64,
        name: input.name.clone(),
        avatar: input.avatar.clone(),
        bio: input.bio.clone(),
        social: decode_social(Some(social)),
        created_at: now,
        updated_at: now,
    })
}

async fn get_author_by_id_mysql(pool: &MySqlPool, id: i64) -> RepoResult<Option<Author>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_AUTHOR))
        .bind(id)
        .fetch_optional(pool)
        .await
        .db_context("Failed to get author by id")?;
    Ok(row.as_ref().map(row_to_author_mysql))
}

async fn get_authors_by_ids_mysql(pool: &MySqlPool, ids: &[i64]) -> RepoResult<Vec<Author>> {
    let sql = format!("{} WHERE id IN ({})", SELECT_AUTHOR, in_placeholders(ids.len()));
    let mut query = sqlx::query(&sql);
    for id in ids {
        query = query.bind(id);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .db_context("Failed to batch-load authors")?;
    Ok(rows.iter().map(row_to_author_mysql).collect())
}

async fn list_authors_mysql(pool: &MySqlPool) -> RepoResult<Vec<Author>> {
    let rows = sqlx::query(&format!("{} ORDER BY name", SELECT_AUTHOR))
        .fetch_all(pool)
        .await
        .db_context("Failed to list authors")?;
    Ok(rows.iter().map(row_to_author_mysql).collect())
}

async fn update_author_mysql(
    pool: &MySqlPool,
    id: i64,
    input: &UpdateAuthorInput,
) -> RepoResult<Author> {
    let existing = get_author_by_id_mysql(pool, id)
        .await?
        .ok_or_else(|| RepositoryError::not_found("Author", id))?;

    let merged = merge_author(existing, input);
    sqlx::query(
        "UPDATE authors SET name = ?, avatar = ?, bio = ?, social = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&merged.name)
    .bind(&merged.avatar)
    .bind(&merged.bio)
    .bind(merged.social.to_string())
    .bind(merged.updated_at)
    .bind(id)
    .execute(pool)
    .await
    .db_context("Failed to update author")?;

    Ok(merged)
}

fn row_to_author_mysql(row: &sqlx::mysql::MySqlRow) -> Author {
    Author {
        id: row.get("id"),
        name: row.get("name"),
        avatar: row.get("avatar"),
        bio: row.get("bio"),
        social: decode_social(row.get("social")),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn merge_author(existing: Author, input: &UpdateAuthorInput) -> Author {
    Author {
        name: input.name.clone().unwrap_or(existing.name),
        avatar: input.avatar.clone().or(existing.avatar),
        bio: input.bio.clone().or(existing.bio),
        social: input.social.clone().unwrap_or(existing.social),
        updated_at: Utc::now(),
        ..existing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations};
    use serde_json::json;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxAuthorRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        let repo = SqlxAuthorRepository::new(pool.clone());
        (pool, repo)
    }

    #[tokio::test]
    async fn test_create_author_with_social() {
        let (_pool, repo) = setup_test_repo().await;
        let input = CreateAuthorInput {
            name: "Ada".into(),
            avatar: Some("/a.png".into()),
            bio: None,
            social: Some(json!({"github": "ada"})),
        };

        let created = repo.create(&input).await.unwrap();
        let fetched = repo.get_by_id(created.id).await.unwrap().expect("author");
        assert_eq!(fetched.name, "Ada");
        assert_eq!(fetched.avatar.as_deref(), Some("/a.png"));
        assert_eq!(fetched.social, json!({"github": "ada"}));
    }

    #[tokio::test]
    async fn test_missing_social_reads_as_empty_object() {
        let (pool, repo) = setup_test_repo().await;
        let id = sqlx::query("INSERT INTO authors (name, social) VALUES ('Legacy', NULL)")
            .execute(pool.sqlite().unwrap())
            .await
            .unwrap()
            .last_insert_rowid();

        let author = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(author.social, json!({}));
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let (_pool, repo) = setup_test_repo().await;
        let created = repo
            .create(&CreateAuthorInput {
                bio: Some("Writes things".into()),
                ..CreateAuthorInput::new("Ada")
            })
            .await
            .unwrap();

        let updated = repo
            .update(
                created.id,
                &UpdateAuthorInput {
                    name: Some("Ada L.".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Ada L.");
        assert_eq!(updated.bio.as_deref(), Some("Writes things"));

        let fetched = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Ada L.");
    }

    #[tokio::test]
    async fn test_get_by_ids_and_delete() {
        let (_pool, repo) = setup_test_repo().await;
        let a = repo.create(&CreateAuthorInput::new("Ada")).await.unwrap();
        let b = repo.create(&CreateAuthorInput::new("Brian")).await.unwrap();

        let mut ids: Vec<_> = repo
            .get_by_ids(&[a.id, b.id, 777])
            .await
            .unwrap()
            .into_iter()
            .map(|x| x.id)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![a.id, b.id]);

        repo.delete(a.id).await.unwrap();
        assert!(repo.get_by_id(a.id).await.unwrap().is_none());
        assert!(repo.delete(a.id).await.unwrap_err().is_not_found());
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }
}
