//! Comment repository

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

use crate::config::DatabaseDriver;
use crate::db::error::{DbContext, RepoResult, RepositoryError};
use crate::db::DynDatabasePool;
use crate::models::{Comment, CreateCommentInput};

/// Comment repository trait
#[async_trait]
pub trait CommentRepository: Send + Sync {
    /// Create a comment, approved or held for moderation
    async fn create(&self, input: &CreateCommentInput, approved: bool) -> RepoResult<Comment>;

    async fn get_by_id(&self, id: i64) -> RepoResult<Option<Comment>>;

    /// Comments on a post, oldest first
    async fn list_by_post(&self, post_id: i64, approved_only: bool) -> RepoResult<Vec<Comment>>;

    /// All comments across posts, newest first, optionally only those awaiting approval
    async fn list_all(&self, pending_only: bool, offset: i64, limit: i64) -> RepoResult<(Vec<Comment>, i64)>;

    /// Mark a comment approved
    async fn approve(&self, id: i64) -> RepoResult<Comment>;

    async fn delete(&self, id: i64) -> RepoResult<()>;
}

/// Comment repository implementation
pub struct SqlxCommentRepository {
    pool: DynDatabasePool,
}

impl SqlxCommentRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CommentRepository> {
        Arc::new(Self::new(pool))
    }
}

const SELECT_COMMENT: &str = "SELECT id, post_id, content, author_name, author_email, approved, created_at, updated_at FROM comments";

#[async_trait]
impl CommentRepository for SqlxCommentRepository {
    async fn create(&self, input: &CreateCommentInput, approved: bool) -> RepoResult<Comment> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_sqlite(self.pool.sqlite()?, input, approved).await,
            DatabaseDriver::Mysql => create_mysql(self.pool.mysql()?, input, approved).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> RepoResult<Option<Comment>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn list_by_post(&self, post_id: i64, approved_only: bool) -> RepoResult<Vec<Comment>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_by_post_sqlite(self.pool.sqlite()?, post_id, approved_only).await
            }
            DatabaseDriver::Mysql => {
                list_by_post_mysql(self.pool.mysql()?, post_id, approved_only).await
            }
        }
    }

    async fn list_all(&self, pending_only: bool, offset: i64, limit: i64) -> RepoResult<(Vec<Comment>, i64)> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                list_all_sqlite(self.pool.sqlite()?, pending_only, offset, limit).await
            }
            DatabaseDriver::Mysql => {
                list_all_mysql(self.pool.mysql()?, pending_only, offset, limit).await
            }
        }
    }

    async fn approve(&self, id: i64) -> RepoResult<Comment> {
        let sql = "UPDATE comments SET approved = ?, updated_at = ? WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(true)
                .bind(Utc::now())
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .db_context("Failed to approve comment")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(true)
                .bind(Utc::now())
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .db_context("Failed to approve comment")?
                .rows_affected(),
        };
        if affected == 0 {
            return Err(RepositoryError::not_found("Comment", id));
        }
        self.get_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Comment", id))
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .db_context("Failed to delete comment")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM comments WHERE id = ?")
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .db_context("Failed to delete comment")?
                .rows_affected(),
        };
        if affected == 0 {
            return Err(RepositoryError::not_found("Comment", id));
        }
        Ok(())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_sqlite(pool: &SqlitePool, input: &CreateCommentInput, approved: bool) -> RepoResult<Comment> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO comments (post_id, content, author_name, author_email, approved, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.post_id)
    .bind(&input.content)
    .bind(&input.author_name)
    .bind(&input.author_email)
    .bind(approved)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .db_context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_rowid(),
        post_id: input.post_id,
        content: input.content.clone(),
        author_name: input.author_name.clone(),
        author_email: input.author_email.clone(),
        approved,
        created_at: now,
        updated_at: now,
    })
}

async fn get_by_id_sqlite(pool: &SqlitePool, id: i64) -> RepoResult<Option<Comment>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COMMENT))
        .bind(id)
        .fetch_optional(pool)
        .await
        .db_context("Failed to get comment")?;
    Ok(row.as_ref().map(row_to_comment_sqlite))
}

async fn list_by_post_sqlite(pool: &SqlitePool, post_id: i64, approved_only: bool) -> RepoResult<Vec<Comment>> {
    let sql = if approved_only {
        format!("{} WHERE post_id = ? AND approved = 1 ORDER BY created_at, id", SELECT_COMMENT)
    } else {
        format!("{} WHERE post_id = ? ORDER BY created_at, id", SELECT_COMMENT)
    };
    let rows = sqlx::query(&sql)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .db_context("Failed to list comments")?;
    Ok(rows.iter().map(row_to_comment_sqlite).collect())
}

async fn list_all_sqlite(pool: &SqlitePool, pending_only: bool, offset: i64, limit: i64) -> RepoResult<(Vec<Comment>, i64)> {
    let filter = if pending_only { "WHERE approved = 0" } else { "" };

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM comments {}", filter))
        .fetch_one(pool)
        .await
        .db_context("Failed to count comments")?;

    let rows = sqlx::query(&format!(
        "{} {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        SELECT_COMMENT, filter
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .db_context("Failed to list comments")?;

    Ok((rows.iter().map(row_to_comment_sqlite).collect(), total))
}

fn row_to_comment_sqlite(row: &sqlx::sqlite::SqliteRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        content: row.get("content"),
        author_name: row.get("author_name"),
        author_email: row.get("author_email"),
        approved: row.get("approved"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_mysql(pool: &MySqlPool, input: &CreateCommentInput, approved: bool) -> RepoResult<Comment> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO comments (post_id, content, author_name, author_email, approved, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(input.post_id)
    .bind(&input.content)
    .bind(&input.author_name)
    .bind(&input.author_email)
    .bind(approved)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .db_context("Failed to create comment")?;

    Ok(Comment {
        id: result.last_insert_id() as i64,
        post_id: input.post_id,
        content: input.content.clone(),
        author_name: input.author_name.clone(),
        author_email: input.author_email.clone(),
        approved,
        created_at: now,
        updated_at: now,
    })
}

async fn get_by_id_mysql(pool: &MySqlPool, id: i64) -> RepoResult<Option<Comment>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COMMENT))
        .bind(id)
        .fetch_optional(pool)
        .await
        .db_context("Failed to get comment")?;
    Ok(row.as_ref().map(row_to_comment_mysql))
}

async fn list_by_post_mysql(pool: &MySqlPool, post_id: i64, approved_only: bool) -> RepoResult<Vec<Comment>> {
    let sql = if approved_only {
        format!("{} WHERE post_id = ? AND approved = 1 ORDER BY created_at, id", SELECT_COMMENT)
    } else {
        format!("{} WHERE post_id = ? ORDER BY created_at, id", SELECT_COMMENT)
    };
    let rows = sqlx::query(&sql)
        .bind(post_id)
        .fetch_all(pool)
        .await
        .db_context("Failed to list comments")?;
    Ok(rows.iter().map(row_to_comment_mysql).collect())
}

async fn list_all_mysql(pool: &MySqlPool, pending_only: bool, offset: i64, limit: i64) -> RepoResult<(Vec<Comment>, i64)> {
    let filter = if pending_only { "WHERE approved = 0" } else { "" };

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM comments {}", filter))
        .fetch_one(pool)
        .await
        .db_context("Failed to count comments")?;

    let rows = sqlx::query(&format!(
        "{} {} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        SELECT_COMMENT, filter
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .db_context("Failed to list comments")?;

    Ok((rows.iter().map(row_to_comment_mysql).collect(), total))
}

fn row_to_comment_mysql(row: &sqlx::mysql::MySqlRow) -> Comment {
    Comment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        content: row.get("content"),
        author_name: row.get("author_name"),
        author_email: row.get("author_email"),
        approved: row.get("approved"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
