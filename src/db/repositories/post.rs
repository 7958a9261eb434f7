//! Post repository
//!
//! Database operations for post rows. This repository deals with the `posts`
//! table only; attaching authors, categories and tags is the job of
//! `relations`, and the tag junction is owned by `post_tag`.
//!
//! This module provides:
//! - `PostRepository` trait defining the interface for post data access
//! - `SqlxPostRepository` implementing the trait for SQLite and MySQL

use crate::config::DatabaseDriver;
use crate::db::error::{DbContext, RepoResult, RepositoryError};
use crate::db::DynDatabasePool;
use crate::models::{CreatePostInput, Post, PostFilter, PostStatus, UpdatePostInput};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::mysql::MySqlArguments;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{MySql, MySqlPool, Row, Sqlite, SqlitePool};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use super::post_tag::{apply_sync_mysql, apply_sync_sqlite};

/// Post repository trait
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a post row. `input.slug` must already be resolved; `tag_ids`
    /// is ignored here.
    async fn create(&self, input: &CreatePostInput) -> RepoResult<Post>;

    async fn get_by_id(&self, id: i64) -> RepoResult<Option<Post>>;

    async fn get_by_slug(&self, slug: &str) -> RepoResult<Option<Post>>;

    /// Posts matching `filter`, newest `date` first
    async fn list(&self, filter: &PostFilter, offset: i64, limit: i64) -> RepoResult<Vec<Post>>;

    /// Every post matching `filter`, newest first
    async fn find_all(&self, filter: &PostFilter) -> RepoResult<Vec<Post>>;

    async fn count(&self, filter: &PostFilter) -> RepoResult<i64>;

    /// Merge `input` into the stored row and, when `input.tag_ids` is set,
    /// replace the tag set, all in one transaction.
    ///
    /// With `expected_status` the write only goes through while the stored
    /// status still equals it; otherwise `Conflict` is returned and nothing
    /// is changed.
    async fn update(
        &self,
        id: i64,
        input: &UpdatePostInput,
        expected_status: Option<PostStatus>,
    ) -> RepoResult<Post>;

    /// Delete a post. Its junction rows and comments go with it.
    async fn delete(&self, id: i64) -> RepoResult<()>;

    /// Add one to the view counter and return the new count
    async fn increment_views(&self, id: i64) -> RepoResult<i64>;

    /// Number of live posts credited to an author
    async fn count_live_by_author(&self, author_id: i64) -> RepoResult<i64>;
}

/// SQLx-based post repository implementation
pub struct SqlxPostRepository {
    pool: DynDatabasePool,
}

impl SqlxPostRepository {
    /// Create a new SQLx post repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostRepository for SqlxPostRepository {
    async fn create(&self, input: &CreatePostInput) -> RepoResult<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_post_sqlite(self.pool.sqlite()?, input).await,
            DatabaseDriver::Mysql => create_post_mysql(self.pool.mysql()?, input).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> RepoResult<Option<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_post_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Mysql => get_post_by_id_mysql(self.pool.mysql()?, id).await,
        }
    }

    async fn get_by_slug(&self, slug: &str) -> RepoResult<Option<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_post_by_slug_sqlite(self.pool.sqlite()?, slug).await,
            DatabaseDriver::Mysql => get_post_by_slug_mysql(self.pool.mysql()?, slug).await,
        }
    }

    async fn list(&self, filter: &PostFilter, offset: i64, limit: i64) -> RepoResult<Vec<Post>> {
        let page = Some((offset, limit));
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_posts_sqlite(self.pool.sqlite()?, filter, page).await,
            DatabaseDriver::Mysql => list_posts_mysql(self.pool.mysql()?, filter, page).await,
        }
    }

    async fn find_all(&self, filter: &PostFilter) -> RepoResult<Vec<Post>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_posts_sqlite(self.pool.sqlite()?, filter, None).await,
            DatabaseDriver::Mysql => list_posts_mysql(self.pool.mysql()?, filter, None).await,
        }
    }

    async fn count(&self, filter: &PostFilter) -> RepoResult<i64> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => count_posts_sqlite(self.pool.sqlite()?, filter).await,
            DatabaseDriver::Mysql => count_posts_mysql(self.pool.mysql()?, filter).await,
        }
    }

    async fn update(
        &self,
        id: i64,
        input: &UpdatePostInput,
        expected_status: Option<PostStatus>,
    ) -> RepoResult<Post> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_post_sqlite(self.pool.sqlite()?, id, input, expected_status).await
            }
            DatabaseDriver::Mysql => {
                update_post_mysql(self.pool.mysql()?, id, input, expected_status).await
            }
        }
    }

    async fn delete(&self, id: i64) -> RepoResult<()> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .db_context("Failed to delete post")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query("DELETE FROM posts WHERE id = ?")
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .db_context("Failed to delete post")?
                .rows_affected(),
        };
        if affected == 0 {
            return Err(RepositoryError::not_found("Post", id));
        }
        Ok(())
    }

    async fn increment_views(&self, id: i64) -> RepoResult<i64> {
        let update = "UPDATE posts SET views = views + 1 WHERE id = ?";
        let select = "SELECT views FROM posts WHERE id = ?";
        let views: Option<i64> = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                sqlx::query(update)
                    .bind(id)
                    .execute(pool)
                    .await
                    .db_context("Failed to increment views")?;
                sqlx::query_scalar(select)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .db_context("Failed to read views")?
            }
            DatabaseDriver::Mysql => {
                let pool = self.pool.mysql()?;
                sqlx::query(update)
                    .bind(id)
                    .execute(pool)
                    .await
                    .db_context("Failed to increment views")?;
                sqlx::query_scalar(select)
                    .bind(id)
                    .fetch_optional(pool)
                    .await
                    .db_context("Failed to read views")?
            }
        };
        views.ok_or_else(|| RepositoryError::not_found("Post", id))
    }

    async fn count_live_by_author(&self, author_id: i64) -> RepoResult<i64> {
        let filter = PostFilter {
            author_id: Some(author_id),
            ..PostFilter::live()
        };
        self.count(&filter).await
    }
}

const SELECT_POST: &str = r#"
    SELECT p.id, p.title, p.slug, p.excerpt, p.content, p.cover_image, p.date, p.featured,
           p.status, p.views, p.author_id, p.category_id, p.created_at, p.updated_at
    FROM posts p
"#;

/// A value bound into a filter clause
#[derive(Debug, Clone, PartialEq)]
enum FilterValue {
    Int(i64),
    Text(String),
    Bool(bool),
}

/// `WHERE` clause for a filter plus the values to bind, in order
#[derive(Debug, Default)]
struct FilterSql {
    clause: String,
    values: Vec<FilterValue>,
}

fn build_filter(filter: &PostFilter) -> FilterSql {
    let mut conditions = Vec::new();
    let mut values = Vec::new();

    if !filter.statuses.is_empty() {
        conditions.push(format!(
            "p.status IN ({})",
            super::in_placeholders(filter.statuses.len())
        ));
        values.extend(
            filter
                .statuses
                .iter()
                .map(|s| FilterValue::Text(s.as_str().to_string())),
        );
    }
    if let Some(author_id) = filter.author_id {
        conditions.push("p.author_id = ?".to_string());
        values.push(FilterValue::Int(author_id));
    }
    if let Some(category_id) = filter.category_id {
        conditions.push("p.category_id = ?".to_string());
        values.push(FilterValue::Int(category_id));
    }
    if let Some(tag_id) = filter.tag_id {
        conditions.push(
            "EXISTS (SELECT 1 FROM post_tags pt WHERE pt.post_id = p.id AND pt.tag_id = ?)"
                .to_string(),
        );
        values.push(FilterValue::Int(tag_id));
    }
    if let Some(featured) = filter.featured {
        conditions.push("p.featured = ?".to_string());
        values.push(FilterValue::Bool(featured));
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        conditions.push("(p.title LIKE ? ESCAPE '!' OR p.excerpt LIKE ? ESCAPE '!')".to_string());
        values.push(FilterValue::Text(pattern.clone()));
        values.push(FilterValue::Text(pattern));
    }

    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    FilterSql { clause, values }
}

/// Escape LIKE wildcards so user input matches literally. `!` is the escape
/// character because a backslash literal reads differently in SQLite and MySQL.
fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '!' | '%' | '_') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped
}

/// Merged column values for an update
struct MergedPost {
    title: String,
    slug: String,
    excerpt: Option<String>,
    content: String,
    cover_image: Option<String>,
    date: chrono::DateTime<Utc>,
    featured: bool,
    status: PostStatus,
    author_id: Option<i64>,
    category_id: Option<i64>,
}

fn merge_post(existing: &Post, input: &UpdatePostInput) -> MergedPost {
    MergedPost {
        title: input.title.clone().unwrap_or_else(|| existing.title.clone()),
        slug: input.slug.clone().unwrap_or_else(|| existing.slug.clone()),
        excerpt: input.excerpt.clone().unwrap_or_else(|| existing.excerpt.clone()),
        content: input.content.clone().unwrap_or_else(|| existing.content.clone()),
        cover_image: input
            .cover_image
            .clone()
            .unwrap_or_else(|| existing.cover_image.clone()),
        date: input.date.unwrap_or(existing.date),
        featured: input.featured.unwrap_or(existing.featured),
        status: input.status.unwrap_or(existing.status),
        author_id: input.author_id.unwrap_or(existing.author_id),
        category_id: input.category_id.unwrap_or(existing.category_id),
    }
}

/// Guarded on the status read inside the same transaction
const UPDATE_POST: &str = r#"
    UPDATE posts
    SET title = ?, slug = ?, excerpt = ?, content = ?, cover_image = ?, date = ?,
        featured = ?, status = ?, author_id = ?, category_id = ?, updated_at = ?
    WHERE id = ? AND status = ?
"#;

fn check_expected_status(existing: &Post, expected: Option<PostStatus>) -> RepoResult<()> {
    match expected {
        Some(status) if status != existing.status => Err(RepositoryError::conflict("Post", existing.id)),
        _ => Ok(()),
    }
}

const INSERT_POST: &str = r#"
    INSERT INTO posts (title, slug, excerpt, content, cover_image, date, featured, status,
                       views, author_id, category_id, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?)
"#;

fn parse_status(raw: &str) -> RepoResult<PostStatus> {
    PostStatus::from_str(raw).map_err(RepositoryError::Storage)
}

// ============================================================================
// SQLite implementations
// ============================================================================

fn bind_filter_sqlite<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    values: &'q [FilterValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in values {
        query = match value {
            FilterValue::Int(v) => query.bind(*v),
            FilterValue::Text(v) => query.bind(v.as_str()),
            FilterValue::Bool(v) => query.bind(*v),
        };
    }
    query
}

async fn create_post_sqlite(pool: &SqlitePool, input: &CreatePostInput) -> RepoResult<Post> {
    let now = Utc::now();
    let date = input.date.unwrap_or(now);
    let status = input.status.unwrap_or_default();

    let result = sqlx::query(INSERT_POST)
        .bind(&input.title)
        .bind(&input.slug)
        .bind(&input.excerpt)
        .bind(&input.content)
        .bind(&input.cover_image)
        .bind(date)
        .bind(input.featured)
        .bind(status.as_str())
        .bind(input.author_id)
        .bind(input.category_id)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .db_context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_rowid(),
        title: input.title.clone(),
        slug: input.slug.clone(),
        excerpt: input.excerpt.clone(),
        content: input.content.clone(),
        cover_image: input.cover_image.clone(),
        date,
        featured: input.featured,
        status,
        views: 0,
        author_id: input.author_id,
        category_id: input.category_id,
        created_at: now,
        updated_at: now,
    })
}

async fn get_post_by_id_sqlite(pool: &SqlitePool, id: i64) -> RepoResult<Option<Post>> {
    let row = sqlx::query(&format!("{} WHERE p.id = ?", SELECT_POST))
        .bind(id)
        .fetch_optional(pool)
        .await
        .db_context("Failed to get post by id")?;
    row.as_ref().map(row_to_post_sqlite).transpose()
}

async fn get_post_by_slug_sqlite(pool: &SqlitePool, slug: &str) -> RepoResult<Option<Post>> {
    let row = sqlx::query(&format!("{} WHERE p.slug = ?", SELECT_POST))
        .bind(slug)
        .fetch_optional(pool)
        .await
        .db_context("Failed to get post by slug")?;
    row.as_ref().map(row_to_post_sqlite).transpose()
}

async fn list_posts_sqlite(
    pool: &SqlitePool,
    filter: &PostFilter,
    page: Option<(i64, i64)>,
) -> RepoResult<Vec<Post>> {
    let filter_sql = build_filter(filter);
    let mut sql = format!(
        "{} {} ORDER BY p.date DESC, p.id DESC",
        SELECT_POST, filter_sql.clause
    );
    if page.is_some() {
        sql.push_str(" LIMIT ? OFFSET ?");
    }

    let mut query = bind_filter_sqlite(sqlx::query(&sql), &filter_sql.values);
    if let Some((offset, limit)) = page {
        query = query.bind(limit).bind(offset);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .db_context("Failed to list posts")?;
    rows.iter().map(row_to_post_sqlite).collect()
}

async fn count_posts_sqlite(pool: &SqlitePool, filter: &PostFilter) -> RepoResult<i64> {
    let filter_sql = build_filter(filter);
    let sql = format!("SELECT COUNT(*) AS count FROM posts p {}", filter_sql.clause);
    let row = bind_filter_sqlite(sqlx::query(&sql), &filter_sql.values)
        .fetch_one(pool)
        .await
        .db_context("Failed to count posts")?;
    Ok(row.get("count"))
}

async fn update_post_sqlite(
    pool: &SqlitePool,
    id: i64,
    input: &UpdatePostInput,
    expected_status: Option<PostStatus>,
) -> RepoResult<Post> {
    let mut tx = pool.begin().await.db_context("Failed to begin post update")?;
    match apply_update_sqlite(&mut tx, id, input, expected_status).await {
        Ok(post) => {
            tx.commit().await.db_context("Failed to commit post update")?;
            Ok(post)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(post_id = id, "Failed to roll back post update: {}", rollback_err);
            }
            Err(e)
        }
    }
}

async fn fetch_post_sqlite(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    id: i64,
) -> RepoResult<Post> {
    let row = sqlx::query(&format!("{} WHERE p.id = ?", SELECT_POST))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .db_context("Failed to get post by id")?;
    row.as_ref()
        .map(row_to_post_sqlite)
        .transpose()?
        .ok_or_else(|| RepositoryError::not_found("Post", id))
}

async fn apply_update_sqlite(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    id: i64,
    input: &UpdatePostInput,
    expected_status: Option<PostStatus>,
) -> RepoResult<Post> {
    let existing = fetch_post_sqlite(tx, id).await?;
    check_expected_status(&existing, expected_status)?;
    if !input.has_changes() {
        return Ok(existing);
    }

    if input.has_row_changes() {
        let merged = merge_post(&existing, input);
        let result = sqlx::query(UPDATE_POST)
            .bind(&merged.title)
            .bind(&merged.slug)
            .bind(&merged.excerpt)
            .bind(&merged.content)
            .bind(&merged.cover_image)
            .bind(merged.date)
            .bind(merged.featured)
            .bind(merged.status.as_str())
            .bind(merged.author_id)
            .bind(merged.category_id)
            .bind(Utc::now())
            .bind(id)
            .bind(existing.status.as_str())
            .execute(&mut **tx)
            .await
            .db_context("Failed to update post")?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::conflict("Post", id));
        }
    }

    if let Some(tag_ids) = &input.tag_ids {
        let desired: BTreeSet<i64> = tag_ids.iter().copied().collect();
        apply_sync_sqlite(tx, id, &desired).await?;
    }

    fetch_post_sqlite(tx, id).await
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> RepoResult<Post> {
    let status: String = row.get("status");
    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        cover_image: row.get("cover_image"),
        date: row.get("date"),
        featured: row.get("featured"),
        status: parse_status(&status)?,
        views: row.get("views"),
        author_id: row.get("author_id"),
        category_id: row.get("category_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

fn bind_filter_mysql<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    values: &'q [FilterValue],
) -> Query<'q, MySql, MySqlArguments> {
    for value in values {
        query = match value {
            FilterValue::Int(v) => query.bind(*v),
            FilterValue::Text(v) => query.bind(v.as_str()),
            FilterValue::Bool(v) => query.bind(*v),
        };
    }
    query
}

async fn create_post_mysql(pool: &MySqlPool, input: &CreatePostInput) -> RepoResult<Post> {
    let now = Utc::now();
    let date = input.date.unwrap_or(now);
    let status = input.status.unwrap_or_default();

    let result = sqlx::query(INSERT_POST)
        .bind(&input.title)
        .bind(&input.slug)
        .bind(&input.excerpt)
        .bind(&input.content)
        .bind(&input.cover_image)
        .bind(date)
        .bind(input.featured)
        .bind(status.as_str())
        .bind(input.author_id)
        .bind(input.category_id)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .db_context("Failed to create post")?;

    Ok(Post {
        id: result.last_insert_id() as i64,
        title: input.title.clone(),
        slug: input.slug.clone(),
        excerpt: input.excerpt.clone(),
        content: input.content.clone(),
        cover_image: input.cover_image.clone(),
        date,
        featured: input.featured,
        status,
        views: 0,
        author_id: input.author_id,
        category_id: input.category_id,
        created_at: now,
        updated_at: now,
    })
}

async fn get_post_by_id_mysql(pool: &MySqlPool, id: i64) -> RepoResult<Option<Post>> {
    let row = sqlx::query(&format!("{} WHERE p.id = ?", SELECT_POST))
        .bind(id)
        .fetch_optional(pool)
        .await
        .db_context("Failed to get post by id")?;
    row.as_ref().map(row_to_post_mysql).transpose()
}

async fn get_post_by_slug_mysql(pool: &MySqlPool, slug: &str) -> RepoResult<Option<Post>> {
    let row = sqlx::query(&format!("{} WHERE p.slug = ?", SELECT_POST))
        .bind(slug)
        .fetch_optional(pool)
        .await
        .db_context("Failed to get post by slug")?;
    row.as_ref().map(row_to_post_mysql).transpose()
}

async fn list_posts_mysql(
    pool: &MySqlPool,
    filter: &PostFilter,
    page: Option<(i64, i64)>,
) -> RepoResult<Vec<Post>> {
    let filter_sql = build_filter(filter);
    let mut sql = format!(
        "{} {} ORDER BY p.date DESC, p.id DESC",
        SELECT_POST, filter_sql.clause
    );
    if page.is_some() {
        sql.push_str(" LIMIT ? OFFSET ?");
    }

    let mut query = bind_filter_mysql(sqlx::query(&sql), &filter_sql.values);
    if let Some((offset, limit)) = page {
        query = query.bind(limit).bind(offset);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .db_context("Failed to list posts")?;
    rows.iter().map(row_to_post_mysql).collect()
}

async fn count_posts_mysql(pool: &MySqlPool, filter: &PostFilter) -> RepoResult<i64> {
    let filter_sql = build_filter(filter);
    let sql = format!("SELECT COUNT(*) AS count FROM posts p {}", filter_sql.clause);
    let row = bind_filter_mysql(sqlx::query(&sql), &filter_sql.values)
        .fetch_one(pool)
        .await
        .db_context("Failed to count posts")?;
    Ok(row.get("count"))
}

async fn update_post_mysql(
    pool: &MySqlPool,
    id: i64,
    input: &UpdatePostInput,
    expected_status: Option<PostStatus>,
) -> RepoResult<Post> {
    let mut tx = pool.begin().await.db_context("Failed to begin post update")?;
    match apply_update_mysql(&mut tx, id, input, expected_status).await {
        Ok(post) => {
            tx.commit().await.db_context("Failed to commit post update")?;
            Ok(post)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(post_id = id, "Failed to roll back post update: {}", rollback_err);
            }
            Err(e)
        }
    }
}

async fn fetch_post_mysql(
    tx: &mut sqlx::Transaction<'_, MySql>,
    id: i64,
    lock: bool,
) -> RepoResult<Post> {
    let sql = if lock {
        format!("{} WHERE p.id = ? FOR UPDATE", SELECT_POST)
    } else {
        format!("{} WHERE p.id = ?", SELECT_POST)
    };
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .db_context("Failed to get post by id")?;
    row.as_ref()
        .map(row_to_post_mysql)
        .transpose()?
        .ok_or_else(|| RepositoryError::not_found("Post", id))
}

async fn apply_update_mysql(
    tx: &mut sqlx::Transaction<'_, MySql>,
    id: i64,
    input: &UpdatePostInput,
    expected_status: Option<PostStatus>,
) -> RepoResult<Post> {
    // The row lock holds until commit, so the merge below cannot go stale.
    let existing = fetch_post_mysql(tx, id, true).await?;
    check_expected_status(&existing, expected_status)?;
    if !input.has_changes() {
        return Ok(existing);
    }

    if input.has_row_changes() {
        let merged = merge_post(&existing, input);
        sqlx::query(UPDATE_POST)
            .bind(&merged.title)
            .bind(&merged.slug)
            .bind(&merged.excerpt)
            .bind(&merged.content)
            .bind(&merged.cover_image)
            .bind(merged.date)
            .bind(merged.featured)
            .bind(merged.status.as_str())
            .bind(merged.author_id)
            .bind(merged.category_id)
            .bind(Utc::now())
            .bind(id)
            .bind(existing.status.as_str())
            .execute(&mut **tx)
            .await
            .db_context("Failed to update post")?;
    }

    if let Some(tag_ids) = &input.tag_ids {
        let desired: BTreeSet<i64> = tag_ids.iter().copied().collect();
        apply_sync_mysql(tx, id, &desired).await?;
    }

    fetch_post_mysql(tx, id, false).await
}

fn row_to_post_mysql(row: &sqlx::mysql::MySqlRow) -> RepoResult<Post> {
    let status: String = row.get("status");
    Ok(Post {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        cover_image: row.get("cover_image"),
        date: row.get("date"),
        featured: row.get("featured"),
        status: parse_status(&status)?,
        views: row.get("views"),
        author_id: row.get("author_id"),
        category_id: row.get("category_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
