//! Post/tag junction repository
//!
//! The `post_tags` rows of a post are owned by that post and only ever
//! changed through `sync`, which brings them to a requested set inside one
//! transaction. Rows that stay in the set are left untouched, so their
//! `created_at` survives.

use crate::config::DatabaseDriver;
use crate::db::error::{DbContext, RepoResult, RepositoryError};
use crate::db::DynDatabasePool;
use crate::models::{PostTag, TagSyncOutcome};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::collections::BTreeSet;
use std::sync::Arc;

use super::in_placeholders;

/// Junction repository trait
#[async_trait]
pub trait PostTagRepository: Send + Sync {
    /// Make the post's tag set equal to the distinct ids in `tag_ids`.
    ///
    /// Fails with `NotFound` for an unknown post and `ForeignKeyViolation`
    /// for an unknown tag; either way nothing is changed.
    async fn sync(&self, post_id: i64, tag_ids: &[i64]) -> RepoResult<TagSyncOutcome>;

    /// Junction rows of one post, by tag id
    async fn list_for_post(&self, post_id: i64) -> RepoResult<Vec<PostTag>>;

    /// Junction rows of every post in `post_ids` with one query
    async fn list_for_posts(&self, post_ids: &[i64]) -> RepoResult<Vec<PostTag>>;
}

/// SQLx-based junction repository
pub struct SqlxPostTagRepository {
    pool: DynDatabasePool,
}

impl SqlxPostTagRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PostTagRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl PostTagRepository for SqlxPostTagRepository {
    async fn sync(&self, post_id: i64, tag_ids: &[i64]) -> RepoResult<TagSyncOutcome> {
        let desired: BTreeSet<i64> = tag_ids.iter().copied().collect();
        let outcome = match self.pool.driver() {
            DatabaseDriver::Sqlite => sync_sqlite(self.pool.sqlite()?, post_id, &desired).await?,
            DatabaseDriver::Mysql => sync_mysql(self.pool.mysql()?, post_id, &desired).await?,
        };
        tracing::debug!(
            post_id,
            added = outcome.added.len(),
            removed = outcome.removed.len(),
            unchanged = outcome.unchanged.len(),
            "Synchronized post tags"
        );
        Ok(outcome)
    }

    async fn list_for_post(&self, post_id: i64) -> RepoResult<Vec<PostTag>> {
        self.list_for_posts(&[post_id]).await
    }

    async fn list_for_posts(&self, post_ids: &[i64]) -> RepoResult<Vec<PostTag>> {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT post_id, tag_id, created_at FROM post_tags WHERE post_id IN ({}) ORDER BY post_id, tag_id",
            in_placeholders(post_ids.len())
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(&sql);
                for id in post_ids {
                    query = query.bind(id);
                }
                let rows = query
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .db_context("Failed to load post tags")?;
                Ok(rows
                    .iter()
                    .map(|row| PostTag {
                        post_id: row.get("post_id"),
                        tag_id: row.get("tag_id"),
                        created_at: row.get("created_at"),
                    })
                    .collect())
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query(&sql);
                for id in post_ids {
                    query = query.bind(id);
                }
                let rows = query
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .db_context("Failed to load post tags")?;
                Ok(rows
                    .iter()
                    .map(|row| PostTag {
                        post_id: row.get("post_id"),
                        tag_id: row.get("tag_id"),
                        created_at: row.get("created_at"),
                    })
                    .collect())
            }
        }
    }
}

/// Split the current and desired tag sets into what to add, remove and keep
pub fn diff_tag_sets(current: &[i64], desired: &BTreeSet<i64>) -> TagSyncOutcome {
    let current: BTreeSet<i64> = current.iter().copied().collect();
    TagSyncOutcome {
        added: desired.difference(&current).copied().collect(),
        removed: current.difference(desired).copied().collect(),
        unchanged: current.intersection(desired).copied().collect(),
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn sync_sqlite(
    pool: &SqlitePool,
    post_id: i64,
    desired: &BTreeSet<i64>,
) -> RepoResult<TagSyncOutcome> {
    let mut tx = pool.begin().await.db_context("Failed to begin tag sync")?;
    match apply_sync_sqlite(&mut tx, post_id, desired).await {
        Ok(outcome) => {
            tx.commit().await.db_context("Failed to commit tag sync")?;
            Ok(outcome)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(post_id, "Failed to roll back tag sync: {}", rollback_err);
            }
            Err(e)
        }
    }
}

/// Tag-set diff inside a caller-owned transaction
pub(super) async fn apply_sync_sqlite(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    post_id: i64,
    desired: &BTreeSet<i64>,
) -> RepoResult<TagSyncOutcome> {
    let post: Option<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_optional(&mut **tx)
        .await
        .db_context("Failed to look up post")?;
    if post.is_none() {
        return Err(RepositoryError::not_found("Post", post_id));
    }

    let current: Vec<i64> = sqlx::query_scalar("SELECT tag_id FROM post_tags WHERE post_id = ?")
        .bind(post_id)
        .fetch_all(&mut **tx)
        .await
        .db_context("Failed to read current tags")?;
    let outcome = diff_tag_sets(&current, desired);

    if !outcome.removed.is_empty() {
        let sql = format!(
            "DELETE FROM post_tags WHERE post_id = ? AND tag_id IN ({})",
            in_placeholders(outcome.removed.len())
        );
        let mut query = sqlx::query(&sql).bind(post_id);
        for tag_id in &outcome.removed {
            query = query.bind(tag_id);
        }
        query
            .execute(&mut **tx)
            .await
            .db_context("Failed to detach tags")?;
    }

    let now = Utc::now();
    for tag_id in &outcome.added {
        sqlx::query("INSERT INTO post_tags (post_id, tag_id, created_at) VALUES (?, ?, ?)")
            .bind(post_id)
            .bind(tag_id)
            .bind(now)
            .execute(&mut **tx)
            .await
            .db_context("Failed to attach tag")?;
    }

    Ok(outcome)
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn sync_mysql(
    pool: &MySqlPool,
    post_id: i64,
    desired: &BTreeSet<i64>,
) -> RepoResult<TagSyncOutcome> {
    let mut tx = pool.begin().await.db_context("Failed to begin tag sync")?;
    match apply_sync_mysql(&mut tx, post_id, desired).await {
        Ok(outcome) => {
            tx.commit().await.db_context("Failed to commit tag sync")?;
            Ok(outcome)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(post_id, "Failed to roll back tag sync: {}", rollback_err);
            }
            Err(e)
        }
    }
}

pub(super) async fn apply_sync_mysql(
    tx: &mut sqlx::Transaction<'_, sqlx::MySql>,
    post_id: i64,
    desired: &BTreeSet<i64>,
) -> RepoResult<TagSyncOutcome> {
    // Lock the post row so concurrent syncs of the same post serialize.
    let post: Option<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE id = ? FOR UPDATE")
        .bind(post_id)
        .fetch_optional(&mut **tx)
        .await
        .db_context("Failed to look up post")?;
    if post.is_none() {
        return Err(RepositoryError::not_found("Post", post_id));
    }

    let current: Vec<i64> = sqlx::query_scalar("SELECT tag_id FROM post_tags WHERE post_id = ?")
        .bind(post_id)
        .fetch_all(&mut **tx)
        .await
        .db_context("Failed to read current tags")?;
    let outcome = diff_tag_sets(&current, desired);

    if !outcome.removed.is_empty() {
        let sql = format!(
            "DELETE FROM post_tags WHERE post_id = ? AND tag_id IN ({})",
            in_placeholders(outcome.removed.len())
        );
        let mut query = sqlx::query(&sql).bind(post_id);
        for tag_id in &outcome.removed {
            query = query.bind(tag_id);
        }
        query
            .execute(&mut **tx)
            .await
            .db_context("Failed to detach tags")?;
    }

    let now = Utc::now();
    for tag_id in &outcome.added {
        sqlx::query("INSERT INTO post_tags (post_id, tag_id, created_at) VALUES (?, ?, ?)")
            .bind(post_id)
            .bind(tag_id)
            .bind(now)
            .execute(&mut **tx)
            .await
            .db_context("Failed to attach tag")?;
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations::run_migrations};

    struct Fixture {
        pool: DynDatabasePool,
        repo: SqlxPostTagRepository,
        post_id: i64,
        tags: Vec<i64>,
    }

    async fn setup(tag_count: usize) -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        let sqlite = pool.sqlite().unwrap();

        let post_id = sqlx::query("INSERT INTO posts (title, slug, content) VALUES ('P', 'p', 'c')")
            .execute(sqlite)
            .await
            .unwrap()
            .last_insert_rowid();

        let mut tags = Vec::new();
        for i in 0..tag_count {
            let id = sqlx::query("INSERT INTO tags (name, slug) VALUES (?, ?)")
                .bind(format!("Tag {}", i))
                .bind(format!("tag-{}", i))
                .execute(sqlite)
                .await
                .unwrap()
                .last_insert_rowid();
            tags.push(id);
        }

        let repo = SqlxPostTagRepository::new(pool.clone());
        Fixture {
            pool,
            repo,
            post_id,
            tags,
        }
    }

    async fn stored_tag_ids(fx: &Fixture) -> Vec<i64> {
        fx.repo
            .list_for_post(fx.post_id)
            .await
            .unwrap()
            .into_iter()
            .map(|pt| pt.tag_id)
            .collect()
    }

    #[test]
    fn test_diff_tag_sets() {
        let desired: BTreeSet<i64> = [2, 3, 4].into_iter().collect();
        let outcome = diff_tag_sets(&[1, 2, 3], &desired);
        assert_eq!(outcome.added, vec![4]);
        assert_eq!(outcome.removed, vec![1]);
        assert_eq!(outcome.unchanged, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_sync_collapses_duplicates() {
        let fx = setup(2).await;
        let (t1, t2) = (fx.tags[0], fx.tags[1]);

        let outcome = fx.repo.sync(fx.post_id, &[t1, t1, t2]).await.unwrap();
        assert_eq!(outcome.added, vec![t1, t2]);
        assert_eq!(stored_tag_ids(&fx).await, vec![t1, t2]);
    }

    #[tokio::test]
    async fn test_sync_twice_is_noop() {
        let fx = setup(3).await;
        fx.repo.sync(fx.post_id, &fx.tags).await.unwrap();
        let before = fx.repo.list_for_post(fx.post_id).await.unwrap();

        let outcome = fx.repo.sync(fx.post_id, &fx.tags).await.unwrap();
        assert!(outcome.is_noop());
        assert_eq!(fx.repo.list_for_post(fx.post_id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_sync_empty_clears() {
        let fx = setup(2).await;
        fx.repo.sync(fx.post_id, &fx.tags).await.unwrap();

        let outcome = fx.repo.sync(fx.post_id, &[]).await.unwrap();
        assert_eq!(outcome.removed.len(), 2);
        assert!(stored_tag_ids(&fx).await.is_empty());
    }

    #[tokio::test]
    async fn test_retained_rows_keep_created_at() {
        let fx = setup(2).await;
        let (t1, t2) = (fx.tags[0], fx.tags[1]);
        fx.repo.sync(fx.post_id, &[t1]).await.unwrap();
        let original = fx.repo.list_for_post(fx.post_id).await.unwrap()[0].created_at;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        fx.repo.sync(fx.post_id, &[t2, t1]).await.unwrap();

        let rows = fx.repo.list_for_post(fx.post_id).await.unwrap();
        let kept = rows.iter().find(|r| r.tag_id == t1).expect("t1 retained");
        assert_eq!(kept.created_at, original);
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_tag_rolls_back() {
        let fx = setup(2).await;
        let (t1, t2) = (fx.tags[0], fx.tags[1]);
        fx.repo.sync(fx.post_id, &[t1]).await.unwrap();

        // Removing t1 and adding t2 would both happen before the bad insert.
        let err = fx.repo.sync(fx.post_id, &[t2, 9999]).await.unwrap_err();
        assert!(matches!(err, RepositoryError::ForeignKeyViolation(_)), "got {:?}", err);
        assert_eq!(stored_tag_ids(&fx).await, vec![t1]);
    }

    #[tokio::test]
    async fn test_unknown_post_is_not_found() {
        let fx = setup(1).await;
        let err = fx.repo.sync(4242, &fx.tags).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_for_posts_batches() {
        let fx = setup(2).await;
        let other = sqlx::query("INSERT INTO posts (title, slug, content) VALUES ('Q', 'q', 'c')")
            .execute(fx.pool.sqlite().unwrap())
            .await
            .unwrap()
            .last_insert_rowid();
        fx.repo.sync(fx.post_id, &fx.tags).await.unwrap();
        fx.repo.sync(other, &fx.tags[..1]).await.unwrap();

        let rows = fx.repo.list_for_posts(&[fx.post_id, other]).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(fx.repo.list_for_posts(&[]).await.unwrap().is_empty());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(20))]

            /// Whatever sequence of requested sets is applied, the stored set
            /// equals the distinct ids of the last request.
            #[test]
            fn sync_result_equals_last_requested_set(
                requests in prop::collection::vec(prop::collection::vec(0usize..5, 0..8), 1..4)
            ) {
                let rt = tokio::runtime::Runtime::new().unwrap();
                let result: Result<(), TestCaseError> = rt.block_on(async {
                    let fx = setup(5).await;
                    let mut expected = Vec::new();
                    for request in &requests {
                        let ids: Vec<i64> = request.iter().map(|i| fx.tags[*i]).collect();
                        fx.repo.sync(fx.post_id, &ids).await.expect("sync should succeed");
                        expected = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
                    }
                    prop_assert_eq!(stored_tag_ids(&fx).await, expected);

                    let last: Vec<i64> = requests[requests.len() - 1].iter().map(|i| fx.tags[*i]).collect();
                    let again = fx.repo.sync(fx.post_id, &last).await.expect("sync should succeed");
                    prop_assert!(again.is_noop());
                    Ok(())
                });
                result?;
            }
        }
    }
}
