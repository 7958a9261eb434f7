//! Post service
//!
//! Business rules around posts:
//! - slug derivation and validation
//! - initial status and the status transition table
//! - tag-set replacement through the junction repository
//! - reader-facing lookups restricted to live posts
//!
//! Every read returns the assembled `PostWithRelations` view produced by the
//! relation loader, so single-post and list responses share one shape.

use std::sync::Arc;

use crate::db::repositories::{PostRepository, PostTagRepository, RelationLoader};
use crate::models::{
    CreatePostInput, ListParams, PagedResult, PostFilter, PostStatus, PostWithRelations,
    UpdatePostInput,
};

use super::error::{ServiceError, ServiceResult};
use super::slug::resolve_slug;

/// Guarded updates re-read and re-check this many times
const UPDATE_ATTEMPTS: usize = 3;

/// Post service
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    post_tags: Arc<dyn PostTagRepository>,
    loader: Arc<dyn RelationLoader>,
    enforce_transitions: bool,
}

impl PostService {
    /// Create a post service. With `enforce_transitions` off any status may
    /// be set on any post.
    pub fn new(
        posts: Arc<dyn PostRepository>,
        post_tags: Arc<dyn PostTagRepository>,
        loader: Arc<dyn RelationLoader>,
        enforce_transitions: bool,
    ) -> Self {
        Self {
            posts,
            post_tags,
            loader,
            enforce_transitions,
        }
    }

    pub fn enforces_transitions(&self) -> bool {
        self.enforce_transitions
    }

    /// Create a post and attach its tags.
    ///
    /// The row and the tag set are written separately. If the tag sync fails
    /// the new row is removed again before the error is returned.
    pub async fn create(&self, input: CreatePostInput) -> ServiceResult<PostWithRelations> {
        let mut input = input;
        input.title = input.title.trim().to_string();
        if input.title.is_empty() {
            return Err(ServiceError::validation("Title cannot be empty"));
        }
        input.slug = resolve_slug(&input.slug, &input.title)?;

        let status = input.status.unwrap_or_default();
        if self.enforce_transitions && !status.is_valid_initial() {
            return Err(ServiceError::validation(format!(
                "New posts must start as DRAFT or PUBLISHED, got {}",
                status
            )));
        }
        input.status = Some(status);

        let post = self.posts.create(&input).await?;

        if !input.tag_ids.is_empty() {
            if let Err(err) = self.post_tags.sync(post.id, &input.tag_ids).await {
                if let Err(cleanup) = self.posts.delete(post.id).await {
                    tracing::warn!("Failed to remove post {} after tag sync error: {}", post.id, cleanup);
                }
                return Err(err.into());
            }
        }

        tracing::info!("Created post {} ({}) as {}", post.id, post.slug, post.status);
        Ok(self.loader.find_by_id(post.id).await?)
    }

    /// Any post by ID, whatever its status
    pub async fn get_by_id(&self, id: i64) -> ServiceResult<PostWithRelations> {
        Ok(self.loader.find_by_id(id).await?)
    }

    pub async fn get_by_slug(&self, slug: &str) -> ServiceResult<PostWithRelations> {
        Ok(self.loader.find_by_slug(slug).await?)
    }

    /// A post readers may see. Non-live posts are reported as missing.
    pub async fn get_published_by_slug(&self, slug: &str) -> ServiceResult<PostWithRelations> {
        let post = self.loader.find_by_slug(slug).await?;
        if !post.post.is_live() {
            return Err(ServiceError::not_found("Post", slug));
        }
        Ok(post)
    }

    /// One page of posts matching `filter`, assembled in a single batch
    pub async fn list(
        &self,
        filter: &PostFilter,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<PostWithRelations>> {
        let (posts, total) = futures::try_join!(
            self.posts.list(filter, params.offset(), params.limit()),
            self.posts.count(filter),
        )?;
        let items = self.loader.load(posts).await?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Like `list` but restricted to live posts regardless of `filter.statuses`
    pub async fn list_published(
        &self,
        filter: PostFilter,
        params: &ListParams,
    ) -> ServiceResult<PagedResult<PostWithRelations>> {
        let filter = PostFilter {
            statuses: PostStatus::live(),
            ..filter
        };
        self.list(&filter, params).await
    }

    /// Every post matching `filter`, unpaged
    pub async fn find_all(&self, filter: &PostFilter) -> ServiceResult<Vec<PostWithRelations>> {
        Ok(self.loader.find_all(filter).await?)
    }

    /// Apply a partial update. A status change is checked against the
    /// transition table; `tag_ids`, when present, replaces the tag set.
    ///
    /// The row and the tag set are written in one transaction. When the
    /// transition table is enforced, the write is guarded on the status the
    /// check was made against; if another writer got there first the check
    /// is repeated on the fresh row.
    pub async fn update(&self, id: i64, input: UpdatePostInput) -> ServiceResult<PostWithRelations> {
        let mut input = input;
        if let Some(title) = input.title.as_mut() {
            *title = title.trim().to_string();
            if title.is_empty() {
                return Err(ServiceError::validation("Title cannot be empty"));
            }
        }

        for attempt in 1..=UPDATE_ATTEMPTS {
            let existing = self
                .posts
                .get_by_id(id)
                .await?
                .ok_or_else(|| ServiceError::not_found("Post", id))?;

            let mut write = input.clone();
            if let Some(slug) = write.slug.take() {
                let source = write.title.as_deref().unwrap_or(&existing.title);
                write.slug = Some(resolve_slug(&slug, source)?);
            }
            let mut expected_status = None;
            if let Some(to) = write.status {
                self.check_transition(existing.status, to)?;
                if self.enforce_transitions {
                    expected_status = Some(existing.status);
                }
            }

            match self.posts.update(id, &write, expected_status).await {
                Ok(post) => {
                    if post.status != existing.status {
                        tracing::info!("Post {} moved from {} to {}", id, existing.status, post.status);
                    }
                    return Ok(self.loader.find_by_id(id).await?);
                }
                Err(err) if err.is_conflict() => {
                    tracing::debug!(
                        "Post {} changed during update, retrying ({}/{})",
                        id,
                        attempt,
                        UPDATE_ATTEMPTS
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ServiceError::Conflict(format!(
            "Post {} kept changing; update abandoned",
            id
        )))
    }

    /// Move a post to `status`
    pub async fn transition_status(&self, id: i64, status: PostStatus) -> ServiceResult<PostWithRelations> {
        self.update(id, UpdatePostInput::new().with_status(status)).await
    }

    /// Replace the tag set of a post. Duplicate ids collapse.
    pub async fn set_tags(&self, id: i64, tag_ids: &[i64]) -> ServiceResult<PostWithRelations> {
        self.post_tags.sync(id, tag_ids).await?;
        Ok(self.loader.find_by_id(id).await?)
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        self.posts.delete(id).await?;
        tracing::info!("Deleted post {}", id);
        Ok(())
    }

    /// Count a view on a live post and return the new total
    pub async fn record_view(&self, id: i64) -> ServiceResult<i64> {
        let post = self
            .posts
            .get_by_id(id)
            .await?
            .filter(|p| p.is_live())
            .ok_or_else(|| ServiceError::not_found("Post", id))?;
        Ok(self.posts.increment_views(post.id).await?)
    }

    fn check_transition(&self, from: PostStatus, to: PostStatus) -> ServiceResult<()> {
        if self.enforce_transitions && !from.can_transition_to(to) {
            tracing::warn!("Rejected status change {} -> {}", from, to);
            return Err(ServiceError::InvalidStatusTransition { from, to });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        AuthorRepository, CategoryRepository, SqlxAuthorRepository, SqlxCategoryRepository,
        SqlxPostRepository, SqlxPostTagRepository, SqlxRelationLoader, SqlxTagRepository,
        TagRepository,
    };
    use crate::db::{create_test_pool, migrations::run_migrations, DynDatabasePool, RepoResult};
    use crate::models::{CreateAuthorInput, CreateCategoryInput, CreateTagInput, Post};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Fixture {
        pool: DynDatabasePool,
        service: PostService,
        tags: Arc<dyn TagRepository>,
    }

    async fn setup(enforce: bool) -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        let posts = SqlxPostRepository::boxed(pool.clone());
        let post_tags = SqlxPostTagRepository::boxed(pool.clone());
        let tags = SqlxTagRepository::boxed(pool.clone());
        let loader = SqlxRelationLoader::boxed(
            posts.clone(),
            SqlxAuthorRepository::boxed(pool.clone()),
            SqlxCategoryRepository::boxed(pool.clone()),
            tags.clone(),
            post_tags.clone(),
        );

        Fixture {
            pool,
            service: PostService::new(posts, post_tags, loader, enforce),
            tags,
        }
    }

    async fn tag(fx: &Fixture, name: &str) -> i64 {
        fx.tags
            .create(&CreateTagInput {
                name: name.to_string(),
                slug: name.to_lowercase(),
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_create_derives_slug_and_assembles() {
        let fx = setup(true).await;
        let author = SqlxAuthorRepository::new(fx.pool.clone())
            .create(&CreateAuthorInput::new("Ada"))
            .await
            .unwrap();
        let category = SqlxCategoryRepository::new(fx.pool.clone())
            .create(&CreateCategoryInput {
                name: "Notes".into(),
                slug: "notes".into(),
            })
            .await
            .unwrap();
        let rust = tag(&fx, "Rust").await;

        let created = fx
            .service
            .create(
                CreatePostInput::new("  Hello World  ", "body")
                    .with_author(author.id)
                    .with_category(category.id)
                    .with_tags(vec![rust, rust]),
            )
            .await
            .unwrap();

        assert_eq!(created.post.title, "Hello World");
        assert_eq!(created.post.slug, "hello-world");
        assert_eq!(created.post.status, PostStatus::Draft);
        assert_eq!(created.author.as_ref().map(|a| a.name.as_str()), Some("Ada"));
        assert_eq!(created.category.as_ref().map(|c| c.slug.as_str()), Some("notes"));
        assert_eq!(created.tag_ids(), vec![rust]);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let fx = setup(true).await;

        let err = fx.service.create(CreatePostInput::new("   ", "body")).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));

        let err = fx
            .service
            .create(CreatePostInput::new("Title", "body").with_slug("Bad Slug"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));

        let err = fx
            .service
            .create(CreatePostInput::new("Title", "body").with_status(PostStatus::Corrected))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_create_with_unknown_tag_leaves_no_post() {
        let fx = setup(true).await;

        let err = fx
            .service
            .create(CreatePostInput::new("Orphan", "body").with_tags(vec![404]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidReference(_)), "got {:?}", err);

        let all = fx.service.find_all(&PostFilter::default()).await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_reported() {
        let fx = setup(true).await;
        fx.service.create(CreatePostInput::new("Same", "a")).await.unwrap();

        let err = fx.service.create(CreatePostInput::new("Same", "b")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_transitions_enforced() {
        let fx = setup(true).await;
        let id = fx.service.create(CreatePostInput::new("Flow", "x")).await.unwrap().post.id;

        let err = fx
            .service
            .transition_status(id, PostStatus::Corrected)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidStatusTransition {
                from: PostStatus::Draft,
                to: PostStatus::Corrected
            }
        ));

        for step in [
            PostStatus::Published,
            PostStatus::Corrected,
            PostStatus::Unpublished,
            PostStatus::Draft,
        ] {
            let post = fx.service.transition_status(id, step).await.unwrap();
            assert_eq!(post.post.status, step);
        }

        // staying put is allowed
        let post = fx.service.transition_status(id, PostStatus::Draft).await.unwrap();
        assert_eq!(post.post.status, PostStatus::Draft);
    }

    #[tokio::test]
    async fn test_transitions_permissive_when_disabled() {
        let fx = setup(false).await;
        let id = fx
            .service
            .create(CreatePostInput::new("Loose", "x").with_status(PostStatus::Unpublished))
            .await
            .unwrap()
            .post
            .id;

        let post = fx.service.transition_status(id, PostStatus::Corrected).await.unwrap();
        assert_eq!(post.post.status, PostStatus::Corrected);
    }

    #[tokio::test]
    async fn test_update_replaces_tags_and_keeps_row() {
        let fx = setup(true).await;
        let a = tag(&fx, "A").await;
        let b = tag(&fx, "B").await;
        let created = fx
            .service
            .create(CreatePostInput::new("Tagged", "x").with_tags(vec![a]))
            .await
            .unwrap();

        let updated = fx
            .service
            .update(created.post.id, UpdatePostInput::new().with_tags(vec![b, b]))
            .await
            .unwrap();
        assert_eq!(updated.tag_ids(), vec![b]);
        assert_eq!(updated.post.updated_at, created.post.updated_at);

        let cleared = fx.service.set_tags(created.post.id, &[]).await.unwrap();
        assert!(cleared.tags.is_empty());
    }

    #[tokio::test]
    async fn test_update_with_unknown_tag_changes_nothing() {
        let fx = setup(true).await;
        let a = tag(&fx, "A").await;
        let created = fx
            .service
            .create(CreatePostInput::new("Before", "x").with_tags(vec![a]))
            .await
            .unwrap();

        let input = UpdatePostInput::new()
            .with_title("After")
            .with_status(PostStatus::Published)
            .with_tags(vec![9999]);
        let err = fx.service.update(created.post.id, input).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidReference(_)), "got {:?}", err);

        let stored = fx.service.get_by_id(created.post.id).await.unwrap();
        assert_eq!(stored.post.title, "Before");
        assert_eq!(stored.post.status, PostStatus::Draft);
        assert_eq!(stored.tag_ids(), vec![a]);
    }

    /// Changes the stored status right before the first guarded write, the
    /// way a concurrent request would.
    struct InterleavedPosts {
        inner: Arc<dyn PostRepository>,
        interleave: PostStatus,
        fired: AtomicBool,
    }

    #[async_trait]
    impl PostRepository for InterleavedPosts {
        async fn create(&self, input: &CreatePostInput) -> RepoResult<Post> {
            self.inner.create(input).await
        }

        async fn get_by_id(&self, id: i64) -> RepoResult<Option<Post>> {
            self.inner.get_by_id(id).await
        }

        async fn get_by_slug(&self, slug: &str) -> RepoResult<Option<Post>> {
            self.inner.get_by_slug(slug).await
        }

        async fn list(&self, filter: &PostFilter, offset: i64, limit: i64) -> RepoResult<Vec<Post>> {
            self.inner.list(filter, offset, limit).await
        }

        async fn find_all(&self, filter: &PostFilter) -> RepoResult<Vec<Post>> {
            self.inner.find_all(filter).await
        }

        async fn count(&self, filter: &PostFilter) -> RepoResult<i64> {
            self.inner.count(filter).await
        }

        async fn update(
            &self,
            id: i64,
            input: &UpdatePostInput,
            expected_status: Option<PostStatus>,
        ) -> RepoResult<Post> {
            if !self.fired.swap(true, Ordering::SeqCst) {
                let other = UpdatePostInput::new().with_status(self.interleave);
                self.inner.update(id, &other, None).await?;
            }
            self.inner.update(id, input, expected_status).await
        }

        async fn delete(&self, id: i64) -> RepoResult<()> {
            self.inner.delete(id).await
        }

        async fn increment_views(&self, id: i64) -> RepoResult<i64> {
            self.inner.increment_views(id).await
        }

        async fn count_live_by_author(&self, author_id: i64) -> RepoResult<i64> {
            self.inner.count_live_by_author(author_id).await
        }
    }

    async fn interleaved_service(interleave: PostStatus) -> (PostService, i64) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        let inner = SqlxPostRepository::boxed(pool.clone());
        let post = inner
            .create(
                &CreatePostInput::new("Raced", "x")
                    .with_slug("raced")
                    .with_status(PostStatus::Published),
            )
            .await
            .unwrap();

        let posts: Arc<dyn PostRepository> = Arc::new(InterleavedPosts {
            inner: inner.clone(),
            interleave,
            fired: AtomicBool::new(false),
        });
        let post_tags = SqlxPostTagRepository::boxed(pool.clone());
        let loader = SqlxRelationLoader::boxed(
            inner,
            SqlxAuthorRepository::boxed(pool.clone()),
            SqlxCategoryRepository::boxed(pool.clone()),
            SqlxTagRepository::boxed(pool.clone()),
            post_tags.clone(),
        );
        (PostService::new(posts, post_tags, loader, true), post.id)
    }

    #[tokio::test]
    async fn test_interleaved_status_change_is_rechecked() {
        // PUBLISHED -> CORRECTED is legal, but the row becomes UNPUBLISHED
        // first and UNPUBLISHED -> CORRECTED is not.
        let (service, id) = interleaved_service(PostStatus::Unpublished).await;

        let err = service
            .transition_status(id, PostStatus::Corrected)
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                ServiceError::InvalidStatusTransition {
                    from: PostStatus::Unpublished,
                    to: PostStatus::Corrected
                }
            ),
            "got {:?}",
            err
        );
        let stored = service.get_by_id(id).await.unwrap();
        assert_eq!(stored.post.status, PostStatus::Unpublished);
    }

    #[tokio::test]
    async fn test_interleaved_change_retries_when_still_legal() {
        // the row becomes CORRECTED first; CORRECTED -> UNPUBLISHED is legal
        let (service, id) = interleaved_service(PostStatus::Corrected).await;

        let updated = service
            .transition_status(id, PostStatus::Unpublished)
            .await
            .unwrap();
        assert_eq!(updated.post.status, PostStatus::Unpublished);
    }

    #[tokio::test]
    async fn test_update_empty_slug_regenerates_from_title() {
        let fx = setup(true).await;
        let id = fx.service.create(CreatePostInput::new("Old", "x")).await.unwrap().post.id;

        let mut input = UpdatePostInput::new().with_title("New Title");
        input.slug = Some(String::new());
        let updated = fx.service.update(id, input).await.unwrap();
        assert_eq!(updated.post.slug, "new-title");
    }

    #[tokio::test]
    async fn test_update_missing_post() {
        let fx = setup(true).await;
        let err = fx
            .service
            .update(99, UpdatePostInput::new().with_title("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_public_reads_hide_drafts() {
        let fx = setup(true).await;
        let draft = fx.service.create(CreatePostInput::new("Draft", "x")).await.unwrap();
        fx.service
            .create(CreatePostInput::new("Live", "x").with_status(PostStatus::Published))
            .await
            .unwrap();

        let err = fx.service.get_published_by_slug("draft").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(fx.service.get_published_by_slug("live").await.is_ok());
        assert!(fx.service.record_view(draft.post.id).await.is_err());

        let page = fx
            .service
            .list_published(PostFilter::default(), &ListParams::new(1, 10))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].post.slug, "live");

        let page = fx
            .service
            .list(&PostFilter::default(), &ListParams::new(1, 10))
            .await
            .unwrap();
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn test_record_view() {
        let fx = setup(true).await;
        let id = fx
            .service
            .create(CreatePostInput::new("Counted", "x").with_status(PostStatus::Published))
            .await
            .unwrap()
            .post
            .id;

        assert_eq!(fx.service.record_view(id).await.unwrap(), 1);
        assert_eq!(fx.service.record_view(id).await.unwrap(), 2);
    }
}
