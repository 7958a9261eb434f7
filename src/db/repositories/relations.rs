//! Post relation assembly
//!
//! Builds `PostWithRelations` views. Every call site, single post or list,
//! goes through the same batched loader: one query per related entity type
//! no matter how many posts are in the batch.
//!
//! Author, category and tag lookups are independent and run concurrently.
//! They are separate reads, not a snapshot.

use crate::db::error::{RepoResult, RepositoryError};
use crate::models::{Author, Category, Post, PostFilter, PostWithRelations, Tag};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::{AuthorRepository, CategoryRepository, PostRepository, PostTagRepository, TagRepository};

/// Loads posts together with their author, category and tags
#[async_trait]
pub trait RelationLoader: Send + Sync {
    /// Attach relations to a batch of posts, preserving their order
    async fn load(&self, posts: Vec<Post>) -> RepoResult<Vec<PostWithRelations>>;

    /// Attach relations to a single post
    async fn load_one(&self, post: Post) -> RepoResult<PostWithRelations> {
        let id = post.id;
        self.load(vec![post])
            .await?
            .pop()
            .ok_or_else(|| RepositoryError::not_found("Post", id))
    }

    /// Assemble a post by id. Fails with `NotFound` when there is no such post.
    async fn find_by_id(&self, id: i64) -> RepoResult<PostWithRelations>;

    /// Assemble a post by slug. Fails with `NotFound` when there is no such post.
    async fn find_by_slug(&self, slug: &str) -> RepoResult<PostWithRelations>;

    /// Assemble every post matching `filter`, newest first
    async fn find_all(&self, filter: &PostFilter) -> RepoResult<Vec<PostWithRelations>>;
}

/// Relation loader on top of the entity repositories
pub struct SqlxRelationLoader {
    posts: Arc<dyn PostRepository>,
    authors: Arc<dyn AuthorRepository>,
    categories: Arc<dyn CategoryRepository>,
    tags: Arc<dyn TagRepository>,
    post_tags: Arc<dyn PostTagRepository>,
}

impl SqlxRelationLoader {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        authors: Arc<dyn AuthorRepository>,
        categories: Arc<dyn CategoryRepository>,
        tags: Arc<dyn TagRepository>,
        post_tags: Arc<dyn PostTagRepository>,
    ) -> Self {
        Self {
            posts,
            authors,
            categories,
            tags,
            post_tags,
        }
    }

    pub fn boxed(
        posts: Arc<dyn PostRepository>,
        authors: Arc<dyn AuthorRepository>,
        categories: Arc<dyn CategoryRepository>,
        tags: Arc<dyn TagRepository>,
        post_tags: Arc<dyn PostTagRepository>,
    ) -> Arc<dyn RelationLoader> {
        Arc::new(Self::new(posts, authors, categories, tags, post_tags))
    }

    /// Junction rows grouped by post, plus every tag they point at
    async fn load_tags(&self, post_ids: &[i64]) -> RepoResult<(HashMap<i64, Vec<i64>>, Vec<Tag>)> {
        let links = self.post_tags.list_for_posts(post_ids).await?;

        let mut by_post: HashMap<i64, Vec<i64>> = HashMap::new();
        let mut tag_ids = BTreeSet::new();
        for link in links {
            tag_ids.insert(link.tag_id);
            by_post.entry(link.post_id).or_default().push(link.tag_id);
        }

        let tag_ids: Vec<i64> = tag_ids.into_iter().collect();
        let tags = self.tags.get_by_ids(&tag_ids).await?;
        Ok((by_post, tags))
    }
}

#[async_trait]
impl RelationLoader for SqlxRelationLoader {
    async fn load(&self, posts: Vec<Post>) -> RepoResult<Vec<PostWithRelations>> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        let author_ids = distinct(posts.iter().filter_map(|p| p.author_id));
        let category_ids = distinct(posts.iter().filter_map(|p| p.category_id));

        let (authors, categories, (tags_by_post, tags)) = futures::try_join!(
            self.authors.get_by_ids(&author_ids),
            self.categories.get_by_ids(&category_ids),
            self.load_tags(&post_ids),
        )?;

        Ok(assemble(posts, authors, categories, tags_by_post, tags))
    }

    async fn find_by_id(&self, id: i64) -> RepoResult<PostWithRelations> {
        let post = self
            .posts
            .get_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Post", id))?;
        self.load_one(post).await
    }

    async fn find_by_slug(&self, slug: &str) -> RepoResult<PostWithRelations> {
        let post = self
            .posts
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| RepositoryError::not_found("Post", slug))?;
        self.load_one(post).await
    }

    async fn find_all(&self, filter: &PostFilter) -> RepoResult<Vec<PostWithRelations>> {
        let posts = self.posts.find_all(filter).await?;
        self.load(posts).await
    }
}

fn distinct(ids: impl Iterator<Item = i64>) -> Vec<i64> {
    ids.collect::<BTreeSet<_>>().into_iter().collect()
}

/// Merge fetched rows into views. References that did not resolve become
/// `None` (author, category) or are dropped (tags). Tags are ordered by name.
fn assemble(
    posts: Vec<Post>,
    authors: Vec<Author>,
    categories: Vec<Category>,
    mut tags_by_post: HashMap<i64, Vec<i64>>,
    tags: Vec<Tag>,
) -> Vec<PostWithRelations> {
    let authors: HashMap<i64, Author> = authors.into_iter().map(|a| (a.id, a)).collect();
    let categories: HashMap<i64, Category> = categories.into_iter().map(|c| (c.id, c)).collect();
    let tags: HashMap<i64, Tag> = tags.into_iter().map(|t| (t.id, t)).collect();

    posts
        .into_iter()
        .map(|post| {
            let author = post.author_id.and_then(|id| authors.get(&id).cloned());
            let category = post.category_id.and_then(|id| categories.get(&id).cloned());
            let mut post_tags: Vec<Tag> = tags_by_post
                .remove(&post.id)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|id| tags.get(&id).cloned())
                .collect();
            post_tags.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
            post_tags.dedup_by_key(|t| t.id);

            PostWithRelations {
                post,
                author,
                category,
                tags: post_tags,
            }
        })
        .collect()
}
