//! Post model
//!
//! This module provides:
//! - `Post` entity and the `PostStatus` state machine
//! - `PostWithRelations`, the assembled view served to readers
//! - Input and filter types for the post repository
//! - Pagination types shared by list queries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Author, Category, Tag};

/// Post entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub title: String,
    /// URL-friendly slug, unique across posts
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image: Option<String>,
    /// Display date shown to readers
    pub date: DateTime<Utc>,
    pub featured: bool,
    pub status: PostStatus,
    pub views: i64,
    pub author_id: Option<i64>,
    pub category_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Whether readers can see this post
    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }
}

/// Publication status.
///
/// ```text
/// DRAFT ──> PUBLISHED ──> UNPUBLISHED ──> DRAFT
///              │  ^            │
///              v  └────────────┘
///          CORRECTED ──> UNPUBLISHED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
    Unpublished,
    /// Published with an editorial correction
    Corrected,
}

impl PostStatus {
    pub const ALL: [PostStatus; 4] = [
        PostStatus::Draft,
        PostStatus::Published,
        PostStatus::Unpublished,
        PostStatus::Corrected,
    ];

    /// Database / wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "DRAFT",
            PostStatus::Published => "PUBLISHED",
            PostStatus::Unpublished => "UNPUBLISHED",
            PostStatus::Corrected => "CORRECTED",
        }
    }

    /// Statuses this one may move to. Staying put is always allowed and is
    /// not listed here.
    pub fn next_states(&self) -> &'static [PostStatus] {
        match self {
            PostStatus::Draft => &[PostStatus::Published],
            PostStatus::Published => &[PostStatus::Unpublished, PostStatus::Corrected],
            PostStatus::Unpublished => &[PostStatus::Published, PostStatus::Draft],
            PostStatus::Corrected => &[PostStatus::Unpublished],
        }
    }

    pub fn can_transition_to(&self, to: PostStatus) -> bool {
        *self == to || self.next_states().contains(&to)
    }

    /// Statuses a new post may be created in
    pub fn is_valid_initial(&self) -> bool {
        matches!(self, PostStatus::Draft | PostStatus::Published)
    }

    /// Published and corrected posts are visible to readers
    pub fn is_live(&self) -> bool {
        matches!(self, PostStatus::Published | PostStatus::Corrected)
    }

    pub fn live() -> Vec<PostStatus> {
        vec![PostStatus::Published, PostStatus::Corrected]
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "DRAFT" => Ok(PostStatus::Draft),
            "PUBLISHED" => Ok(PostStatus::Published),
            "UNPUBLISHED" => Ok(PostStatus::Unpublished),
            "CORRECTED" => Ok(PostStatus::Corrected),
            _ => Err(anyhow::anyhow!("Invalid post status: {}", s)),
        }
    }
}

/// A post with its author, category and tags resolved.
///
/// Author and category are `None` when the post has no reference or the
/// referenced row no longer exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostWithRelations {
    #[serde(flatten)]
    pub post: Post,
    pub author: Option<Author>,
    pub category: Option<Category>,
    pub tags: Vec<Tag>,
}

impl PostWithRelations {
    pub fn tag_ids(&self) -> Vec<i64> {
        self.tags.iter().map(|t| t.id).collect()
    }
}

/// Input for creating a new post
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostInput {
    pub title: String,
    /// Generated from the title when empty
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub content: String,
    #[serde(default)]
    pub cover_image: Option<String>,
    /// Defaults to the creation time
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub featured: bool,
    /// Defaults to Draft
    #[serde(default)]
    pub status: Option<PostStatus>,
    #[serde(default)]
    pub author_id: Option<i64>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

impl CreatePostInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = slug.into();
        self
    }

    pub fn with_status(mut self, status: PostStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_author(mut self, author_id: i64) -> Self {
        self.author_id = Some(author_id);
        self
    }

    pub fn with_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_tags(mut self, tag_ids: Vec<i64>) -> Self {
        self.tag_ids = tag_ids;
        self
    }

    pub fn with_featured(mut self, featured: bool) -> Self {
        self.featured = featured;
        self
    }
}

/// Input for updating an existing post.
///
/// Nullable columns use `Option<Option<T>>`: absent leaves the column alone,
/// an explicit `null` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub excerpt: Option<Option<String>>,
    pub content: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub cover_image: Option<Option<String>>,
    pub date: Option<DateTime<Utc>>,
    pub featured: Option<bool>,
    pub status: Option<PostStatus>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub author_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub category_id: Option<Option<i64>>,
    /// Replaces the post's tag set when present
    pub tag_ids: Option<Vec<i64>>,
}

impl UpdatePostInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_status(mut self, status: PostStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_author(mut self, author_id: Option<i64>) -> Self {
        self.author_id = Some(author_id);
        self
    }

    pub fn with_category(mut self, category_id: Option<i64>) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_tags(mut self, tag_ids: Vec<i64>) -> Self {
        self.tag_ids = Some(tag_ids);
        self
    }

    /// Whether any column of the post row changes. `tag_ids` is not a column.
    pub fn has_row_changes(&self) -> bool {
        self.title.is_some()
            || self.slug.is_some()
            || self.excerpt.is_some()
            || self.content.is_some()
            || self.cover_image.is_some()
            || self.date.is_some()
            || self.featured.is_some()
            || self.status.is_some()
            || self.author_id.is_some()
            || self.category_id.is_some()
    }

    pub fn has_changes(&self) -> bool {
        self.has_row_changes() || self.tag_ids.is_some()
    }
}

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// Filters for post listing. Empty `statuses` means any status.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub statuses: Vec<PostStatus>,
    pub author_id: Option<i64>,
    pub category_id: Option<i64>,
    pub tag_id: Option<i64>,
    pub featured: Option<bool>,
    /// Substring match on title and excerpt
    pub search: Option<String>,
}

impl PostFilter {
    /// Posts readers may see
    pub fn live() -> Self {
        Self {
            statuses: PostStatus::live(),
            ..Default::default()
        }
    }
}

/// Pagination parameters for list queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    /// Number of items per page
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    /// Create pagination params, clamping to page >= 1 and 1..=100 per page
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    pub fn offset(&self) -> i64 {
        ((self.page - 1) as i64) * (self.per_page as i64)
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// One page of results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 {
            return 0;
        }
        ((self.total as f64) / (self.per_page as f64)).ceil() as u32
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in PostStatus::ALL {
            assert_eq!(status.as_str().parse::<PostStatus>().unwrap(), status);
        }
        assert_eq!("published".parse::<PostStatus>().unwrap(), PostStatus::Published);
        assert!("archived".parse::<PostStatus>().is_err());
    }

    #[test]
    fn test_transition_table() {
        use PostStatus::*;

        assert!(Draft.can_transition_to(Published));
        assert!(!Draft.can_transition_to(Unpublished));
        assert!(!Draft.can_transition_to(Corrected));

        assert!(Published.can_transition_to(Unpublished));
        assert!(Published.can_transition_to(Corrected));
        assert!(!Published.can_transition_to(Draft));

        assert!(Unpublished.can_transition_to(Published));
        assert!(Unpublished.can_transition_to(Draft));
        assert!(!Unpublished.can_transition_to(Corrected));

        assert!(Corrected.can_transition_to(Unpublished));
        assert!(!Corrected.can_transition_to(Draft));
        assert!(!Corrected.can_transition_to(Published));
    }

    #[test]
    fn test_same_state_always_allowed() {
        for status in PostStatus::ALL {
            assert!(status.can_transition_to(status));
        }
    }

    #[test]
    fn test_corrected_only_reachable_from_published() {
        for from in PostStatus::ALL {
            if from == PostStatus::Corrected {
                continue;
            }
            assert_eq!(
                from.can_transition_to(PostStatus::Corrected),
                from == PostStatus::Published,
                "{} -> CORRECTED",
                from
            );
        }
    }

    #[test]
    fn test_status_serde_uppercase() {
        let json = serde_json::to_string(&PostStatus::Unpublished).unwrap();
        assert_eq!(json, "\"UNPUBLISHED\"");
        let parsed: PostStatus = serde_json::from_str("\"CORRECTED\"").unwrap();
        assert_eq!(parsed, PostStatus::Corrected);
    }

    #[test]
    fn test_update_input_null_clears_nullable_fields() {
        let input: UpdatePostInput =
            serde_json::from_str(r#"{"authorId": null, "title": "New"}"#).unwrap();
        assert_eq!(input.author_id, Some(None));
        assert_eq!(input.category_id, None);
        assert_eq!(input.title.as_deref(), Some("New"));
        assert!(input.has_row_changes());

        let input: UpdatePostInput = serde_json::from_str(r#"{"tagIds": [1, 2]}"#).unwrap();
        assert!(!input.has_row_changes());
        assert!(input.has_changes());
    }

    #[test]
    fn test_list_params_clamped() {
        let params = ListParams::new(0, 500);
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);
        assert_eq!(ListParams::new(3, 10).offset(), 20);
    }

    #[test]
    fn test_paged_result_navigation() {
        let result = PagedResult::new(vec![1, 2], 21, &ListParams::new(2, 10));
        assert_eq!(result.total_pages(), 3);
        assert!(result.has_next());
        assert!(result.has_prev());

        let mapped = result.map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20]);
    }
}
