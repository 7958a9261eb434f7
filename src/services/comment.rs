//! Comment service
//!
//! Readers may comment on live posts while `comments_enabled` is on. New
//! comments wait for approval unless `comment_moderation` is "false".

use std::sync::Arc;

use crate::db::repositories::{CommentRepository, PostRepository};
use crate::models::{Comment, CreateCommentInput, ListParams, PagedResult};

use super::error::{ServiceError, ServiceResult};
use super::settings::SettingsService;
use super::user::is_valid_email;

const MAX_COMMENT_LENGTH: usize = 5000;

pub struct CommentService {
    comments: Arc<dyn CommentRepository>,
    posts: Arc<dyn PostRepository>,
    settings: Arc<SettingsService>,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentRepository>,
        posts: Arc<dyn PostRepository>,
        settings: Arc<SettingsService>,
    ) -> Self {
        Self {
            comments,
            posts,
            settings,
        }
    }

    /// Submit a reader comment on a live post
    pub async fn create(&self, input: CreateCommentInput) -> ServiceResult<Comment> {
        if !self.settings.flag("comments_enabled", true).await? {
            return Err(ServiceError::Disabled("Comments are disabled".to_string()));
        }

        let input = validate(input)?;
        self.posts
            .get_by_id(input.post_id)
            .await?
            .filter(|p| p.is_live())
            .ok_or_else(|| ServiceError::not_found("Post", input.post_id))?;

        let approved = !self.settings.flag("comment_moderation", true).await?;
        let comment = self.comments.create(&input, approved).await?;
        tracing::info!(
            "New comment {} on post {} (approved: {})",
            comment.id,
            comment.post_id,
            comment.approved
        );
        Ok(comment)
    }

    /// Approved comments of a post, oldest first
    pub async fn list_for_post(&self, post_id: i64) -> ServiceResult<Vec<Comment>> {
        Ok(self.comments.list_by_post(post_id, true).await?)
    }

    /// Moderation queue or full list for the dashboard
    pub async fn list(&self, pending_only: bool, params: &ListParams) -> ServiceResult<PagedResult<Comment>> {
        let (items, total) = self
            .comments
            .list_all(pending_only, params.offset(), params.limit())
            .await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn approve(&self, id: i64) -> ServiceResult<Comment> {
        Ok(self.comments.approve(id).await?)
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        self.comments.delete(id).await?;
        Ok(())
    }
}

fn validate(input: CreateCommentInput) -> ServiceResult<CreateCommentInput> {
    let content = input.content.trim().to_string();
    if content.is_empty() {
        return Err(ServiceError::validation("Comment cannot be empty"));
    }
    if content.chars().count() > MAX_COMMENT_LENGTH {
        return Err(ServiceError::validation(format!(
            "Comment cannot exceed {} characters",
            MAX_COMMENT_LENGTH
        )));
    }

    let author_name = input.author_name.trim().to_string();
    if author_name.is_empty() {
        return Err(ServiceError::validation("Name cannot be empty"));
    }

    let author_email = input.author_email.trim().to_string();
    if !is_valid_email(&author_email) {
        return Err(ServiceError::validation("Invalid email address"));
    }

    Ok(CreateCommentInput {
        post_id: input.post_id,
        content,
        author_name,
        author_email,
    })
}
