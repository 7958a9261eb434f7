//! Comment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reader comment on a post. Hidden from the public site until approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub content: String,
    pub author_name: String,
    pub author_email: String,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a comment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommentInput {
    pub post_id: i64,
    pub content: String,
    pub author_name: String,
    pub author_email: String,
}

impl CreateCommentInput {
    pub fn new(
        post_id: i64,
        content: impl Into<String>,
        author_name: impl Into<String>,
        author_email: impl Into<String>,
    ) -> Self {
        Self {
            post_id,
            content: content.into(),
            author_name: author_name.into(),
            author_email: author_email.into(),
        }
    }
}
