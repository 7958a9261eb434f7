//! Database repositories
//!
//! One repository per entity, each a trait plus an sqlx implementation that
//! dispatches on the configured driver. `relations` assembles posts with
//! their author, category and tags; `post_tag` owns the junction table.

pub mod author;
pub mod category;
pub mod comment;
pub mod post;
pub mod post_tag;
pub mod relations;
pub mod settings;
pub mod tag;
pub mod user;

pub use author::{AuthorRepository, SqlxAuthorRepository};
pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use post::{PostRepository, SqlxPostRepository};
pub use post_tag::{PostTagRepository, SqlxPostTagRepository};
pub use relations::{RelationLoader, SqlxRelationLoader};
pub use settings::{Setting, SettingsRepository, SqlxSettingsRepository};
pub use tag::{SqlxTagRepository, TagRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// `?, ?, ?` for an `IN (...)` list of `n` bound values
pub(crate) fn in_placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
