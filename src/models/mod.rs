//! Data models
//!
//! Entities stored in the database (Post, Author, Category, Tag, PostTag,
//! Comment, User), the assembled `PostWithRelations` view, and the input and
//! filter types accepted by repositories and services.

mod author;
mod category;
mod comment;
mod post;
mod tag;
mod user;

pub(crate) use author::decode_social;
pub use author::{is_valid_social, Author, CreateAuthorInput, UpdateAuthorInput};
pub use category::{Category, CategoryWithCount, CreateCategoryInput, UpdateCategoryInput};
pub use comment::{Comment, CreateCommentInput};
pub use post::{
    CreatePostInput, ListParams, PagedResult, Post, PostFilter, PostStatus, PostWithRelations,
    UpdatePostInput,
};
pub use tag::{CreateTagInput, PostTag, Tag, TagSyncOutcome, TagWithCount, UpdateTagInput};
pub use user::{CreateUserInput, UpdateUserInput, User, UserRole};
