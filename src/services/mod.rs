//! Services layer - Business logic
//!
//! Services sit between the HTTP handlers and the repositories. They own
//! validation, slug derivation, the post status rules and the settings the
//! server consults at runtime. Every service returns `ServiceResult`.

pub mod author;
pub mod category;
pub mod comment;
pub mod error;
pub mod password;
pub mod post;
pub mod settings;
pub mod slug;
pub mod tag;
pub mod user;

pub use author::AuthorService;
pub use category::CategoryService;
pub use comment::CommentService;
pub use error::{ServiceError, ServiceResult};
pub use password::{hash_password, verify_password};
pub use post::PostService;
pub use settings::SettingsService;
pub use slug::{generate_slug, is_valid_slug};
pub use tag::TagService;
pub use user::UserService;
