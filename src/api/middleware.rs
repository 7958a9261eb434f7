//! API middleware and shared handler types
//!
//! Contains:
//! - `AppState`, the services shared by every handler
//! - `ApiError`, the JSON error body and its status mapping
//! - `require_admin`, the bearer-token guard for `/admin` routes

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::db::repositories::{
    SqlxAuthorRepository, SqlxCategoryRepository, SqlxCommentRepository, SqlxPostRepository,
    SqlxPostTagRepository, SqlxRelationLoader, SqlxSettingsRepository, SqlxTagRepository,
    SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::services::{
    AuthorService, CategoryService, CommentService, PostService, ServiceError, SettingsService,
    TagService, UserService,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    /// Bearer token for admin routes; `None` closes them
    pub admin_token: Option<Arc<str>>,
    pub post_service: Arc<PostService>,
    pub author_service: Arc<AuthorService>,
    pub category_service: Arc<CategoryService>,
    pub tag_service: Arc<TagService>,
    pub comment_service: Arc<CommentService>,
    pub user_service: Arc<UserService>,
    pub settings_service: Arc<SettingsService>,
}

impl AppState {
    /// Wire repositories and services over `pool`
    pub fn build(pool: DynDatabasePool, config: &Config) -> Self {
        let posts = SqlxPostRepository::boxed(pool.clone());
        let authors = SqlxAuthorRepository::boxed(pool.clone());
        let categories = SqlxCategoryRepository::boxed(pool.clone());
        let tags = SqlxTagRepository::boxed(pool.clone());
        let post_tags = SqlxPostTagRepository::boxed(pool.clone());
        let loader = SqlxRelationLoader::boxed(
            posts.clone(),
            authors.clone(),
            categories.clone(),
            tags.clone(),
            post_tags.clone(),
        );

        let settings_service = Arc::new(SettingsService::new(SqlxSettingsRepository::boxed(
            pool.clone(),
            config.settings.defaults.clone(),
        )));

        Self {
            admin_token: config
                .server
                .admin_token
                .as_deref()
                .filter(|t| !t.is_empty())
                .map(Arc::from),
            post_service: Arc::new(PostService::new(
                posts.clone(),
                post_tags,
                loader,
                config.content.enforce_status_transitions,
            )),
            author_service: Arc::new(AuthorService::new(authors, posts.clone())),
            category_service: Arc::new(CategoryService::new(categories)),
            tag_service: Arc::new(TagService::new(tags)),
            comment_service: Arc::new(CommentService::new(
                SqlxCommentRepository::boxed(pool.clone()),
                posts,
                settings_service.clone(),
            )),
            user_service: Arc::new(UserService::new(SqlxUserRepository::boxed(pool.clone()))),
            settings_service,
            pool,
        }
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" | "COMMENTS_DISABLED" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" | "DUPLICATE" | "INVALID_REFERENCE" | "INVALID_STATUS_TRANSITION" => {
                StatusCode::BAD_REQUEST
            }
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(msg) => ApiError::not_found(msg),
            ServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ServiceError::Duplicate(msg) => {
                tracing::debug!("Duplicate value rejected: {}", msg);
                ApiError::new("DUPLICATE", "A record with this slug or email already exists")
            }
            ServiceError::InvalidReference(msg) => {
                tracing::debug!("Dangling reference rejected: {}", msg);
                ApiError::new("INVALID_REFERENCE", "invalid reference")
            }
            ServiceError::InvalidStatusTransition { from, to } => ApiError::with_details(
                "INVALID_STATUS_TRANSITION",
                format!("Cannot change status from {} to {}", from, to),
                serde_json::json!({
                    "from": from,
                    "to": to,
                    "allowed": from.next_states(),
                }),
            ),
            ServiceError::AuthorHasPublishedPosts { author_id, count } => ApiError::with_details(
                "CONFLICT",
                "Author still has published posts",
                serde_json::json!({ "authorId": author_id, "publishedPosts": count }),
            ),
            ServiceError::Conflict(msg) => ApiError::new("CONFLICT", msg),
            ServiceError::Disabled(msg) => ApiError::new("COMMENTS_DISABLED", msg),
            ServiceError::InvalidCredentials => ApiError::unauthorized("Invalid credentials"),
            ServiceError::InternalError(e) => {
                tracing::error!("Internal error: {:#}", e);
                ApiError::internal_error("Internal server error")
            }
        }
    }
}

/// Extract the bearer token from the Authorization header
fn extract_bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Admin authorization middleware.
///
/// 403 when no admin token is configured, 401 when the request carries a
/// missing or wrong token.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = state
        .admin_token
        .as_deref()
        .ok_or_else(|| ApiError::forbidden("Admin API is disabled"))?;

    let matches = extract_bearer_token(&request).map(|token| token == expected);
    match matches {
        Some(true) => Ok(next.run(request).await),
        Some(false) => {
            tracing::warn!("Rejected admin request to {} with invalid token", request.uri().path());
            Err(ApiError::unauthorized("Invalid admin token"))
        }
        None => Err(ApiError::unauthorized("Missing authentication token")),
    }
}
