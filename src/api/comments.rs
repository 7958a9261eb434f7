//! Comment API endpoints
//!
//! Public:
//! - GET  /api/v1/posts/{post}/comments   - approved comments
//! - POST /api/v1/posts/{post}/comments   - submit a comment
//!
//! Admin:
//! - GET    /api/v1/admin/comments?pending=true
//! - PUT    /api/v1/admin/comments/{id}/approve
//! - DELETE /api/v1/admin/comments/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{default_page, default_per_page, PageResponse};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{Comment, CreateCommentInput, ListParams};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub content: String,
    pub author_name: String,
    pub author_email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCommentsQuery {
    #[serde(default)]
    pub pending: bool,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comments: Vec<Comment>,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route(
        "/posts/{post}/comments",
        get(list_post_comments).post(create_comment),
    )
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/admin/comments", get(list_comments))
        .route("/admin/comments/{id}/approve", put(approve_comment))
        .route("/admin/comments/{id}", delete(delete_comment))
}

async fn list_post_comments(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<CommentListResponse>, ApiError> {
    let comments = state.comment_service.list_for_post(post_id).await?;
    Ok(Json(CommentListResponse { comments }))
}

async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Json(body): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let input = CreateCommentInput::new(post_id, body.content, body.author_name, body.author_email);
    let comment = state.comment_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<AdminCommentsQuery>,
) -> Result<Json<PageResponse<Comment>>, ApiError> {
    let params = ListParams::new(query.page, query.per_page);
    let page = state.comment_service.list(query.pending, &params).await?;
    Ok(Json(page.into()))
}

async fn approve_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Comment>, ApiError> {
    Ok(Json(state.comment_service.approve(id).await?))
}

async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.comment_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
