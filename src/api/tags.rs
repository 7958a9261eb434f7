//! Tag API endpoints
//!
//! - GET    /api/v1/tags               - tag cloud, most used first
//! - GET    /api/v1/admin/tags/{id}
//! - POST   /api/v1/admin/tags
//! - PUT    /api/v1/admin/tags/{id}
//! - DELETE /api/v1/admin/tags/{id}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{CreateTagInput, Tag, TagWithCount, UpdateTagInput};

#[derive(Debug, Deserialize)]
pub struct ListTagsQuery {
    /// Cap on the number of tags returned
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TagListResponse {
    pub tags: Vec<TagWithCount>,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/tags", get(list_tags))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/admin/tags", post(create_tag))
        .route(
            "/admin/tags/{id}",
            get(get_tag).put(update_tag).delete(delete_tag),
        )
}

/// GET /api/v1/tags
async fn list_tags(
    State(state): State<AppState>,
    Query(query): Query<ListTagsQuery>,
) -> Result<Json<TagListResponse>, ApiError> {
    let mut tags = state.tag_service.cloud().await?;
    if let Some(limit) = query.limit {
        tags.truncate(limit);
    }
    Ok(Json(TagListResponse { tags }))
}

async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Tag>, ApiError> {
    Ok(Json(state.tag_service.get_by_id(id).await?))
}

async fn create_tag(
    State(state): State<AppState>,
    Json(input): Json<CreateTagInput>,
) -> Result<(StatusCode, Json<Tag>), ApiError> {
    let tag = state.tag_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

async fn update_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateTagInput>,
) -> Result<Json<Tag>, ApiError> {
    Ok(Json(state.tag_service.update(id, input).await?))
}

async fn delete_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.tag_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
