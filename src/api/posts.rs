//! Post API endpoints
//!
//! Public:
//! - GET  /api/v1/posts                 - live posts, paged and filtered
//! - GET  /api/v1/posts/{post}          - live post by slug
//! - POST /api/v1/posts/{post}/views    - count a view
//!
//! Admin:
//! - GET    /api/v1/admin/posts               - all posts, any status
//! - POST   /api/v1/admin/posts               - create
//! - GET    /api/v1/admin/posts/{id}          - any post by ID
//! - PUT    /api/v1/admin/posts/{id}          - partial update
//! - DELETE /api/v1/admin/posts/{id}          - delete
//! - PUT    /api/v1/admin/posts/{id}/tags     - replace the tag set
//! - PUT    /api/v1/admin/posts/{id}/status   - status transition

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{default_page, PageResponse};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{
    CreatePostInput, ListParams, PostFilter, PostStatus, PostWithRelations, UpdatePostInput,
};

/// Query parameters for post listings
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPostsQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    /// Falls back to the `posts_per_page` setting
    pub per_page: Option<u32>,
    /// Category slug
    pub category: Option<String>,
    /// Tag slug
    pub tag: Option<String>,
    pub author: Option<i64>,
    pub featured: Option<bool>,
    /// Search on title and excerpt
    pub q: Option<String>,
    /// Admin only; comma-separated statuses
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetTagsRequest {
    pub tag_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: PostStatus,
}

#[derive(Debug, Serialize)]
pub struct ViewsResponse {
    pub views: i64,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_published))
        .route("/posts/{post}", get(get_published))
        .route("/posts/{post}/views", post(record_view))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/admin/posts", get(list_all).post(create_post))
        .route(
            "/admin/posts/{id}",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/admin/posts/{id}/tags", put(set_tags))
        .route("/admin/posts/{id}/status", put(set_status))
}

/// Turn query parameters into a repository filter.
///
/// Returns `None` when a category or tag slug matches nothing, so the caller
/// can answer with an empty page.
async fn build_filter(state: &AppState, query: &ListPostsQuery) -> Result<Option<PostFilter>, ApiError> {
    let mut filter = PostFilter {
        author_id: query.author,
        featured: query.featured,
        search: query.q.clone(),
        ..Default::default()
    };

    if let Some(slug) = query.category.as_deref().filter(|s| !s.is_empty()) {
        match state.category_service.find_by_slug(slug).await? {
            Some(category) => filter.category_id = Some(category.id),
            None => return Ok(None),
        }
    }
    if let Some(slug) = query.tag.as_deref().filter(|s| !s.is_empty()) {
        match state.tag_service.find_by_slug(slug).await? {
            Some(tag) => filter.tag_id = Some(tag.id),
            None => return Ok(None),
        }
    }

    Ok(Some(filter))
}

fn parse_statuses(raw: &str) -> Result<Vec<PostStatus>, ApiError> {
    crate::api::common::split_csv(raw)
        .into_iter()
        .map(|s| {
            s.parse::<PostStatus>()
                .map_err(|e| ApiError::validation_error(e.to_string()))
        })
        .collect()
}

/// GET /api/v1/posts
async fn list_published(
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<PageResponse<PostWithRelations>>, ApiError> {
    let per_page = match query.per_page {
        Some(n) => n,
        None => state.settings_service.posts_per_page().await?,
    };
    let params = ListParams::new(query.page, per_page);

    let Some(filter) = build_filter(&state, &query).await? else {
        return Ok(Json(PageResponse::empty(&params)));
    };

    let page = state.post_service.list_published(filter, &params).await?;
    Ok(Json(page.into()))
}

/// GET /api/v1/posts/{slug}
async fn get_published(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PostWithRelations>, ApiError> {
    Ok(Json(state.post_service.get_published_by_slug(&slug).await?))
}

/// POST /api/v1/posts/{id}/views
async fn record_view(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ViewsResponse>, ApiError> {
    let views = state.post_service.record_view(id).await?;
    Ok(Json(ViewsResponse { views }))
}

/// GET /api/v1/admin/posts
async fn list_all(
    State(state): State<AppState>,
    Query(query): Query<ListPostsQuery>,
) -> Result<Json<PageResponse<PostWithRelations>>, ApiError> {
    let params = ListParams::new(query.page, query.per_page.unwrap_or(20));

    let Some(mut filter) = build_filter(&state, &query).await? else {
        return Ok(Json(PageResponse::empty(&params)));
    };
    if let Some(raw) = query.status.as_deref() {
        filter.statuses = parse_statuses(raw)?;
    }

    let page = state.post_service.list(&filter, &params).await?;
    Ok(Json(page.into()))
}

/// POST /api/v1/admin/posts
async fn create_post(
    State(state): State<AppState>,
    Json(input): Json<CreatePostInput>,
) -> Result<(StatusCode, Json<PostWithRelations>), ApiError> {
    let post = state.post_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /api/v1/admin/posts/{id}
async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PostWithRelations>, ApiError> {
    Ok(Json(state.post_service.get_by_id(id).await?))
}

/// PUT /api/v1/admin/posts/{id}
async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdatePostInput>,
) -> Result<Json<PostWithRelations>, ApiError> {
    Ok(Json(state.post_service.update(id, input).await?))
}

/// DELETE /api/v1/admin/posts/{id}
async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.post_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/admin/posts/{id}/tags
async fn set_tags(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<SetTagsRequest>,
) -> Result<Json<PostWithRelations>, ApiError> {
    Ok(Json(state.post_service.set_tags(id, &body.tag_ids).await?))
}

/// PUT /api/v1/admin/posts/{id}/status
async fn set_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<SetStatusRequest>,
) -> Result<Json<PostWithRelations>, ApiError> {
    Ok(Json(state.post_service.transition_status(id, body.status).await?))
}
