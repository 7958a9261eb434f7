//! Author API endpoints
//!
//! - GET    /api/v1/authors
//! - GET    /api/v1/authors/{id}
//! - POST   /api/v1/admin/authors
//! - PUT    /api/v1/admin/authors/{id}
//! - DELETE /api/v1/admin/authors/{id}   (409 while the author has live posts)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState};
use crate::models::{Author, CreateAuthorInput, UpdateAuthorInput};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/authors", get(list_authors))
        .route("/authors/{id}", get(get_author))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/admin/authors", post(create_author))
        .route("/admin/authors/{id}", put(update_author).delete(delete_author))
}

async fn list_authors(State(state): State<AppState>) -> Result<Json<Vec<Author>>, ApiError> {
    Ok(Json(state.author_service.list().await?))
}

async fn get_author(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Author>, ApiError> {
    Ok(Json(state.author_service.get_by_id(id).await?))
}

async fn create_author(
    State(state): State<AppState>,
    Json(input): Json<CreateAuthorInput>,
) -> Result<(StatusCode, Json<Author>), ApiError> {
    let author = state.author_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(author)))
}

async fn update_author(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateAuthorInput>,
) -> Result<Json<Author>, ApiError> {
    Ok(Json(state.author_service.update(id, input).await?))
}

async fn delete_author(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.author_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
