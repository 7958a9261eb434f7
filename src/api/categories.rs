//! Category API endpoints
//!
//! - GET    /api/v1/categories              - categories with live post counts
//! - GET    /api/v1/admin/categories/{id}
//! - POST   /api/v1/admin/categories
//! - PUT    /api/v1/admin/categories/{id}
//! - DELETE /api/v1/admin/categories/{id}   - posts become uncategorized

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState};
use crate::models::{Category, CategoryWithCount, CreateCategoryInput, UpdateCategoryInput};

#[derive(Debug, Serialize)]
pub struct CategoryListResponse {
    pub categories: Vec<CategoryWithCount>,
}

pub fn public_router() -> Router<AppState> {
    Router::new().route("/categories", get(list_categories))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/admin/categories", post(create_category))
        .route(
            "/admin/categories/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
}

/// GET /api/v1/categories
async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<CategoryListResponse>, ApiError> {
    let categories = state.category_service.list_with_counts().await?;
    Ok(Json(CategoryListResponse { categories }))
}

async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.category_service.get_by_id(id).await?))
}

async fn create_category(
    State(state): State<AppState>,
    Json(input): Json<CreateCategoryInput>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let category = state.category_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateCategoryInput>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(state.category_service.update(id, input).await?))
}

async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.category_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
