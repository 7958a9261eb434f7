//! User administration endpoints
//!
//! - GET    /api/v1/admin/users
//! - POST   /api/v1/admin/users
//! - GET    /api/v1/admin/users/{id}
//! - PUT    /api/v1/admin/users/{id}
//! - DELETE /api/v1/admin/users/{id}
//! - POST   /api/v1/admin/users/verify   - check an email/password pair

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::{PageResponse, PaginationQuery};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{CreateUserInput, UpdateUserInput, User};

#[derive(Debug, Deserialize)]
pub struct VerifyCredentialsRequest {
    pub email: String,
    pub password: String,
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users).post(create_user))
        .route("/admin/users/verify", post(verify_credentials))
        .route(
            "/admin/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}

async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PageResponse<User>>, ApiError> {
    let page = state.user_service.list(&query.params()).await?;
    Ok(Json(page.into()))
}

async fn create_user(
    State(state): State<AppState>,
    Json(input): Json<CreateUserInput>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state.user_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.user_service.get_by_id(id).await?))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateUserInput>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.user_service.update(id, input).await?))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.user_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn verify_credentials(
    State(state): State<AppState>,
    Json(body): Json<VerifyCredentialsRequest>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(
        state
            .user_service
            .verify_credentials(&body.email, &body.password)
            .await?,
    ))
}
