//! Site info and settings endpoints
//!
//! - GET /api/v1/health
//! - GET /api/v1/site                   - public settings
//! - GET /api/v1/admin/settings         - all settings, or `?keys=a,b`
//! - PUT /api/v1/admin/settings         - upsert a map of settings

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::api::common::split_csv;
use crate::api::middleware::{ApiError, AppState};
use crate::db::migrations;

#[derive(Debug, Deserialize)]
pub struct SettingsQuery {
    /// Comma-separated keys; every key is answered, unknown ones with ""
    pub keys: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub settings: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub migrations_pending: usize,
    pub status_transitions_enforced: bool,
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/site", get(site_info))
}

pub fn admin_router() -> Router<AppState> {
    Router::new().route("/admin/settings", get(get_settings).put(update_settings))
}

/// GET /api/v1/health
async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let pending = migrations::pending_count(&state.pool).await.map_err(|e| {
        tracing::error!("Health check failed: {:#}", e);
        ApiError::internal_error("Database unavailable")
    })?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        migrations_pending: pending,
        status_transitions_enforced: state.post_service.enforces_transitions(),
    }))
}

/// GET /api/v1/site
async fn site_info(State(state): State<AppState>) -> Result<Json<SettingsResponse>, ApiError> {
    let settings = state.settings_service.get_public().await?;
    Ok(Json(SettingsResponse { settings }))
}

/// GET /api/v1/admin/settings
async fn get_settings(
    State(state): State<AppState>,
    Query(query): Query<SettingsQuery>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let settings = match query.keys.as_deref() {
        Some(raw) => state.settings_service.get_by_keys(&split_csv(raw)).await?,
        None => state.settings_service.get_all().await?,
    };
    Ok(Json(SettingsResponse { settings }))
}

/// PUT /api/v1/admin/settings
async fn update_settings(
    State(state): State<AppState>,
    Json(body): Json<BTreeMap<String, String>>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let settings = state.settings_service.update(body).await?;
    Ok(Json(SettingsResponse { settings }))
}
