//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`. Public routes serve live content;
//! `/admin` routes require the configured bearer token.

pub mod authors;
pub mod categories;
pub mod comments;
pub mod common;
pub mod middleware;
pub mod posts;
pub mod site;
pub mod tags;
pub mod users;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware, Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState};

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let admin_routes = Router::new()
        .merge(posts::admin_router())
        .merge(authors::admin_router())
        .merge(categories::admin_router())
        .merge(tags::admin_router())
        .merge(comments::admin_router())
        .merge(users::admin_router())
        .merge(site::admin_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_admin,
        ));

    Router::new()
        .merge(posts::public_router())
        .merge(comments::public_router())
        .merge(authors::public_router())
        .merge(categories::public_router())
        .merge(tags::public_router())
        .merge(site::public_router())
        .merge(admin_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
