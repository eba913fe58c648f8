//! HTTP surface for the Buildcrew API.
//!
//! Provides endpoints for:
//! - Project CRUD (`/api/projects`)
//! - Build status and generated files (`/api/projects/:id/status`, `/files`)
//! - Stopping a build (`/api/projects/:id/stop`)
//! - Live event subscription via WebSocket (`/api/projects/:id/events`)
//! - Health check (`/health`)

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod handlers;

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS layer for frontend access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/projects",
            post(handlers::create_project).get(handlers::list_projects),
        )
        .route("/api/projects/:id", get(handlers::get_project))
        .route("/api/projects/:id/status", get(handlers::get_project_status))
        .route("/api/projects/:id/files", get(handlers::get_project_files))
        .route("/api/projects/:id/stop", post(handlers::stop_project))
        .route("/api/projects/:id/events", get(handlers::project_events))
        .route("/health", get(handlers::health_check))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
