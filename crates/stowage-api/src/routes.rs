//! Route configuration and setup

use crate::handlers;
use crate::state::AppState;
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(state: Arc<AppState>) -> Router {
    Router::new()
        // Both spellings are in use for local-mode URLs.
        .route("/storage", get(handlers::stored_file::get_stored_file))
        .route("/storage/", get(handlers::stored_file::get_stored_file))
        .route("/health", get(health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
