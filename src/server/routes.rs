//! Router configuration for the API server.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/latest", get(handlers::latest))
        .route("/api/history", get(handlers::history))
        .route("/api/scrape", post(handlers::trigger_scrape))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
