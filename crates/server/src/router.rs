//! HTTP router construction.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use crate::api;
use crate::state::AppState;

/// Build the application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>, cors_origin: &str) -> Router {
    Router::new()
        .route("/health", get(api::health))
        .route("/groups", get(api::list_groups).post(api::create_group))
        .route(
            "/groups/{id}",
            get(api::get_group).delete(api::delete_group),
        )
        .route("/groups/{id}/emails", post(api::add_emails))
        .route("/groups/{id}/progress", get(api::group_progress))
        .layer(cors_layer(cors_origin))
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    if origin == "*" {
        return CorsLayer::permissive();
    }
    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::permissive().allow_origin(AllowOrigin::exact(value)),
        Err(_) => {
            warn!(origin = %origin, "invalid CORS_ORIGIN, falling back to permissive");
            CorsLayer::permissive()
        }
    }
}
