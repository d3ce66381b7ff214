//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Bundles
        .route("/bundles", post(handlers::register_bundle))
        .route("/bundles/:id", get(handlers::get_bundle))
        .route("/bundles/:id/approvals", post(handlers::record_approval))
        // Runs
        .route("/runs", get(handlers::list_runs))
        .route("/runs", post(handlers::create_run))
        .route("/runs/:id", get(handlers::get_run))
        .route("/runs/:id/advance", post(handlers::advance_run))
        .route("/runs/:id/abort", post(handlers::abort_run))
        .route("/runs/:id/events", get(handlers::get_run_events));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
