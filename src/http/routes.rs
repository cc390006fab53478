use super::handlers;
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Discovery
        .route("/capabilities", get(handlers::capabilities))
        .route("/initialize", post(handlers::initialize))
        // Whole-file submission
        .route("/process", post(handlers::process_sync))
        .route("/process/async", post(handlers::process_async))
        // Chunked sessions
        .route("/session", post(handlers::create_session))
        .route("/session/:session_id", get(handlers::get_session))
        .route("/session/:session_id/audio", post(handlers::upload_chunk))
        .route("/session/:session_id/commit", post(handlers::commit_session))
        // Retrieval
        .route("/jobs/:job_id", get(handlers::get_job))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
