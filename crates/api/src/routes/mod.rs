//! API routes.

pub mod health;
pub mod ticks;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Largest accepted `POST /ticks` body.
pub const MAX_SUBMIT_BYTES: usize = 1024 * 1024;

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ticks", post(ticks::submit_handler))
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
        .route("/metrics", get(health::metrics_handler))
        .layer(DefaultBodyLimit::max(MAX_SUBMIT_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
