use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with all nptr endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = usize::try_from(state.body_limit()).unwrap_or(usize::MAX);
    Router::new()
        .route("/", get(handler::index).post(handler::upload))
        .route("/health", get(handler::health))
        .route("/status", get(handler::health))
        .route("/{key}", get(handler::download))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
