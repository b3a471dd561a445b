//! Router assembly.

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// `/_health` plus the page dispatcher for every other path.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/_health", get(handlers::health::health))
        .fallback(handlers::page::dispatch)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
