//! HTTP surface: system endpoints and the WebSocket route.

pub mod handlers;

use axum::Router;
use axum::routing::get;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Builds the complete router: system endpoints plus the WebSocket upgrade
/// route mounted at `ws_path`.
pub fn build_router(ws_path: &str) -> Router<AppState> {
    Router::new()
        .merge(handlers::routes())
        .route(ws_path, get(ws_handler))
}
