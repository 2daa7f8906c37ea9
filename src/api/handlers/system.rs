//! System endpoints: health check.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"healthy"` when the server answers.
    pub status: String,
    /// RFC 3339 timestamp of the response.
    pub timestamp: String,
    /// Crate version.
    pub version: String,
    /// Live WebSocket connections.
    pub connections: usize,
    /// Hub channels with at least one subscriber.
    pub rooms: usize,
}

/// `GET /health`: service health status.
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            connections: state.gateway.connected().await,
            rooms: state.gateway.hub().channel_count(),
        }),
    )
}

/// System routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::gateway::RoomGateway;
    use crate::hub::MemoryHub;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_reports_counts() {
        let state = AppState::new(RoomGateway::new(Arc::new(MemoryHub::new())));
        let app = routes().with_state(state);

        let Ok(request) = Request::builder().uri("/health").body(Body::empty()) else {
            panic!("request should build");
        };
        let Ok(response) = app.oneshot(request).await else {
            panic!("router should answer");
        };
        assert_eq!(response.status(), StatusCode::OK);

        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body should be readable");
        };
        let Ok(health) = serde_json::from_slice::<HealthResponse>(&bytes) else {
            panic!("body should be a health response");
        };
        assert_eq!(health.status, "healthy");
        assert_eq!(health.connections, 0);
        assert_eq!(health.rooms, 0);
    }
}
