//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::gateway::RoomGateway;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Room gateway serving every WebSocket connection.
    pub gateway: Arc<RoomGateway>,
}

impl AppState {
    /// Wraps a configured gateway.
    #[must_use]
    pub fn new(gateway: RoomGateway) -> Self {
        Self {
            gateway: Arc::new(gateway),
        }
    }
}
