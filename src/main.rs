//! room-gateway server entry point.
//!
//! Starts the Axum HTTP server with the health and WebSocket endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use room_gateway::api;
use room_gateway::app_state::AppState;
use room_gateway::config::{GatewayConfig, LogFormat};
use room_gateway::{MemoryHub, RoomGateway};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting room-gateway");

    // Build the room core
    let hub = MemoryHub::with_options(config.hub_separator.clone(), config.hub_max_name_len);
    let gateway = RoomGateway::new(Arc::new(hub)).with_scope_prefix(config.scope_prefix.clone());
    let app_state = AppState::new(gateway);

    // Build router
    let app = api::build_router(&config.ws_path)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, ws_path = %config.ws_path, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
