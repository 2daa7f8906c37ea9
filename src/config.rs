//! Gateway configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`).

use std::net::SocketAddr;

use crate::hub::memory::{DEFAULT_MAX_NAME_LEN, DEFAULT_SEPARATOR};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// Top-level gateway configuration.
///
/// Loaded once at startup via [`GatewayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Path of the WebSocket upgrade route.
    pub ws_path: String,

    /// Mount prefix every control scope must start with (empty for none).
    pub scope_prefix: String,

    /// Channel path separator used by the hub for normalization.
    pub hub_separator: String,

    /// Longest accepted normalized room name.
    pub hub_max_name_len: usize,

    /// Log output format.
    pub log_format: LogFormat,
}

impl GatewayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()?;

        let mut ws_path = std::env::var("WS_PATH").unwrap_or_else(|_| "/ws".to_string());
        if !ws_path.starts_with('/') {
            ws_path.insert(0, '/');
        }

        let scope_prefix = std::env::var("SCOPE_PREFIX").unwrap_or_default();
        let hub_separator =
            std::env::var("HUB_SEPARATOR").unwrap_or_else(|_| DEFAULT_SEPARATOR.to_string());
        let hub_max_name_len = parse_env("HUB_MAX_NAME_LEN", DEFAULT_MAX_NAME_LEN);

        let log_format = match std::env::var("LOG_FORMAT").ok().as_deref() {
            Some("json") | Some("JSON") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            listen_addr,
            ws_path,
            scope_prefix,
            hub_separator,
            hub_max_name_len,
            log_format,
        })
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            ws_path: "/ws".to_string(),
            scope_prefix: String::new(),
            hub_separator: DEFAULT_SEPARATOR.to_string(),
            hub_max_name_len: DEFAULT_MAX_NAME_LEN,
            log_format: LogFormat::Text,
        }
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
