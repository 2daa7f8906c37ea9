//! WebSocket layer: upgrade handler and per-connection loop.
//!
//! The WebSocket endpoint (default `/ws`) carries envelope frames in both
//! directions: control requests and events from the client, replies and
//! room events from the server.

pub mod connection;
pub mod handler;
