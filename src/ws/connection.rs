//! WebSocket connection loop.
//!
//! Handles the read/write loop for a single WebSocket connection: inbound
//! frames go through the gateway one at a time, in arrival order, while
//! queued outbound envelopes (replies and room events) are written back.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::domain::{Connection, Envelope, RawMessage};
use crate::error::RoomError;
use crate::gateway::RoomGateway;

/// Scope of error frames sent when the pipeline fails.
pub const ERROR_SCOPE: &str = "/error";

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Attaches the connection (arming its close teardown) before reading.
/// - Dispatches each text/binary frame and awaits the result before
///   reading the next one.
/// - Forwards queued envelopes to the client.
/// - On close, fires the close signal and waits for teardown to finish.
pub async fn run_connection(socket: WebSocket, gateway: Arc<RoomGateway>, peer: Option<SocketAddr>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (conn, mut outbound) = Connection::new(peer);
    let teardown = gateway.connect(&conn).await;

    loop {
        tokio::select! {
            // Incoming frame from client
            msg = ws_rx.next() => {
                let raw = match msg {
                    Some(Ok(Message::Text(text))) => RawMessage::Text(text.to_string()),
                    Some(Ok(Message::Binary(bytes))) => RawMessage::Binary(bytes.to_vec()),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!(conn_id = %conn.id(), error = %e, "ws read failed");
                        break;
                    }
                };
                match gateway.handle(&conn, raw).await {
                    Ok(outcome) => {
                        debug!(conn_id = %conn.id(), ?outcome, "message handled");
                    }
                    Err(e) => {
                        warn!(conn_id = %conn.id(), error = %e, "message pipeline failed");
                        conn.send(error_envelope(&e));
                    }
                }
            }
            // Reply or room event queued for this client
            envelope = outbound.recv() => {
                let Some(envelope) = envelope else { break };
                match envelope.to_json() {
                    Ok(json) => {
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(conn_id = %conn.id(), error = %e, "envelope not serializable"),
                }
            }
        }
    }

    conn.close();
    if let Some(teardown) = teardown
        && let Err(e) = teardown.await
    {
        warn!(conn_id = %conn.id(), error = %e, "teardown task failed");
    }
    debug!(conn_id = %conn.id(), "ws connection closed");
}

fn error_envelope(error: &RoomError) -> Envelope {
    Envelope::new(
        ERROR_SCOPE,
        serde_json::to_value(error.body()).unwrap_or_default(),
    )
}
