//! Per-message processing context.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::envelope::{self, Envelope, RawMessage};
use crate::domain::{Connection, ControlMessage};
use crate::error::FormatError;

/// State carried through the pipeline for one inbound frame.
///
/// The raw frame is kept untouched next to the decoded scope and payload.
/// Middleware and event listeners may rewrite `payload` and answer through
/// [`MessageContext::reply`].
#[derive(Debug)]
pub struct MessageContext {
    connection: Connection,
    raw: RawMessage,
    received_at: DateTime<Utc>,
    control: Option<ControlMessage>,
    /// Decoded scope (empty until decoded).
    pub scope: String,
    /// Decoded payload (`null` until decoded).
    pub payload: Value,
    /// Named captures from the matching route pattern.
    pub params: HashMap<String, String>,
}

impl MessageContext {
    /// Creates a context for `raw`, received on `connection`.
    #[must_use]
    pub fn new(connection: Connection, raw: RawMessage) -> Self {
        Self {
            connection,
            raw,
            received_at: Utc::now(),
            control: None,
            scope: String::new(),
            payload: Value::Null,
            params: HashMap::new(),
        }
    }

    /// Decodes the raw frame into `scope` and `payload`.
    ///
    /// # Errors
    ///
    /// Returns a [`FormatError`] if the frame is not a valid envelope.
    pub fn decode(&mut self) -> Result<(), FormatError> {
        let Envelope { scope, payload } = envelope::decode(&self.raw)?;
        self.scope = scope;
        self.payload = payload;
        Ok(())
    }

    /// Connection the frame arrived on.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// The frame exactly as received.
    #[must_use]
    pub fn raw(&self) -> &RawMessage {
        &self.raw
    }

    /// Arrival timestamp.
    #[must_use]
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Parsed control message, once the scope matched a control route.
    #[must_use]
    pub fn control(&self) -> Option<&ControlMessage> {
        self.control.as_ref()
    }

    pub(crate) fn set_control(&mut self, control: ControlMessage) {
        self.control = Some(control);
    }

    /// Normalized room name of the control message.
    #[must_use]
    pub fn room(&self) -> Option<&str> {
        self.control.as_ref().map(|c| c.room.as_str())
    }

    /// Scope replies are addressed to.
    #[must_use]
    pub fn original_scope(&self) -> &str {
        self.control
            .as_ref()
            .map_or(self.scope.as_str(), |c| c.original_scope.as_str())
    }

    /// Sends an arbitrary envelope to the connection.
    pub fn send(&self, envelope: Envelope) -> bool {
        self.connection.send(envelope)
    }

    /// Sends `payload` back on [`MessageContext::original_scope`].
    pub fn reply(&self, payload: impl Into<Value>) -> bool {
        self.send(Envelope::new(self.original_scope(), payload))
    }
}
