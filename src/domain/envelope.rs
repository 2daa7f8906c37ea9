//! Envelope codec.
//!
//! Inbound frames arrive in one of two wire shapes, a positional pair
//! `[scope, payload]` or a keyed object `{"scope": .., "payload": ..}`. Both
//! are decoded here, once, into an [`Envelope`]. Nothing downstream looks at
//! the wire shape again.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::FormatError;

/// Normalized `{scope, payload}` unit exchanged over a connection.
///
/// Outbound envelopes are always serialized in the keyed shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// `/`-delimited path identifying the message's route.
    pub scope: String,
    /// Arbitrary JSON payload.
    pub payload: Value,
}

impl Envelope {
    /// Creates an envelope.
    pub fn new(scope: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self {
            scope: scope.into(),
            payload: payload.into(),
        }
    }

    /// Serializes the envelope as a keyed JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if the payload cannot be serialized.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// An inbound frame exactly as the transport handed it over.
#[derive(Debug, Clone, PartialEq)]
pub enum RawMessage {
    /// Text frame, expected to hold JSON.
    Text(String),
    /// Binary frame, expected to hold UTF-8 JSON.
    Binary(Vec<u8>),
    /// Already-structured value (in-process producers).
    Structured(Value),
}

impl From<String> for RawMessage {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for RawMessage {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for RawMessage {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

impl From<Value> for RawMessage {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

/// Decodes a raw frame into an [`Envelope`].
///
/// Bytes are decoded as UTF-8 first, text is parsed as JSON. A JSON array
/// contributes its elements 0 and 1 as scope and payload; an object its
/// `scope` and `payload` fields. A missing payload becomes `null`.
///
/// # Errors
///
/// Returns a [`FormatError`] if the bytes are not UTF-8, the text is not
/// JSON, the value is neither an array nor an object, or the scope is
/// missing or not a string.
pub fn decode(raw: &RawMessage) -> Result<Envelope, FormatError> {
    let parsed;
    let value = match raw {
        RawMessage::Structured(value) => value,
        RawMessage::Text(text) => {
            parsed = serde_json::from_str::<Value>(text)?;
            &parsed
        }
        RawMessage::Binary(bytes) => {
            let text = String::from_utf8(bytes.clone())?;
            parsed = serde_json::from_str::<Value>(&text)?;
            &parsed
        }
    };

    let (scope, payload) = match value {
        Value::Array(items) => (items.first(), items.get(1)),
        Value::Object(fields) => (fields.get("scope"), fields.get("payload")),
        other => return Err(FormatError::UnsupportedType(type_name(other))),
    };

    let Some(Value::String(scope)) = scope else {
        return Err(FormatError::MissingScope);
    };
    let payload = payload.cloned().unwrap_or(Value::Null);

    debug!(
        scope = %scope,
        payload_len = payload_len(&payload),
        "decoded envelope"
    );

    Ok(Envelope {
        scope: scope.clone(),
        payload,
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn payload_len(payload: &Value) -> usize {
    match payload {
        Value::Null => 0,
        Value::String(s) => s.len(),
        other => other.to_string().len(),
    }
}
