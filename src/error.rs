//! Gateway error types.
//!
//! [`RoomError`] is the central error type for the gateway. Only a malformed
//! envelope or a downstream veto fails the message pipeline; redundant
//! enter/leave requests and hub denials are reported as `false` replies
//! instead. Each variant carries a numeric code that the WebSocket transport
//! puts into `/error` frames.

use serde::Serialize;

/// Structured JSON error body.
///
/// Payload of `/error` WebSocket frames:
/// ```json
/// { "code": 1001, "message": "malformed envelope: ..." }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Failure to turn a raw inbound frame into an envelope.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// Byte frame that is not valid UTF-8.
    #[error("binary frame is not valid utf-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Text frame that is not valid JSON.
    #[error("frame is not valid json: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Structured value of a type that cannot carry an envelope.
    #[error("cannot parse message of type \"{0}\"")]
    UnsupportedType(&'static str),

    /// Envelope without a string scope.
    #[error("envelope has no string scope")]
    MissingScope,
}

/// Server-side error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category            |
/// |-----------|---------------------|
/// | 1000–1999 | Malformed input     |
/// | 2000–2999 | Application veto    |
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// Inbound frame could not be decoded.
    #[error("malformed envelope: {0}")]
    Format(#[from] FormatError),

    /// A route pattern passed to the router is not valid.
    #[error("invalid route pattern: {0}")]
    InvalidPattern(String),

    /// Downstream middleware aborted the pipeline.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl RoomError {
    /// Shorthand for a downstream veto.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Format(_) => 1001,
            Self::InvalidPattern(_) => 1002,
            Self::Rejected(_) => 2001,
        }
    }

    /// Builds the structured body for this error.
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            code: self.error_code(),
            message: self.to_string(),
        }
    }
}
