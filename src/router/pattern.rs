//! Room-segment route patterns.

use std::fmt;

use crate::error::RoomError;

/// Pattern matched against a normalized room name.
///
/// - `lobby` matches exactly `lobby`
/// - `:room` matches any room and captures it as `room`
/// - `game-*` matches any room starting with `game-`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePattern {
    /// Exact room name.
    Literal(String),
    /// Any room, captured under the given name.
    Param(String),
    /// Any room starting with the given prefix (possibly empty).
    Prefix(String),
}

impl RoutePattern {
    /// Parses a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::InvalidPattern`] for an empty pattern, a bare
    /// `:`, a `/` anywhere, or a `*` that is not the last character.
    pub fn parse(pattern: &str) -> Result<Self, RoomError> {
        let pattern = pattern.trim();
        if pattern.is_empty() || pattern.contains('/') {
            return Err(RoomError::InvalidPattern(pattern.to_string()));
        }

        if let Some(name) = pattern.strip_prefix(':') {
            if name.is_empty() || name.contains(['*', ':']) {
                return Err(RoomError::InvalidPattern(pattern.to_string()));
            }
            return Ok(Self::Param(name.to_string()));
        }

        if let Some(prefix) = pattern.strip_suffix('*') {
            if prefix.contains('*') {
                return Err(RoomError::InvalidPattern(pattern.to_string()));
            }
            return Ok(Self::Prefix(prefix.to_string()));
        }

        if pattern.contains('*') {
            return Err(RoomError::InvalidPattern(pattern.to_string()));
        }
        Ok(Self::Literal(pattern.to_string()))
    }

    /// Matches `room`, returning the captured parameter if any.
    ///
    /// `None` means no match; `Some(None)` a match without captures.
    #[must_use]
    pub fn matches<'a>(&'a self, room: &str) -> Option<Option<(&'a str, String)>> {
        match self {
            Self::Literal(literal) => (literal == room).then_some(None),
            Self::Param(name) => Some(Some((name.as_str(), room.to_string()))),
            Self::Prefix(prefix) => room.starts_with(prefix.as_str()).then_some(None),
        }
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(literal) => f.write_str(literal),
            Self::Param(name) => write!(f, ":{name}"),
            Self::Prefix(prefix) => write!(f, "{prefix}*"),
        }
    }
}
