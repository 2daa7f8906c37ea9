//! Control messages derived from an envelope scope.
//!
//! A control scope is an action alias followed by `/` and exactly one room
//! segment:
//!
//! | Action | Aliases            |
//! |--------|--------------------|
//! | enter  | `+`, `/enter`      |
//! | leave  | `-`, `/leave`      |
//! | event  | `!`, `/event`      |
//!
//! The aliases are mutually exclusive, so at most one action matches a
//! given scope.

use std::fmt;

use serde::Serialize;

/// Room control action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Join a room.
    Enter,
    /// Leave a room.
    Leave,
    /// Inject an event into a joined room.
    Event,
}

impl Action {
    const ALIASES: [(&'static str, Self); 6] = [
        ("+/", Self::Enter),
        ("/enter/", Self::Enter),
        ("-/", Self::Leave),
        ("/leave/", Self::Leave),
        ("!/", Self::Event),
        ("/event/", Self::Event),
    ];

    /// Splits `scope` into the action and the remainder after the alias.
    #[must_use]
    pub fn split(scope: &str) -> Option<(Self, &str)> {
        Self::ALIASES
            .iter()
            .find_map(|(alias, action)| scope.strip_prefix(alias).map(|rest| (*action, rest)))
    }

    /// Returns the verbose keyword for this action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enter => "enter",
            Self::Leave => "leave",
            Self::Event => "event",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recognized enter/leave/event request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlMessage {
    /// Requested action.
    pub action: Action,
    /// Normalized room name.
    pub room: String,
    /// Room segment exactly as it appeared in the scope.
    pub room_param: String,
    /// Scope as received; replies are addressed to it.
    pub original_scope: String,
}

impl ControlMessage {
    /// Parses `scope` as a control message.
    ///
    /// `prefix` is the mount point the gateway is served under and must lead
    /// the scope; a `/` between the prefix and a one-character alias is
    /// tolerated. `normalize` canonicalizes the room segment. Returns `None`
    /// if the scope is not a control scope or the room normalizes to nothing.
    pub fn parse(scope: &str, prefix: &str, normalize: impl Fn(&str) -> String) -> Option<Self> {
        let rest = scope.strip_prefix(prefix)?;
        let (action, room_param) = Action::split(rest).or_else(|| {
            if prefix.is_empty() {
                None
            } else {
                rest.strip_prefix('/').and_then(Action::split)
            }
        })?;

        if room_param.is_empty() || room_param.contains('/') {
            return None;
        }

        let room = normalize(room_param);
        if room.is_empty() {
            return None;
        }

        Some(Self {
            action,
            room,
            room_param: room_param.to_string(),
            original_scope: scope.to_string(),
        })
    }
}
