//! Domain layer: connections, envelopes, control messages and membership.
//!
//! This module contains the room core's data model: connection identity and
//! handles, the envelope codec, control message parsing, per-connection
//! membership storage and the room registry built on top of it.

pub mod connection;
pub mod connection_id;
pub mod control;
pub mod envelope;
pub mod membership;
pub mod room_registry;

pub use connection::{Connection, WeakConnection};
pub use connection_id::ConnectionId;
pub use control::{Action, ControlMessage};
pub use envelope::{Envelope, RawMessage};
pub use membership::{MembershipTable, RoomMembership};
pub use room_registry::RoomRegistry;
