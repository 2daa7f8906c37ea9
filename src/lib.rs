//! # room-gateway
//!
//! Room membership and event fan-out layer for WebSocket messaging servers.
//!
//! Connections join and leave named rooms backed by a publish/subscribe
//! hub. Control frames (`+/room`, `-/room`, `!/room` and their verbose
//! `/enter`, `/leave`, `/event` forms) become subscribe, unsubscribe and
//! emit operations, and every subscription is released when its connection
//! closes.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket)
//!     │
//!     ├── WS Handler (ws/)
//!     │
//!     ├── RoomGateway (gateway)
//!     │     ├── ControlDispatcher + Router + EventListeners (service/, router/)
//!     │     └── LifecycleHook (service/)
//!     │
//!     ├── RoomRegistry + MembershipTable (domain/)
//!     │
//!     └── PubSubHub (hub/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod router;
pub mod service;
pub mod ws;

pub use context::MessageContext;
pub use domain::{Connection, Envelope, RawMessage};
pub use error::{FormatError, RoomError};
pub use gateway::RoomGateway;
pub use hub::{MemoryHub, PubSubHub, SubscriptionToken};
pub use service::DispatchOutcome;
