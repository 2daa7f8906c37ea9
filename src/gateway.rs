//! Room gateway facade.
//!
//! [`RoomGateway`] wires the envelope codec, room registry, control
//! dispatcher and lifecycle hook to a hub. Host code configures it through
//! `&mut` registration methods, then shares it behind an `Arc`.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::context::MessageContext;
use crate::domain::{Action, Connection, MembershipTable, RawMessage, RoomRegistry};
use crate::error::RoomError;
use crate::hub::PubSubHub;
use crate::router::from_fn;
use crate::service::{ControlDispatcher, DispatchOutcome, LifecycleHook};

/// Application-facing entry point of the room core.
///
/// ```ignore
/// let mut gateway = RoomGateway::new(Arc::new(MemoryHub::new()));
/// gateway
///     .enter("lobby", |ctx| Box::pin(async move { Ok(()) }))?
///     .on("lobby", |ctx| { ctx.reply("ack"); });
/// let gateway = Arc::new(gateway);
/// ```
#[derive(Debug)]
pub struct RoomGateway {
    hub: Arc<dyn PubSubHub>,
    memberships: Arc<MembershipTable>,
    registry: Arc<RoomRegistry>,
    lifecycle: LifecycleHook,
    dispatcher: ControlDispatcher,
}

impl RoomGateway {
    /// Creates a gateway over `hub` with no extra handlers.
    #[must_use]
    pub fn new(hub: Arc<dyn PubSubHub>) -> Self {
        let memberships = Arc::new(MembershipTable::new());
        let registry = Arc::new(RoomRegistry::new(
            Arc::clone(&memberships),
            Arc::clone(&hub),
        ));
        let lifecycle = LifecycleHook::new(Arc::clone(&memberships), Arc::clone(&registry));
        let dispatcher = ControlDispatcher::new(Arc::clone(&registry), Arc::clone(&hub));
        Self {
            hub,
            memberships,
            registry,
            lifecycle,
            dispatcher,
        }
    }

    /// Requires every control scope to start with `prefix`.
    #[must_use]
    pub fn with_scope_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.dispatcher.set_scope_prefix(prefix);
        self
    }

    /// Registers middleware that runs before a matching enter is applied.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::InvalidPattern`] if `pattern` does not parse.
    pub fn enter<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RoomError>
    where
        F: for<'c> Fn(&'c mut MessageContext) -> BoxFuture<'c, Result<(), RoomError>>
            + Send
            + Sync
            + 'static,
    {
        self.route(Action::Enter, pattern, handler)
    }

    /// Registers middleware that runs before a matching leave is applied.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::InvalidPattern`] if `pattern` does not parse.
    pub fn leave<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RoomError>
    where
        F: for<'c> Fn(&'c mut MessageContext) -> BoxFuture<'c, Result<(), RoomError>>
            + Send
            + Sync
            + 'static,
    {
        self.route(Action::Leave, pattern, handler)
    }

    /// Registers middleware that runs for admitted events before emission.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::InvalidPattern`] if `pattern` does not parse.
    pub fn event<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self, RoomError>
    where
        F: for<'c> Fn(&'c mut MessageContext) -> BoxFuture<'c, Result<(), RoomError>>
            + Send
            + Sync
            + 'static,
    {
        self.route(Action::Event, pattern, handler)
    }

    fn route<F>(&mut self, action: Action, pattern: &str, handler: F) -> Result<&mut Self, RoomError>
    where
        F: for<'c> Fn(&'c mut MessageContext) -> BoxFuture<'c, Result<(), RoomError>>
            + Send
            + Sync
            + 'static,
    {
        self.dispatcher
            .router_mut()
            .route(action, pattern, Arc::new(from_fn(handler)))?;
        Ok(self)
    }

    /// Listens for admitted events in `room`.
    ///
    /// The room name is normalized, so `" chat1/"` and `"chat1"` register
    /// for the same room.
    pub fn on<F>(&mut self, room: &str, listener: F) -> &mut Self
    where
        F: Fn(&mut MessageContext) + Send + Sync + 'static,
    {
        let room = self.hub.normalize_name(room);
        self.dispatcher.listeners_mut().on(room, Arc::new(listener));
        self
    }

    /// Upgrade hook: attaches `conn` and arms its close teardown.
    ///
    /// Returns the teardown task on first contact, `None` afterwards.
    pub async fn connect(&self, conn: &Connection) -> Option<JoinHandle<usize>> {
        self.lifecycle.attach(conn).await
    }

    /// Message hook: runs the control pipeline for one inbound frame.
    ///
    /// Attaches the connection first if the upgrade hook was skipped. A
    /// frame arriving after close is ignored with [`DispatchOutcome::Closed`].
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::Format`] for a malformed frame, or the error of
    /// a downstream middleware that vetoed the message.
    pub async fn handle(
        &self,
        conn: &Connection,
        raw: RawMessage,
    ) -> Result<DispatchOutcome, RoomError> {
        if conn.is_closed() {
            debug!(conn_id = %conn.id(), "frame after close ignored");
            return Ok(DispatchOutcome::Closed);
        }
        if !self.memberships.contains(conn.id()).await {
            let _ = self.lifecycle.attach(conn).await;
        }
        let mut ctx = MessageContext::new(conn.clone(), raw);
        self.dispatcher.dispatch(&mut ctx).await
    }

    /// Tears down `conn` immediately, without waiting for its close signal.
    ///
    /// Returns the number of subscriptions released.
    pub async fn disconnect(&self, conn: &Connection) -> usize {
        let mut released = self.lifecycle.teardown(conn.id()).await;
        conn.close();
        // A frame handled between the first teardown and close may have
        // re-attached the connection.
        released += self.lifecycle.teardown(conn.id()).await;
        released
    }

    /// Publishes `payload` to every member of `room`.
    pub fn publish(&self, room: &str, payload: impl Into<Value>) -> usize {
        self.hub.publish(room, payload.into())
    }

    /// The underlying hub.
    #[must_use]
    pub fn hub(&self) -> &Arc<dyn PubSubHub> {
        &self.hub
    }

    /// The room registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Number of live (attached, not yet torn down) connections.
    pub async fn connected(&self) -> usize {
        self.memberships.len().await
    }
}
