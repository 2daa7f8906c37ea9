//! Control dispatcher: parse, match action, run downstream, apply and reply.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::context::MessageContext;
use crate::domain::{Action, ControlMessage, RoomRegistry};
use crate::error::RoomError;
use crate::hub::PubSubHub;
use crate::router::Router;

use super::events::EventListeners;

/// What the dispatcher did with one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Enter request answered; `created` is the reply payload.
    Entered {
        /// Whether a new subscription was created.
        created: bool,
    },
    /// Leave request answered; `removed` is the reply payload.
    Left {
        /// Whether a subscription was released.
        removed: bool,
    },
    /// Event admitted and emitted.
    Emitted {
        /// Listeners invoked.
        listeners: usize,
    },
    /// Event from a non-member, dropped without a trace.
    Dropped,
    /// Scope is not a control scope; nothing was done.
    Unrouted,
    /// Connection already closed; the frame was ignored.
    Closed,
}

/// Per-message pipeline over the room registry.
///
/// Stages: **parse** the raw frame, **match** the scope against the
/// enter/leave/event aliases, run **downstream** middleware, then **apply**
/// the registry change and **reply**. For enter/leave, downstream completes
/// before the registry is touched, so a middleware error vetoes the request.
/// For event, membership is checked first and a non-member's message never
/// reaches downstream.
#[derive(Debug)]
pub struct ControlDispatcher {
    registry: Arc<RoomRegistry>,
    hub: Arc<dyn PubSubHub>,
    router: Router,
    listeners: EventListeners,
    scope_prefix: String,
}

impl ControlDispatcher {
    /// Creates a dispatcher with an empty router and listener table.
    #[must_use]
    pub fn new(registry: Arc<RoomRegistry>, hub: Arc<dyn PubSubHub>) -> Self {
        Self {
            registry,
            hub,
            router: Router::new(),
            listeners: EventListeners::new(),
            scope_prefix: String::new(),
        }
    }

    /// Sets the mount prefix that must lead every control scope.
    pub fn set_scope_prefix(&mut self, prefix: impl Into<String>) {
        self.scope_prefix = prefix.into();
    }

    /// Mutable access to the downstream router.
    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Mutable access to the event listener table.
    pub fn listeners_mut(&mut self) -> &mut EventListeners {
        &mut self.listeners
    }

    /// Read access to the event listener table.
    #[must_use]
    pub fn listeners(&self) -> &EventListeners {
        &self.listeners
    }

    /// Runs the full pipeline for `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::Format`] if the frame does not decode, or the
    /// error of a downstream middleware that aborted the pipeline.
    pub async fn dispatch(&self, ctx: &mut MessageContext) -> Result<DispatchOutcome, RoomError> {
        ctx.decode()?;

        let Some(control) = ControlMessage::parse(&ctx.scope, &self.scope_prefix, |name| {
            self.hub.normalize_name(name)
        }) else {
            debug!(conn_id = %ctx.connection().id(), scope = %ctx.scope, "no control route");
            return Ok(DispatchOutcome::Unrouted);
        };

        let action = control.action;
        let room = control.room.clone();
        ctx.set_control(control);

        match action {
            Action::Enter => {
                self.router.run(Action::Enter, &room, ctx).await?;
                let created = self.registry.enter_room(ctx.connection(), &room).await;
                ctx.reply(created);
                Ok(DispatchOutcome::Entered { created })
            }
            Action::Leave => {
                self.router.run(Action::Leave, &room, ctx).await?;
                let removed = self.registry.leave_room(ctx.connection(), &room).await;
                ctx.reply(removed);
                Ok(DispatchOutcome::Left { removed })
            }
            Action::Event => {
                if !self.registry.has_room(ctx.connection(), &room).await {
                    return Ok(DispatchOutcome::Dropped);
                }
                debug!(
                    conn_id = %ctx.connection().id(),
                    room = %room,
                    room_param = ctx.control().map(|c| c.room_param.as_str()),
                    peer = ?ctx.connection().peer(),
                    "event in room"
                );
                self.router.run(Action::Event, &room, ctx).await?;
                let listeners = self.listeners.emit(&room, ctx);
                Ok(DispatchOutcome::Emitted { listeners })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::membership::MembershipTable;
    use crate::domain::{Connection, Envelope, RawMessage};
    use crate::hub::MemoryHub;
    use crate::router::from_fn;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Fixture {
        hub: MemoryHub,
        table: Arc<MembershipTable>,
        dispatcher: ControlDispatcher,
    }

    fn fixture() -> Fixture {
        let hub = MemoryHub::new();
        let shared: Arc<dyn PubSubHub> = Arc::new(hub.clone());
        let table = Arc::new(MembershipTable::new());
        let registry = Arc::new(RoomRegistry::new(Arc::clone(&table), Arc::clone(&shared)));
        Fixture {
            hub,
            table,
            dispatcher: ControlDispatcher::new(registry, shared),
        }
    }

    async fn attached(fx: &Fixture) -> (Connection, UnboundedReceiver<Envelope>) {
        let (conn, rx) = Connection::new(None);
        fx.table.create(conn.id()).await;
        (conn, rx)
    }

    async fn send(
        fx: &Fixture,
        conn: &Connection,
        raw: &str,
    ) -> Result<DispatchOutcome, RoomError> {
        let mut ctx = MessageContext::new(conn.clone(), RawMessage::from(raw));
        fx.dispatcher.dispatch(&mut ctx).await
    }

    #[tokio::test]
    async fn enter_twice_replies_true_then_false() {
        let fx = fixture();
        let (conn, mut rx) = attached(&fx).await;

        let first = send(&fx, &conn, r#"["+/chat1", null]"#).await;
        assert!(matches!(first, Ok(DispatchOutcome::Entered { created: true })));
        let second = send(&fx, &conn, r#"{"scope": "+/chat1"}"#).await;
        assert!(matches!(second, Ok(DispatchOutcome::Entered { created: false })));

        assert_eq!(rx.recv().await, Some(Envelope::new("+/chat1", true)));
        assert_eq!(rx.recv().await, Some(Envelope::new("+/chat1", false)));
    }

    #[tokio::test]
    async fn denied_subscription_replies_false() {
        let fx = fixture();
        let (conn, mut rx) = attached(&fx).await;

        let outcome = send(&fx, &conn, r#"["+/bad*room"]"#).await;
        assert!(matches!(outcome, Ok(DispatchOutcome::Entered { created: false })));
        assert_eq!(rx.recv().await, Some(Envelope::new("+/bad*room", false)));
        assert_eq!(fx.hub.channel_count(), 0);
    }

    #[tokio::test]
    async fn leave_replies_on_verbose_scope() {
        let fx = fixture();
        let (conn, mut rx) = attached(&fx).await;
        let _ = send(&fx, &conn, r#"["/enter/chat1"]"#).await;
        let _ = rx.recv().await;

        let left = send(&fx, &conn, r#"["/leave/chat1"]"#).await;
        assert!(matches!(left, Ok(DispatchOutcome::Left { removed: true })));
        assert_eq!(rx.recv().await, Some(Envelope::new("/leave/chat1", true)));

        let again = send(&fx, &conn, r#"["-/chat1"]"#).await;
        assert!(matches!(again, Ok(DispatchOutcome::Left { removed: false })));
        assert_eq!(rx.recv().await, Some(Envelope::new("-/chat1", false)));
        assert_eq!(fx.hub.channel_count(), 0);
    }

    #[tokio::test]
    async fn event_from_non_member_is_dropped() {
        let mut fx = fixture();
        let emitted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&emitted);
        fx.dispatcher.listeners_mut().on(
            "chat1".to_string(),
            Arc::new(move |_ctx: &mut MessageContext| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let downstream = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&downstream);
        let _ = fx.dispatcher.router_mut().route(
            Action::Event,
            ":room",
            Arc::new(from_fn(move |_ctx| {
                seen.fetch_add(1, Ordering::SeqCst);
                Box::pin(async { Ok(()) })
            })),
        );
        let (conn, mut rx) = attached(&fx).await;

        let outcome = send(&fx, &conn, r#"["!/chat1", {"text": "hi"}]"#).await;
        assert!(matches!(outcome, Ok(DispatchOutcome::Dropped)));
        assert_eq!(emitted.load(Ordering::SeqCst), 0);
        assert_eq!(downstream.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn event_from_member_runs_downstream_then_emits() {
        let mut fx = fixture();
        let _ = fx.dispatcher.router_mut().route(
            Action::Event,
            ":room",
            Arc::new(from_fn(|ctx| {
                Box::pin(async move {
                    tokio::task::yield_now().await;
                    ctx.payload = json!({"stamped": true});
                    Ok(())
                })
            })),
        );
        fx.dispatcher.listeners_mut().on(
            "chat1".to_string(),
            Arc::new(|ctx: &mut MessageContext| {
                let payload = ctx.payload.clone();
                ctx.reply(payload);
            }),
        );
        let (conn, mut rx) = attached(&fx).await;
        let _ = send(&fx, &conn, r#"["+/chat1"]"#).await;
        let _ = rx.recv().await;

        let outcome = send(&fx, &conn, r#"["/event/ chat1 ", "raw"]"#).await;
        assert!(matches!(outcome, Ok(DispatchOutcome::Emitted { listeners: 1 })));
        assert_eq!(
            rx.recv().await,
            Some(Envelope::new("/event/ chat1 ", json!({"stamped": true})))
        );
    }

    #[tokio::test]
    async fn downstream_veto_blocks_enter_and_reply() {
        let mut fx = fixture();
        let _ = fx.dispatcher.router_mut().route(
            Action::Enter,
            "private*",
            Arc::new(from_fn(|_ctx| {
                Box::pin(async { Err(RoomError::rejected("invite only")) })
            })),
        );
        let (conn, mut rx) = attached(&fx).await;

        let outcome = send(&fx, &conn, r#"["+/private-1"]"#).await;
        assert!(matches!(outcome, Err(RoomError::Rejected(_))));
        assert_eq!(fx.hub.channel_count(), 0);
        assert!(rx.try_recv().is_err());

        let allowed = send(&fx, &conn, r#"["+/public"]"#).await;
        assert!(matches!(allowed, Ok(DispatchOutcome::Entered { created: true })));
    }

    #[tokio::test]
    async fn malformed_frame_is_a_format_error() {
        let fx = fixture();
        let (conn, mut rx) = attached(&fx).await;

        let outcome = send(&fx, &conn, "12").await;
        assert!(matches!(outcome, Err(RoomError::Format(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn plain_scope_is_unrouted() {
        let fx = fixture();
        let (conn, mut rx) = attached(&fx).await;

        let outcome = send(&fx, &conn, r#"["a/b", {"x": 1}]"#).await;
        assert!(matches!(outcome, Ok(DispatchOutcome::Unrouted)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn scope_prefix_is_honored() {
        let mut fx = fixture();
        fx.dispatcher.set_scope_prefix("/app");
        let (conn, mut rx) = attached(&fx).await;

        let outcome = send(&fx, &conn, r#"["/app/+/chat1"]"#).await;
        assert!(matches!(outcome, Ok(DispatchOutcome::Entered { created: true })));
        assert_eq!(rx.recv().await, Some(Envelope::new("/app/+/chat1", true)));

        let bare = send(&fx, &conn, r#"["+/chat1"]"#).await;
        assert!(matches!(bare, Ok(DispatchOutcome::Unrouted)));
    }
}
