//! Connection lifecycle hook.
//!
//! Creates a connection's membership on first contact and tears it down on
//! close. Teardown drains the tokens under the connection's membership lock,
//! so concurrent or repeated teardowns release each token exactly once.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::domain::membership::MembershipTable;
use crate::domain::{Connection, ConnectionId, RoomRegistry};

/// Owner of the top-level membership entries.
#[derive(Debug, Clone)]
pub struct LifecycleHook {
    memberships: Arc<MembershipTable>,
    registry: Arc<RoomRegistry>,
}

impl LifecycleHook {
    /// Creates a hook over the shared membership table.
    #[must_use]
    pub fn new(memberships: Arc<MembershipTable>, registry: Arc<RoomRegistry>) -> Self {
        Self {
            memberships,
            registry,
        }
    }

    /// Initializes `conn` on first contact.
    ///
    /// Creates an empty membership and spawns a one-shot task that tears it
    /// down when the connection's close signal fires. Returns the task
    /// handle, resolving to the number of subscriptions released, or `None`
    /// if the connection was already attached or has closed.
    pub async fn attach(&self, conn: &Connection) -> Option<JoinHandle<usize>> {
        let id = conn.id();
        if conn.is_closed() {
            debug!(conn_id = %id, "attach on closed connection");
            return None;
        }
        if !self.memberships.create(id).await {
            return None;
        }
        info!(conn_id = %id, peer = ?conn.peer(), "connection attached");

        let hook = self.clone();
        let closed = conn.closed();
        Some(tokio::spawn(async move {
            closed.await;
            hook.teardown(id).await
        }))
    }

    /// Releases every subscription of `id` and discards its membership.
    ///
    /// Returns the number of subscriptions released. A connection that
    /// never joined a room, or was already torn down, releases nothing.
    pub async fn teardown(&self, id: ConnectionId) -> usize {
        let tokens = self.registry.all_tokens(id).await;
        let released = tokens.len();
        for token in tokens {
            debug!(conn_id = %id, room = %token.channel(), "releasing subscription");
            token.unsubscribe();
        }

        if self.memberships.discard(id).await.is_some() {
            info!(conn_id = %id, released, "connection closed");
        }
        released
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::hub::{MemoryHub, PubSubHub, SubscriptionToken};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Hub wrapper counting `unsubscribe` calls per channel.
    #[derive(Debug, Default)]
    struct CountingHub {
        inner: MemoryHub,
        released: Arc<Mutex<Vec<String>>>,
        subscribed: AtomicUsize,
    }

    impl PubSubHub for CountingHub {
        fn normalize_name(&self, name: &str) -> String {
            self.inner.normalize_name(name)
        }

        fn subscribe(
            &self,
            name: &str,
            delivery: crate::hub::Delivery,
        ) -> Option<SubscriptionToken> {
            let token = self.inner.subscribe(name, delivery)?;
            self.subscribed.fetch_add(1, Ordering::SeqCst);
            let released = Arc::clone(&self.released);
            let channel = token.channel().to_string();
            let id = token.id();
            Some(SubscriptionToken::new(channel.clone(), id, move || {
                if let Ok(mut released) = released.lock() {
                    released.push(channel);
                }
                token.unsubscribe();
            }))
        }

        fn publish(&self, name: &str, payload: Value) -> usize {
            self.inner.publish(name, payload)
        }

        fn channel_count(&self) -> usize {
            self.inner.channel_count()
        }
    }

    fn setup() -> (Arc<CountingHub>, Arc<MembershipTable>, Arc<RoomRegistry>, LifecycleHook) {
        let hub = Arc::new(CountingHub::default());
        let table = Arc::new(MembershipTable::new());
        let shared: Arc<dyn PubSubHub> = Arc::clone(&hub) as Arc<dyn PubSubHub>;
        let registry = Arc::new(RoomRegistry::new(Arc::clone(&table), shared));
        let hook = LifecycleHook::new(Arc::clone(&table), Arc::clone(&registry));
        (hub, table, registry, hook)
    }

    fn released(hub: &CountingHub) -> Vec<String> {
        let mut names = hub.released.lock().map(|v| v.clone()).unwrap_or_default();
        names.sort();
        names
    }

    #[tokio::test]
    async fn attach_is_once_per_connection() {
        let (_hub, table, _registry, hook) = setup();
        let (conn, _rx) = Connection::new(None);

        assert!(hook.attach(&conn).await.is_some());
        assert!(hook.attach(&conn).await.is_none());
        assert!(table.contains(conn.id()).await);
    }

    #[tokio::test]
    async fn closed_connection_is_not_attached() {
        let (_hub, table, _registry, hook) = setup();
        let (conn, _rx) = Connection::new(None);
        conn.close();

        assert!(hook.attach(&conn).await.is_none());
        assert!(!table.contains(conn.id()).await);
    }

    #[tokio::test]
    async fn close_releases_every_room_exactly_once() {
        let (hub, table, registry, hook) = setup();
        let (conn, _rx) = Connection::new(None);
        let Some(teardown) = hook.attach(&conn).await else {
            panic!("first attach should spawn teardown");
        };
        assert!(registry.enter_room(&conn, "chat1").await);
        assert!(registry.enter_room(&conn, "chat2").await);

        conn.close();
        let Ok(count) = teardown.await else {
            panic!("teardown task failed");
        };
        assert_eq!(count, 2);
        assert_eq!(released(&hub), vec!["chat1", "chat2"]);
        assert!(!table.contains(conn.id()).await);
        assert!(!registry.has_room(&conn, "chat1").await);
        assert_eq!(hub.channel_count(), 0);

        assert_eq!(hook.teardown(conn.id()).await, 0);
        assert_eq!(released(&hub).len(), 2);
    }

    #[tokio::test]
    async fn leave_then_close_never_double_releases() {
        let (hub, _table, registry, hook) = setup();
        let (conn, _rx) = Connection::new(None);
        let Some(teardown) = hook.attach(&conn).await else {
            panic!("first attach should spawn teardown");
        };
        registry.enter_room(&conn, "chat1").await;
        registry.enter_room(&conn, "chat2").await;
        assert!(registry.leave_room(&conn, "chat1").await);

        conn.close();
        assert!(matches!(teardown.await, Ok(1)));
        assert_eq!(released(&hub), vec!["chat1", "chat2"]);
        assert_eq!(hub.subscribed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn close_without_rooms_is_noop() {
        let (hub, table, _registry, hook) = setup();
        let (conn, _rx) = Connection::new(None);
        let Some(teardown) = hook.attach(&conn).await else {
            panic!("first attach should spawn teardown");
        };

        conn.close();
        assert!(matches!(teardown.await, Ok(0)));
        assert!(released(&hub).is_empty());
        assert!(table.is_empty().await);
    }

    #[tokio::test]
    async fn concurrent_teardowns_release_once() {
        let (hub, _table, registry, hook) = setup();
        let (conn, _rx) = Connection::new(None);
        let _ = hook.attach(&conn).await;
        registry.enter_room(&conn, "chat1").await;

        let (a, b) = tokio::join!(hook.teardown(conn.id()), hook.teardown(conn.id()));
        assert_eq!(a + b, 1);
        assert_eq!(released(&hub), vec!["chat1"]);
    }
}
