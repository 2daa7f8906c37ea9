//! Room registry: enter/leave/has over a connection's membership.
//!
//! Every operation takes a raw room name and normalizes it once through the
//! hub, so differently spelled but equivalent names share one identity.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::membership::MembershipTable;
use super::{Connection, ConnectionId, Envelope};
use crate::hub::{Delivery, PubSubHub, SubscriptionToken};

/// Scope prefix of envelopes pushed to room members.
pub const EVENT_SCOPE_PREFIX: &str = "/event/";

/// Subscription bookkeeping between connections and the hub.
///
/// # Concurrency
///
/// A connection's membership is written only by that connection's own
/// sequential message processing and by its close teardown. The per-entry
/// lock serializes those two; different connections never contend on it.
#[derive(Debug)]
pub struct RoomRegistry {
    memberships: Arc<MembershipTable>,
    hub: Arc<dyn PubSubHub>,
}

impl RoomRegistry {
    /// Creates a registry over an existing membership table.
    #[must_use]
    pub fn new(memberships: Arc<MembershipTable>, hub: Arc<dyn PubSubHub>) -> Self {
        Self { memberships, hub }
    }

    /// Returns `true` if `conn` is currently a member of `name`.
    pub async fn has_room(&self, conn: &Connection, name: &str) -> bool {
        let room = self.hub.normalize_name(name);
        match self.memberships.get(conn.id()).await {
            Some(entry) => entry.read().await.contains(&room),
            None => false,
        }
    }

    /// Joins `conn` to `name`.
    ///
    /// Returns `true` if a new subscription was created; `false` if the
    /// connection already is a member, the hub denied the subscription, or
    /// the connection is not attached or has closed.
    pub async fn enter_room(&self, conn: &Connection, name: &str) -> bool {
        let room = self.hub.normalize_name(name);
        let Some(entry) = self.memberships.get(conn.id()).await else {
            warn!(conn_id = %conn.id(), room = %room, "enter on unattached connection");
            return false;
        };

        let mut membership = entry.write().await;
        if conn.is_closed() {
            debug!(conn_id = %conn.id(), room = %room, "enter on closed connection");
            return false;
        }
        if membership.contains(&room) {
            debug!(conn_id = %conn.id(), room = %room, "already in room");
            return false;
        }

        let Some(token) = self.hub.subscribe(&room, forward_to(conn, &room)) else {
            debug!(conn_id = %conn.id(), room = %room, "subscription denied");
            return false;
        };

        match membership.insert(token) {
            Ok(()) => {
                debug!(conn_id = %conn.id(), room = %room, "entered room");
                true
            }
            Err(duplicate) => {
                duplicate.unsubscribe();
                false
            }
        }
    }

    /// Removes `conn` from `name`, releasing its subscription.
    ///
    /// Returns `false` if the connection was not a member.
    pub async fn leave_room(&self, conn: &Connection, name: &str) -> bool {
        let room = self.hub.normalize_name(name);
        let Some(entry) = self.memberships.get(conn.id()).await else {
            return false;
        };

        let Some(token) = entry.write().await.remove(&room) else {
            debug!(conn_id = %conn.id(), room = %room, "not in room");
            return false;
        };
        token.unsubscribe();
        debug!(conn_id = %conn.id(), room = %room, "left room");
        true
    }

    /// Takes every token out of the connection's membership.
    ///
    /// The membership is left empty; the caller is responsible for
    /// unsubscribing the returned tokens.
    pub async fn all_tokens(&self, conn: ConnectionId) -> Vec<SubscriptionToken> {
        match self.memberships.get(conn).await {
            Some(entry) => entry.write().await.drain(),
            None => Vec::new(),
        }
    }

    /// Joined room names for `conn`, sorted.
    pub async fn rooms(&self, conn: &Connection) -> Vec<String> {
        match self.memberships.get(conn.id()).await {
            Some(entry) => entry.read().await.rooms(),
            None => Vec::new(),
        }
    }
}

/// Builds the delivery callback pushing published payloads to `conn`.
///
/// Holds only a weak handle, so a late delivery to a gone connection is a
/// no-op.
fn forward_to(conn: &Connection, room: &str) -> Delivery {
    let target = conn.downgrade();
    let scope = format!("{EVENT_SCOPE_PREFIX}{room}");
    Arc::new(move |payload: Value| {
        if let Some(conn) = target.upgrade() {
            conn.send(Envelope::new(scope.as_str(), payload));
        }
    })
}
