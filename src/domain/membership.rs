//! Per-connection room membership.
//!
//! [`MembershipTable`] maps each live connection to its own
//! [`RoomMembership`], individually protected by a [`tokio::sync::RwLock`].
//! Only the lifecycle hook creates and discards entries; the room registry
//! only looks them up.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::ConnectionId;
use crate::hub::SubscriptionToken;

/// Rooms one connection has joined, keyed by canonical channel name.
#[derive(Debug, Default)]
pub struct RoomMembership {
    tokens: HashMap<String, SubscriptionToken>,
}

impl RoomMembership {
    /// Creates an empty membership set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the connection is a member of `room`.
    #[must_use]
    pub fn contains(&self, room: &str) -> bool {
        self.tokens.contains_key(room)
    }

    /// Stores `token` under its channel name.
    ///
    /// # Errors
    ///
    /// Hands the token back if its channel is already present, so the
    /// caller can release it.
    pub fn insert(&mut self, token: SubscriptionToken) -> Result<(), SubscriptionToken> {
        if self.tokens.contains_key(token.channel()) {
            return Err(token);
        }
        self.tokens.insert(token.channel().to_string(), token);
        Ok(())
    }

    /// Removes and returns the token for `room`.
    pub fn remove(&mut self, room: &str) -> Option<SubscriptionToken> {
        self.tokens.remove(room)
    }

    /// Removes and returns every token.
    pub fn drain(&mut self) -> Vec<SubscriptionToken> {
        self.tokens.drain().map(|(_, token)| token).collect()
    }

    /// Joined room names, sorted.
    #[must_use]
    pub fn rooms(&self) -> Vec<String> {
        let mut rooms: Vec<String> = self.tokens.keys().cloned().collect();
        rooms.sort();
        rooms
    }

    /// Number of joined rooms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if no room is joined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Shared handle to one connection's membership.
pub type MembershipEntry = Arc<RwLock<RoomMembership>>;

/// Connection id to membership map.
#[derive(Debug, Default)]
pub struct MembershipTable {
    entries: RwLock<HashMap<ConnectionId, MembershipEntry>>,
}

impl MembershipTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an empty membership for `id`.
    ///
    /// Returns `false` if the connection already has one.
    pub(crate) async fn create(&self, id: ConnectionId) -> bool {
        let mut map = self.entries.write().await;
        if map.contains_key(&id) {
            return false;
        }
        map.insert(id, Arc::new(RwLock::new(RoomMembership::new())));
        true
    }

    /// Removes the membership for `id`.
    pub(crate) async fn discard(&self, id: ConnectionId) -> Option<MembershipEntry> {
        self.entries.write().await.remove(&id)
    }

    /// Returns the membership for `id`, if the connection is live.
    pub async fn get(&self, id: ConnectionId) -> Option<MembershipEntry> {
        self.entries.read().await.get(&id).cloned()
    }

    /// Returns `true` if `id` has a membership entry.
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.entries.read().await.contains_key(&id)
    }

    /// Number of live connections.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if no connection is live.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
