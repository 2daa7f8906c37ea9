//! Publish/subscribe hub interface.
//!
//! The room core only needs four things from a hub: name normalization,
//! callback-based subscribe, a token that can unsubscribe, and publish.
//! [`MemoryHub`] is the in-process implementation used by the binary.

pub mod memory;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

pub use memory::MemoryHub;

/// Callback invoked by the hub for every payload published to a channel.
pub type Delivery = Arc<dyn Fn(Value) + Send + Sync>;

/// Pub/sub hub used as the backing store for rooms.
pub trait PubSubHub: Send + Sync + fmt::Debug {
    /// Canonicalizes a channel name. Equivalent spellings map to one string.
    fn normalize_name(&self, name: &str) -> String;

    /// Subscribes `delivery` to the channel `name`.
    ///
    /// Returns `None` when the hub refuses the subscription, e.g. for an
    /// invalid channel name.
    fn subscribe(&self, name: &str, delivery: Delivery) -> Option<SubscriptionToken>;

    /// Publishes `payload` to every current subscriber of `name`.
    ///
    /// Returns the number of subscribers the payload was delivered to.
    fn publish(&self, name: &str, payload: Value) -> usize;

    /// Returns the number of channels with at least one subscriber.
    fn channel_count(&self) -> usize;
}

/// Handle to one hub subscription.
///
/// Carries the canonical channel name. [`SubscriptionToken::unsubscribe`]
/// consumes the token, so a subscription can be released at most once.
pub struct SubscriptionToken {
    channel: String,
    id: u64,
    release: Box<dyn FnOnce() + Send + Sync>,
}

impl SubscriptionToken {
    /// Creates a token whose `release` closure removes the subscription.
    pub fn new(
        channel: impl Into<String>,
        id: u64,
        release: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            channel: channel.into(),
            id,
            release: Box::new(release),
        }
    }

    /// Canonical channel name as assigned by the hub.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Hub-assigned subscription id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Releases the subscription. Deliveries stop once this returns.
    pub fn unsubscribe(self) {
        (self.release)();
    }
}

impl fmt::Debug for SubscriptionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionToken")
            .field("channel", &self.channel)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
