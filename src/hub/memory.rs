//! In-memory pub/sub hub.
//!
//! Single-process only. Each channel maps subscription ids to delivery
//! callbacks; publish invokes a snapshot of the callbacks outside the map
//! lock, so a callback may itself subscribe or unsubscribe.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use super::{Delivery, PubSubHub, SubscriptionToken};

/// Default channel path separator.
pub const DEFAULT_SEPARATOR: &str = "/";

/// Default maximum length of a normalized channel name.
pub const DEFAULT_MAX_NAME_LEN: usize = 128;

struct HubInner {
    channels: DashMap<String, HashMap<u64, Delivery>>,
    next_id: AtomicU64,
    separator: String,
    max_name_len: usize,
}

impl HubInner {
    fn release(&self, channel: &str, id: u64) {
        if let Some(mut subscribers) = self.channels.get_mut(channel) {
            subscribers.remove(&id);
        }
        if self
            .channels
            .remove_if(channel, |_, subscribers| subscribers.is_empty())
            .is_some()
        {
            debug!(channel, "removed empty channel");
        }
        debug!(channel, id, "unsubscribed");
    }
}

/// In-process hub backed by a [`DashMap`] of channels.
///
/// Cloning yields another handle to the same hub.
#[derive(Clone)]
pub struct MemoryHub {
    inner: Arc<HubInner>,
}

impl MemoryHub {
    /// Creates a hub with the default separator and name limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(DEFAULT_SEPARATOR, DEFAULT_MAX_NAME_LEN)
    }

    /// Creates a hub with a custom separator and maximum name length.
    ///
    /// An empty separator falls back to [`DEFAULT_SEPARATOR`].
    pub fn with_options(separator: impl Into<String>, max_name_len: usize) -> Self {
        let mut separator = separator.into();
        if separator.is_empty() {
            separator = DEFAULT_SEPARATOR.to_string();
        }
        Self {
            inner: Arc::new(HubInner {
                channels: DashMap::new(),
                next_id: AtomicU64::new(1),
                separator,
                max_name_len,
            }),
        }
    }

    /// Returns the number of subscribers of `name`.
    #[must_use]
    pub fn subscriber_count(&self, name: &str) -> usize {
        let channel = self.normalize_name(name);
        self.inner
            .channels
            .get(&channel)
            .map_or(0, |subscribers| subscribers.len())
    }

    fn is_valid(&self, channel: &str) -> bool {
        !channel.is_empty()
            && channel.len() <= self.inner.max_name_len
            && !channel
                .chars()
                .any(|c| c.is_control() || c == '*' || c == '#')
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        Self::new()
    }
}

impl PubSubHub for MemoryHub {
    fn normalize_name(&self, name: &str) -> String {
        let separator = self.inner.separator.as_str();
        name.split(separator)
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join(separator)
    }

    fn subscribe(&self, name: &str, delivery: Delivery) -> Option<SubscriptionToken> {
        let channel = self.normalize_name(name);
        if !self.is_valid(&channel) {
            debug!(name, "subscription denied");
            return None;
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .channels
            .entry(channel.clone())
            .or_default()
            .insert(id, delivery);
        debug!(channel = %channel, id, "subscribed");

        let hub: Weak<HubInner> = Arc::downgrade(&self.inner);
        let released = channel.clone();
        Some(SubscriptionToken::new(channel, id, move || {
            if let Some(hub) = hub.upgrade() {
                hub.release(&released, id);
            }
        }))
    }

    fn publish(&self, name: &str, payload: Value) -> usize {
        let channel = self.normalize_name(name);
        let deliveries: Vec<Delivery> = match self.inner.channels.get(&channel) {
            Some(subscribers) => subscribers.values().map(Arc::clone).collect(),
            None => return 0,
        };

        for delivery in &deliveries {
            delivery(payload.clone());
        }
        debug!(channel = %channel, receivers = deliveries.len(), "published");
        deliveries.len()
    }

    fn channel_count(&self) -> usize {
        self.inner.channels.len()
    }
}

impl fmt::Debug for MemoryHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHub")
            .field("channels", &self.inner.channels.len())
            .field("separator", &self.inner.separator)
            .field("max_name_len", &self.inner.max_name_len)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn recorder() -> (Delivery, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let delivery: Delivery = Arc::new(move |payload| {
            if let Ok(mut seen) = sink.lock() {
                seen.push(payload);
            }
        });
        (delivery, seen)
    }

    fn seen(values: &Arc<Mutex<Vec<Value>>>) -> Vec<Value> {
        values.lock().map(|v| v.clone()).unwrap_or_default()
    }

    #[test]
    fn normalize_collapses_separators_and_whitespace() {
        let hub = MemoryHub::new();
        assert_eq!(hub.normalize_name(" chat1 "), "chat1");
        assert_eq!(hub.normalize_name("/chat1/"), "chat1");
        assert_eq!(hub.normalize_name("a//b/ c"), "a/b/c");
        assert_eq!(hub.normalize_name("///"), "");
    }

    #[test]
    fn subscribe_and_publish() {
        let hub = MemoryHub::new();
        let (delivery, values) = recorder();

        let Some(token) = hub.subscribe("/chat1", delivery) else {
            panic!("subscription should be granted");
        };
        assert_eq!(token.channel(), "chat1");

        assert_eq!(hub.publish("chat1", json!({"x": 1})), 1);
        assert_eq!(seen(&values), vec![json!({"x": 1})]);
    }

    #[test]
    fn invalid_names_are_denied() {
        let hub = MemoryHub::with_options("/", 8);
        let (delivery, _) = recorder();
        assert!(hub.subscribe("  ", Arc::clone(&delivery)).is_none());
        assert!(hub.subscribe("room*", Arc::clone(&delivery)).is_none());
        assert!(hub.subscribe("room#1", Arc::clone(&delivery)).is_none());
        assert!(hub.subscribe("far-too-long", Arc::clone(&delivery)).is_none());
        assert!(hub.subscribe("ok", delivery).is_some());
    }

    #[test]
    fn unsubscribe_stops_delivery_and_drops_channel() {
        let hub = MemoryHub::new();
        let (delivery, values) = recorder();

        let Some(token) = hub.subscribe("chat1", delivery) else {
            panic!("subscription should be granted");
        };
        assert_eq!(hub.channel_count(), 1);

        token.unsubscribe();
        assert_eq!(hub.channel_count(), 0);
        assert_eq!(hub.publish("chat1", json!(1)), 0);
        assert!(seen(&values).is_empty());
    }

    #[test]
    fn channel_survives_while_other_subscribers_remain() {
        let hub = MemoryHub::new();
        let (first, _) = recorder();
        let (second, values) = recorder();

        let Some(a) = hub.subscribe("chat1", first) else {
            panic!("first subscription");
        };
        let Some(_b) = hub.subscribe("chat1", second) else {
            panic!("second subscription");
        };
        assert_eq!(hub.subscriber_count("chat1"), 2);

        a.unsubscribe();
        assert_eq!(hub.subscriber_count("chat1"), 1);
        assert_eq!(hub.publish("chat1", json!("hi")), 1);
        assert_eq!(seen(&values), vec![json!("hi")]);
    }

    #[test]
    fn token_outliving_hub_is_harmless() {
        let hub = MemoryHub::new();
        let (delivery, _) = recorder();
        let Some(token) = hub.subscribe("chat1", delivery) else {
            panic!("subscription should be granted");
        };
        drop(hub);
        token.unsubscribe();
    }

    #[test]
    fn custom_separator() {
        let hub = MemoryHub::with_options(".", DEFAULT_MAX_NAME_LEN);
        assert_eq!(hub.normalize_name(".a..b."), "a.b");
    }
}
