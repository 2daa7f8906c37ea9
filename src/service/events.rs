//! Room-keyed application event listeners.
//!
//! Replaces a process-wide emitter: each gateway owns its own listener
//! table, keyed by normalized room name.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::context::MessageContext;

/// Listener invoked for every admitted `event` message in a room.
pub type EventListener = Arc<dyn Fn(&mut MessageContext) + Send + Sync>;

/// Listener table owned by one gateway instance.
#[derive(Default)]
pub struct EventListeners {
    listeners: HashMap<String, Vec<EventListener>>,
}

impl EventListeners {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `listener` for the (already normalized) `room`.
    pub fn on(&mut self, room: String, listener: EventListener) {
        self.listeners.entry(room).or_default().push(listener);
    }

    /// Invokes every listener of `room` with `ctx`, in registration order.
    ///
    /// Returns the number of listeners invoked.
    pub fn emit(&self, room: &str, ctx: &mut MessageContext) -> usize {
        let Some(listeners) = self.listeners.get(room) else {
            return 0;
        };
        for listener in listeners {
            listener(ctx);
        }
        listeners.len()
    }

    /// Number of listeners registered for `room`.
    #[must_use]
    pub fn listener_count(&self, room: &str) -> usize {
        self.listeners.get(room).map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.listeners.iter().map(|(room, l)| (room, l.len())))
            .finish()
    }
}
