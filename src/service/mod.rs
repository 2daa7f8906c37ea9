//! Service layer: control dispatcher, lifecycle hook and event listeners.

pub mod dispatcher;
pub mod events;
pub mod lifecycle;

pub use dispatcher::{ControlDispatcher, DispatchOutcome};
pub use events::{EventListener, EventListeners};
pub use lifecycle::LifecycleHook;
