//! Publish/subscribe event dispatch.

pub mod event;
pub mod event_type;
pub mod manager;
pub mod notifier;

pub use event::Event;
pub use event_type::EventType;
pub use manager::{DispatchError, DispatchState, EventManager, EventQueue, Listener, RunSummary};
pub use notifier::{ListenerId, Notifier, NotifierTable};
