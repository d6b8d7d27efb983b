//! Notifier chain: one notifier per event type, each linked to the notifier
//! of its immediate supertype.

use super::event_type::EventType;
use std::collections::HashMap;
use std::fmt;

/// Handle returned when a listener is registered with the event manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub(crate) usize);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Notifier {
    event_type: EventType,
    parent: Option<EventType>,
    listeners: Vec<ListenerId>,
}

impl Notifier {
    fn new(event_type: EventType) -> Self {
        Self {
            event_type,
            parent: event_type.parent(),
            listeners: Vec::new(),
        }
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn parent(&self) -> Option<EventType> {
        self.parent
    }

    /// Listeners in subscription order.
    pub fn listeners(&self) -> &[ListenerId] {
        &self.listeners
    }
}

#[derive(Debug, Clone)]
pub struct NotifierTable {
    notifiers: HashMap<EventType, Notifier>,
}

impl Default for NotifierTable {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifierTable {
    pub fn new() -> Self {
        let notifiers = EventType::ALL
            .into_iter()
            .map(|t| (t, Notifier::new(t)))
            .collect();
        Self { notifiers }
    }

    pub fn notifier(&self, event_type: EventType) -> Option<&Notifier> {
        self.notifiers.get(&event_type)
    }

    /// Returns `false` when `id` was already subscribed to `event_type`.
    pub fn subscribe(&mut self, event_type: EventType, id: ListenerId) -> bool {
        let notifier = self
            .notifiers
            .entry(event_type)
            .or_insert_with(|| Notifier::new(event_type));
        if notifier.listeners.contains(&id) {
            return false;
        }
        notifier.listeners.push(id);
        true
    }

    /// Returns `false` when `id` was not subscribed to `event_type`.
    pub fn unsubscribe(&mut self, event_type: EventType, id: ListenerId) -> bool {
        match self.notifiers.get_mut(&event_type) {
            Some(notifier) => {
                let before = notifier.listeners.len();
                notifier.listeners.retain(|l| *l != id);
                notifier.listeners.len() != before
            }
            None => false,
        }
    }

    /// Everyone to notify for an event of type `event_type`: its own
    /// listeners first, then each supertype's, walking the parent links.
    /// A listener subscribed at several levels is notified once, at the
    /// most specific one.
    pub fn recipients(&self, event_type: EventType) -> Vec<ListenerId> {
        let mut out: Vec<ListenerId> = Vec::new();
        let mut level = Some(event_type);
        while let Some(t) = level {
            let Some(notifier) = self.notifiers.get(&t) else {
                break;
            };
            for id in &notifier.listeners {
                if !out.contains(id) {
                    out.push(*id);
                }
            }
            level = notifier.parent;
        }
        out
    }
}
