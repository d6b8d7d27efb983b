//! Event manager: the FIFO queue and the dispatch loop.
//!
//! Dispatch is single-threaded and cooperative. Each `dispatch_next` call
//! pops the head of the queue and hands it to every listener subscribed to
//! its type or to any of its supertypes, most specific first. Listeners
//! publish follow-up events through the [`EventQueue`] handle they receive.
//!
//! ```text
//! QueueEmpty ⇄ HasPendingEvents → Dispatching → (QueueEmpty | HasPendingEvents)
//!                                      └──── EndTrading ────→ TradingEnded
//! ```

use super::event::Event;
use super::event_type::EventType;
use super::notifier::{ListenerId, NotifierTable};
use crate::error::SimError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("subscriptions are closed once the event loop has started")]
    SubscriptionClosed,

    #[error("unknown {0}")]
    UnknownListener(ListenerId),

    #[error("trading has ended; {event_type} event at {time} was rejected")]
    TradingEnded {
        event_type: EventType,
        time: NaiveDateTime,
    },
}

/// Something that reacts to dispatched events.
///
/// `C` is the simulation context shared by all listeners of one run.
pub trait Listener<C> {
    /// Used in logs and error messages.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn on_event(&mut self, event: &Event, ctx: &mut C, queue: &mut EventQueue)
        -> Result<(), SimError>;
}

/// FIFO queue of events awaiting dispatch.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    /// Append at the tail. Events are never reordered.
    pub fn publish(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn peek(&self) -> Option<&Event> {
        self.events.front()
    }

    fn pop(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    fn clear(&mut self) -> usize {
        let dropped = self.events.len();
        self.events.clear();
        dropped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchState {
    QueueEmpty,
    HasPendingEvents,
    Dispatching,
    TradingEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Events dispatched during this call to `run`.
    pub dispatched: u64,
    /// Whether an `EndTrading` event was reached.
    pub ended: bool,
}

pub struct EventManager<C> {
    queue: EventQueue,
    notifiers: NotifierTable,
    listeners: Vec<Box<dyn Listener<C>>>,
    state: DispatchState,
    started: bool,
    dispatched: u64,
}

impl<C> Default for EventManager<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> EventManager<C> {
    pub fn new() -> Self {
        Self {
            queue: EventQueue::default(),
            notifiers: NotifierTable::new(),
            listeners: Vec::new(),
            state: DispatchState::QueueEmpty,
            started: false,
            dispatched: 0,
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Total events dispatched since construction.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    pub fn notifiers(&self) -> &NotifierTable {
        &self.notifiers
    }

    pub fn register(
        &mut self,
        listener: Box<dyn Listener<C>>,
    ) -> Result<ListenerId, DispatchError> {
        if self.started {
            return Err(DispatchError::SubscriptionClosed);
        }
        let id = ListenerId(self.listeners.len());
        debug!(listener = listener.name(), %id, "registered");
        self.listeners.push(listener);
        Ok(id)
    }

    /// Register `listener` and subscribe it to each of `event_types`.
    pub fn register_for(
        &mut self,
        listener: Box<dyn Listener<C>>,
        event_types: &[EventType],
    ) -> Result<ListenerId, DispatchError> {
        let id = self.register(listener)?;
        for event_type in event_types {
            self.subscribe(id, *event_type)?;
        }
        Ok(id)
    }

    /// Subscribing twice to the same type is a no-op.
    pub fn subscribe(
        &mut self,
        id: ListenerId,
        event_type: EventType,
    ) -> Result<(), DispatchError> {
        self.check_subscription(id)?;
        self.notifiers.subscribe(event_type, id);
        Ok(())
    }

    pub fn unsubscribe(
        &mut self,
        id: ListenerId,
        event_type: EventType,
    ) -> Result<(), DispatchError> {
        self.check_subscription(id)?;
        self.notifiers.unsubscribe(event_type, id);
        Ok(())
    }

    fn check_subscription(&self, id: ListenerId) -> Result<(), DispatchError> {
        if self.started {
            return Err(DispatchError::SubscriptionClosed);
        }
        if id.0 >= self.listeners.len() {
            return Err(DispatchError::UnknownListener(id));
        }
        Ok(())
    }

    pub fn publish(&mut self, event: Event) -> Result<(), DispatchError> {
        if self.state == DispatchState::TradingEnded {
            return Err(DispatchError::TradingEnded {
                event_type: event.event_type(),
                time: event.time(),
            });
        }
        self.queue.publish(event);
        self.state = DispatchState::HasPendingEvents;
        Ok(())
    }

    /// Dispatch the head of the queue. Returns its type, or `None` when the
    /// queue is empty or trading has ended.
    ///
    /// A listener error aborts the run: the queue is dropped and the manager
    /// moves to `TradingEnded`.
    pub fn dispatch_next(&mut self, ctx: &mut C) -> Result<Option<EventType>, SimError> {
        if self.state == DispatchState::TradingEnded {
            return Ok(None);
        }
        let Some(event) = self.queue.pop() else {
            self.state = DispatchState::QueueEmpty;
            return Ok(None);
        };
        self.started = true;
        self.state = DispatchState::Dispatching;

        let event_type = event.event_type();
        let time = event.time();
        let recipients = self.notifiers.recipients(event_type);
        debug!(%event_type, %time, recipients = recipients.len(), "dispatch");

        for id in recipients {
            let listener = &mut self.listeners[id.0];
            if let Err(source) = listener.on_event(&event, ctx, &mut self.queue) {
                let err = SimError::Listener {
                    listener: listener.name().to_string(),
                    event_type,
                    time,
                    source: Box::new(source),
                };
                error!(%err, "run aborted");
                self.queue.clear();
                self.state = DispatchState::TradingEnded;
                return Err(err);
            }
        }
        self.dispatched += 1;

        if event_type == EventType::EndTrading {
            let dropped = self.queue.clear();
            self.state = DispatchState::TradingEnded;
            info!(%time, dispatched = self.dispatched, dropped, "trading ended");
        } else if !self.queue.is_empty() {
            self.state = DispatchState::HasPendingEvents;
        } else if event_type == EventType::EmptyQueue {
            // nobody reacted to the empty queue; go idle instead of spinning
            self.state = DispatchState::QueueEmpty;
            debug!(%time, "idle");
        } else {
            self.queue.publish(Event::EmptyQueue { time });
            self.state = DispatchState::HasPendingEvents;
        }
        Ok(Some(event_type))
    }

    /// Dispatch until trading ends or the loop goes idle.
    pub fn run(&mut self, ctx: &mut C) -> Result<RunSummary, SimError> {
        let before = self.dispatched;
        while self.dispatch_next(ctx)?.is_some() {}
        Ok(RunSummary {
            dispatched: self.dispatched - before,
            ended: self.state == DispatchState::TradingEnded,
        })
    }
}
