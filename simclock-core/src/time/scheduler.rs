//! Scheduler: given the current simulated instant, decides which subscribed
//! time event fires next.
//!
//! Recurrence rules are resolved on every call, so an unconfigured setting
//! surfaces as a [`ConfigError`] the first time the scheduler needs it.

use super::session::{ConfigError, SessionConfig};
use super::time_event::TimeEvent;
use chrono::NaiveDateTime;

/// All subscribed events that share the nearest occurrence, in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEvents {
    pub time: NaiveDateTime,
    pub events: Vec<TimeEvent>,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    session: SessionConfig,
    /// Kept sorted (priority order) and free of duplicates.
    subscriptions: Vec<TimeEvent>,
}

impl Scheduler {
    pub fn new(session: SessionConfig) -> Self {
        Self {
            session,
            subscriptions: Vec::new(),
        }
    }

    pub fn with_events(
        session: SessionConfig,
        events: impl IntoIterator<Item = TimeEvent>,
    ) -> Self {
        let mut scheduler = Self::new(session);
        for event in events {
            scheduler.subscribe(event);
        }
        scheduler
    }

    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    pub fn subscriptions(&self) -> &[TimeEvent] {
        &self.subscriptions
    }

    /// Subscribe to a time event. Subscribing twice is a no-op.
    pub fn subscribe(&mut self, event: TimeEvent) {
        if let Err(pos) = self.subscriptions.binary_search(&event) {
            self.subscriptions.insert(pos, event);
        }
    }

    pub fn unsubscribe(&mut self, event: &TimeEvent) {
        self.subscriptions.retain(|e| e != event);
    }

    /// The nearest event strictly after `now`. Ties resolve to the
    /// highest-priority event; use [`Scheduler::next_events`] to get all of them.
    pub fn next_event(
        &self,
        now: NaiveDateTime,
    ) -> Result<Option<(TimeEvent, NaiveDateTime)>, ConfigError> {
        Ok(self.next_events(now)?.and_then(|batch| {
            let time = batch.time;
            batch.events.into_iter().next().map(|event| (event, time))
        }))
    }

    /// Every subscribed event that occurs at the nearest instant strictly
    /// after `now`. `None` when nothing is left to fire.
    pub fn next_events(&self, now: NaiveDateTime) -> Result<Option<ScheduledEvents>, ConfigError> {
        let mut best: Option<ScheduledEvents> = None;
        for event in &self.subscriptions {
            let rule = event.rule(&self.session)?;
            let Some(time) = rule.next_after(now, &self.session.calendar)? else {
                continue;
            };
            let earlier = best.as_ref().map_or(true, |batch| time < batch.time);
            if earlier {
                best = Some(ScheduledEvents {
                    time,
                    events: vec![event.clone()],
                });
            } else if let Some(batch) = best.as_mut().filter(|batch| batch.time == time) {
                batch.events.push(event.clone());
            }
        }
        // subscriptions are iterated in priority order, so each batch already is
        Ok(best)
    }

    /// The next `count` occurrences after `now`, flattened in firing order.
    pub fn upcoming(
        &self,
        now: NaiveDateTime,
        count: usize,
    ) -> Result<Vec<(TimeEvent, NaiveDateTime)>, ConfigError> {
        let mut out = Vec::with_capacity(count);
        let mut cursor = now;
        while out.len() < count {
            let Some(batch) = self.next_events(cursor)? else {
                break;
            };
            cursor = batch.time;
            for event in batch.events {
                if out.len() == count {
                    break;
                }
                out.push((event, cursor));
            }
        }
        Ok(out)
    }
}
