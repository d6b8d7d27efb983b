//! Events carried by the dispatch queue.

use super::event_type::EventType;
use crate::domain::{Fill, SignalEvent};
use crate::time::{ConfigError, Frequency, SessionConfig, TimeEvent};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A timestamped event. Owned by the queue until dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    BeforeMarketOpen { time: NaiveDateTime },
    MarketOpen { time: NaiveDateTime },
    MarketClose { time: NaiveDateTime },
    AfterMarketClose { time: NaiveDateTime },
    IntradayBar { time: NaiveDateTime, frequency: Frequency },
    OneShot { time: NaiveDateTime, tag: String },
    Signal(SignalEvent),
    Fill(Fill),
    EmptyQueue { time: NaiveDateTime },
    EndTrading { time: NaiveDateTime },
}

impl Event {
    /// Materialize a scheduled time event firing at `time`.
    pub fn from_time_event(
        event: &TimeEvent,
        time: NaiveDateTime,
        session: &SessionConfig,
    ) -> Result<Self, ConfigError> {
        let event = match event {
            TimeEvent::BeforeMarketOpen => Event::BeforeMarketOpen { time },
            TimeEvent::MarketOpen => Event::MarketOpen { time },
            TimeEvent::MarketClose => Event::MarketClose { time },
            TimeEvent::AfterMarketClose => Event::AfterMarketClose { time },
            TimeEvent::IntradayBar => Event::IntradayBar {
                time,
                frequency: session.intraday_frequency()?,
            },
            TimeEvent::OneShot { tag, .. } => Event::OneShot {
                time,
                tag: tag.clone(),
            },
        };
        Ok(event)
    }

    pub fn time(&self) -> NaiveDateTime {
        match self {
            Event::BeforeMarketOpen { time }
            | Event::MarketOpen { time }
            | Event::MarketClose { time }
            | Event::AfterMarketClose { time }
            | Event::IntradayBar { time, .. }
            | Event::OneShot { time, .. }
            | Event::EmptyQueue { time }
            | Event::EndTrading { time } => *time,
            Event::Signal(signal) => signal.time,
            Event::Fill(fill) => fill.time,
        }
    }

    /// Concrete type of this event; never abstract.
    pub fn event_type(&self) -> EventType {
        match self {
            Event::BeforeMarketOpen { .. } => EventType::BeforeMarketOpen,
            Event::MarketOpen { .. } => EventType::MarketOpen,
            Event::MarketClose { .. } => EventType::MarketClose,
            Event::AfterMarketClose { .. } => EventType::AfterMarketClose,
            Event::IntradayBar { .. } => EventType::IntradayBar,
            Event::OneShot { .. } => EventType::OneShot,
            Event::Signal(_) => EventType::Signal,
            Event::Fill(_) => EventType::Fill,
            Event::EmptyQueue { .. } => EventType::EmptyQueue,
            Event::EndTrading { .. } => EventType::EndTrading,
        }
    }
}
