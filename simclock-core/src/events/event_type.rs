//! Event type taxonomy.
//!
//! Every event type declares its immediate supertype, up to [`EventType::Any`].
//! Abstract types (`Any`, `Time`, `RegularTime`, `PeriodicTime`) are never
//! published themselves; they exist so a listener can subscribe to a whole
//! category.
//!
//! ```text
//! Any
//! ├── Time
//! │   ├── RegularTime ── BeforeMarketOpen, MarketOpen, MarketClose, AfterMarketClose
//! │   ├── PeriodicTime ─ IntradayBar
//! │   └── OneShot
//! ├── Signal
//! ├── Fill
//! ├── EmptyQueue
//! └── EndTrading
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Any,
    Time,
    RegularTime,
    PeriodicTime,
    BeforeMarketOpen,
    MarketOpen,
    MarketClose,
    AfterMarketClose,
    IntradayBar,
    OneShot,
    Signal,
    Fill,
    EmptyQueue,
    EndTrading,
}

impl EventType {
    pub const ALL: [EventType; 14] = [
        EventType::Any,
        EventType::Time,
        EventType::RegularTime,
        EventType::PeriodicTime,
        EventType::BeforeMarketOpen,
        EventType::MarketOpen,
        EventType::MarketClose,
        EventType::AfterMarketClose,
        EventType::IntradayBar,
        EventType::OneShot,
        EventType::Signal,
        EventType::Fill,
        EventType::EmptyQueue,
        EventType::EndTrading,
    ];

    /// Immediate supertype. `None` only for `Any`.
    pub fn parent(self) -> Option<EventType> {
        match self {
            EventType::Any => None,
            EventType::Time
            | EventType::Signal
            | EventType::Fill
            | EventType::EmptyQueue
            | EventType::EndTrading => Some(EventType::Any),
            EventType::RegularTime | EventType::PeriodicTime | EventType::OneShot => {
                Some(EventType::Time)
            }
            EventType::BeforeMarketOpen
            | EventType::MarketOpen
            | EventType::MarketClose
            | EventType::AfterMarketClose => Some(EventType::RegularTime),
            EventType::IntradayBar => Some(EventType::PeriodicTime),
        }
    }

    /// This type followed by each supertype, ending at `Any`.
    pub fn chain(self) -> impl Iterator<Item = EventType> {
        std::iter::successors(Some(self), |t| t.parent())
    }

    /// Whether an event of type `self` is also an event of type `ancestor`.
    pub fn is_a(self, ancestor: EventType) -> bool {
        self.chain().any(|t| t == ancestor)
    }

    pub fn is_abstract(self) -> bool {
        matches!(
            self,
            EventType::Any | EventType::Time | EventType::RegularTime | EventType::PeriodicTime
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            EventType::Any => "any",
            EventType::Time => "time",
            EventType::RegularTime => "regular_time",
            EventType::PeriodicTime => "periodic_time",
            EventType::BeforeMarketOpen => "before_market_open",
            EventType::MarketOpen => "market_open",
            EventType::MarketClose => "market_close",
            EventType::AfterMarketClose => "after_market_close",
            EventType::IntradayBar => "intraday_bar",
            EventType::OneShot => "one_shot",
            EventType::Signal => "signal",
            EventType::Fill => "fill",
            EventType::EmptyQueue => "empty_queue",
            EventType::EndTrading => "end_trading",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
