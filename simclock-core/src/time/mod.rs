//! Simulated time: bar frequencies, the trading calendar, the session
//! configuration, the recurring time events and the scheduler that decides
//! which of them fires next.

pub mod calendar;
pub mod clock;
pub mod frequency;
pub mod scheduler;
pub mod session;
pub mod time_event;

pub use calendar::{CalendarKind, TradingCalendar};
pub use clock::{ClockError, SimulatedClock};
pub use frequency::{Frequency, ParseFrequencyError};
pub use scheduler::{ScheduledEvents, Scheduler};
pub use session::{ConfigError, SessionConfig, TimeOfDay};
pub use time_event::{TimeEvent, TimeRule};

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

fn epoch() -> NaiveDateTime {
    NaiveDate::default().and_time(NaiveTime::MIN)
}

/// Microseconds since 1970-01-01T00:00:00.
pub(crate) fn to_micros(ts: NaiveDateTime) -> i64 {
    ts.and_utc().timestamp_micros()
}

pub(crate) fn from_micros(micros: i64) -> NaiveDateTime {
    epoch() + Duration::microseconds(micros)
}
