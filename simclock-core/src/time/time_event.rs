//! Time events: the recurring (or one-shot) instants a listener can ask to
//! be woken at.
//!
//! Each event resolves against the [`SessionConfig`] into a [`TimeRule`]. A
//! rule is a pure function of the calendar date: it never looks at which
//! events already fired.

use super::calendar::TradingCalendar;
use super::session::{ConfigError, SessionConfig};
use super::{from_micros, to_micros};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Upper bound on how many calendar days a rule scans forward.
const MAX_ROLL_DAYS: u32 = 370;

/// Subscribable time events.
///
/// Variant order is the tie-break priority when two events fall on the same
/// instant: market-structure events first (open, close), then the
/// strategy-level hooks around them, then intraday bars, then one-shot
/// events. `Ord` is derived from this order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimeEvent {
    MarketOpen,
    MarketClose,
    BeforeMarketOpen,
    AfterMarketClose,
    /// Every `intraday_frequency` step from `open + step` up to, but not
    /// including, `close - step`.
    IntradayBar,
    /// Fires once at an absolute instant.
    OneShot { at: NaiveDateTime, tag: String },
}

/// A resolved recurrence rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeRule {
    /// Once per trading day at a fixed time of day.
    Daily(NaiveTime),
    /// Every `step` in `[open + step, close - step)` on each trading day.
    Periodic {
        step: Duration,
        open: NaiveTime,
        close: NaiveTime,
    },
    /// Exactly once.
    Once(NaiveDateTime),
}

impl TimeEvent {
    pub fn one_shot(at: NaiveDateTime, tag: impl Into<String>) -> Self {
        TimeEvent::OneShot {
            at,
            tag: tag.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TimeEvent::MarketOpen => "market_open",
            TimeEvent::MarketClose => "market_close",
            TimeEvent::BeforeMarketOpen => "before_market_open",
            TimeEvent::AfterMarketClose => "after_market_close",
            TimeEvent::IntradayBar => "intraday_bar",
            TimeEvent::OneShot { .. } => "one_shot",
        }
    }

    /// Resolve this event's recurrence against the session configuration.
    pub fn rule(&self, session: &SessionConfig) -> Result<TimeRule, ConfigError> {
        let rule = match self {
            TimeEvent::MarketOpen => TimeRule::Daily(session.market_open_time()?),
            TimeEvent::MarketClose => TimeRule::Daily(session.market_close_time()?),
            TimeEvent::BeforeMarketOpen => TimeRule::Daily(session.before_market_open_time()?),
            TimeEvent::AfterMarketClose => TimeRule::Daily(session.after_market_close_time()?),
            TimeEvent::IntradayBar => {
                let frequency = session.intraday_frequency()?;
                let open = session.market_open_time()?;
                let close = session.market_close_time()?;
                // intraday_frequency() guarantees a step
                let step = frequency
                    .step()
                    .ok_or(ConfigError::NotIntraday { frequency })?;
                let rule = TimeRule::Periodic { step, open, close };
                rule.check_window()?;
                rule
            }
            TimeEvent::OneShot { at, .. } => TimeRule::Once(*at),
        };
        Ok(rule)
    }
}

impl TimeRule {
    /// Smallest occurrence strictly after `now`, or `None` once a one-shot
    /// rule is exhausted.
    pub fn next_after(
        &self,
        now: NaiveDateTime,
        calendar: &TradingCalendar,
    ) -> Result<Option<NaiveDateTime>, ConfigError> {
        match self {
            TimeRule::Once(at) => Ok((*at > now).then_some(*at)),
            TimeRule::Daily(time) => {
                let found = scan_days(now.date(), calendar, |date| {
                    let candidate = date.and_time(*time);
                    (candidate > now).then_some(candidate)
                })?;
                Ok(Some(found))
            }
            TimeRule::Periodic { step, open, close } => {
                let step_us = step.num_microseconds().unwrap_or(i64::MAX).max(1);
                let found = scan_days(now.date(), calendar, |date| {
                    let first = date.and_time(*open) + *step;
                    let last = date.and_time(*close) - *step;
                    let candidate = if now < first {
                        first
                    } else {
                        let elapsed = to_micros(now) - to_micros(first);
                        from_micros(to_micros(first) + (elapsed / step_us + 1) * step_us)
                    };
                    (candidate < last).then_some(candidate)
                })?;
                Ok(Some(found))
            }
        }
    }

    fn check_window(&self) -> Result<(), ConfigError> {
        if let TimeRule::Periodic { step, open, close } = self {
            let day = NaiveDate::default();
            if day.and_time(*open) + *step >= day.and_time(*close) - *step {
                return Err(ConfigError::EmptySession {
                    open: *open,
                    close: *close,
                });
            }
        }
        Ok(())
    }
}

/// Walk trading days from `start` until `pick` yields an instant.
fn scan_days(
    start: NaiveDate,
    calendar: &TradingCalendar,
    mut pick: impl FnMut(NaiveDate) -> Option<NaiveDateTime>,
) -> Result<NaiveDateTime, ConfigError> {
    let mut date = start;
    for _ in 0..MAX_ROLL_DAYS {
        if calendar.is_trading_day(date) {
            if let Some(found) = pick(date) {
                return Ok(found);
            }
        }
        date = date
            .succ_opt()
            .ok_or(ConfigError::NoTradingDays { from: start })?;
    }
    Err(ConfigError::NoTradingDays { from: start })
}
