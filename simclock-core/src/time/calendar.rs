//! Trading calendar: which dates carry a session.
//!
//! Pure date logic, no I/O and no wall clock. Daily and periodic time events
//! roll forward over non-trading dates, and PnL reconstruction walks the
//! trading dates between two bounds.

use super::session::ConfigError;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Upper bound on how far the calendar searches for the next session.
const MAX_SEARCH_DAYS: u32 = 370;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarKind {
    /// Monday to Friday, minus the configured holidays.
    #[default]
    Weekdays,
    /// Every date is a trading date (crypto, synthetic tests).
    AlwaysOn,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingCalendar {
    pub kind: CalendarKind,
    pub holidays: BTreeSet<NaiveDate>,
}

impl TradingCalendar {
    pub fn weekdays() -> Self {
        Self::default()
    }

    pub fn always_on() -> Self {
        Self {
            kind: CalendarKind::AlwaysOn,
            holidays: BTreeSet::new(),
        }
    }

    pub fn with_holidays(mut self, holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.holidays.extend(holidays);
        self
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        if self.holidays.contains(&date) {
            return false;
        }
        match self.kind {
            CalendarKind::AlwaysOn => true,
            CalendarKind::Weekdays => !matches!(date.weekday(), Weekday::Sat | Weekday::Sun),
        }
    }

    /// First trading date on or after `date`.
    pub fn next_trading_day(&self, date: NaiveDate) -> Result<NaiveDate, ConfigError> {
        let mut candidate = date;
        for _ in 0..MAX_SEARCH_DAYS {
            if self.is_trading_day(candidate) {
                return Ok(candidate);
            }
            candidate = candidate
                .succ_opt()
                .ok_or(ConfigError::NoTradingDays { from: date })?;
        }
        Err(ConfigError::NoTradingDays { from: date })
    }

    /// Last trading date strictly before `date`.
    pub fn previous_trading_day(&self, date: NaiveDate) -> Result<NaiveDate, ConfigError> {
        let mut candidate = date;
        for _ in 0..MAX_SEARCH_DAYS {
            candidate = candidate
                .pred_opt()
                .ok_or(ConfigError::NoTradingDays { from: date })?;
            if self.is_trading_day(candidate) {
                return Ok(candidate);
            }
        }
        Err(ConfigError::NoTradingDays { from: date })
    }

    /// All trading dates in `[start, end]`, ascending.
    pub fn trading_days(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| self.is_trading_day(*d))
            .collect()
    }
}
