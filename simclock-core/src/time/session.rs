//! Session configuration: market hours and intraday bar frequency.
//!
//! Set once before the event loop starts and passed by value into the
//! scheduler and the data handler. Every time-of-day is optional on purpose:
//! a missing setting is only an error when something actually needs it, and
//! then it is a hard [`ConfigError::Unset`], never a silent default.

use super::calendar::TradingCalendar;
use super::frequency::Frequency;
use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("session setting `{setting}` is not configured")]
    Unset { setting: &'static str },

    #[error("invalid time of day {hour:02}:{minute:02}:{second:02}.{microsecond:06}")]
    InvalidTimeOfDay {
        hour: u32,
        minute: u32,
        second: u32,
        microsecond: u32,
    },

    #[error("intraday frequency must be intraday, got {frequency}")]
    NotIntraday { frequency: Frequency },

    #[error("session window is empty: open {open}, close {close}")]
    EmptySession { open: NaiveTime, close: NaiveTime },

    #[error("`{earlier}` ({earlier_time}) must come before `{later}` ({later_time})")]
    OutOfOrder {
        earlier: &'static str,
        earlier_time: NaiveTime,
        later: &'static str,
        later_time: NaiveTime,
    },

    #[error("no trading day found within a year of {from}")]
    NoTradingDays { from: NaiveDate },

    #[error("invalid backtest range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("config parse error: {0}")]
    Parse(String),

    #[error("config I/O error: {0}")]
    Io(String),
}

/// A time of day as it appears in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
    #[serde(default)]
    pub second: u32,
    #[serde(default)]
    pub microsecond: u32,
}

impl TimeOfDay {
    pub const fn hm(hour: u32, minute: u32) -> Self {
        Self {
            hour,
            minute,
            second: 0,
            microsecond: 0,
        }
    }

    pub fn to_time(self) -> Result<NaiveTime, ConfigError> {
        NaiveTime::from_hms_micro_opt(self.hour, self.minute, self.second, self.microsecond)
            .ok_or(ConfigError::InvalidTimeOfDay {
                hour: self.hour,
                minute: self.minute,
                second: self.second,
                microsecond: self.microsecond,
            })
    }
}

impl From<NaiveTime> for TimeOfDay {
    fn from(t: NaiveTime) -> Self {
        Self {
            hour: t.hour(),
            minute: t.minute(),
            second: t.second(),
            microsecond: t.nanosecond() / 1_000,
        }
    }
}

/// Market-structure settings for one backtest session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub market_open: Option<TimeOfDay>,
    pub market_close: Option<TimeOfDay>,
    pub before_market_open: Option<TimeOfDay>,
    pub after_market_close: Option<TimeOfDay>,
    pub intraday_frequency: Option<Frequency>,
    pub calendar: TradingCalendar,
}

impl SessionConfig {
    /// US equities regular session expressed in UTC (EST offset), 1-minute bars.
    pub fn us_equities() -> Self {
        Self {
            market_open: Some(TimeOfDay::hm(13, 30)),
            market_close: Some(TimeOfDay::hm(20, 0)),
            before_market_open: Some(TimeOfDay::hm(13, 0)),
            after_market_close: Some(TimeOfDay::hm(20, 30)),
            intraday_frequency: Some(Frequency::Min1),
            calendar: TradingCalendar::weekdays(),
        }
    }

    pub fn with_market_open(mut self, t: TimeOfDay) -> Self {
        self.market_open = Some(t);
        self
    }

    pub fn with_market_close(mut self, t: TimeOfDay) -> Self {
        self.market_close = Some(t);
        self
    }

    pub fn with_before_market_open(mut self, t: TimeOfDay) -> Self {
        self.before_market_open = Some(t);
        self
    }

    pub fn with_after_market_close(mut self, t: TimeOfDay) -> Self {
        self.after_market_close = Some(t);
        self
    }

    pub fn with_intraday_frequency(mut self, frequency: Frequency) -> Self {
        self.intraday_frequency = Some(frequency);
        self
    }

    pub fn with_calendar(mut self, calendar: TradingCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn market_open_time(&self) -> Result<NaiveTime, ConfigError> {
        required(self.market_open, "market_open")
    }

    pub fn market_close_time(&self) -> Result<NaiveTime, ConfigError> {
        required(self.market_close, "market_close")
    }

    pub fn before_market_open_time(&self) -> Result<NaiveTime, ConfigError> {
        required(self.before_market_open, "before_market_open")
    }

    pub fn after_market_close_time(&self) -> Result<NaiveTime, ConfigError> {
        required(self.after_market_close, "after_market_close")
    }

    pub fn intraday_frequency(&self) -> Result<Frequency, ConfigError> {
        let frequency = self.intraday_frequency.ok_or(ConfigError::Unset {
            setting: "intraday_frequency",
        })?;
        if !frequency.is_intraday() {
            return Err(ConfigError::NotIntraday { frequency });
        }
        Ok(frequency)
    }

    /// Check whatever is configured for internal consistency.
    ///
    /// Unset values are not reported here; they fail at first use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let resolve = |t: Option<TimeOfDay>| t.map(TimeOfDay::to_time).transpose();
        let before = resolve(self.before_market_open)?;
        let open = resolve(self.market_open)?;
        let close = resolve(self.market_close)?;
        let after = resolve(self.after_market_close)?;

        if let (Some(open), Some(close)) = (open, close) {
            if open >= close {
                return Err(ConfigError::EmptySession { open, close });
            }
        }
        let ordered = [
            ("before_market_open", before),
            ("market_open", open),
            ("market_close", close),
            ("after_market_close", after),
        ];
        let set: Vec<(&'static str, NaiveTime)> = ordered
            .iter()
            .filter_map(|(name, t)| t.map(|t| (*name, t)))
            .collect();
        for pair in set.windows(2) {
            let (earlier, earlier_time) = pair[0];
            let (later, later_time) = pair[1];
            if earlier_time >= later_time {
                return Err(ConfigError::OutOfOrder {
                    earlier,
                    earlier_time,
                    later,
                    later_time,
                });
            }
        }
        if let Some(frequency) = self.intraday_frequency {
            if !frequency.is_intraday() {
                return Err(ConfigError::NotIntraday { frequency });
            }
        }
        Ok(())
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig =
            toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }
}

fn required(t: Option<TimeOfDay>, setting: &'static str) -> Result<NaiveTime, ConfigError> {
    t.ok_or(ConfigError::Unset { setting })?.to_time()
}
