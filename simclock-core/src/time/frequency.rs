//! Bar frequency: the sampling interval of a price series.
//!
//! Bars are labelled by the *start* of the interval they cover. A 1-minute bar
//! labelled 13:30 covers `[13:30, 13:31)` and is only complete once the clock
//! reaches 13:31. Daily bars are labelled with their date at midnight, weekly
//! bars with the Monday of their week, monthly bars with the first of the month.

use super::{from_micros, to_micros};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Supported bar frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "1min")]
    Min1,
    #[serde(rename = "5min")]
    Min5,
    #[serde(rename = "10min")]
    Min10,
    #[serde(rename = "15min")]
    Min15,
    #[serde(rename = "30min")]
    Min30,
    #[serde(rename = "60min")]
    Min60,
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "weekly")]
    Weekly,
    #[serde(rename = "monthly")]
    Monthly,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown frequency '{0}' (expected one of 1min, 5min, 10min, 15min, 30min, 60min, daily, weekly, monthly)")]
pub struct ParseFrequencyError(pub String);

impl Frequency {
    pub const ALL: [Frequency; 9] = [
        Frequency::Min1,
        Frequency::Min5,
        Frequency::Min10,
        Frequency::Min15,
        Frequency::Min30,
        Frequency::Min60,
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Monthly,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Frequency::Min1 => "1min",
            Frequency::Min5 => "5min",
            Frequency::Min10 => "10min",
            Frequency::Min15 => "15min",
            Frequency::Min30 => "30min",
            Frequency::Min60 => "60min",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }

    /// Length of an intraday bar in minutes. `None` for daily or coarser.
    pub fn minutes(self) -> Option<i64> {
        match self {
            Frequency::Min1 => Some(1),
            Frequency::Min5 => Some(5),
            Frequency::Min10 => Some(10),
            Frequency::Min15 => Some(15),
            Frequency::Min30 => Some(30),
            Frequency::Min60 => Some(60),
            Frequency::Daily | Frequency::Weekly | Frequency::Monthly => None,
        }
    }

    pub fn is_intraday(self) -> bool {
        self.minutes().is_some()
    }

    /// Fixed step between consecutive intraday bars.
    pub fn step(self) -> Option<Duration> {
        self.minutes().map(Duration::minutes)
    }

    /// Floor `ts` to the label of the bar that contains it.
    pub fn bucket_start(self, ts: NaiveDateTime) -> NaiveDateTime {
        match self.minutes() {
            Some(minutes) => {
                let step = minutes * 60 * 1_000_000;
                from_micros(to_micros(ts).div_euclid(step) * step)
            }
            None => {
                let date = ts.date();
                let label = match self {
                    Frequency::Weekly => {
                        date - Duration::days(date.weekday().num_days_from_monday() as i64)
                    }
                    Frequency::Monthly => date.with_day(1).unwrap_or(date),
                    _ => date,
                };
                label.and_time(NaiveTime::MIN)
            }
        }
    }

    /// Label of the bar following the one labelled `label`.
    pub fn next_bucket(self, label: NaiveDateTime) -> NaiveDateTime {
        match self.step() {
            Some(step) => label + step,
            None => {
                let date = label.date();
                let next = match self {
                    Frequency::Weekly => date + Duration::days(7),
                    Frequency::Monthly => {
                        let (y, m) = if date.month() == 12 {
                            (date.year() + 1, 1)
                        } else {
                            (date.year(), date.month() + 1)
                        };
                        NaiveDate::from_ymd_opt(y, m, 1).unwrap_or(date + Duration::days(31))
                    }
                    _ => date + Duration::days(1),
                };
                self.bucket_start(next.and_time(NaiveTime::MIN))
            }
        }
    }

    /// Whether bars of this frequency can be built by aggregating bars of `finer`.
    ///
    /// Intraday bars aggregate into longer intraday bars whose length is an exact
    /// multiple; daily bars aggregate into weekly or monthly bars. Intraday data
    /// never aggregates into daily bars here: the session boundaries needed to do
    /// that safely belong to the data handler, not the source.
    pub fn is_multiple_of(self, finer: Frequency) -> bool {
        match (self.minutes(), finer.minutes()) {
            (Some(coarse), Some(fine)) => coarse >= fine && coarse % fine == 0,
            (None, None) => finer == Frequency::Daily || self == finer,
            _ => false,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Frequency {
    type Err = ParseFrequencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', '-'], "");
        let freq = match normalized.as_str() {
            "1min" | "min1" | "1m" => Frequency::Min1,
            "5min" | "min5" | "5m" => Frequency::Min5,
            "10min" | "min10" | "10m" => Frequency::Min10,
            "15min" | "min15" | "15m" => Frequency::Min15,
            "30min" | "min30" | "30m" => Frequency::Min30,
            "60min" | "min60" | "60m" | "1h" | "hourly" => Frequency::Min60,
            "daily" | "1d" | "d" => Frequency::Daily,
            "weekly" | "1w" | "w" => Frequency::Weekly,
            "monthly" | "1mo" => Frequency::Monthly,
            _ => return Err(ParseFrequencyError(s.to_string())),
        };
        Ok(freq)
    }
}
