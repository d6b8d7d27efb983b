//! Raw price source boundary.
//!
//! A [`PriceSource`] answers range queries over stored bars with no notion
//! of the simulated clock. Look-ahead protection lives one layer up, in the
//! [`DataHandler`](super::handler::DataHandler).

use super::array::PriceArray;
use super::field::PriceField;
use crate::time::{ConfigError, Frequency};
use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataError {
    #[error(
        "insufficient {frequency} data for [{}] up to {end}: requested {requested} bars, {available} available",
        .instruments.join(", ")
    )]
    InsufficientData {
        instruments: Vec<String>,
        frequency: Frequency,
        end: NaiveDateTime,
        requested: usize,
        available: usize,
    },

    #[error(
        "{frequency} range {start} .. {end} for [{}] is outside the available data {available_start} .. {available_end}",
        .instruments.join(", ")
    )]
    OutOfRange {
        instruments: Vec<String>,
        frequency: Frequency,
        start: NaiveDateTime,
        end: NaiveDateTime,
        available_start: NaiveDateTime,
        available_end: NaiveDateTime,
    },

    #[error("unknown instrument '{0}'")]
    UnknownInstrument(String),

    #[error("frequency {requested} cannot be served from {native} data")]
    UnsupportedFrequency {
        requested: Frequency,
        native: Frequency,
    },

    #[error("source holds no data")]
    NoData,

    #[error("invalid price bundle: {0}")]
    InvalidBundle(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Stored prices, queried by bar label.
pub trait PriceSource: Send + Sync {
    /// Human-readable source name (e.g. "preset", "csv").
    fn name(&self) -> &str;

    fn native_frequency(&self) -> Frequency;

    /// First and last bar labels held, at the native frequency.
    fn available_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)>;

    fn instruments(&self) -> Vec<String>;

    /// Bars at `frequency` whose label lies in
    /// `[bucket_start(start), bucket_start(end)]`, on the full date axis
    /// (missing observations are NaN).
    fn get_price(
        &self,
        instruments: &[&str],
        fields: &[PriceField],
        start: NaiveDateTime,
        end: NaiveDateTime,
        frequency: Frequency,
    ) -> Result<PriceArray, DataError>;

    /// Like [`get_price`](PriceSource::get_price), without dates on which
    /// every requested value is missing.
    fn get_history(
        &self,
        instruments: &[&str],
        fields: &[PriceField],
        start: NaiveDateTime,
        end: NaiveDateTime,
        frequency: Frequency,
    ) -> Result<PriceArray, DataError> {
        Ok(self
            .get_price(instruments, fields, start, end, frequency)?
            .drop_empty_dates())
    }
}
