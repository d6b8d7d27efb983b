//! Batch P&L reconstruction from a transaction log.
//!
//! Replays fills against stored closes one trading day at a time, with no
//! reference to the live portfolio, so the result can be used to
//! cross-check it. For each day: apply every fill in
//! `(previous close, this close]`, mark whatever is still open at the
//! day's close, and record realized plus unrealized P&L.

use crate::data::{DataError, PriceField, PriceSource};
use crate::domain::{Fill, Portfolio};
use crate::error::SimError;
use crate::time::{ConfigError, Frequency, SessionConfig};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PnlPoint {
    pub date: NaiveDate,
    pub realized: f64,
    pub unrealized: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PnlSeries {
    pub points: Vec<PnlPoint>,
}

impl PnlSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&PnlPoint> {
        self.points.last()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&PnlPoint> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| &self.points[i])
    }
}

/// Daily point-in-time P&L over the trading days in `[start, end]`.
///
/// Fills before the first close all land in the first day. A missing close
/// keeps the previous mark.
pub fn reconstruct_pnl(
    transactions: &[Fill],
    source: &dyn PriceSource,
    start: NaiveDate,
    end: NaiveDate,
    session: &SessionConfig,
) -> Result<PnlSeries, SimError> {
    if start > end {
        return Err(ConfigError::InvalidRange { start, end }.into());
    }
    let close_time = session.market_close_time()?;
    let days = session.calendar.trading_days(start, end);

    let mut ordered: Vec<&Fill> = transactions.iter().collect();
    ordered.sort_by_key(|f| f.time);

    let symbols: BTreeSet<&str> = ordered.iter().map(|f| f.symbol.as_str()).collect();
    let closes = daily_closes(source, &symbols, start, end, close_time)?;

    let mut book = Portfolio::new(0.0);
    let mut next = 0;
    let mut points = Vec::with_capacity(days.len());
    for day in days {
        let close_at = day.and_time(close_time);
        while let Some(fill) = ordered.get(next).filter(|f| f.time <= close_at) {
            book.transact_fill(fill)?;
            next += 1;
        }
        let open: Vec<String> = book.positions().keys().cloned().collect();
        for symbol in open {
            if let Some(price) = closes.get(&(symbol.clone(), day)) {
                book.update_price(&symbol, *price, *price);
            }
        }
        let realized = book.realized_pnl();
        let unrealized = book.unrealized_pnl();
        points.push(PnlPoint {
            date: day,
            realized,
            unrealized,
            total: realized + unrealized,
        });
    }
    debug!(
        days = points.len(),
        applied = next,
        ignored = ordered.len() - next,
        "pnl reconstructed"
    );
    Ok(PnlSeries { points })
}

/// Close per `(symbol, date)`. For intraday data, the close of the last bar
/// ending at or before the market close.
fn daily_closes(
    source: &dyn PriceSource,
    symbols: &BTreeSet<&str>,
    start: NaiveDate,
    end: NaiveDate,
    close_time: NaiveTime,
) -> Result<BTreeMap<(String, NaiveDate), f64>, SimError> {
    let mut out = BTreeMap::new();
    if symbols.is_empty() {
        return Ok(out);
    }
    let native = source.native_frequency();
    let frequency = if native.is_intraday() {
        native
    } else {
        Frequency::Daily
    };
    let instruments: Vec<&str> = symbols.iter().copied().collect();
    let array = match source.get_price(
        &instruments,
        &[PriceField::Close],
        start.and_time(NaiveTime::MIN),
        end.and_time(close_time),
        frequency,
    ) {
        Ok(array) => array,
        Err(DataError::OutOfRange { .. }) => return Ok(out),
        Err(err) => return Err(err.into()),
    };

    for symbol in instruments {
        let Some(series) = array.series(symbol, PriceField::Close) else {
            continue;
        };
        for (label, value) in series {
            if value.is_nan() {
                continue;
            }
            let bar_end: NaiveDateTime = match frequency.step() {
                Some(step) => label + step,
                None => label,
            };
            if frequency.is_intraday() && bar_end > label.date().and_time(close_time) {
                continue;
            }
            out.insert((symbol.to_string(), label.date()), value);
        }
    }
    Ok(out)
}
