//! DataHandler: price access clipped to the simulated present.
//!
//! Every query routes its end date through [`DataHandler::effective_end`]
//! before reaching the source, so a caller can never observe a bar that
//! had not closed as of the clock's current instant.
//!
//! - intraday: a bar labelled `t` covers `[t, t + step)` and becomes visible
//!   once the clock reaches `t + step`, so the last visible label is
//!   `floor(now) − step`;
//! - daily: the last visible bar is the one whose market close is at or
//!   before `now` (today's once the close has passed, yesterday's before);
//! - weekly / monthly: as daily, minus a bucket whose trading days have not
//!   all closed yet.

use super::array::PriceArray;
use super::field::PriceField;
use super::source::{DataError, PriceSource};
use crate::time::{Frequency, SessionConfig, SimulatedClock};
use chrono::{Duration, NaiveDateTime, NaiveTime};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// How far back the last available price may be forward-filled.
pub const FORWARD_FILL_DAYS: i64 = 7;

/// Prices keyed by instrument. NaN when nothing is known.
pub type PriceMap = BTreeMap<String, f64>;

#[derive(Clone)]
pub struct DataHandler {
    source: Arc<dyn PriceSource>,
    clock: SimulatedClock,
    session: SessionConfig,
    frequency: Frequency,
}

impl std::fmt::Debug for DataHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataHandler")
            .field("source", &self.source.name())
            .field("now", &self.clock.now())
            .field("frequency", &self.frequency)
            .finish()
    }
}

impl DataHandler {
    /// `frequency` is the frequency used for last/current price lookups.
    pub fn new(
        source: Arc<dyn PriceSource>,
        clock: SimulatedClock,
        session: SessionConfig,
        frequency: Frequency,
    ) -> Self {
        Self {
            source,
            clock,
            session,
            frequency,
        }
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn session(&self) -> &SessionConfig {
        &self.session
    }

    pub fn source(&self) -> &Arc<dyn PriceSource> {
        &self.source
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Latest instant whose bar at `frequency` is complete as of now,
    /// capped by `end`. Always `<= now`, and strictly before now for
    /// intraday frequencies.
    pub fn effective_end(
        &self,
        end: NaiveDateTime,
        frequency: Frequency,
    ) -> Result<NaiveDateTime, DataError> {
        let now = self.clock.now();
        if let Some(step) = frequency.step() {
            let last_complete = frequency.bucket_start(now) - step;
            return Ok(end.min(last_complete));
        }

        let last_close = self.last_close(now)?;
        let effective = end.min(last_close);
        if frequency == Frequency::Daily {
            return Ok(effective);
        }
        // a weekly/monthly bucket is complete once no trading day of it is left
        let label = frequency.bucket_start(effective);
        let bucket_end = frequency.next_bucket(label).date();
        let next_session = match last_close.date().succ_opt() {
            Some(day) => self.session.calendar.next_trading_day(day)?,
            None => return Ok(effective),
        };
        if next_session < bucket_end {
            Ok(label - Duration::microseconds(1))
        } else {
            Ok(effective)
        }
    }

    /// Most recent market close at or before `now`, on a trading day.
    fn last_close(&self, now: NaiveDateTime) -> Result<NaiveDateTime, DataError> {
        let close = self.session.market_close_time()?;
        let calendar = &self.session.calendar;
        let today = now.date();
        let day = if calendar.is_trading_day(today) && now >= today.and_time(close) {
            today
        } else {
            calendar.previous_trading_day(today)?
        };
        Ok(day.and_time(close))
    }

    /// Bars in `[start, effective_end(end)]` on the full date axis.
    pub fn get_price(
        &self,
        instruments: &[&str],
        fields: &[PriceField],
        start: NaiveDateTime,
        end: NaiveDateTime,
        frequency: Frequency,
    ) -> Result<PriceArray, DataError> {
        let end = self.effective_end(end, frequency)?;
        self.source
            .get_price(instruments, fields, start, end, frequency)
    }

    /// Observed bars in `[start, effective_end(end)]`; dates with no value
    /// for any requested column are dropped.
    pub fn get_history(
        &self,
        instruments: &[&str],
        fields: &[PriceField],
        start: NaiveDateTime,
        end: NaiveDateTime,
        frequency: Frequency,
    ) -> Result<PriceArray, DataError> {
        let end = self.effective_end(end, frequency)?;
        self.source
            .get_history(instruments, fields, start, end, frequency)
    }

    /// The last `nr_of_bars` observed bars visible now.
    pub fn historical_price(
        &self,
        instruments: &[&str],
        fields: &[PriceField],
        nr_of_bars: usize,
        frequency: Frequency,
    ) -> Result<PriceArray, DataError> {
        let end = self.effective_end(self.clock.now(), frequency)?;
        let insufficient = |available: usize| DataError::InsufficientData {
            instruments: instruments.iter().map(|s| s.to_string()).collect(),
            frequency,
            end,
            requested: nr_of_bars,
            available,
        };
        let (first, _) = self.source.available_range().ok_or(DataError::NoData)?;
        if end < first {
            return Err(insufficient(0));
        }
        let history = self
            .source
            .get_history(instruments, fields, first, end, frequency)?;
        if history.len() < nr_of_bars {
            return Err(insufficient(history.len()));
        }
        Ok(history.tail(nr_of_bars))
    }

    /// Best price known now for each instrument.
    ///
    /// With daily data during the session this is today's open, known since
    /// the open. Otherwise it is the last visible close, forward-filled over
    /// at most [`FORWARD_FILL_DAYS`] calendar days; NaN beyond that.
    pub fn get_last_available_price(&self, instruments: &[&str]) -> Result<PriceMap, DataError> {
        let now = self.clock.now();
        let mut prices = if self.frequency == Frequency::Daily && self.in_session(now)? {
            let today = now.date().and_time(NaiveTime::MIN);
            let opens = self.gap_tolerant(self.source.get_price(
                instruments,
                &[PriceField::Open],
                today,
                today,
                Frequency::Daily,
            ))?;
            self.at_date(&opens, instruments, today, PriceField::Open)
        } else {
            nan_map(instruments)
        };

        let missing: Vec<&str> = instruments
            .iter()
            .copied()
            .filter(|s| prices.get(*s).map_or(true, |p| p.is_nan()))
            .collect();
        if missing.is_empty() {
            return Ok(prices);
        }

        let end = self.effective_end(now, self.frequency)?;
        let start = end - Duration::days(FORWARD_FILL_DAYS);
        let closes = self.gap_tolerant(self.source.get_price(
            &missing,
            &[PriceField::Close],
            start,
            end,
            self.frequency,
        ))?;
        let latest = closes.dates().last().copied();
        for symbol in missing {
            let price = match closes.last_valid(symbol, PriceField::Close) {
                Some((date, price)) => {
                    if Some(date) != latest {
                        warn!(instrument = symbol, %date, %now, "forward-filling last price");
                    }
                    price
                }
                None => {
                    warn!(
                        instrument = symbol,
                        %now,
                        days = FORWARD_FILL_DAYS,
                        "no price within the forward-fill window"
                    );
                    f64::NAN
                }
            };
            prices.insert(symbol.to_string(), price);
        }
        Ok(prices)
    }

    /// Price of a bar event happening exactly now, NaN otherwise.
    ///
    /// Daily: today's open exactly at the open, today's close exactly at the
    /// close. Intraday: the open of the bar starting now. Weekly and monthly
    /// data have no such instant.
    pub fn get_current_price(&self, instruments: &[&str]) -> Result<PriceMap, DataError> {
        let now = self.clock.now();
        match self.frequency {
            Frequency::Daily => {
                if !self.session.calendar.is_trading_day(now.date()) {
                    return Ok(nan_map(instruments));
                }
                let field = if now.time() == self.session.market_open_time()? {
                    PriceField::Open
                } else if now.time() == self.session.market_close_time()? {
                    PriceField::Close
                } else {
                    return Ok(nan_map(instruments));
                };
                let today = now.date().and_time(NaiveTime::MIN);
                let bars = self.gap_tolerant(self.source.get_price(
                    instruments,
                    &[field],
                    today,
                    today,
                    Frequency::Daily,
                ))?;
                Ok(self.at_date(&bars, instruments, today, field))
            }
            frequency if frequency.is_intraday() => {
                if frequency.bucket_start(now) != now {
                    return Ok(nan_map(instruments));
                }
                let bars = self.gap_tolerant(self.source.get_price(
                    instruments,
                    &[PriceField::Open],
                    now,
                    now,
                    frequency,
                ))?;
                Ok(self.at_date(&bars, instruments, now, PriceField::Open))
            }
            _ => Ok(nan_map(instruments)),
        }
    }

    fn in_session(&self, now: NaiveDateTime) -> Result<bool, DataError> {
        if !self.session.calendar.is_trading_day(now.date()) {
            return Ok(false);
        }
        let open = self.session.market_open_time()?;
        let close = self.session.market_close_time()?;
        Ok(open <= now.time() && now.time() < close)
    }

    /// Treat a window with no stored data as a gap rather than a failure.
    fn gap_tolerant(
        &self,
        result: Result<PriceArray, DataError>,
    ) -> Result<PriceArray, DataError> {
        match result {
            Err(DataError::OutOfRange { .. }) => {
                Ok(PriceArray::empty(Vec::new(), Vec::new(), Vec::new()))
            }
            other => other,
        }
    }

    fn at_date(
        &self,
        array: &PriceArray,
        instruments: &[&str],
        date: NaiveDateTime,
        field: PriceField,
    ) -> PriceMap {
        instruments
            .iter()
            .map(|s| {
                let value = array.value(date, s, field).unwrap_or(f64::NAN);
                (s.to_string(), value)
            })
            .collect()
    }
}

fn nan_map(instruments: &[&str]) -> PriceMap {
    instruments
        .iter()
        .map(|s| (s.to_string(), f64::NAN))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::bundle::PriceBundleBuilder;
    use crate::data::preset::PresetSource;
    use crate::domain::Bar;
    use crate::time::ConfigError;
    use chrono::NaiveDate;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn daily_bar(d: u32, open: f64, close: f64) -> Bar {
        Bar {
            time: at(d, 0, 0),
            open,
            high: open.max(close) + 1.0,
            low: open.min(close) - 1.0,
            close,
            volume: 1_000.0,
        }
    }

    /// SPY every weekday 2024-01-02 ..= 2024-01-12; QQQ stops after 01-03.
    fn daily_handler(now: NaiveDateTime) -> (DataHandler, SimulatedClock) {
        let mut builder = PriceBundleBuilder::new(Frequency::Daily);
        for d in [2, 3, 4, 5, 8, 9, 10, 11, 12] {
            builder.add_bar("SPY", daily_bar(d, 100.0 + d as f64, 100.5 + d as f64));
        }
        builder.add_bar("QQQ", daily_bar(2, 300.0, 301.0));
        builder.add_bar("QQQ", daily_bar(3, 302.0, 303.0));
        let source: Arc<dyn PriceSource> = Arc::new(PresetSource::new(builder.build().unwrap()));
        let clock = SimulatedClock::new(now);
        let handler = DataHandler::new(
            source,
            clock.clone(),
            SessionConfig::us_equities(),
            Frequency::Daily,
        );
        (handler, clock)
    }

    fn minute_handler(now: NaiveDateTime) -> DataHandler {
        let mut builder = PriceBundleBuilder::new(Frequency::Min1);
        for m in 0..60 {
            let time = at(2, 14, 0) + Duration::minutes(m);
            let px = 100.0 + m as f64;
            builder.add_bar(
                "SPY",
                Bar {
                    time,
                    open: px,
                    high: px + 0.5,
                    low: px - 0.5,
                    close: px + 0.25,
                    volume: 1.0,
                },
            );
        }
        let source: Arc<dyn PriceSource> = Arc::new(PresetSource::new(builder.build().unwrap()));
        DataHandler::new(
            source,
            SimulatedClock::new(now),
            SessionConfig::us_equities(),
            Frequency::Min1,
        )
    }

    #[test]
    fn daily_end_before_close_is_yesterday() {
        let (handler, _) = daily_handler(at(3, 15, 0));
        assert_eq!(
            handler.effective_end(at(3, 0, 0), Frequency::Daily).unwrap(),
            at(2, 20, 0)
        );
        assert_eq!(
            handler.effective_end(at(9, 0, 0), Frequency::Daily).unwrap(),
            at(2, 20, 0)
        );
    }

    #[test]
    fn daily_end_after_close_is_today() {
        let (handler, _) = daily_handler(at(3, 20, 0));
        assert_eq!(
            handler.effective_end(at(9, 0, 0), Frequency::Daily).unwrap(),
            at(3, 20, 0)
        );
    }

    #[test]
    fn daily_end_over_a_weekend_is_friday_close() {
        // Saturday evening and Monday morning both see Friday 2024-01-05
        let (handler, clock) = daily_handler(at(6, 21, 0));
        assert_eq!(
            handler.effective_end(at(9, 0, 0), Frequency::Daily).unwrap(),
            at(5, 20, 0)
        );
        clock.advance_to(at(8, 9, 0)).unwrap();
        assert_eq!(
            handler.effective_end(at(9, 0, 0), Frequency::Daily).unwrap(),
            at(5, 20, 0)
        );
    }

    #[test]
    fn intraday_end_excludes_the_forming_bar() {
        let handler = minute_handler(at(2, 14, 10));
        assert_eq!(
            handler.effective_end(at(2, 23, 0), Frequency::Min1).unwrap(),
            at(2, 14, 9)
        );
        assert_eq!(
            handler.effective_end(at(2, 23, 0), Frequency::Min5).unwrap(),
            at(2, 14, 5)
        );
        // mid-bar: the 14:05 five-minute bar is still forming at 14:07
        let handler = minute_handler(at(2, 14, 7));
        assert_eq!(
            handler.effective_end(at(2, 23, 0), Frequency::Min5).unwrap(),
            at(2, 14, 0)
        );
    }

    #[test]
    fn weekly_bucket_hidden_until_its_last_session_closed() {
        // Friday 2024-01-05 before the close: the first week is not done
        let (handler, clock) = daily_handler(at(5, 15, 0));
        let end = handler.effective_end(at(12, 0, 0), Frequency::Weekly).unwrap();
        assert!(end < at(1, 0, 0));
        // after Friday's close it is
        clock.advance_to(at(5, 20, 0)).unwrap();
        assert_eq!(
            handler.effective_end(at(12, 0, 0), Frequency::Weekly).unwrap(),
            at(5, 20, 0)
        );
    }

    #[test]
    fn unset_market_close_is_a_config_error() {
        let source: Arc<dyn PriceSource> = daily_handler(at(3, 0, 0)).0.source().clone();
        let handler = DataHandler::new(
            source,
            SimulatedClock::new(at(3, 15, 0)),
            SessionConfig::default(),
            Frequency::Daily,
        );
        assert_eq!(
            handler.effective_end(at(3, 0, 0), Frequency::Daily),
            Err(DataError::Config(ConfigError::Unset {
                setting: "market_close"
            }))
        );
    }

    #[test]
    fn historical_price_counts_observed_bars() {
        let (handler, _) = daily_handler(at(9, 21, 0));
        let bars = handler
            .historical_price(&["SPY"], &[PriceField::Close], 3, Frequency::Daily)
            .unwrap();
        assert_eq!(bars.dates(), &[at(5, 0, 0), at(8, 0, 0), at(9, 0, 0)]);

        let err = handler
            .historical_price(&["SPY"], &[PriceField::Close], 50, Frequency::Daily)
            .unwrap_err();
        assert!(matches!(
            err,
            DataError::InsufficientData {
                requested: 50,
                available: 6,
                frequency: Frequency::Daily,
                ..
            }
        ));
        let message = err.to_string();
        assert!(message.contains("SPY"), "{message}");
        assert!(message.contains("daily"), "{message}");
    }

    #[test]
    fn last_price_is_today_open_during_the_session() {
        let (handler, clock) = daily_handler(at(4, 13, 30));
        let prices = handler.get_last_available_price(&["SPY"]).unwrap();
        assert_eq!(prices["SPY"], 104.0);
        // after the close it is today's close
        clock.advance_to(at(4, 20, 0)).unwrap();
        let prices = handler.get_last_available_price(&["SPY"]).unwrap();
        assert_eq!(prices["SPY"], 104.5);
    }

    #[test]
    fn last_price_forward_fills_for_seven_days_only() {
        // QQQ's last bar is 2024-01-03
        let (handler, clock) = daily_handler(at(8, 21, 0));
        let prices = handler.get_last_available_price(&["SPY", "QQQ"]).unwrap();
        assert_eq!(prices["SPY"], 108.5);
        assert_eq!(prices["QQQ"], 303.0);

        clock.advance_to(at(11, 21, 0)).unwrap();
        let prices = handler.get_last_available_price(&["QQQ"]).unwrap();
        assert!(prices["QQQ"].is_nan());
    }

    #[test]
    fn current_price_only_at_open_and_close() {
        let (handler, clock) = daily_handler(at(4, 13, 30));
        assert_eq!(handler.get_current_price(&["SPY"]).unwrap()["SPY"], 104.0);
        clock.advance_to(at(4, 15, 0)).unwrap();
        assert!(handler.get_current_price(&["SPY"]).unwrap()["SPY"].is_nan());
        clock.advance_to(at(4, 20, 0)).unwrap();
        assert_eq!(handler.get_current_price(&["SPY"]).unwrap()["SPY"], 104.5);
    }

    #[test]
    fn intraday_current_price_needs_a_bar_boundary() {
        let handler = minute_handler(at(2, 14, 5));
        assert_eq!(handler.get_current_price(&["SPY"]).unwrap()["SPY"], 105.0);
        let handler = minute_handler(at(2, 14, 5) + Duration::seconds(30));
        assert!(handler.get_current_price(&["SPY"]).unwrap()["SPY"].is_nan());
        let handler = minute_handler(at(2, 16, 0));
        assert!(handler.get_current_price(&["SPY"]).unwrap()["SPY"].is_nan());
    }

    #[test]
    fn intraday_last_price_is_last_complete_close() {
        let handler = minute_handler(at(2, 14, 10));
        // bar 14:09 closed at 14:10
        assert_eq!(
            handler.get_last_available_price(&["SPY"]).unwrap()["SPY"],
            109.25
        );
    }
}
