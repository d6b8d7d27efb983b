//! P&L reconstruction against a live run.
//!
//! Replaying the transaction log of a finished backtest against daily closes
//! must reproduce, day by day, the equity change the portfolio reported at
//! each market close.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use simclock_core::backtest::{Backtest, BacktestConfig, BacktestContext, BuyAndHold};
use simclock_core::data::{PresetSource, PriceBundleBuilder, PriceSource};
use simclock_core::domain::{Bar, Fill, SignalEvent};
use simclock_core::events::{Event, EventQueue, EventType, Listener};
use simclock_core::pnl::reconstruct_pnl;
use simclock_core::time::{SessionConfig, TradingCalendar};
use simclock_core::SimError;
use std::sync::Arc;

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

/// Weekday bars from January to March 2024 with a deterministic walk.
/// `QQQ` has no bar on `qqq_gap`.
fn source(qqq_gap: NaiveDate) -> Arc<dyn PriceSource> {
    let calendar = TradingCalendar::weekdays();
    let mut builder = PriceBundleBuilder::new(simclock_core::time::Frequency::Daily);
    for (symbol, base) in [("SPY", 470.0), ("QQQ", 400.0)] {
        let mut price = base;
        for (i, day) in calendar.trading_days(date(1, 1), date(3, 29)).into_iter().enumerate() {
            let seed = (i as u64 + base as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
            let change = ((seed >> 33) % 200) as f64 * 0.05 - 5.0;
            let open = price;
            price = (price + change).max(50.0);
            if symbol == "QQQ" && day == qqq_gap {
                continue;
            }
            builder.add_bar(
                symbol,
                Bar {
                    time: day.and_time(NaiveTime::MIN),
                    open,
                    high: open.max(price) + 1.0,
                    low: open.min(price) - 1.0,
                    close: price,
                    volume: 1_000_000.0,
                },
            );
        }
    }
    Arc::new(PresetSource::new(builder.build().unwrap()))
}

/// Sells `fraction` of the holding in `symbol` at the open of `day`.
struct TrimOnDay {
    symbol: String,
    day: NaiveDate,
    fraction: f64,
}

impl Listener<BacktestContext> for TrimOnDay {
    fn on_event(
        &mut self,
        event: &Event,
        ctx: &mut BacktestContext,
        queue: &mut EventQueue,
    ) -> Result<(), SimError> {
        let Event::MarketOpen { time } = event else {
            return Ok(());
        };
        if time.date() != self.day {
            return Ok(());
        }
        if let Some(position) = ctx.portfolio.position(&self.symbol) {
            let quantity = (position.quantity() * self.fraction).floor();
            let signal = SignalEvent::new(*time).with_order(self.symbol.clone(), -quantity);
            queue.publish(Event::Signal(signal));
        }
        Ok(())
    }
}

fn close_of(snapshot_time: NaiveDateTime) -> bool {
    snapshot_time.time() == NaiveTime::from_hms_opt(20, 0, 0).unwrap()
}

#[test]
fn reconstructed_pnl_matches_reported_equity() {
    let source = source(date(2, 15));
    let config =
        BacktestConfig::new(date(1, 2), date(3, 28), 100_000.0).with_commission_per_share(0.01);
    let result = Backtest::new(config.clone(), Arc::clone(&source))
        .with_listener(BuyAndHold::new(["SPY", "QQQ"], 0.9), &[EventType::MarketOpen])
        .with_listener(
            TrimOnDay {
                symbol: "SPY".into(),
                day: date(2, 1),
                fraction: 0.5,
            },
            &[EventType::MarketOpen],
        )
        .run()
        .unwrap();

    assert!(result.summary.ended);
    assert_eq!(result.transactions.len(), 3);
    assert_eq!(result.trades.len(), 1);

    let pnl = reconstruct_pnl(
        &result.transactions,
        source.as_ref(),
        config.start,
        config.end,
        &config.session,
    )
    .unwrap();
    assert_eq!(pnl.len(), config.session.calendar.trading_days(config.start, config.end).len());

    let closes: Vec<_> = result.history.iter().filter(|s| close_of(s.time)).collect();
    assert_eq!(closes.len(), pnl.len());
    for snapshot in closes {
        let point = pnl.get(snapshot.time.date()).unwrap();
        let reported = snapshot.total_value - config.initial_cash;
        assert!(
            (reported - point.total).abs() < 1e-6,
            "{}: reported {} reconstructed {}",
            point.date,
            reported,
            point.total
        );
    }
    let last = pnl.last().unwrap();
    assert!((result.total_pnl() - last.total).abs() < 1e-6);
}

#[test]
fn fills_outside_the_window_are_handled() {
    let source = source(date(2, 15));
    let at = |d: NaiveDate, h: u32| d.and_hms_opt(h, 0, 0).unwrap();
    let fills = vec![
        // before the first close: counted on the first day
        Fill::new(at(date(1, 1), 9), "SPY", 10.0, 1.0, 0.0),
        // after the last close: ignored
        Fill::new(at(date(1, 5), 21), "SPY", -10.0, 480.0, 0.0),
    ];
    let session = SessionConfig::us_equities();
    let pnl = reconstruct_pnl(&fills, source.as_ref(), date(1, 2), date(1, 5), &session).unwrap();
    assert_eq!(pnl.len(), 4);
    assert!(pnl.points.iter().all(|p| p.realized == 0.0));
    assert!(pnl.get(date(1, 2)).unwrap().unrealized != 0.0);
}

#[test]
fn reversed_range_is_rejected() {
    let source = source(date(2, 15));
    let session = SessionConfig::us_equities();
    let err = reconstruct_pnl(&[], source.as_ref(), date(1, 5), date(1, 2), &session).unwrap_err();
    assert!(matches!(err, SimError::Config(_)));
}
