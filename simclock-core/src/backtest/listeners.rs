//! Built-in listeners that drive a backtest: time flow, bookkeeping and
//! event recording.

use super::context::BacktestContext;
use crate::error::SimError;
use crate::events::{Event, EventQueue, Listener};
use crate::time::Scheduler;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

/// Injects the next scheduled time events whenever the queue runs dry, and
/// ends trading once the schedule passes the last simulated day.
#[derive(Debug, Clone)]
pub struct TimeFlowController {
    scheduler: Scheduler,
    /// First instant past the simulated range.
    until: NaiveDateTime,
}

impl TimeFlowController {
    pub fn new(scheduler: Scheduler, last_day: NaiveDate) -> Self {
        Self {
            scheduler,
            until: (last_day + Duration::days(1)).and_time(NaiveTime::MIN),
        }
    }
}

impl Listener<BacktestContext> for TimeFlowController {
    fn name(&self) -> &str {
        "time_flow"
    }

    fn on_event(
        &mut self,
        event: &Event,
        ctx: &mut BacktestContext,
        queue: &mut EventQueue,
    ) -> Result<(), SimError> {
        if !matches!(event, Event::EmptyQueue { .. }) {
            return Ok(());
        }
        let now = ctx.clock.now();
        match self.scheduler.next_events(now)? {
            Some(batch) if batch.time < self.until => {
                ctx.clock.advance_to(batch.time)?;
                for time_event in &batch.events {
                    queue.publish(Event::from_time_event(
                        time_event,
                        batch.time,
                        self.scheduler.session(),
                    )?);
                }
            }
            _ => {
                debug!(%now, "schedule exhausted");
                queue.publish(Event::EndTrading { time: now });
            }
        }
        Ok(())
    }
}

/// Applies fills to the portfolio and revalues it at each market close and
/// at the end of trading.
#[derive(Debug, Clone, Default)]
pub struct Bookkeeper;

impl Bookkeeper {
    fn revalue(ctx: &mut BacktestContext, time: NaiveDateTime) -> Result<(), SimError> {
        let symbols: Vec<String> = ctx.portfolio.positions().keys().cloned().collect();
        if !symbols.is_empty() {
            let refs: Vec<&str> = symbols.iter().map(String::as_str).collect();
            let prices = ctx.data.get_last_available_price(&refs)?;
            for (symbol, price) in &prices {
                ctx.portfolio.update_price(symbol, *price, *price);
            }
        }
        let snapshot = ctx.portfolio.update(time);
        debug!(%time, total_value = snapshot.total_value, cash = snapshot.cash, "revalued");
        Ok(())
    }
}

impl Listener<BacktestContext> for Bookkeeper {
    fn name(&self) -> &str {
        "bookkeeper"
    }

    fn on_event(
        &mut self,
        event: &Event,
        ctx: &mut BacktestContext,
        _queue: &mut EventQueue,
    ) -> Result<(), SimError> {
        match event {
            Event::Fill(fill) => {
                ctx.portfolio.transact_fill(fill)?;
                ctx.transactions.push(fill.clone());
            }
            Event::MarketClose { time } => Self::revalue(ctx, *time)?,
            Event::EndTrading { time } => {
                let already = ctx.portfolio.history().last().map(|s| s.time) == Some(*time);
                if !already {
                    Self::revalue(ctx, *time)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Appends every dispatched event to the context's log.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder;

impl Listener<BacktestContext> for EventRecorder {
    fn name(&self) -> &str {
        "event_recorder"
    }

    fn on_event(
        &mut self,
        event: &Event,
        ctx: &mut BacktestContext,
        _queue: &mut EventQueue,
    ) -> Result<(), SimError> {
        ctx.event_log.push(event.clone());
        Ok(())
    }
}
