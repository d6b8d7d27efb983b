//! Buy-and-hold: the smallest strategy that exercises the whole loop.

use super::context::BacktestContext;
use crate::domain::SignalEvent;
use crate::error::SimError;
use crate::events::{Event, EventQueue, Listener};
use tracing::info;

/// On the first market open with prices for its symbols, splits
/// `allocation × cash` equally across them in whole units, then holds.
#[derive(Debug, Clone)]
pub struct BuyAndHold {
    symbols: Vec<String>,
    allocation: f64,
    entered: bool,
}

impl BuyAndHold {
    pub fn new(symbols: impl IntoIterator<Item = impl Into<String>>, allocation: f64) -> Self {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
            allocation,
            entered: false,
        }
    }
}

impl Listener<BacktestContext> for BuyAndHold {
    fn name(&self) -> &str {
        "buy_and_hold"
    }

    fn on_event(
        &mut self,
        event: &Event,
        ctx: &mut BacktestContext,
        queue: &mut EventQueue,
    ) -> Result<(), SimError> {
        let Event::MarketOpen { time } = event else {
            return Ok(());
        };
        if self.entered || self.symbols.is_empty() {
            return Ok(());
        }
        let refs: Vec<&str> = self.symbols.iter().map(String::as_str).collect();
        let prices = ctx.data.get_last_available_price(&refs)?;
        let budget = ctx.portfolio.cash() * self.allocation / self.symbols.len() as f64;

        let mut signal = SignalEvent::new(*time);
        for symbol in &self.symbols {
            let price = prices.get(symbol).copied().unwrap_or(f64::NAN);
            if !(price.is_finite() && price > 0.0) {
                continue;
            }
            let quantity = (budget / price).floor();
            if quantity > 0.0 {
                signal = signal.with_order(symbol.clone(), quantity);
            }
        }
        if !signal.suggested_orders.is_empty() {
            info!(%time, orders = signal.suggested_orders.len(), "entering");
            self.entered = true;
            queue.publish(Event::Signal(signal));
        }
        Ok(())
    }
}
