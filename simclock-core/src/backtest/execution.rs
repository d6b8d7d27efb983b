//! Reference execution: fills every suggested order immediately.

use super::context::BacktestContext;
use crate::domain::Fill;
use crate::error::SimError;
use crate::events::{Event, EventQueue, Listener};
use tracing::warn;

/// Fills each suggested order at the last available price, charging a
/// fixed commission per unit. No slippage, no volume limits.
#[derive(Debug, Clone, Default)]
pub struct ImmediateExecutor {
    commission_per_share: f64,
}

impl ImmediateExecutor {
    pub fn new(commission_per_share: f64) -> Self {
        Self {
            commission_per_share,
        }
    }
}

impl Listener<BacktestContext> for ImmediateExecutor {
    fn name(&self) -> &str {
        "immediate_executor"
    }

    fn on_event(
        &mut self,
        event: &Event,
        ctx: &mut BacktestContext,
        queue: &mut EventQueue,
    ) -> Result<(), SimError> {
        let Event::Signal(signal) = event else {
            return Ok(());
        };
        let symbols: Vec<&str> = signal
            .suggested_orders
            .iter()
            .map(|o| o.symbol.as_str())
            .collect();
        let prices = ctx.data.get_last_available_price(&symbols)?;
        let now = ctx.clock.now();
        for order in &signal.suggested_orders {
            if order.quantity == 0.0 {
                continue;
            }
            let price = prices.get(&order.symbol).copied().unwrap_or(f64::NAN);
            if !(price.is_finite() && price > 0.0) {
                warn!(instrument = %order.symbol, %now, "no price, order skipped");
                continue;
            }
            let commission = self.commission_per_share * order.quantity.abs();
            queue.publish(Event::Fill(Fill::new(
                now,
                order.symbol.clone(),
                order.quantity,
                price,
                commission,
            )));
        }
        Ok(())
    }
}
