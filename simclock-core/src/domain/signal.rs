use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A target trade proposed by a strategy, not yet sized against liquidity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedOrder {
    pub symbol: String,
    /// Signed: positive to buy, negative to sell.
    pub quantity: f64,
}

/// Orders a strategy would like executed, as of `time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub time: NaiveDateTime,
    pub suggested_orders: Vec<SuggestedOrder>,
}

impl SignalEvent {
    pub fn new(time: NaiveDateTime) -> Self {
        Self {
            time,
            suggested_orders: Vec::new(),
        }
    }

    pub fn with_order(mut self, symbol: impl Into<String>, quantity: f64) -> Self {
        self.suggested_orders.push(SuggestedOrder {
            symbol: symbol.into(),
            quantity,
        });
        self
    }
}
