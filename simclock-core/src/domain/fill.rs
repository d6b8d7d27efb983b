use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// An executed transaction. `quantity` is signed: positive buys, negative sells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub time: NaiveDateTime,
    pub symbol: String,
    pub quantity: f64,
    pub price: f64,
    pub commission: f64,
}

impl Fill {
    pub fn new(
        time: NaiveDateTime,
        symbol: impl Into<String>,
        quantity: f64,
        price: f64,
        commission: f64,
    ) -> Self {
        Self {
            time,
            symbol: symbol.into(),
            quantity,
            price,
            commission,
        }
    }

    /// Cash leaving the account: `quantity * price + commission`.
    /// Negative for sells net of commission.
    pub fn transaction_cost(&self) -> f64 {
        self.quantity * self.price + self.commission
    }

    /// Per-unit price with commission folded in, `(q * p + c) / q`.
    ///
    /// For a buy this is above the fill price, for a sell below it.
    pub fn avg_price_incl_commission(&self) -> f64 {
        self.transaction_cost() / self.quantity
    }
}
