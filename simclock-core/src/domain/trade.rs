//! Trade: a realized, position-reducing fill.

use super::position::Direction;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Created exactly when a fill moves a position toward flat. Fills that
/// extend a position never produce one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub direction: Direction,
    /// First fill of the position.
    pub entry_time: NaiveDateTime,
    /// The reducing fill.
    pub exit_time: NaiveDateTime,
    /// Amount closed, signed in the position's direction.
    pub quantity: f64,
    /// Volume-weighted cost per unit over the extending fills, commission included.
    pub entry_price: f64,
    /// The reducing fill's own commission-inclusive average price.
    pub exit_price: f64,
    pub commission: f64,
    pub pnl: f64,
}

impl Trade {
    /// Return as a fraction of the entry cost.
    pub fn return_pct(&self) -> f64 {
        let cost = self.entry_price * self.quantity;
        if cost == 0.0 {
            return 0.0;
        }
        self.pnl / cost.abs()
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }
}
