//! Position: per-instrument state machine fed by fills.
//!
//! ```text
//! Flat ──first fill──→ Long | Short ──fills──→ … ──quantity = 0──→ closed
//! ```
//!
//! The first fill locks the direction. Fills in the same direction extend
//! the position and move its average cost; opposite fills reduce it and each
//! produces a [`Trade`]. A single fill may not carry the quantity through
//! zero to the other side, and a closed position accepts nothing further.

use super::fill::Fill;
use super::trade::Trade;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A position whose remaining quantity is within this distance of zero is flat.
const QUANTITY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
    Flat,
}

impl Direction {
    /// Direction of a position holding `quantity`; dust counts as flat.
    pub fn of(quantity: f64) -> Self {
        if quantity > QUANTITY_EPSILON {
            Direction::Long
        } else if quantity < -QUANTITY_EPSILON {
            Direction::Short
        } else {
            Direction::Flat
        }
    }

    /// Direction a fill trades in. Only an exact zero is flat.
    pub fn of_fill(quantity: f64) -> Self {
        if quantity > 0.0 {
            Direction::Long
        } else if quantity < 0.0 {
            Direction::Short
        } else {
            Direction::Flat
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum PositionError {
    #[error("{symbol}: fill of {fill_quantity} at {time} would flip the position from {quantity} to {resulting}")]
    DirectionFlip {
        symbol: String,
        time: NaiveDateTime,
        quantity: f64,
        fill_quantity: f64,
        resulting: f64,
    },

    #[error("{symbol}: position is closed, fill at {time} rejected")]
    Closed { symbol: String, time: NaiveDateTime },

    #[error("{symbol}: fill at {time} has zero or non-finite quantity")]
    ZeroQuantity { symbol: String, time: NaiveDateTime },

    #[error("{symbol}: fill at {time} has non-positive price {price}")]
    NonPositivePrice {
        symbol: String,
        time: NaiveDateTime,
        price: f64,
    },

    #[error("fill for {got} applied to the {expected} position")]
    SymbolMismatch { expected: String, got: String },
}

/// What applying one fill did.
#[derive(Debug, Clone, PartialEq)]
pub struct FillEffect {
    /// Cash spent, `quantity * price + commission`.
    pub transaction_cost: f64,
    /// Present iff the fill reduced the position.
    pub trade: Option<Trade>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    symbol: String,
    direction: Direction,
    quantity: f64,
    fills: Vec<Fill>,
    current_price: f64,
    closed: bool,
    /// Σ (q·p + c) over extending fills.
    entry_cost: f64,
    /// Σ q over extending fills.
    entry_quantity: f64,
    realized_pnl: f64,
    total_commission: f64,
}

impl Position {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            direction: Direction::Flat,
            quantity: 0.0,
            fills: Vec::new(),
            current_price: f64::NAN,
            closed: false,
            entry_cost: 0.0,
            entry_quantity: 0.0,
            realized_pnl: 0.0,
            total_commission: 0.0,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Locked by the first fill; stays set after the position closes.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn current_price(&self) -> f64 {
        self.current_price
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn market_value(&self) -> f64 {
        self.quantity * self.current_price
    }

    /// Volume-weighted cost per unit, commission included. NaN before the first fill.
    pub fn avg_cost(&self) -> f64 {
        if self.entry_quantity == 0.0 {
            return f64::NAN;
        }
        self.entry_cost / self.entry_quantity
    }

    pub fn unrealized_pnl(&self) -> f64 {
        if self.closed || self.fills.is_empty() {
            return 0.0;
        }
        self.quantity * (self.current_price - self.avg_cost())
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn total_commission(&self) -> f64 {
        self.total_commission
    }

    pub fn start_time(&self) -> Option<NaiveDateTime> {
        self.fills.first().map(|f| f.time)
    }

    /// Time of the closing fill.
    pub fn end_time(&self) -> Option<NaiveDateTime> {
        if self.closed {
            self.fills.last().map(|f| f.time)
        } else {
            None
        }
    }

    pub fn apply_fill(&mut self, fill: &Fill) -> Result<FillEffect, PositionError> {
        if fill.symbol != self.symbol {
            return Err(PositionError::SymbolMismatch {
                expected: self.symbol.clone(),
                got: fill.symbol.clone(),
            });
        }
        if self.closed {
            return Err(PositionError::Closed {
                symbol: self.symbol.clone(),
                time: fill.time,
            });
        }
        if !fill.quantity.is_finite() {
            return Err(self.zero_quantity(fill));
        }
        if !(fill.price > 0.0 && fill.price.is_finite()) {
            return Err(PositionError::NonPositivePrice {
                symbol: self.symbol.clone(),
                time: fill.time,
                price: fill.price,
            });
        }

        let trade = match (self.direction, Direction::of_fill(fill.quantity)) {
            (_, Direction::Flat) => return Err(self.zero_quantity(fill)),
            (Direction::Flat, opening) => {
                self.direction = opening;
                self.current_price = fill.price;
                self.extend(fill);
                None
            }
            (Direction::Long, Direction::Long) | (Direction::Short, Direction::Short) => {
                self.extend(fill);
                None
            }
            (Direction::Long, Direction::Short) | (Direction::Short, Direction::Long) => {
                Some(self.reduce(fill)?)
            }
        };

        self.fills.push(fill.clone());
        self.total_commission += fill.commission;
        Ok(FillEffect {
            transaction_cost: fill.transaction_cost(),
            trade,
        })
    }

    /// Mark the position: longs at the bid, shorts at the ask. NaN quotes
    /// keep the previous mark.
    pub fn update_price(&mut self, bid: f64, ask: f64) {
        if self.closed {
            return;
        }
        let mark = match self.direction {
            Direction::Long => bid,
            Direction::Short => ask,
            Direction::Flat => return,
        };
        if mark.is_finite() {
            self.current_price = mark;
        }
    }

    fn extend(&mut self, fill: &Fill) {
        self.quantity += fill.quantity;
        self.entry_cost += fill.transaction_cost();
        self.entry_quantity += fill.quantity;
    }

    fn reduce(&mut self, fill: &Fill) -> Result<Trade, PositionError> {
        let resulting = self.quantity + fill.quantity;
        let remaining = Direction::of(resulting);
        if remaining != self.direction && remaining != Direction::Flat {
            return Err(PositionError::DirectionFlip {
                symbol: self.symbol.clone(),
                time: fill.time,
                quantity: self.quantity,
                fill_quantity: fill.quantity,
                resulting,
            });
        }
        let entry_price = self.avg_cost();
        let exit_price = fill.avg_price_incl_commission();
        let closed_quantity = -fill.quantity;
        let pnl = closed_quantity * (exit_price - entry_price);
        self.realized_pnl += pnl;

        if remaining == Direction::Flat {
            self.quantity = 0.0;
            self.closed = true;
        } else {
            self.quantity = resulting;
        }

        Ok(Trade {
            symbol: self.symbol.clone(),
            direction: self.direction,
            entry_time: self.start_time().unwrap_or(fill.time),
            exit_time: fill.time,
            quantity: closed_quantity,
            entry_price,
            exit_price,
            commission: fill.commission,
            pnl,
        })
    }

    fn zero_quantity(&self, fill: &Fill) -> PositionError {
        PositionError::ZeroQuantity {
            symbol: self.symbol.clone(),
            time: fill.time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap()
    }

    fn fill(d: u32, quantity: f64, price: f64, commission: f64) -> Fill {
        Fill::new(at(d), "SPY", quantity, price, commission)
    }

    #[test]
    fn partial_exit_produces_trade_with_commission_inclusive_prices() {
        let mut pos = Position::new("SPY");
        let first = pos.apply_fill(&fill(2, 100.0, 10.0, 1.0)).unwrap();
        assert_eq!(pos.direction(), Direction::Long);
        assert_eq!(pos.quantity(), 100.0);
        assert!(first.trade.is_none());
        assert!((first.transaction_cost - 1001.0).abs() < 1e-12);

        let second = pos.apply_fill(&fill(3, -40.0, 12.0, 1.0)).unwrap();
        let trade = second.trade.expect("reducing fill is a trade");
        assert!((trade.entry_price - 10.01).abs() < 1e-12);
        assert!((trade.exit_price - 11.975).abs() < 1e-12);
        assert_eq!(trade.quantity, 40.0);
        assert!((trade.pnl - 78.6).abs() < 1e-9);
        assert_eq!(pos.quantity(), 60.0);
        assert!(!pos.is_closed());
    }

    #[test]
    fn tiny_fill_is_not_a_zero_quantity() {
        let mut pos = Position::new("SPY");
        pos.apply_fill(&fill(2, 5e-10, 10.0, 0.0)).unwrap();
        assert_eq!(pos.direction(), Direction::Long);
        assert_eq!(pos.quantity(), 5e-10);
        assert!(matches!(
            pos.apply_fill(&fill(3, 0.0, 10.0, 0.0)),
            Err(PositionError::ZeroQuantity { .. })
        ));

        // leaving dust behind still closes the position
        let mut pos = Position::new("SPY");
        pos.apply_fill(&fill(2, 1.0, 10.0, 0.0)).unwrap();
        pos.apply_fill(&fill(3, -(1.0 - 5e-10), 11.0, 0.0)).unwrap();
        assert!(pos.is_closed());
        assert_eq!(pos.quantity(), 0.0);
    }

    #[test]
    fn extending_fill_moves_average_cost() {
        let mut pos = Position::new("SPY");
        pos.apply_fill(&fill(2, 100.0, 10.0, 0.0)).unwrap();
        let effect = pos.apply_fill(&fill(3, 100.0, 12.0, 0.0)).unwrap();
        assert!(effect.trade.is_none());
        assert!((pos.avg_cost() - 11.0).abs() < 1e-12);
    }

    #[test]
    fn short_position_round_trip() {
        let mut pos = Position::new("SPY");
        pos.apply_fill(&fill(2, -100.0, 10.0, 1.0)).unwrap();
        assert_eq!(pos.direction(), Direction::Short);
        let effect = pos.apply_fill(&fill(3, 100.0, 8.0, 1.0)).unwrap();
        let trade = effect.trade.unwrap();
        assert_eq!(trade.quantity, -100.0);
        // received 999, paid 801
        assert!((trade.pnl - 198.0).abs() < 1e-9);
        assert!(pos.is_closed());
        assert_eq!(pos.end_time(), Some(at(3)));
    }

    #[test]
    fn flip_in_one_fill_is_refused() {
        let mut pos = Position::new("SPY");
        pos.apply_fill(&fill(2, 100.0, 10.0, 0.0)).unwrap();
        let err = pos.apply_fill(&fill(3, -150.0, 10.0, 0.0)).unwrap_err();
        assert!(matches!(err, PositionError::DirectionFlip { .. }));
        assert_eq!(pos.quantity(), 100.0);
        assert_eq!(pos.fills().len(), 1);
    }

    #[test]
    fn closed_position_rejects_fills() {
        let mut pos = Position::new("SPY");
        pos.apply_fill(&fill(2, 10.0, 10.0, 0.0)).unwrap();
        pos.apply_fill(&fill(3, -10.0, 11.0, 0.0)).unwrap();
        assert!(pos.is_closed());
        assert!(matches!(
            pos.apply_fill(&fill(4, 10.0, 10.0, 0.0)),
            Err(PositionError::Closed { .. })
        ));
    }

    #[test]
    fn invalid_fills_are_rejected() {
        let mut pos = Position::new("SPY");
        assert!(matches!(
            pos.apply_fill(&fill(2, 0.0, 10.0, 0.0)),
            Err(PositionError::ZeroQuantity { .. })
        ));
        assert!(matches!(
            pos.apply_fill(&fill(2, 10.0, 0.0, 0.0)),
            Err(PositionError::NonPositivePrice { .. })
        ));
        assert!(matches!(
            pos.apply_fill(&Fill::new(at(2), "QQQ", 10.0, 10.0, 0.0)),
            Err(PositionError::SymbolMismatch { .. })
        ));
        assert_eq!(pos.direction(), Direction::Flat);
    }

    #[test]
    fn marks_long_at_bid_short_at_ask_and_ignores_nan() {
        let mut long = Position::new("SPY");
        long.apply_fill(&fill(2, 10.0, 10.0, 0.0)).unwrap();
        long.update_price(9.9, 10.1);
        assert_eq!(long.current_price(), 9.9);
        long.update_price(f64::NAN, f64::NAN);
        assert_eq!(long.current_price(), 9.9);
        assert!((long.market_value() - 99.0).abs() < 1e-12);

        let mut short = Position::new("SPY");
        short.apply_fill(&fill(2, -10.0, 10.0, 0.0)).unwrap();
        short.update_price(9.9, 10.1);
        assert_eq!(short.current_price(), 10.1);
    }

    #[test]
    fn realized_plus_unrealized_matches_cash_flow() {
        let mut pos = Position::new("SPY");
        pos.apply_fill(&fill(2, 100.0, 10.0, 1.0)).unwrap();
        pos.apply_fill(&fill(3, -40.0, 12.0, 1.0)).unwrap();
        pos.update_price(11.0, 11.0);
        let cash_flow: f64 = -pos.fills().iter().map(Fill::transaction_cost).sum::<f64>();
        let economic = cash_flow + pos.market_value();
        assert!((pos.realized_pnl() + pos.unrealized_pnl() - economic).abs() < 1e-9);
    }
}
