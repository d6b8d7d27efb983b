//! Portfolio: cash plus every position, open and closed.

use super::fill::Fill;
use super::position::{FillEffect, Position, PositionError};
use super::trade::Trade;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Valuation recorded by each [`Portfolio::update`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub time: NaiveDateTime,
    pub cash: f64,
    pub total_value: f64,
    pub gross_exposure: f64,
    pub net_exposure: f64,
}

/// Aggregate account state.
///
/// `total_value == cash + Σ market_value(open positions)` holds after every
/// [`Portfolio::update`]; the sum is recomputed from the positions each time
/// rather than adjusted incrementally.
#[derive(Debug, Clone)]
pub struct Portfolio {
    initial_cash: f64,
    cash: f64,
    total_value: f64,
    open: BTreeMap<String, Position>,
    closed: Vec<Position>,
    trades: Vec<Trade>,
    history: Vec<PortfolioSnapshot>,
}

impl Portfolio {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            initial_cash,
            cash: initial_cash,
            total_value: initial_cash,
            open: BTreeMap::new(),
            closed: Vec::new(),
            trades: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Value as of the last [`Portfolio::update`].
    pub fn total_value(&self) -> f64 {
        self.total_value
    }

    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.open
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.open.get(symbol)
    }

    pub fn closed_positions(&self) -> &[Position] {
        &self.closed
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn history(&self) -> &[PortfolioSnapshot] {
        &self.history
    }

    /// Apply a fill, opening a position lazily on the first fill for a
    /// symbol. A position that returns to zero moves to the closed list; a
    /// later fill on the same symbol opens a fresh one.
    pub fn transact_fill(&mut self, fill: &Fill) -> Result<FillEffect, PositionError> {
        let position = self
            .open
            .entry(fill.symbol.clone())
            .or_insert_with(|| Position::new(fill.symbol.clone()));
        let effect = match position.apply_fill(fill) {
            Ok(effect) => effect,
            Err(err) => {
                if position.fills().is_empty() {
                    self.open.remove(&fill.symbol);
                }
                return Err(err);
            }
        };
        let closed = position.is_closed();

        self.cash -= effect.transaction_cost;
        if let Some(trade) = &effect.trade {
            self.trades.push(trade.clone());
        }
        if closed {
            if let Some(position) = self.open.remove(&fill.symbol) {
                self.closed.push(position);
            }
        }
        Ok(effect)
    }

    /// Mark one open position. Returns `false` if there is none for `symbol`.
    pub fn update_price(&mut self, symbol: &str, bid: f64, ask: f64) -> bool {
        match self.open.get_mut(symbol) {
            Some(position) => {
                position.update_price(bid, ask);
                true
            }
            None => false,
        }
    }

    /// Recompute `total_value` from cash and current marks and record a snapshot.
    pub fn update(&mut self, time: NaiveDateTime) -> PortfolioSnapshot {
        let market_value: f64 = self.open.values().map(Position::market_value).sum();
        self.total_value = self.cash + market_value;
        let snapshot = PortfolioSnapshot {
            time,
            cash: self.cash,
            total_value: self.total_value,
            gross_exposure: self.gross_exposure(),
            net_exposure: market_value,
        };
        self.history.push(snapshot);
        snapshot
    }

    pub fn gross_exposure(&self) -> f64 {
        self.open.values().map(|p| p.market_value().abs()).sum()
    }

    /// Realized P&L across open and closed positions.
    pub fn realized_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.open.values().map(Position::unrealized_pnl).sum()
    }
}
