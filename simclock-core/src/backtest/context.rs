//! State shared by all listeners of one backtest.

use crate::data::DataHandler;
use crate::domain::{Fill, Portfolio};
use crate::events::Event;
use crate::time::SimulatedClock;

#[derive(Debug)]
pub struct BacktestContext {
    pub clock: SimulatedClock,
    pub data: DataHandler,
    pub portfolio: Portfolio,
    /// Every fill applied to the portfolio, in order.
    pub transactions: Vec<Fill>,
    /// Every dispatched event, in dispatch order.
    pub event_log: Vec<Event>,
}

impl BacktestContext {
    pub fn new(clock: SimulatedClock, data: DataHandler, portfolio: Portfolio) -> Self {
        Self {
            clock,
            data,
            portfolio,
            transactions: Vec::new(),
            event_log: Vec::new(),
        }
    }
}
