//! Accounting domain: bars, signals, fills, positions, trades, portfolio.

pub mod bar;
pub mod fill;
pub mod portfolio;
pub mod position;
pub mod signal;
pub mod trade;

pub use bar::Bar;
pub use fill::Fill;
pub use portfolio::{Portfolio, PortfolioSnapshot};
pub use position::{Direction, FillEffect, Position, PositionError};
pub use signal::{SignalEvent, SuggestedOrder};
pub use trade::Trade;
