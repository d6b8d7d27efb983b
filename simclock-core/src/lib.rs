//! simclock core: simulated time, event dispatch, look-ahead-safe data
//! access and position accounting for discrete-event backtests.
//!
//! - `time`: frequencies, trading calendar, session config, time events, scheduler
//! - `events`: event taxonomy, notifier chain, event manager
//! - `data`: price storage, raw sources, resampling, the clipping data handler
//! - `domain`: fills, positions, trades, portfolio
//! - `pnl`: batch P&L reconstruction from a transaction log
//! - `backtest`: built-in listeners, the run driver and parallel sweeps

pub mod backtest;
pub mod data;
pub mod domain;
pub mod error;
pub mod events;
pub mod pnl;
pub mod time;

pub use error::SimError;
