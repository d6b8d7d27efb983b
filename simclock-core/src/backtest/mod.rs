//! Simulation wiring: configuration, built-in listeners and the run driver.

pub mod config;
pub mod context;
pub mod execution;
pub mod listeners;
pub mod runner;
pub mod strategy;
pub mod sweep;

pub use config::BacktestConfig;
pub use context::BacktestContext;
pub use execution::ImmediateExecutor;
pub use listeners::{Bookkeeper, EventRecorder, TimeFlowController};
pub use runner::{event_log_fingerprint, Backtest, BacktestResult};
pub use strategy::BuyAndHold;
pub use sweep::Sweep;
