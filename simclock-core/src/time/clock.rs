//! Simulated clock: the single source of "now" for one backtest.
//!
//! Cloning the clock hands out another view of the same instant; only the
//! time-flow driver moves it, and only forward.

use super::{from_micros, to_micros};
use chrono::NaiveDateTime;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClockError {
    #[error("simulated clock cannot move backwards from {current} to {requested}")]
    Backwards {
        current: NaiveDateTime,
        requested: NaiveDateTime,
    },
}

#[derive(Debug, Clone)]
pub struct SimulatedClock {
    micros: Arc<AtomicI64>,
}

impl SimulatedClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            micros: Arc::new(AtomicI64::new(to_micros(start))),
        }
    }

    pub fn now(&self) -> NaiveDateTime {
        from_micros(self.micros.load(Ordering::Acquire))
    }

    /// Advance to `to`. Setting the current instant again is a no-op.
    pub fn advance_to(&self, to: NaiveDateTime) -> Result<(), ClockError> {
        let requested = to_micros(to);
        let current = self.micros.load(Ordering::Acquire);
        if requested < current {
            return Err(ClockError::Backwards {
                current: from_micros(current),
                requested: to,
            });
        }
        self.micros.store(requested, Ordering::Release);
        Ok(())
    }
}
