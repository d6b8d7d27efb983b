//! Independent backtests over many configurations.

use super::config::BacktestConfig;
use super::runner::{Backtest, BacktestResult};
use crate::data::PriceSource;
use crate::error::SimError;
use rayon::prelude::*;
use std::sync::Arc;

/// Runs one isolated backtest per configuration against a shared source.
/// Results come back in input order.
pub struct Sweep {
    source: Arc<dyn PriceSource>,
    parallel: bool,
}

impl Sweep {
    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self {
            source,
            parallel: true,
        }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// `setup` attaches strategies to each freshly built backtest.
    pub fn run<F>(
        &self,
        configs: &[BacktestConfig],
        setup: F,
    ) -> Vec<Result<BacktestResult, SimError>>
    where
        F: Fn(Backtest) -> Backtest + Send + Sync,
    {
        let run_one = |config: &BacktestConfig| {
            setup(Backtest::new(config.clone(), Arc::clone(&self.source))).run()
        };
        if self.parallel {
            configs.par_iter().map(run_one).collect()
        } else {
            configs.iter().map(run_one).collect()
        }
    }
}
