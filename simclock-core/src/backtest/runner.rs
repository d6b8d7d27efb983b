//! Backtest runner: wires the scheduler, event manager, data handler and
//! portfolio for one run and drives the loop to the end.

use super::config::BacktestConfig;
use super::context::BacktestContext;
use super::execution::ImmediateExecutor;
use super::listeners::{Bookkeeper, EventRecorder, TimeFlowController};
use crate::data::{DataHandler, PriceSource};
use crate::domain::{Fill, Portfolio, PortfolioSnapshot, Trade};
use crate::error::SimError;
use crate::events::{Event, EventManager, EventType, Listener, RunSummary};
use crate::time::{Scheduler, SimulatedClock};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

type BoxedListener = Box<dyn Listener<BacktestContext>>;

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub config: BacktestConfig,
    pub summary: RunSummary,
    pub final_value: f64,
    pub cash: f64,
    /// Quantity per still-open position.
    pub open_positions: BTreeMap<String, f64>,
    pub trades: Vec<Trade>,
    pub transactions: Vec<Fill>,
    pub history: Vec<PortfolioSnapshot>,
    pub events: Vec<Event>,
    /// BLAKE3 hex digest of the dispatched event log.
    pub fingerprint: String,
}

impl BacktestResult {
    pub fn total_pnl(&self) -> f64 {
        self.final_value - self.config.initial_cash
    }

    pub fn total_return(&self) -> f64 {
        if self.config.initial_cash == 0.0 {
            return 0.0;
        }
        self.total_pnl() / self.config.initial_cash
    }
}

/// BLAKE3 over the canonical JSON of each event, in dispatch order.
pub fn event_log_fingerprint(events: &[Event]) -> Result<String, SimError> {
    let mut hasher = blake3::Hasher::new();
    for event in events {
        let json = serde_json::to_vec(event).map_err(|e| SimError::Serialization(e.to_string()))?;
        hasher.update(&json);
        hasher.update(b"\n");
    }
    Ok(hasher.finalize().to_hex().to_string())
}

pub struct Backtest {
    config: BacktestConfig,
    source: Arc<dyn PriceSource>,
    listeners: Vec<(BoxedListener, Vec<EventType>)>,
}

impl Backtest {
    pub fn new(config: BacktestConfig, source: Arc<dyn PriceSource>) -> Self {
        Self {
            config,
            source,
            listeners: Vec::new(),
        }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Add a strategy or other collaborator, subscribed to `event_types`.
    pub fn with_listener(
        mut self,
        listener: impl Listener<BacktestContext> + 'static,
        event_types: &[EventType],
    ) -> Self {
        self.listeners.push((Box::new(listener), event_types.to_vec()));
        self
    }

    pub fn run(self) -> Result<BacktestResult, SimError> {
        let config = self.config;
        config.validate()?;

        let start = config.start.and_time(NaiveTime::MIN);
        let clock = SimulatedClock::new(start);
        let data = DataHandler::new(
            Arc::clone(&self.source),
            clock.clone(),
            config.session.clone(),
            config.data_frequency,
        );
        let mut ctx = BacktestContext::new(clock, data, Portfolio::new(config.initial_cash));

        let scheduler =
            Scheduler::with_events(config.session.clone(), config.events.iter().cloned());
        let mut manager: EventManager<BacktestContext> = EventManager::new();
        manager.register_for(
            Box::new(TimeFlowController::new(scheduler, config.end)),
            &[EventType::EmptyQueue],
        )?;
        manager.register_for(
            Box::new(Bookkeeper),
            &[EventType::Fill, EventType::MarketClose, EventType::EndTrading],
        )?;
        manager.register_for(
            Box::new(ImmediateExecutor::new(config.commission_per_share)),
            &[EventType::Signal],
        )?;
        for (listener, event_types) in self.listeners {
            manager.register_for(listener, &event_types)?;
        }
        manager.register_for(Box::new(EventRecorder), &[EventType::Any])?;

        info!(
            start = %config.start,
            end = %config.end,
            source = self.source.name(),
            frequency = %config.data_frequency,
            "backtest starting"
        );
        manager.publish(Event::EmptyQueue { time: start })?;
        let summary = manager.run(&mut ctx)?;

        let fingerprint = event_log_fingerprint(&ctx.event_log)?;
        let portfolio = &ctx.portfolio;
        info!(
            dispatched = summary.dispatched,
            trades = portfolio.trades().len(),
            final_value = portfolio.total_value(),
            %fingerprint,
            "backtest finished"
        );
        Ok(BacktestResult {
            summary,
            final_value: portfolio.total_value(),
            cash: portfolio.cash(),
            open_positions: portfolio
                .positions()
                .iter()
                .map(|(s, p)| (s.clone(), p.quantity()))
                .collect(),
            trades: portfolio.trades().to_vec(),
            transactions: ctx.transactions,
            history: portfolio.history().to_vec(),
            events: ctx.event_log,
            fingerprint,
            config,
        })
    }
}
