//! Backtest configuration, loaded from TOML.

use crate::time::{ConfigError, Frequency, SessionConfig, TimeEvent};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_events() -> Vec<TimeEvent> {
    vec![TimeEvent::MarketOpen, TimeEvent::MarketClose]
}

fn default_frequency() -> Frequency {
    Frequency::Daily
}

/// Settings for one run. Fixed before the event loop starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// First calendar day simulated.
    pub start: NaiveDate,
    /// Last calendar day simulated, inclusive.
    pub end: NaiveDate,
    pub initial_cash: f64,
    #[serde(default = "SessionConfig::us_equities")]
    pub session: SessionConfig,
    /// Frequency of the stored bars the handler reads last/current prices at.
    #[serde(default = "default_frequency")]
    pub data_frequency: Frequency,
    /// Time events the run is driven by.
    #[serde(default = "default_events")]
    pub events: Vec<TimeEvent>,
    /// Charged per unit traded by the reference executor.
    #[serde(default)]
    pub commission_per_share: f64,
}

impl BacktestConfig {
    pub fn new(start: NaiveDate, end: NaiveDate, initial_cash: f64) -> Self {
        Self {
            start,
            end,
            initial_cash,
            session: SessionConfig::us_equities(),
            data_frequency: default_frequency(),
            events: default_events(),
            commission_per_share: 0.0,
        }
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    pub fn with_data_frequency(mut self, frequency: Frequency) -> Self {
        self.data_frequency = frequency;
        self
    }

    pub fn with_events(mut self, events: impl IntoIterator<Item = TimeEvent>) -> Self {
        self.events = events.into_iter().collect();
        self
    }

    pub fn with_commission_per_share(mut self, commission: f64) -> Self {
        self.commission_per_share = commission;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start > self.end {
            return Err(ConfigError::InvalidRange {
                start: self.start,
                end: self.end,
            });
        }
        if !(self.initial_cash.is_finite() && self.initial_cash >= 0.0) {
            return Err(ConfigError::Parse(format!(
                "initial_cash must be a non-negative number, got {}",
                self.initial_cash
            )));
        }
        if !(self.commission_per_share.is_finite() && self.commission_per_share >= 0.0) {
            return Err(ConfigError::Parse(format!(
                "commission_per_share must be a non-negative number, got {}",
                self.commission_per_share
            )));
        }
        self.session.validate()
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: BacktestConfig =
            toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_gets_defaults() {
        let config = BacktestConfig::from_toml_str(
            r#"
                start = "2024-01-02"
                end = "2024-01-31"
                initial_cash = 100000.0
            "#,
        )
        .unwrap();
        assert_eq!(config.session, SessionConfig::us_equities());
        assert_eq!(config.data_frequency, Frequency::Daily);
        assert_eq!(config.events, default_events());
    }

    #[test]
    fn events_and_session_from_toml() {
        let config = BacktestConfig::from_toml_str(
            r#"
                start = "2024-01-02"
                end = "2024-01-05"
                initial_cash = 1000.0
                data_frequency = "1min"
                events = [{ type = "market_open" }, { type = "intraday_bar" }]

                [session]
                intraday_frequency = "5min"
                market_open = { hour = 14, minute = 30 }
                market_close = { hour = 21 }
            "#,
        )
        .unwrap();
        assert_eq!(config.data_frequency, Frequency::Min1);
        assert_eq!(
            config.events,
            vec![TimeEvent::MarketOpen, TimeEvent::IntradayBar]
        );
        assert_eq!(config.session.intraday_frequency, Some(Frequency::Min5));
    }

    #[test]
    fn reversed_dates_are_rejected() {
        let config = BacktestConfig::new(
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            1.0,
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRange { .. })
        ));
    }
}
