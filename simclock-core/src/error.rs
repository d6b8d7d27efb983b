//! Crate-level error type.

use crate::data::DataError;
use crate::domain::PositionError;
use crate::events::{DispatchError, EventType};
use crate::time::{ClockError, ConfigError};
use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Clock(#[from] ClockError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Position(#[from] PositionError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("listener `{listener}` failed on {event_type} at {time}: {source}")]
    Listener {
        listener: String,
        event_type: EventType,
        time: NaiveDateTime,
        #[source]
        source: Box<SimError>,
    },
}

impl SimError {
    /// The innermost error, unwrapping listener context.
    pub fn root(&self) -> &SimError {
        match self {
            SimError::Listener { source, .. } => source.root(),
            other => other,
        }
    }
}
