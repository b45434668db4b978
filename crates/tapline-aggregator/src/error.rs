use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("sweep interval must be non-zero")]
    ZeroSweepInterval,

    #[error("aggregator task is not running")]
    Closed,

    #[error("store error: {0}")]
    State(#[from] tapline_state::StateError),

    #[error("analytics error: {0}")]
    Analytics(#[from] tapline_analytics::AnalyticsError),

    #[error("bus error: {0}")]
    Bus(#[from] tapline_bus::BusError),
}

pub type AggregatorResult<T> = Result<T, AggregatorError>;
