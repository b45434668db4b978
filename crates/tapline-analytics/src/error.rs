//! Analytics error types.

use thiserror::Error;

/// Errors that can occur while computing analytics.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("keg not found: {tap_id}/{keg_id}")]
    KegNotFound { tap_id: String, keg_id: String },

    #[error("state store error: {0}")]
    State(#[from] tapline_state::StateError),
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
