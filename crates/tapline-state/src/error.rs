//! Store errors.

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open tap store: {0}")]
    Open(String),

    /// A redb transaction, table, read or write step failed.
    #[error("store {op} failed: {message}")]
    Storage { op: &'static str, message: String },

    #[error("failed to encode record: {0}")]
    Encode(String),

    /// A stored value no longer matches its record type.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("no inventory record for keg {keg_id} on tap {tap_id}")]
    KegNotFound { tap_id: String, keg_id: String },

    #[error("order {0} not found")]
    OrderNotFound(u64),
}
