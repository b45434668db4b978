use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValveError {
    #[error("tap {0} has no kegs")]
    NoKegs(String),

    #[error("bus error: {0}")]
    Bus(#[from] tapline_bus::BusError),
}

pub type ValveResult<T> = Result<T, ValveError>;
