//! tapline-valve — the valve box sitting between a tap UI and its kegs.
//!
//! [`ValveBox`] decides which keg serves a pour and fails over to the next
//! keg when the active one runs dry. [`ValveBoxController`] runs it as a
//! task on the bus and owns the swap timer.

pub mod controller;
pub mod error;
pub mod machine;

pub use controller::ValveBoxController;
pub use error::{ValveError, ValveResult};
pub use machine::{ValveBox, ValveInput, ValveOutput, ValveState, LOW_LEVEL_PCT, NO_KEGS_ALERT};
