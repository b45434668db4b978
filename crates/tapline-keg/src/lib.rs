//! tapline-keg — simulated keg unit.
//!
//! [`KegModel`] is the pump/volume state machine with no I/O: each
//! operation returns the [`KegOutput`]s to publish. [`KegDevice`] wraps a
//! model in a task that listens on `{tap}/keg/{keg}/command` and reports on
//! the keg's status and event topics.

pub mod device;
pub mod model;

pub use device::KegDevice;
pub use model::{KegModel, KegOutput};
