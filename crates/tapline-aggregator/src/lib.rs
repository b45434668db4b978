//! tapline-aggregator — the backend's authoritative view of every tap.
//!
//! [`Aggregator`] reconciles display, status and event messages into one
//! [`TapSession`] per tap, persists inventory, telemetry and usage to the
//! store, raises restock orders, and detects taps that went silent. It is
//! plain synchronous state; [`AggregatorService`] runs it as a single task
//! fed by the bus, and [`AggregatorHandle`] is how the rest of the process
//! queries it or attaches a live viewer.

pub mod aggregator;
pub mod error;
pub mod events;
pub mod service;
pub mod session;

pub use aggregator::{Aggregator, BROKER_SETTING};
pub use error::{AggregatorError, AggregatorResult};
pub use events::ViewerEvent;
pub use service::{AggregatorHandle, AggregatorService, ViewerStream};
pub use session::{KegRuntime, ReadingPolicy, TapSession};
