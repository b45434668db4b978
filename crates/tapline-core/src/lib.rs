//! tapline-core — shared vocabulary for the Tapline crates.
//!
//! Holds the topic layout, the JSON wire messages exchanged between tap
//! UIs, valve boxes, kegs, and the aggregator, and the `tapline.toml`
//! configuration file.

pub mod config;
pub mod error;
pub mod messages;
pub mod topic;
pub mod types;

pub use config::{parse_duration, TaplineConfig};
pub use error::{ConfigError, ConfigResult};
pub use messages::*;
pub use topic::TapTopic;
pub use types::*;
