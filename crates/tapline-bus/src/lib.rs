//! tapline-bus — topic-based publish/subscribe transport.
//!
//! Devices and the aggregator only talk through the bus. Topics are
//! `/`-separated hierarchical names; subscriptions use filters with
//! MQTT-style wildcards:
//!
//! - `+` matches exactly one segment: `tap-1/keg/+/status`
//! - `#` matches zero or more trailing segments: `tap-1/#`
//!
//! # Delivery
//!
//! Every subscription owns an unbounded, ordered queue. A publish fans the
//! payload out to each matching subscription in publish order; there is no
//! retention and no acknowledgement. Subscriptions that were dropped are
//! pruned lazily on the next publish.

pub mod bus;
pub mod error;
pub mod filter;

pub use bus::{Bus, Message, Subscription};
pub use error::{BusError, BusResult};
pub use filter::TopicFilter;
