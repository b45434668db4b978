//! tapline-state — embedded store for Tapline.
//!
//! Backed by [redb](https://docs.rs/redb), holds everything the aggregator
//! persists: per-keg inventory, the append-only telemetry log, hourly
//! usage buckets, reorder requests, and key/value settings.
//!
//! # Architecture
//!
//! All records are JSON-serialized into redb's `&[u8]` value columns.
//! Inventory uses `{tap_id}:{keg_id}` keys so a tap's kegs can be found
//! (and deleted) with a prefix scan. Usage keys are
//! `{bucket_start:012}/{beer_name}` so they sort by time. Telemetry and
//! orders use monotonically increasing `u64` keys.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`).

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
