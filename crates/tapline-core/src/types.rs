//! Identifiers, clock helpers, and unit conversions shared across crates.

use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier of a tap (the `systemId` segment of every topic).
pub type TapId = String;

/// Identifier of a keg, scoped to its tap.
pub type KegId = String;

/// Beer name used when neither the payload nor any cached sample names one.
pub const UNKNOWN_BEER: &str = "Unknown";

/// Milliseconds since the unix epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Composite `{tap_id}:{keg_id}` key used for per-keg lookups and storage.
pub fn keg_key(tap_id: &str, keg_id: &str) -> String {
    format!("{tap_id}:{keg_id}")
}

/// Millilitres delivered by `flow_lpm` litres/minute over `secs` seconds.
pub fn flow_volume_ml(flow_lpm: f64, secs: f64) -> f64 {
    flow_lpm * secs * 1000.0 / 60.0
}
