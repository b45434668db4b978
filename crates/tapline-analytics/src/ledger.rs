//! Hourly usage ledger and per-keg consumption tracking.

use std::collections::HashMap;

pub const HOUR_SECS: u64 = 3600;

/// Start of the hour containing `now_secs`.
pub fn hour_bucket(now_secs: u64) -> u64 {
    now_secs / HOUR_SECS * HOUR_SECS
}

#[derive(Debug, Clone, PartialEq)]
struct LastReading {
    volume_ml: f64,
    beer_name: String,
}

/// Remembers the last volume reading per keg and turns new readings into
/// consumption deltas.
///
/// Only a strictly lower reading counts as consumption. A higher reading
/// (sensor glitch, refill) yields nothing, but it still replaces the
/// baseline, so a glitch is absorbed in one step.
#[derive(Debug, Default)]
pub struct ConsumptionTracker {
    last: HashMap<String, LastReading>,
}

impl ConsumptionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reading for `keg_key` and return the consumed volume, if any.
    pub fn observe(&mut self, keg_key: &str, volume_ml: f64, beer_name: &str) -> Option<f64> {
        let previous = self.last.insert(
            keg_key.to_string(),
            LastReading {
                volume_ml,
                beer_name: beer_name.to_string(),
            },
        );

        match previous {
            Some(prev) if volume_ml < prev.volume_ml => Some(prev.volume_ml - volume_ml),
            _ => None,
        }
    }

    /// Beer name of the most recent reading for `keg_key`.
    pub fn beer_name(&self, keg_key: &str) -> Option<&str> {
        self.last.get(keg_key).map(|r| r.beer_name.as_str())
    }

    /// Last recorded volume for `keg_key`.
    pub fn last_volume(&self, keg_key: &str) -> Option<f64> {
        self.last.get(keg_key).map(|r| r.volume_ml)
    }

    /// Drop every keg whose key starts with `prefix`. Returns how many.
    pub fn forget_prefix(&mut self, prefix: &str) -> usize {
        let before = self.last.len();
        self.last.retain(|key, _| !key.starts_with(prefix));
        before - self.last.len()
    }
}
