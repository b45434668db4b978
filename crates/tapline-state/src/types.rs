//! Persisted record types.

use serde::{Deserialize, Serialize};

// ── Inventory ─────────────────────────────────────────────────────

/// Stock status of a keg slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryStatus {
    /// Currently pumping.
    Active,
    /// Drained.
    Empty,
    /// Connected and holding beer, not pumping.
    Standby,
}

/// Latest known stock for one keg on one tap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventoryRecord {
    pub tap_id: String,
    pub keg_id: String,
    pub beer_name: String,
    pub total_volume_ml: f64,
    pub remaining_volume_ml: f64,
    pub status: InventoryStatus,
    /// Unix timestamp (milliseconds) of the last upsert.
    pub updated_at_ms: u64,
}

impl InventoryRecord {
    /// Build the composite key for the inventory table.
    pub fn table_key(&self) -> String {
        inventory_key(&self.tap_id, &self.keg_id)
    }
}

pub(crate) fn inventory_key(tap_id: &str, keg_id: &str) -> String {
    format!("{tap_id}:{keg_id}")
}

// ── Telemetry ─────────────────────────────────────────────────────

/// One status reading, as received.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySample {
    pub timestamp_ms: u64,
    pub tap_id: String,
    pub keg_id: String,
    pub volume_remaining_ml: f64,
    pub flow_lpm: f64,
    pub temp_beer_c: f64,
}

// ── Usage ─────────────────────────────────────────────────────────

/// Consumption of one beer during one hour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageBucket {
    /// Unix timestamp (seconds) of the start of the hour.
    pub bucket_start: u64,
    pub beer_name: String,
    pub volume_ml: f64,
}

impl UsageBucket {
    /// Build the composite key for the usage table.
    pub fn table_key(&self) -> String {
        usage_key(self.bucket_start, &self.beer_name)
    }
}

pub(crate) fn usage_key(bucket_start: u64, beer_name: &str) -> String {
    format!("{bucket_start:012}/{beer_name}")
}

// ── Orders ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Fulfilled,
}

/// A restock request for a keg.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: u64,
    pub tap_id: String,
    pub keg_id: String,
    pub beer_name: String,
    pub status: OrderStatus,
    pub created_at_ms: u64,
}
