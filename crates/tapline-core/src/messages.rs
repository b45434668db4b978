//! Wire messages, one type per topic channel.
//!
//! Payloads are JSON with `snake_case` keys and `SCREAMING_SNAKE_CASE`
//! enum values. Inbound telemetry ([`KegStatus`]) keeps every field
//! optional; deciding what a missing field means is the consumer's job.

use serde::{Deserialize, Serialize};

// ── Display (`{tap}/ui/display`) ──────────────────────────────────

/// Screen shown on the tap UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum View {
    #[default]
    Idle,
    Pouring,
    Swapping,
}

/// Old/new keg pair shown while a failover swap is in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapNotice {
    pub from_keg: String,
    pub to_keg: String,
}

/// Unified display state published by a valve box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayState {
    pub view: View,
    pub beer_name: String,
    /// Percent of the active keg remaining (0–100).
    pub volume_remaining_pct: f64,
    #[serde(default)]
    pub alert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap: Option<SwapNotice>,
}

impl DisplayState {
    /// Placeholder display for a tap first seen through keg telemetry.
    pub fn placeholder(beer_name: &str) -> Self {
        Self {
            view: View::Idle,
            beer_name: beer_name.to_string(),
            volume_remaining_pct: 0.0,
            alert: None,
            swap: None,
        }
    }
}

// ── UI events (`{tap}/ui/event`) ──────────────────────────────────

/// User pour intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PourEvent {
    PourStart,
    PourStop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiEvent {
    pub event: PourEvent,
    #[serde(default)]
    pub timestamp: u64,
}

// ── Keg commands (`{tap}/keg/{keg}/command`) ──────────────────────

/// Pump parameters carried by `START_PUMP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PumpConfig {
    /// Pump duty cycle in percent; `None` runs at full duty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pwm_duty: Option<u8>,
    /// Safety cut-off: stop after this much pumping time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KegCommand {
    StartPump(PumpConfig),
    StopPump,
    /// Cellar-side keg change: restore the keg to full capacity.
    Refill,
}

// ── Keg telemetry (`{tap}/keg/{keg}/status`) ──────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KegState {
    #[default]
    Idle,
    Pumping,
}

/// Status sample reported by a keg. Every field may be absent on input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KegStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<KegState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_lpm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_beer_c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vol_remaining_ml: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vol_total_ml: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beer_name: Option<String>,
}

// ── Keg events (`{tap}/keg/{keg}/event`) ──────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KegEvent {
    EmptyDetected {
        #[serde(default)]
        reason: String,
        #[serde(default)]
        timestamp: u64,
    },
}
