//! Pump and volume state machine for a single keg.

use std::time::Duration;

use tracing::{debug, info, warn};

use tapline_core::config::KegConfig;
use tapline_core::{epoch_millis, flow_volume_ml, KegEvent, KegState, KegStatus, PumpConfig};

/// Something the keg wants published.
#[derive(Debug, Clone, PartialEq)]
pub enum KegOutput {
    Status(KegStatus),
    Event(KegEvent),
}

/// Volumetric model of one keg.
///
/// Volume only decreases while pumping and is clamped at zero. Reaching
/// zero stops the pump and raises `EMPTY_DETECTED`.
#[derive(Debug, Clone)]
pub struct KegModel {
    keg_id: String,
    beer_name: String,
    capacity_ml: f64,
    nominal_flow_lpm: f64,
    temp_beer_c: f64,
    tick: Duration,

    state: KegState,
    volume_ml: f64,
    flow_lpm: f64,
    pumped_ms: u64,
    timeout_ms: Option<u64>,
}

impl KegModel {
    /// A full keg.
    pub fn new(keg_id: &str, beer_name: &str, config: &KegConfig) -> Self {
        Self {
            keg_id: keg_id.to_string(),
            beer_name: beer_name.to_string(),
            capacity_ml: config.capacity_ml,
            nominal_flow_lpm: config.flow_lpm,
            temp_beer_c: config.temp_beer_c,
            tick: config.tick(),
            state: KegState::Idle,
            volume_ml: config.capacity_ml,
            flow_lpm: 0.0,
            pumped_ms: 0,
            timeout_ms: None,
        }
    }

    /// Start from a partially drained keg. Clamped to `[0, capacity]`.
    pub fn with_volume(mut self, volume_ml: f64) -> Self {
        self.volume_ml = volume_ml.clamp(0.0, self.capacity_ml);
        self
    }

    pub fn keg_id(&self) -> &str {
        &self.keg_id
    }

    pub fn state(&self) -> KegState {
        self.state
    }

    pub fn is_pumping(&self) -> bool {
        self.state == KegState::Pumping
    }

    pub fn volume_ml(&self) -> f64 {
        self.volume_ml
    }

    /// Tick period used while pumping.
    pub fn tick_period(&self) -> Duration {
        self.tick
    }

    /// Current status sample.
    pub fn status(&self) -> KegStatus {
        KegStatus {
            state: Some(self.state),
            flow_lpm: Some(self.flow_lpm),
            temp_beer_c: Some(self.temp_beer_c),
            vol_remaining_ml: Some(self.volume_ml),
            vol_total_ml: Some(self.capacity_ml),
            beer_name: Some(self.beer_name.clone()),
        }
    }

    pub fn start_pump(&mut self, config: PumpConfig) -> Vec<KegOutput> {
        if self.is_pumping() {
            return Vec::new();
        }
        if self.volume_ml <= 0.0 {
            warn!(keg_id = %self.keg_id, "pump start refused: keg is empty");
            return vec![self.empty_event("start requested on empty keg")];
        }

        let duty = f64::from(config.pwm_duty.unwrap_or(100).min(100));
        self.state = KegState::Pumping;
        self.flow_lpm = self.nominal_flow_lpm * duty / 100.0;
        self.pumped_ms = 0;
        self.timeout_ms = config.timeout_ms;
        info!(keg_id = %self.keg_id, flow_lpm = self.flow_lpm, "pump started");
        Vec::new()
    }

    /// Advance the pump by `dt`. Does nothing while idle.
    pub fn tick(&mut self, dt: Duration) -> Vec<KegOutput> {
        if !self.is_pumping() {
            return Vec::new();
        }

        let drawn = flow_volume_ml(self.flow_lpm, dt.as_secs_f64());
        self.volume_ml = (self.volume_ml - drawn).max(0.0);
        self.pumped_ms += dt.as_millis() as u64;
        debug!(keg_id = %self.keg_id, volume_ml = self.volume_ml, "tick");

        if self.volume_ml <= 0.0 {
            self.halt();
            info!(keg_id = %self.keg_id, "keg ran dry");
            return vec![
                KegOutput::Status(self.status()),
                self.empty_event("volume depleted"),
            ];
        }

        let mut outputs = vec![KegOutput::Status(self.status())];
        if self.timeout_ms.is_some_and(|limit| self.pumped_ms >= limit) {
            warn!(keg_id = %self.keg_id, pumped_ms = self.pumped_ms, "pump timeout reached");
            outputs.extend(self.stop_pump());
        }
        outputs
    }

    pub fn stop_pump(&mut self) -> Vec<KegOutput> {
        if !self.is_pumping() {
            return Vec::new();
        }
        self.halt();
        info!(keg_id = %self.keg_id, volume_ml = self.volume_ml, "pump stopped");
        vec![KegOutput::Status(self.status())]
    }

    /// Swap in a fresh keg at the cellar. Refused while pumping.
    pub fn refill(&mut self) -> Vec<KegOutput> {
        if self.is_pumping() {
            warn!(keg_id = %self.keg_id, "refill refused while pumping");
            return Vec::new();
        }
        self.volume_ml = self.capacity_ml;
        info!(keg_id = %self.keg_id, volume_ml = self.volume_ml, "keg refilled");
        vec![KegOutput::Status(self.status())]
    }

    fn halt(&mut self) {
        self.state = KegState::Idle;
        self.flow_lpm = 0.0;
        self.timeout_ms = None;
    }

    fn empty_event(&self, reason: &str) -> KegOutput {
        KegOutput::Event(KegEvent::EmptyDetected {
            reason: reason.to_string(),
            timestamp: epoch_millis(),
        })
    }
}
