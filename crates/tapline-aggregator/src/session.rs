//! Live per-tap state and the rules for reading keg telemetry into it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use tapline_core::{DisplayState, KegState, KegStatus, UNKNOWN_BEER};

/// Runtime view of one keg, as last reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KegRuntime {
    pub keg_id: String,
    pub state: KegState,
    pub volume_remaining_ml: f64,
    pub total_volume_ml: f64,
    pub flow_lpm: f64,
    pub temp_beer_c: f64,
}

/// Everything the aggregator knows about one tap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TapSession {
    pub tap_id: String,
    pub display: DisplayState,
    /// Keg that is pumping, or that reported most recently while none is.
    pub active_keg: Option<KegRuntime>,
    /// Every keg seen on this tap.
    pub kegs: BTreeMap<String, KegRuntime>,
    pub last_heartbeat_ms: u64,
    pub connected: bool,
}

impl TapSession {
    pub fn new(tap_id: &str, now_ms: u64) -> Self {
        Self {
            tap_id: tap_id.to_string(),
            display: DisplayState::placeholder(UNKNOWN_BEER),
            active_keg: None,
            kegs: BTreeMap::new(),
            last_heartbeat_ms: now_ms,
            connected: true,
        }
    }

    /// Store `runtime` and decide whether it becomes the active keg.
    pub fn update_keg(&mut self, runtime: KegRuntime) {
        let takes_over = match &self.active_keg {
            None => true,
            Some(active) => {
                active.keg_id == runtime.keg_id
                    || runtime.state == KegState::Pumping
                    || active.state != KegState::Pumping
            }
        };
        if takes_over {
            self.active_keg = Some(runtime.clone());
        }
        self.kegs.insert(runtime.keg_id.clone(), runtime);
    }
}

/// How missing fields in a status payload are filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingPolicy {
    /// The keg is measuring: take values verbatim and keep the previous
    /// value for any field the payload left out. Never substitute zeros.
    TrustWhilePumping,
    /// Missing numerics read as zero, missing state as `IDLE`.
    DefaultWhileIdle,
}

impl ReadingPolicy {
    pub fn for_status(status: &KegStatus) -> Self {
        if status.state == Some(KegState::Pumping) {
            Self::TrustWhilePumping
        } else {
            Self::DefaultWhileIdle
        }
    }

    /// Resolve a payload into a full runtime record.
    pub fn apply(self, keg_id: &str, previous: Option<&KegRuntime>, status: &KegStatus) -> KegRuntime {
        let (state, volume, flow, temp) = match self {
            Self::TrustWhilePumping => {
                // A keg with no history has nothing to carry over.
                let prev = |f: fn(&KegRuntime) -> f64| previous.map(f).unwrap_or(0.0);
                (
                    KegState::Pumping,
                    status
                        .vol_remaining_ml
                        .unwrap_or_else(|| prev(|p| p.volume_remaining_ml)),
                    status.flow_lpm.unwrap_or_else(|| prev(|p| p.flow_lpm)),
                    status.temp_beer_c.unwrap_or_else(|| prev(|p| p.temp_beer_c)),
                )
            }
            Self::DefaultWhileIdle => (
                status.state.unwrap_or(KegState::Idle),
                status.vol_remaining_ml.unwrap_or(0.0),
                status.flow_lpm.unwrap_or(0.0),
                status.temp_beer_c.unwrap_or(0.0),
            ),
        };

        let volume = volume.max(0.0);
        let total = status
            .vol_total_ml
            .or_else(|| previous.map(|p| p.total_volume_ml))
            .unwrap_or(volume)
            .max(volume);

        KegRuntime {
            keg_id: keg_id.to_string(),
            state,
            volume_remaining_ml: volume,
            total_volume_ml: total,
            flow_lpm: flow,
            temp_beer_c: temp,
        }
    }
}
