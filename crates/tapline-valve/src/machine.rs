//! Valve box state machine.
//!
//! ```text
//!            PourStart                 EMPTY_DETECTED (active keg)
//!   IDLE ───────────────▶ POURING ─────────────────────────▶ SWAPPING
//!    ▲  ◀─────────────────   │                                  │
//!    │       PourStop        │            SwapElapsed           │
//!    │                       ◀──────── (pour requested) ────────┤
//!    └────────────────── (no pour, or next keg exhausted) ◀─────┘
//! ```
//!
//! The machine never touches the bus; [`ValveBox::handle`] returns the
//! commands, display updates and timer requests for the caller to carry
//! out.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, info, warn};

use tapline_core::{
    DisplayState, KegCommand, KegEvent, KegStatus, PumpConfig, SwapNotice, View,
};

use crate::error::{ValveError, ValveResult};

/// Displayed percent below which the low-level alert is shown.
pub const LOW_LEVEL_PCT: f64 = 10.0;

/// Alert shown when a pour cannot be served by any keg.
pub const NO_KEGS_ALERT: &str = "no kegs available";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveState {
    Idle,
    Pouring,
    Swapping,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValveInput {
    PourStart,
    PourStop,
    KegStatus { keg_id: String, status: KegStatus },
    KegEvent { keg_id: String, event: KegEvent },
    SwapElapsed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValveOutput {
    Command { keg_id: String, command: KegCommand },
    Display(DisplayState),
    ArmSwapTimer(Duration),
}

/// Failover controller for one tap.
#[derive(Debug, Clone)]
pub struct ValveBox {
    tap_id: String,
    beer_name: String,
    kegs: Vec<String>,
    active_index: usize,
    state: ValveState,
    /// User intent to pour, kept across a swap.
    pour_requested: bool,
    volume_pct: f64,
    swap_delay: Duration,
    swap: Option<SwapNotice>,
    /// Kegs that reported empty and have not shown volume since.
    exhausted: HashSet<String>,
    blocked: bool,
}

impl ValveBox {
    pub fn new(
        tap_id: &str,
        beer_name: &str,
        kegs: Vec<String>,
        swap_delay: Duration,
    ) -> ValveResult<Self> {
        if kegs.is_empty() {
            return Err(ValveError::NoKegs(tap_id.to_string()));
        }
        Ok(Self {
            tap_id: tap_id.to_string(),
            beer_name: beer_name.to_string(),
            kegs,
            active_index: 0,
            state: ValveState::Idle,
            pour_requested: false,
            volume_pct: 100.0,
            swap_delay,
            swap: None,
            exhausted: HashSet::new(),
            blocked: false,
        })
    }

    pub fn state(&self) -> ValveState {
        self.state
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn active_keg(&self) -> &str {
        &self.kegs[self.active_index]
    }

    pub fn kegs(&self) -> &[String] {
        &self.kegs
    }

    /// Current screen state.
    pub fn display(&self) -> DisplayState {
        let (view, pct) = match self.state {
            ValveState::Idle => (View::Idle, self.volume_pct),
            ValveState::Pouring => (View::Pouring, self.volume_pct),
            ValveState::Swapping => (View::Swapping, 0.0),
        };

        let alert = if self.blocked {
            Some(NO_KEGS_ALERT.to_string())
        } else if self.state != ValveState::Swapping && pct < LOW_LEVEL_PCT {
            Some(format!("low keg level: {pct:.0}% remaining"))
        } else {
            None
        };

        DisplayState {
            view,
            beer_name: self.beer_name.clone(),
            volume_remaining_pct: pct,
            alert,
            swap: self.swap.clone(),
        }
    }

    /// Feed one input through the machine.
    pub fn handle(&mut self, input: ValveInput) -> Vec<ValveOutput> {
        match input {
            ValveInput::PourStart => self.on_pour_start(),
            ValveInput::PourStop => self.on_pour_stop(),
            ValveInput::KegStatus { keg_id, status } => self.on_keg_status(&keg_id, &status),
            ValveInput::KegEvent { keg_id, event } => self.on_keg_event(&keg_id, &event),
            ValveInput::SwapElapsed => self.on_swap_elapsed(),
        }
    }

    fn on_pour_start(&mut self) -> Vec<ValveOutput> {
        if self.state == ValveState::Swapping {
            debug!(tap_id = %self.tap_id, "pour requested during swap");
            self.pour_requested = true;
            return Vec::new();
        }

        if self.kegs.iter().all(|k| self.exhausted.contains(k)) {
            warn!(tap_id = %self.tap_id, "pour refused: every keg is exhausted");
            self.state = ValveState::Idle;
            self.pour_requested = false;
            self.blocked = true;
            return vec![ValveOutput::Display(self.display())];
        }

        self.pour_requested = true;
        self.blocked = false;
        self.state = ValveState::Pouring;
        vec![
            self.command(KegCommand::StartPump(PumpConfig::default())),
            ValveOutput::Display(self.display()),
        ]
    }

    fn on_pour_stop(&mut self) -> Vec<ValveOutput> {
        self.pour_requested = false;
        if self.state != ValveState::Pouring {
            return Vec::new();
        }
        self.state = ValveState::Idle;
        vec![
            self.command(KegCommand::StopPump),
            ValveOutput::Display(self.display()),
        ]
    }

    fn on_keg_status(&mut self, keg_id: &str, status: &KegStatus) -> Vec<ValveOutput> {
        if status.vol_remaining_ml.is_some_and(|v| v > 0.0) && self.exhausted.remove(keg_id) {
            debug!(tap_id = %self.tap_id, %keg_id, "keg back in service");
        }

        if keg_id != self.active_keg() {
            return Vec::new();
        }

        if let (Some(remaining), Some(total)) = (status.vol_remaining_ml, status.vol_total_ml)
            && total > 0.0
        {
            self.volume_pct = (remaining / total * 100.0).clamp(0.0, 100.0);
        }
        if self.blocked && !self.exhausted.contains(keg_id) {
            self.blocked = false;
        }
        vec![ValveOutput::Display(self.display())]
    }

    fn on_keg_event(&mut self, keg_id: &str, event: &KegEvent) -> Vec<ValveOutput> {
        let KegEvent::EmptyDetected { reason, .. } = event;
        self.exhausted.insert(keg_id.to_string());

        if keg_id != self.active_keg() || self.state == ValveState::Swapping {
            return Vec::new();
        }

        let from = keg_id.to_string();
        let mut outputs = vec![self.command(KegCommand::StopPump)];

        self.pour_requested = self.state == ValveState::Pouring;
        self.state = ValveState::Swapping;
        self.active_index = (self.active_index + 1) % self.kegs.len();
        let to = self.active_keg().to_string();
        self.swap = Some(SwapNotice {
            from_keg: from.clone(),
            to_keg: to.clone(),
        });
        info!(tap_id = %self.tap_id, %from, %to, %reason, "keg empty, swapping");

        outputs.push(ValveOutput::Display(self.display()));
        self.volume_pct = 100.0;
        outputs.push(ValveOutput::ArmSwapTimer(self.swap_delay));
        outputs
    }

    fn on_swap_elapsed(&mut self) -> Vec<ValveOutput> {
        if self.state != ValveState::Swapping {
            return Vec::new();
        }
        self.swap = None;

        if self.exhausted.contains(self.active_keg()) {
            warn!(tap_id = %self.tap_id, keg_id = %self.active_keg(), "next keg is exhausted");
            self.state = ValveState::Idle;
            self.pour_requested = false;
            self.blocked = true;
            return vec![ValveOutput::Display(self.display())];
        }

        if self.pour_requested {
            self.state = ValveState::Pouring;
            info!(tap_id = %self.tap_id, keg_id = %self.active_keg(), "swap complete, resuming pour");
            vec![
                self.command(KegCommand::StartPump(PumpConfig::default())),
                ValveOutput::Display(self.display()),
            ]
        } else {
            self.state = ValveState::Idle;
            info!(tap_id = %self.tap_id, keg_id = %self.active_keg(), "swap complete");
            vec![ValveOutput::Display(self.display())]
        }
    }

    fn command(&self, command: KegCommand) -> ValveOutput {
        ValveOutput::Command {
            keg_id: self.active_keg().to_string(),
            command,
        }
    }
}
