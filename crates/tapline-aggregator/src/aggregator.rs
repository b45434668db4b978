//! Message reconciliation, persistence and heartbeat detection.
//!
//! Every handler takes the current time and returns the viewer events it
//! produced. Persistence failures are logged and never abort a handler;
//! the in-memory session and the fan-out always proceed.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use tapline_analytics::{ConsumptionTracker, UsageAnalyzer};
use tapline_bus::Message;
use tapline_core::config::{AggregatorConfig, BrokerConfig};
use tapline_core::{keg_key, DisplayState, KegEvent, KegState, KegStatus, TapTopic, UNKNOWN_BEER};
use tapline_state::{InventoryRecord, InventoryStatus, StateStore, TelemetrySample};

use crate::error::{AggregatorError, AggregatorResult};
use crate::events::ViewerEvent;
use crate::session::{KegRuntime, ReadingPolicy, TapSession};

/// Settings key holding the persisted broker configuration.
pub const BROKER_SETTING: &str = "broker";

const HISTORY_HOURS: u64 = 24;

/// Authoritative live state of every tap.
pub struct Aggregator {
    state: StateStore,
    analyzer: UsageAnalyzer,
    tracker: ConsumptionTracker,
    sessions: BTreeMap<String, TapSession>,
    heartbeat_timeout: Duration,
    low_stock_ml: f64,
    default_broker: BrokerConfig,
}

impl Aggregator {
    pub fn new(state: StateStore) -> Self {
        let defaults = AggregatorConfig::default();
        Self {
            analyzer: UsageAnalyzer::new(state.clone()),
            state,
            tracker: ConsumptionTracker::new(),
            sessions: BTreeMap::new(),
            heartbeat_timeout: defaults.heartbeat_timeout(),
            low_stock_ml: defaults.low_stock_ml,
            default_broker: BrokerConfig::default(),
        }
    }

    /// Apply the `[aggregator]` section of the config file.
    pub fn with_config(mut self, config: &AggregatorConfig) -> Self {
        self.heartbeat_timeout = config.heartbeat_timeout();
        self.low_stock_ml = config.low_stock_ml;
        self
    }

    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    pub fn with_low_stock_ml(mut self, threshold: f64) -> Self {
        self.low_stock_ml = threshold;
        self
    }

    /// Broker config reported until one is stored.
    pub fn with_default_broker(mut self, broker: BrokerConfig) -> Self {
        self.default_broker = broker;
        self
    }

    pub fn session(&self, tap_id: &str) -> Option<&TapSession> {
        self.sessions.get(tap_id)
    }

    /// All sessions ordered by tap id.
    pub fn list_taps(&self) -> Vec<TapSession> {
        self.sessions.values().cloned().collect()
    }

    /// Create a session for an unseen tap. Returns whether one was created.
    pub fn upsert_session(&mut self, tap_id: &str, now_ms: u64) -> bool {
        if self.sessions.contains_key(tap_id) {
            return false;
        }
        self.sessions
            .insert(tap_id.to_string(), TapSession::new(tap_id, now_ms));
        info!(%tap_id, "tap auto-registered");
        true
    }

    /// Route a raw bus message to its handler.
    pub fn on_message(&mut self, msg: &Message, now_ms: u64) -> Vec<ViewerEvent> {
        match TapTopic::parse(&msg.topic) {
            Some(TapTopic::Display { tap }) => match msg.json::<DisplayState>() {
                Ok(display) => self.on_display_message(&tap, display, now_ms),
                Err(e) => skip(&msg.topic, &e),
            },
            Some(TapTopic::KegStatus { tap, keg }) => match msg.json::<KegStatus>() {
                Ok(status) => self.on_keg_status_message(&tap, &keg, status, now_ms),
                Err(e) => skip(&msg.topic, &e),
            },
            Some(TapTopic::KegEvent { tap, keg }) => match msg.json::<KegEvent>() {
                Ok(event) => self.on_keg_event_message(&tap, &keg, event, now_ms),
                Err(e) => skip(&msg.topic, &e),
            },
            Some(TapTopic::UiEvent { .. } | TapTopic::KegCommand { .. }) => {
                trace!(topic = %msg.topic, "not for the aggregator");
                Vec::new()
            }
            None => {
                warn!(topic = %msg.topic, "ignoring message on unknown topic");
                Vec::new()
            }
        }
    }

    pub fn on_display_message(
        &mut self,
        tap_id: &str,
        display: DisplayState,
        now_ms: u64,
    ) -> Vec<ViewerEvent> {
        self.upsert_session(tap_id, now_ms);
        let mut events = Vec::new();
        let Some(session) = self.sessions.get_mut(tap_id) else {
            return events;
        };

        heartbeat(session, now_ms, &mut events);
        session.display = display;
        debug!(%tap_id, view = ?session.display.view, "display updated");
        events.push(tap_update(session));
        events
    }

    pub fn on_keg_status_message(
        &mut self,
        tap_id: &str,
        keg_id: &str,
        status: KegStatus,
        now_ms: u64,
    ) -> Vec<ViewerEvent> {
        let key = keg_key(tap_id, keg_id);
        let beer_name = status
            .beer_name
            .clone()
            .or_else(|| self.tracker.beer_name(&key).map(str::to_string))
            .unwrap_or_else(|| UNKNOWN_BEER.to_string());

        let created = self.upsert_session(tap_id, now_ms);
        let mut events = Vec::new();
        let Some(session) = self.sessions.get_mut(tap_id) else {
            return events;
        };
        if created {
            session.display = DisplayState::placeholder(&beer_name);
            events.push(tap_update(session));
        }
        heartbeat(session, now_ms, &mut events);

        let policy = ReadingPolicy::for_status(&status);
        let runtime = policy.apply(keg_id, session.kegs.get(keg_id), &status);
        session.update_keg(runtime.clone());
        debug!(%tap_id, %keg_id, ?policy, volume_ml = runtime.volume_remaining_ml, "keg status");

        self.persist_reading(tap_id, &beer_name, &runtime, now_ms);

        if let Some(delta) = self.tracker.observe(&key, runtime.volume_remaining_ml, &beer_name)
            && let Err(e) = self
                .analyzer
                .record_consumption(now_ms / 1000, &beer_name, delta)
        {
            warn!(%tap_id, %keg_id, error = %e, "failed to record consumption");
        }

        events.push(ViewerEvent::KegUpdate {
            tap_id: tap_id.to_string(),
            beer_name: beer_name.clone(),
            keg: runtime.clone(),
        });

        if runtime.state == KegState::Idle && runtime.volume_remaining_ml < self.low_stock_ml {
            events.extend(self.raise_order(tap_id, keg_id, &beer_name, now_ms));
        }
        events
    }

    pub fn on_keg_event_message(
        &mut self,
        tap_id: &str,
        keg_id: &str,
        event: KegEvent,
        now_ms: u64,
    ) -> Vec<ViewerEvent> {
        self.upsert_session(tap_id, now_ms);
        let mut events = Vec::new();
        if let Some(session) = self.sessions.get_mut(tap_id) {
            heartbeat(session, now_ms, &mut events);
        }

        let KegEvent::EmptyDetected { reason, .. } = event;
        info!(%tap_id, %keg_id, %reason, "keg reported empty");
        if let Err(e) = self.state.mark_keg_empty(tap_id, keg_id, now_ms) {
            warn!(%tap_id, %keg_id, error = %e, "failed to mark keg empty");
        }

        events.push(ViewerEvent::Alert {
            tap_id: tap_id.to_string(),
            keg_id: Some(keg_id.to_string()),
            message: format!("keg {keg_id} on tap {tap_id} is empty"),
        });
        events
    }

    /// Mark taps silent for longer than the heartbeat timeout as
    /// disconnected. Each silence is reported once.
    pub fn sweep(&mut self, now_ms: u64) -> Vec<ViewerEvent> {
        let timeout_ms = self.heartbeat_timeout.as_millis() as u64;
        let mut events = Vec::new();
        for session in self.sessions.values_mut() {
            let silent_for = now_ms.saturating_sub(session.last_heartbeat_ms);
            if session.connected && silent_for > timeout_ms {
                session.connected = false;
                warn!(tap_id = %session.tap_id, silent_for_ms = silent_for, "tap disconnected");
                events.push(ViewerEvent::TapStatusChanged {
                    tap_id: session.tap_id.clone(),
                    connected: false,
                });
            }
        }
        events
    }

    /// Forget a tap and its inventory.
    pub fn delete_tap(&mut self, tap_id: &str) -> AggregatorResult<Vec<ViewerEvent>> {
        if self.sessions.remove(tap_id).is_none() {
            return Err(AggregatorError::NotFound(format!("tap {tap_id}")));
        }
        self.tracker.forget_prefix(&format!("{tap_id}:"));
        match self.state.delete_inventory_for_tap(tap_id) {
            Ok(count) => info!(%tap_id, kegs = count, "tap deleted"),
            Err(e) => warn!(%tap_id, error = %e, "failed to delete inventory"),
        }
        Ok(vec![ViewerEvent::TapDeleted {
            tap_id: tap_id.to_string(),
        }])
    }

    /// Stored broker config, or the default if none was saved.
    pub fn broker_config(&self) -> AggregatorResult<BrokerConfig> {
        Ok(self
            .state
            .get_setting(BROKER_SETTING)?
            .unwrap_or_else(|| self.default_broker.clone()))
    }

    pub fn set_broker_config(&mut self, broker: &BrokerConfig) -> AggregatorResult<()> {
        self.state.put_setting(BROKER_SETTING, broker)?;
        info!(host = %broker.host, port = broker.port, "broker config updated");
        Ok(())
    }

    /// Close a restock order and publish the new order list.
    pub fn fulfil_order(&mut self, order_id: u64) -> AggregatorResult<Vec<ViewerEvent>> {
        let order = self.state.mark_order_fulfilled(order_id)?;
        info!(order_id, tap_id = %order.tap_id, keg_id = %order.keg_id, "order fulfilled");
        Ok(vec![ViewerEvent::OrdersData {
            orders: self.state.list_orders()?,
        }])
    }

    /// Full current state, replayed to a newly attached viewer.
    pub fn snapshot(&self, now_ms: u64) -> Vec<ViewerEvent> {
        let mut events = Vec::new();
        for session in self.sessions.values() {
            events.push(tap_update(session));
            for keg in session.kegs.values() {
                let beer_name = self
                    .tracker
                    .beer_name(&keg_key(&session.tap_id, &keg.keg_id))
                    .unwrap_or(UNKNOWN_BEER)
                    .to_string();
                events.push(ViewerEvent::KegUpdate {
                    tap_id: session.tap_id.clone(),
                    beer_name,
                    keg: keg.clone(),
                });
            }
        }

        match self.state.list_inventory() {
            Ok(inventory) => events.push(ViewerEvent::InventoryData { inventory }),
            Err(e) => warn!(error = %e, "snapshot: inventory unavailable"),
        }
        match self.analyzer.usage_history(now_ms / 1000, HISTORY_HOURS) {
            Ok(history) => events.push(ViewerEvent::HistoryData { history }),
            Err(e) => warn!(error = %e, "snapshot: usage history unavailable"),
        }
        match self.state.list_orders() {
            Ok(orders) => events.push(ViewerEvent::OrdersData { orders }),
            Err(e) => warn!(error = %e, "snapshot: orders unavailable"),
        }
        events
    }

    fn persist_reading(&self, tap_id: &str, beer_name: &str, runtime: &KegRuntime, now_ms: u64) {
        let status = if runtime.volume_remaining_ml <= 0.0 {
            InventoryStatus::Empty
        } else if runtime.state == KegState::Pumping {
            InventoryStatus::Active
        } else {
            InventoryStatus::Standby
        };

        let record = InventoryRecord {
            tap_id: tap_id.to_string(),
            keg_id: runtime.keg_id.clone(),
            beer_name: beer_name.to_string(),
            total_volume_ml: runtime.total_volume_ml,
            remaining_volume_ml: runtime.volume_remaining_ml,
            status,
            updated_at_ms: now_ms,
        };
        if let Err(e) = self.state.put_inventory(&record) {
            warn!(%tap_id, keg_id = %runtime.keg_id, error = %e, "failed to persist inventory");
        }

        let sample = TelemetrySample {
            timestamp_ms: now_ms,
            tap_id: tap_id.to_string(),
            keg_id: runtime.keg_id.clone(),
            volume_remaining_ml: runtime.volume_remaining_ml,
            flow_lpm: runtime.flow_lpm,
            temp_beer_c: runtime.temp_beer_c,
        };
        if let Err(e) = self.state.append_telemetry(&sample) {
            warn!(%tap_id, keg_id = %runtime.keg_id, error = %e, "failed to persist telemetry");
        }
    }

    fn raise_order(&self, tap_id: &str, keg_id: &str, beer_name: &str, now_ms: u64) -> Vec<ViewerEvent> {
        let order = match self.state.create_order_if_absent(tap_id, keg_id, beer_name, now_ms) {
            Ok(Some(order)) => order,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(%tap_id, %keg_id, error = %e, "failed to create order");
                return Vec::new();
            }
        };
        info!(order_id = order.id, %tap_id, %keg_id, %beer_name, "restock order created");

        let mut events = vec![ViewerEvent::Alert {
            tap_id: tap_id.to_string(),
            keg_id: Some(keg_id.to_string()),
            message: format!("low stock: order #{} placed for {beer_name}", order.id),
        }];
        match self.state.list_orders() {
            Ok(orders) => events.push(ViewerEvent::OrdersData { orders }),
            Err(e) => warn!(error = %e, "failed to list orders"),
        }
        events
    }
}

fn heartbeat(session: &mut TapSession, now_ms: u64, events: &mut Vec<ViewerEvent>) {
    session.last_heartbeat_ms = now_ms;
    if !session.connected {
        session.connected = true;
        info!(tap_id = %session.tap_id, "tap reconnected");
        events.push(ViewerEvent::TapStatusChanged {
            tap_id: session.tap_id.clone(),
            connected: true,
        });
    }
}

fn tap_update(session: &TapSession) -> ViewerEvent {
    ViewerEvent::TapUpdate {
        tap_id: session.tap_id.clone(),
        display: session.display.clone(),
        connected: session.connected,
    }
}

fn skip(topic: &str, error: &tapline_bus::BusError) -> Vec<ViewerEvent> {
    warn!(%topic, %error, "dropping malformed payload");
    Vec::new()
}
