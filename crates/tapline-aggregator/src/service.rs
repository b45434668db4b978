//! Aggregator task and its handle.
//!
//! One task owns the [`Aggregator`]; bus messages, handle requests and the
//! heartbeat sweep are serialized through its select loop. Callers talk to
//! it over an `mpsc` channel with `oneshot` replies.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

use tapline_bus::{Bus, Subscription};
use tapline_core::config::BrokerConfig;
use tapline_core::epoch_millis;

use crate::aggregator::Aggregator;
use crate::error::{AggregatorError, AggregatorResult};
use crate::events::ViewerEvent;
use crate::session::TapSession;

/// Bus messages handled back to back before pending requests and the
/// sweep get a turn.
const MAX_INBOUND_BURST: usize = 64;

/// Live feed of viewer events. Dropping it detaches the viewer.
pub type ViewerStream = mpsc::UnboundedReceiver<ViewerEvent>;

enum Request {
    ListTaps {
        reply: oneshot::Sender<Vec<TapSession>>,
    },
    DeleteTap {
        tap_id: String,
        reply: oneshot::Sender<AggregatorResult<()>>,
    },
    GetBroker {
        reply: oneshot::Sender<AggregatorResult<BrokerConfig>>,
    },
    SetBroker {
        broker: BrokerConfig,
        reply: oneshot::Sender<AggregatorResult<()>>,
    },
    FulfilOrder {
        order_id: u64,
        reply: oneshot::Sender<AggregatorResult<()>>,
    },
    AttachViewer {
        reply: oneshot::Sender<ViewerStream>,
    },
}

/// Cloneable handle to a running aggregator task.
#[derive(Clone)]
pub struct AggregatorHandle {
    tx: mpsc::Sender<Request>,
}

impl AggregatorHandle {
    pub async fn list_taps(&self) -> AggregatorResult<Vec<TapSession>> {
        self.call(|reply| Request::ListTaps { reply }).await
    }

    /// Remove a tap; `NotFound` if the aggregator never saw it.
    pub async fn delete_tap(&self, tap_id: &str) -> AggregatorResult<()> {
        let tap_id = tap_id.to_string();
        self.call(|reply| Request::DeleteTap { tap_id, reply }).await?
    }

    pub async fn broker_config(&self) -> AggregatorResult<BrokerConfig> {
        self.call(|reply| Request::GetBroker { reply }).await?
    }

    pub async fn set_broker_config(&self, broker: BrokerConfig) -> AggregatorResult<()> {
        self.call(|reply| Request::SetBroker { broker, reply }).await?
    }

    pub async fn fulfil_order(&self, order_id: u64) -> AggregatorResult<()> {
        self.call(|reply| Request::FulfilOrder { order_id, reply }).await?
    }

    /// Attach a viewer. The stream starts with a replay of the current
    /// state and continues with live updates.
    pub async fn attach_viewer(&self) -> AggregatorResult<ViewerStream> {
        self.call(|reply| Request::AttachViewer { reply }).await
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Request) -> AggregatorResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| AggregatorError::Closed)?;
        rx.await.map_err(|_| AggregatorError::Closed)
    }
}

/// Spawns the aggregator task.
pub struct AggregatorService;

impl AggregatorService {
    /// Subscribe `aggregator` to every tap on `bus` and run it until
    /// `shutdown` fires. Taps are swept for silence every `sweep_interval`.
    pub fn spawn(
        bus: &Bus,
        aggregator: Aggregator,
        sweep_interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> AggregatorResult<(AggregatorHandle, JoinHandle<()>)> {
        if sweep_interval.is_zero() {
            return Err(AggregatorError::ZeroSweepInterval);
        }
        let inbound = bus.subscribe("#")?;
        let (tx, rx) = mpsc::channel(64);
        let task = Service {
            aggregator,
            viewers: Vec::new(),
            clock: Clock::start(),
        };
        let handle = tokio::spawn(task.run(inbound, rx, sweep_interval, shutdown));
        Ok((AggregatorHandle { tx }, handle))
    }
}

struct Service {
    aggregator: Aggregator,
    viewers: Vec<mpsc::UnboundedSender<ViewerEvent>>,
    clock: Clock,
}

/// Wall-clock milliseconds advanced by the runtime's monotonic clock.
struct Clock {
    started: Instant,
    epoch_ms: u64,
}

impl Clock {
    fn start() -> Self {
        Self {
            started: Instant::now(),
            epoch_ms: epoch_millis(),
        }
    }

    fn now_ms(&self) -> u64 {
        let elapsed = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.epoch_ms.saturating_add(elapsed)
    }
}

impl Service {
    async fn run(
        mut self,
        mut inbound: Subscription,
        mut requests: mpsc::Receiver<Request>,
        sweep_interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut sweep = interval(sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(sweep_interval = ?sweep_interval, "aggregator started");
        let mut burst = 0usize;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    debug!("aggregator shutting down");
                    break;
                }
                msg = inbound.recv(), if burst < MAX_INBOUND_BURST => {
                    let Some(msg) = msg else { break };
                    burst += 1;
                    let events = self.aggregator.on_message(&msg, self.clock.now_ms());
                    self.broadcast(events);
                }
                Some(request) = requests.recv() => {
                    burst = 0;
                    self.serve(request);
                }
                _ = sweep.tick() => {
                    burst = 0;
                    let events = self.aggregator.sweep(self.clock.now_ms());
                    self.broadcast(events);
                }
                // Nothing else was waiting; resume reading the bus.
                _ = std::future::ready(()), if burst >= MAX_INBOUND_BURST => burst = 0,
            }
        }
        info!("aggregator stopped");
    }

    fn serve(&mut self, request: Request) {
        match request {
            Request::ListTaps { reply } => {
                let _ = reply.send(self.aggregator.list_taps());
            }
            Request::DeleteTap { tap_id, reply } => {
                let result = self.aggregator.delete_tap(&tap_id).map(|events| self.broadcast(events));
                let _ = reply.send(result);
            }
            Request::GetBroker { reply } => {
                let _ = reply.send(self.aggregator.broker_config());
            }
            Request::SetBroker { broker, reply } => {
                let _ = reply.send(self.aggregator.set_broker_config(&broker));
            }
            Request::FulfilOrder { order_id, reply } => {
                let result = self.aggregator.fulfil_order(order_id).map(|events| self.broadcast(events));
                let _ = reply.send(result);
            }
            Request::AttachViewer { reply } => {
                let (tx, rx) = mpsc::unbounded_channel();
                for event in self.aggregator.snapshot(self.clock.now_ms()) {
                    let _ = tx.send(event);
                }
                if reply.send(rx).is_ok() {
                    self.viewers.push(tx);
                    debug!(viewers = self.viewers.len(), "viewer attached");
                }
            }
        }
    }

    fn broadcast(&mut self, events: Vec<ViewerEvent>) {
        if events.is_empty() {
            return;
        }
        let before = self.viewers.len();
        self.viewers.retain(|viewer| {
            events.iter().all(|event| viewer.send(event.clone()).is_ok())
        });
        if self.viewers.len() < before {
            debug!(viewers = self.viewers.len(), "viewer detached");
        }
    }
}
