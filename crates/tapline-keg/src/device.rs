//! Keg device task: drives a [`KegModel`] from bus commands.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use tapline_bus::{Bus, BusResult, Subscription};
use tapline_core::{KegCommand, TapTopic};

use crate::model::{KegModel, KegOutput};

/// Spawns keg device tasks.
pub struct KegDevice;

impl KegDevice {
    /// Start a device task for `model` on tap `tap_id`.
    ///
    /// The command subscription is taken before the task starts, so
    /// commands published right after `spawn` returns are not lost. The
    /// device announces itself with one status sample.
    pub fn spawn(
        bus: &Bus,
        tap_id: &str,
        model: KegModel,
        shutdown: watch::Receiver<bool>,
    ) -> BusResult<JoinHandle<()>> {
        let commands = bus.subscribe(&TapTopic::keg_command(tap_id, model.keg_id()).to_string())?;
        let device = Device {
            bus: bus.clone(),
            status_topic: TapTopic::keg_status(tap_id, model.keg_id()).to_string(),
            event_topic: TapTopic::keg_event(tap_id, model.keg_id()).to_string(),
            tap_id: tap_id.to_string(),
            model,
        };

        Ok(tokio::spawn(device.run(commands, shutdown)))
    }
}

struct Device {
    bus: Bus,
    tap_id: String,
    status_topic: String,
    event_topic: String,
    model: KegModel,
}

impl Device {
    async fn run(mut self, mut commands: Subscription, mut shutdown: watch::Receiver<bool>) {
        let tick = self.model.tick_period();
        // Exists only while the pump runs.
        let mut ticker: Option<Interval> = None;

        info!(tap_id = %self.tap_id, keg_id = %self.model.keg_id(), "keg device online");
        let announce = KegOutput::Status(self.model.status());
        self.publish(&[announce]);

        loop {
            tokio::select! {
                msg = commands.recv() => {
                    let Some(msg) = msg else { break };
                    let command = match msg.json::<KegCommand>() {
                        Ok(command) => command,
                        Err(e) => {
                            warn!(tap_id = %self.tap_id, error = %e, "dropping malformed keg command");
                            continue;
                        }
                    };
                    debug!(tap_id = %self.tap_id, keg_id = %self.model.keg_id(), ?command, "command");
                    let outputs = match command {
                        KegCommand::StartPump(config) => self.model.start_pump(config),
                        KegCommand::StopPump => self.model.stop_pump(),
                        KegCommand::Refill => self.model.refill(),
                    };
                    self.publish(&outputs);
                }
                _ = next_tick(&mut ticker) => {
                    let outputs = self.model.tick(tick);
                    self.publish(&outputs);
                }
                _ = shutdown.changed() => {
                    debug!(tap_id = %self.tap_id, keg_id = %self.model.keg_id(), "keg device shutting down");
                    break;
                }
            }

            match (self.model.is_pumping(), ticker.is_some()) {
                (true, false) => {
                    let mut t = interval_at(Instant::now() + tick, tick);
                    t.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    ticker = Some(t);
                }
                (false, true) => ticker = None,
                _ => {}
            }
        }
    }

    fn publish(&self, outputs: &[KegOutput]) {
        for output in outputs {
            let result = match output {
                KegOutput::Status(status) => self.bus.publish_json(&self.status_topic, status),
                KegOutput::Event(event) => self.bus.publish_json(&self.event_topic, event),
            };
            if let Err(e) = result {
                warn!(tap_id = %self.tap_id, keg_id = %self.model.keg_id(), error = %e, "publish failed");
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending().await,
    }
}
