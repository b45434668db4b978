//! Pour simulator: a bartender pulling pours and a cellar swapping
//! drained kegs.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use tapline_bus::{Bus, BusResult};
use tapline_core::{epoch_millis, KegCommand, KegEvent, PourEvent, TapTopic, UiEvent};

pub struct PourSimulator {
    /// How long each pour holds the tap open.
    pub pour_for: Duration,
    /// Pause between pours.
    pub rest_for: Duration,
    /// Delay before the cellar replaces a drained keg.
    pub refill_after: Duration,
}

impl Default for PourSimulator {
    fn default() -> Self {
        Self {
            pour_for: Duration::from_secs(4),
            rest_for: Duration::from_secs(6),
            refill_after: Duration::from_secs(30),
        }
    }
}

impl PourSimulator {
    /// Pour on every tap in `taps`, one after another, until shutdown.
    pub fn spawn(
        self,
        bus: &Bus,
        taps: Vec<String>,
        mut shutdown: watch::Receiver<bool>,
    ) -> BusResult<JoinHandle<()>> {
        let mut empties = bus.subscribe("+/keg/+/event")?;
        let bus = bus.clone();

        Ok(tokio::spawn(async move {
            let mut turn = 0usize;
            let mut pouring: Option<String> = None;
            let mut next = Box::pin(sleep(self.rest_for));

            loop {
                tokio::select! {
                    _ = &mut next => {
                        match pouring.take() {
                            Some(tap) => {
                                pour(&bus, &tap, PourEvent::PourStop);
                                next.as_mut().reset(tokio::time::Instant::now() + self.rest_for);
                            }
                            None if taps.is_empty() => {
                                next.as_mut().reset(tokio::time::Instant::now() + self.rest_for);
                            }
                            None => {
                                let tap = taps[turn % taps.len()].clone();
                                turn += 1;
                                pour(&bus, &tap, PourEvent::PourStart);
                                pouring = Some(tap);
                                next.as_mut().reset(tokio::time::Instant::now() + self.pour_for);
                            }
                        }
                    }
                    Some(msg) = empties.recv() => {
                        let Some(TapTopic::KegEvent { tap, keg }) = TapTopic::parse(&msg.topic) else {
                            continue;
                        };
                        if let Ok(KegEvent::EmptyDetected { .. }) = msg.json::<KegEvent>() {
                            info!(tap_id = %tap, keg_id = %keg, after = ?self.refill_after, "cellar will swap the keg");
                            tokio::spawn(refill(bus.clone(), tap, keg, self.refill_after));
                        }
                    }
                    _ = shutdown.changed() => {
                        if let Some(tap) = pouring.take() {
                            pour(&bus, &tap, PourEvent::PourStop);
                        }
                        debug!("pour simulator shutting down");
                        break;
                    }
                }
            }
        }))
    }
}

fn pour(bus: &Bus, tap_id: &str, event: PourEvent) {
    let message = UiEvent {
        event,
        timestamp: epoch_millis(),
    };
    debug!(%tap_id, ?event, "simulated pour");
    if let Err(e) = bus.publish_json(&TapTopic::ui_event(tap_id).to_string(), &message) {
        warn!(%tap_id, error = %e, "failed to publish pour");
    }
}

async fn refill(bus: Bus, tap_id: String, keg_id: String, after: Duration) {
    sleep(after).await;
    let topic = TapTopic::keg_command(&tap_id, &keg_id).to_string();
    if let Err(e) = bus.publish_json(&topic, &KegCommand::Refill) {
        warn!(%tap_id, %keg_id, error = %e, "failed to publish refill");
    }
}
