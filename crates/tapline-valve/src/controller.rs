//! Valve box task: bus plumbing and the swap timer around [`ValveBox`].

use std::pin::Pin;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use tracing::{debug, info, warn};

use tapline_bus::{Bus, Message, Subscription};
use tapline_core::{KegEvent, KegStatus, PourEvent, TapTopic, UiEvent};

use crate::error::ValveResult;
use crate::machine::{ValveBox, ValveInput, ValveOutput, ValveState};

/// Spawns valve box tasks.
pub struct ValveBoxController;

impl ValveBoxController {
    /// Run `valve` for tap `tap_id` until `shutdown` fires.
    ///
    /// Subscribes to the tap's UI events and to status and event topics of
    /// every keg under it, then publishes the initial display.
    pub fn spawn(
        bus: &Bus,
        tap_id: &str,
        valve: ValveBox,
        shutdown: watch::Receiver<bool>,
    ) -> ValveResult<JoinHandle<()>> {
        let subs = Subscriptions {
            ui: bus.subscribe(&TapTopic::ui_event(tap_id).to_string())?,
            status: bus.subscribe(&format!("{tap_id}/keg/+/status"))?,
            events: bus.subscribe(&format!("{tap_id}/keg/+/event"))?,
        };
        let task = Controller {
            bus: bus.clone(),
            tap_id: tap_id.to_string(),
            display_topic: TapTopic::display(tap_id).to_string(),
            valve,
            swap_timer: None,
        };
        Ok(tokio::spawn(task.run(subs, shutdown)))
    }
}

struct Subscriptions {
    ui: Subscription,
    status: Subscription,
    events: Subscription,
}

struct Controller {
    bus: Bus,
    tap_id: String,
    display_topic: String,
    valve: ValveBox,
    /// Exists only while swapping.
    swap_timer: Option<Pin<Box<Sleep>>>,
}

impl Controller {
    async fn run(mut self, mut subs: Subscriptions, mut shutdown: watch::Receiver<bool>) {
        info!(tap_id = %self.tap_id, kegs = ?self.valve.kegs(), "valve box online");
        let initial = ValveOutput::Display(self.valve.display());
        self.apply(vec![initial]);

        loop {
            let input = tokio::select! {
                Some(msg) = subs.ui.recv() => ui_input(&msg),
                Some(msg) = subs.status.recv() => keg_status_input(&msg),
                Some(msg) = subs.events.recv() => keg_event_input(&msg),
                _ = swap_elapsed(&mut self.swap_timer) => {
                    self.swap_timer = None;
                    Some(ValveInput::SwapElapsed)
                }
                _ = shutdown.changed() => {
                    debug!(tap_id = %self.tap_id, "valve box shutting down");
                    break;
                }
                else => break,
            };

            if let Some(input) = input {
                let outputs = self.valve.handle(input);
                self.apply(outputs);
            }
            if self.valve.state() != ValveState::Swapping {
                self.swap_timer = None;
            }
        }
    }

    fn apply(&mut self, outputs: Vec<ValveOutput>) {
        for output in outputs {
            let result = match output {
                ValveOutput::Command { keg_id, command } => {
                    debug!(tap_id = %self.tap_id, %keg_id, ?command, "keg command");
                    self.bus
                        .publish_json(&TapTopic::keg_command(&self.tap_id, &keg_id).to_string(), &command)
                }
                ValveOutput::Display(display) => self.bus.publish_json(&self.display_topic, &display),
                ValveOutput::ArmSwapTimer(delay) => {
                    self.swap_timer = Some(Box::pin(sleep(delay)));
                    continue;
                }
            };
            if let Err(e) = result {
                warn!(tap_id = %self.tap_id, error = %e, "publish failed");
            }
        }
    }
}

async fn swap_elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

fn ui_input(msg: &Message) -> Option<ValveInput> {
    match msg.json::<UiEvent>() {
        Ok(UiEvent { event: PourEvent::PourStart, .. }) => Some(ValveInput::PourStart),
        Ok(UiEvent { event: PourEvent::PourStop, .. }) => Some(ValveInput::PourStop),
        Err(e) => {
            warn!(error = %e, "dropping malformed ui event");
            None
        }
    }
}

fn keg_status_input(msg: &Message) -> Option<ValveInput> {
    let keg_id = keg_of(msg)?;
    match msg.json::<KegStatus>() {
        Ok(status) => Some(ValveInput::KegStatus { keg_id, status }),
        Err(e) => {
            warn!(%keg_id, error = %e, "dropping malformed keg status");
            None
        }
    }
}

fn keg_event_input(msg: &Message) -> Option<ValveInput> {
    let keg_id = keg_of(msg)?;
    match msg.json::<KegEvent>() {
        Ok(event) => Some(ValveInput::KegEvent { keg_id, event }),
        Err(e) => {
            warn!(%keg_id, error = %e, "dropping malformed keg event");
            None
        }
    }
}

fn keg_of(msg: &Message) -> Option<String> {
    let keg = TapTopic::parse(&msg.topic).and_then(|t| t.keg_id().map(str::to_string));
    if keg.is_none() {
        warn!(topic = %msg.topic, "ignoring message on unexpected topic");
    }
    keg
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use tapline_core::{DisplayState, KegCommand, PumpConfig, View};

    fn spawn(bus: &Bus, kegs: &[&str]) -> watch::Sender<bool> {
        let valve = ValveBox::new(
            "tap-1",
            "Stout",
            kegs.iter().map(|k| k.to_string()).collect(),
            Duration::from_secs(1),
        )
        .unwrap();
        let (tx, rx) = watch::channel(false);
        ValveBoxController::spawn(bus, "tap-1", valve, rx).unwrap();
        tx
    }

    fn pour(bus: &Bus, event: PourEvent) {
        bus.publish_json("tap-1/ui/event", &UiEvent { event, timestamp: 0 })
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_initial_display() {
        let bus = Bus::new();
        let mut display = bus.subscribe("tap-1/ui/display").unwrap();
        let _tx = spawn(&bus, &["keg-a"]);

        let shown: DisplayState = display.recv().await.unwrap().json().unwrap();
        assert_eq!(shown.view, View::Idle);
        assert_eq!(shown.beer_name, "Stout");
    }

    #[tokio::test(start_paused = true)]
    async fn fails_over_after_swap_delay() {
        let bus = Bus::new();
        let mut commands = bus.subscribe("tap-1/keg/+/command").unwrap();
        let _tx = spawn(&bus, &["keg-a", "keg-b"]);

        pour(&bus, PourEvent::PourStart);
        let msg = commands.recv().await.unwrap();
        assert_eq!(msg.topic, "tap-1/keg/keg-a/command");
        assert_eq!(
            msg.json::<KegCommand>().unwrap(),
            KegCommand::StartPump(PumpConfig::default())
        );

        bus.publish_json(
            "tap-1/keg/keg-a/event",
            &KegEvent::EmptyDetected {
                reason: "volume depleted".to_string(),
                timestamp: 0,
            },
        )
        .unwrap();
        let msg = commands.recv().await.unwrap();
        assert_eq!(msg.topic, "tap-1/keg/keg-a/command");
        assert_eq!(msg.json::<KegCommand>().unwrap(), KegCommand::StopPump);

        // Nothing before the swap delay has passed.
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert!(commands.try_recv().is_none());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let msg = commands.try_recv().unwrap();
        assert_eq!(msg.topic, "tap-1/keg/keg-b/command");
        assert_eq!(
            msg.json::<KegCommand>().unwrap(),
            KegCommand::StartPump(PumpConfig::default())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_ui_event_is_skipped() {
        let bus = Bus::new();
        let mut commands = bus.subscribe("tap-1/keg/+/command").unwrap();
        let _tx = spawn(&bus, &["keg-a"]);

        bus.publish("tap-1/ui/event", "{\"event\":\"WAVE\"}").unwrap();
        pour(&bus, PourEvent::PourStart);

        let msg = commands.recv().await.unwrap();
        assert_eq!(msg.topic, "tap-1/keg/keg-a/command");
    }
}
