//! End-to-end: UI events in, keg telemetry through the valve box and the
//! aggregator, persisted usage out.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use tapline_aggregator::{Aggregator, AggregatorHandle, AggregatorService, ViewerEvent};
use tapline_bus::{Bus, Subscription};
use tapline_core::config::KegConfig;
use tapline_core::{DisplayState, KegCommand, KegState, PourEvent, UiEvent, View};
use tapline_keg::{KegDevice, KegModel};
use tapline_state::{InventoryStatus, OrderStatus, StateStore};
use tapline_valve::{ValveBox, ValveBoxController, NO_KEGS_ALERT};

struct Network {
    bus: Bus,
    aggregator: AggregatorHandle,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Network {
    /// One tap serving "Stout" from the given `(keg_id, volume_ml)` kegs.
    fn start(state: StateStore, kegs: &[(&str, f64)]) -> Self {
        let bus = Bus::new();
        let (shutdown, rx) = watch::channel(false);

        let (aggregator, task) = AggregatorService::spawn(
            &bus,
            Aggregator::new(state),
            Duration::from_secs(10),
            rx.clone(),
        )
        .unwrap();
        let mut tasks = vec![task];

        let valve = ValveBox::new(
            "tap-1",
            "Stout",
            kegs.iter().map(|(id, _)| id.to_string()).collect(),
            Duration::from_secs(1),
        )
        .unwrap();
        tasks.push(ValveBoxController::spawn(&bus, "tap-1", valve, rx.clone()).unwrap());

        for (keg_id, volume) in kegs {
            let model = KegModel::new(keg_id, "Stout", &KegConfig::default()).with_volume(*volume);
            tasks.push(KegDevice::spawn(&bus, "tap-1", model, rx.clone()).unwrap());
        }

        Self {
            bus,
            aggregator,
            shutdown,
            tasks,
        }
    }

    fn pour(&self, event: PourEvent) {
        self.bus
            .publish_json("tap-1/ui/event", &UiEvent { event, timestamp: 0 })
            .unwrap();
    }

    async fn stop(self) {
        self.shutdown.send(true).unwrap();
        drop(self.aggregator);
        for task in self.tasks {
            task.await.unwrap();
        }
    }
}

fn drain_displays(sub: &mut Subscription) -> Vec<DisplayState> {
    let mut displays = Vec::new();
    while let Some(msg) = sub.try_recv() {
        displays.push(msg.json().unwrap());
    }
    displays
}

#[tokio::test(start_paused = true)]
async fn drained_keg_fails_over_to_the_next() {
    let state = StateStore::open_in_memory().unwrap();
    let net = Network::start(state.clone(), &[("keg-a", 100.0), ("keg-b", 20_000.0)]);
    let mut displays = net.bus.subscribe("tap-1/ui/display").unwrap();
    let mut viewer = net.aggregator.attach_viewer().await.unwrap();

    net.pour(PourEvent::PourStart);
    tokio::time::sleep(Duration::from_millis(3_200)).await;
    net.pour(PourEvent::PourStop);
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The screen went through a swap from keg-a to keg-b at 0%.
    let shown = drain_displays(&mut displays);
    let swap = shown.iter().find(|d| d.view == View::Swapping).unwrap();
    assert_eq!(swap.volume_remaining_pct, 0.0);
    let notice = swap.swap.as_ref().unwrap();
    assert_eq!((notice.from_keg.as_str(), notice.to_keg.as_str()), ("keg-a", "keg-b"));
    assert_eq!(shown.last().unwrap().view, View::Idle);

    // Aggregator view of both kegs.
    let taps = net.aggregator.list_taps().await.unwrap();
    assert_eq!(taps.len(), 1);
    let kegs = &taps[0].kegs;
    assert_eq!(kegs["keg-a"].volume_remaining_ml, 0.0);
    assert_eq!(kegs["keg-b"].volume_remaining_ml, 19_900.0);
    assert_eq!(kegs["keg-b"].state, KegState::Idle);

    // Persisted side effects.
    let record = state.get_inventory("tap-1", "keg-a").unwrap().unwrap();
    assert_eq!(record.status, InventoryStatus::Empty);
    let orders = state.list_orders().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].keg_id, "keg-a");
    assert_eq!(orders[0].status, OrderStatus::Pending);
    assert_eq!(state.sum_usage_for_beer("Stout", 0).unwrap(), 200.0);

    // The viewer heard about the empty keg.
    let mut events = Vec::new();
    while let Ok(event) = viewer.try_recv() {
        events.push(event);
    }
    assert!(events.iter().any(|e| matches!(
        e,
        ViewerEvent::Alert { keg_id: Some(keg), .. } if keg == "keg-a"
    )));

    net.stop().await;
}

#[tokio::test(start_paused = true)]
async fn fully_drained_tap_stops_and_recovers_after_refill() {
    let state = StateStore::open_in_memory().unwrap();
    let net = Network::start(state, &[("keg-a", 50.0)]);
    let mut displays = net.bus.subscribe("tap-1/ui/display").unwrap();

    net.pour(PourEvent::PourStart);
    tokio::time::sleep(Duration::from_secs(3)).await;

    let shown = drain_displays(&mut displays);
    let last = shown.last().unwrap();
    assert_eq!(last.view, View::Idle);
    assert_eq!(last.alert.as_deref(), Some(NO_KEGS_ALERT));

    // Cellar swaps the keg; the tap is serviceable again.
    net.bus
        .publish_json("tap-1/keg/keg-a/command", &KegCommand::Refill)
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let shown = drain_displays(&mut displays);
    let last = shown.last().unwrap();
    assert_eq!(last.alert, None);
    assert_eq!(last.volume_remaining_pct, 100.0);

    let mut commands = net.bus.subscribe("tap-1/keg/+/command").unwrap();
    net.pour(PourEvent::PourStart);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let msg = commands.try_recv().unwrap();
    assert!(matches!(msg.json::<KegCommand>().unwrap(), KegCommand::StartPump(_)));

    net.stop().await;
}

#[tokio::test(start_paused = true)]
async fn usage_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tapline.redb");

    {
        let state = StateStore::open(&path).unwrap();
        let net = Network::start(state, &[("keg-a", 20_000.0)]);
        net.pour(PourEvent::PourStart);
        tokio::time::sleep(Duration::from_millis(1_200)).await;
        net.pour(PourEvent::PourStop);
        tokio::time::sleep(Duration::from_millis(100)).await;
        net.stop().await;
    }

    let state = StateStore::open(&path).unwrap();
    assert_eq!(state.sum_usage_for_beer("Stout", 0).unwrap(), 100.0);
    let record = state.get_inventory("tap-1", "keg-a").unwrap().unwrap();
    assert_eq!(record.remaining_volume_ml, 19_900.0);
    assert_eq!(record.status, InventoryStatus::Standby);
}
