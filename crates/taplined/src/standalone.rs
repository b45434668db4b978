//! Standalone mode: the whole tap network in one process.

use std::path::Path;

use anyhow::Context;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use tapline_aggregator::{Aggregator, AggregatorHandle, AggregatorService, ViewerStream};
use tapline_bus::Bus;
use tapline_core::TaplineConfig;
use tapline_keg::{KegDevice, KegModel};
use tapline_state::StateStore;
use tapline_valve::{ValveBox, ValveBoxController};

use crate::simulate::PourSimulator;

pub async fn run(config_path: &Path, data_dir: &Path, simulate_pours: bool) -> anyhow::Result<()> {
    info!("Tapline daemon starting in standalone mode");

    let config = if config_path.exists() {
        TaplineConfig::from_file(config_path)
            .with_context(|| format!("loading {}", config_path.display()))?
    } else {
        info!(path = ?config_path, "no config file, using built-in single-tap layout");
        TaplineConfig::scaffold("tap-1", "House Lager")
    };

    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("tapline.redb");
    let state = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let bus = Bus::new();

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let (aggregator, mut tasks) = spawn_network(&bus, state, &config, &shutdown_rx)?;

    let broker = aggregator.broker_config().await?;
    info!(host = %broker.host, port = broker.port, client_id = %broker.client_id, "broker config");

    let viewer = aggregator.attach_viewer().await?;
    tasks.push(tokio::spawn(log_viewer_events(viewer)));

    if simulate_pours {
        let taps = config.taps.iter().map(|t| t.id.clone()).collect();
        tasks.push(PourSimulator::default().spawn(&bus, taps, shutdown_rx.clone())?);
        info!("pour simulator started");
    }

    info!(taps = config.taps.len(), "tap network running");

    // Graceful shutdown on Ctrl-C.
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    drop(aggregator);
    for task in tasks {
        let _ = task.await;
    }

    info!("Tapline daemon stopped");
    Ok(())
}

/// Spawn the aggregator, then every keg device and valve box in `config`.
///
/// The aggregator subscribes first so it sees the devices' start-up
/// announcements.
pub fn spawn_network(
    bus: &Bus,
    state: StateStore,
    config: &TaplineConfig,
    shutdown: &watch::Receiver<bool>,
) -> anyhow::Result<(AggregatorHandle, Vec<JoinHandle<()>>)> {
    let aggregator = Aggregator::new(state)
        .with_config(&config.aggregator)
        .with_default_broker(config.broker.clone());
    let (handle, task) = AggregatorService::spawn(
        bus,
        aggregator,
        config.aggregator.sweep_interval(),
        shutdown.clone(),
    )?;
    let mut tasks = vec![task];
    info!(
        heartbeat_timeout = ?config.aggregator.heartbeat_timeout(),
        low_stock_ml = config.aggregator.low_stock_ml,
        "aggregator initialized"
    );

    for tap in &config.taps {
        let valve = ValveBox::new(
            &tap.id,
            &tap.beer_name,
            tap.kegs.clone(),
            config.valve.swap_delay(),
        )?;
        tasks.push(ValveBoxController::spawn(bus, &tap.id, valve, shutdown.clone())?);

        for keg_id in &tap.kegs {
            let model = KegModel::new(keg_id, &tap.beer_name, &config.keg);
            tasks.push(KegDevice::spawn(bus, &tap.id, model, shutdown.clone())?);
        }
        info!(tap_id = %tap.id, beer = %tap.beer_name, kegs = tap.kegs.len(), "tap started");
    }

    Ok((handle, tasks))
}

async fn log_viewer_events(mut viewer: ViewerStream) {
    while let Some(event) = viewer.recv().await {
        match serde_json::to_string(&event) {
            Ok(json) => debug!(target: "taplined::viewer", "{json}"),
            Err(e) => warn!(error = %e, "failed to encode viewer event"),
        }
    }
}
