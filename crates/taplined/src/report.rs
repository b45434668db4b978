use std::path::Path;

use serde_json::json;

use tapline_analytics::UsageAnalyzer;
use tapline_core::epoch_millis;
use tapline_state::{OrderStatus, StateStore};

pub fn run(data_dir: &Path, format: &str) -> anyhow::Result<()> {
    let state = StateStore::open(&data_dir.join("tapline.redb"))?;
    let analyzer = UsageAnalyzer::new(state.clone());
    let now_ms = epoch_millis();

    let efficiency = analyzer.efficiency(now_ms)?;
    let forecasts = analyzer.forecast_all(now_ms / 1000)?;
    let pending: Vec<_> = state
        .list_orders()?
        .into_iter()
        .filter(|o| o.status == OrderStatus::Pending)
        .collect();

    if format == "json" {
        let report = json!({
            "efficiency_pct": efficiency,
            "forecasts": forecasts,
            "pending_orders": pending,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match efficiency {
        Some(pct) => println!("Dispensing efficiency (24h): {pct:.1}%"),
        None => println!("Dispensing efficiency (24h): insufficient data"),
    }

    println!();
    println!("Depletion forecast (7-day average):");
    if forecasts.is_empty() {
        println!("  no kegs recorded");
    }
    for f in &forecasts {
        let days = f
            .days_remaining
            .map(|d| format!("{d:.1} days"))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "  {}/{} {:<16} {:>8.0} ml  {:>8.0} ml/day  {}",
            f.tap_id, f.keg_id, f.beer_name, f.current_volume_ml, f.avg_daily_ml, days
        );
    }

    println!();
    println!("Pending orders:");
    if pending.is_empty() {
        println!("  none");
    }
    for order in &pending {
        println!(
            "  #{} {}/{} {}",
            order.id, order.tap_id, order.keg_id, order.beer_name
        );
    }

    Ok(())
}
