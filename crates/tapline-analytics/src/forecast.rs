//! Depletion forecast from the trailing week of usage.

use serde::{Deserialize, Serialize};

/// Days of usage history averaged by the forecast.
pub const FORECAST_DAYS: u64 = 7;

/// Forecast for a single keg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepletionForecast {
    pub tap_id: String,
    pub keg_id: String,
    pub beer_name: String,
    pub current_volume_ml: f64,
    pub avg_daily_ml: f64,
    /// `None` when consumption or stock is non-positive.
    pub days_remaining: Option<f64>,
}

/// Days until `current_volume_ml` runs out given `usage_ml` consumed over
/// the last [`FORECAST_DAYS`] days.
pub fn forecast_days(current_volume_ml: f64, usage_ml: f64) -> Option<f64> {
    let avg_daily = usage_ml / FORECAST_DAYS as f64;
    if avg_daily <= 0.0 || current_volume_ml <= 0.0 {
        return None;
    }
    Some(current_volume_ml / avg_daily)
}
