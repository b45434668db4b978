//! Store-backed analytics.

use tracing::debug;

use tapline_state::{StateStore, UsageBucket};

use crate::efficiency::{efficiency, EFFICIENCY_WINDOW};
use crate::error::{AnalyticsError, AnalyticsResult};
use crate::forecast::{forecast_days, DepletionForecast, FORECAST_DAYS};
use crate::ledger::hour_bucket;

const DAY_SECS: u64 = 24 * 3600;

/// Computes usage analytics from the persisted telemetry and ledger.
#[derive(Clone)]
pub struct UsageAnalyzer {
    state: StateStore,
}

impl UsageAnalyzer {
    pub fn new(state: StateStore) -> Self {
        Self { state }
    }

    /// Fold a consumption delta into the current hour's bucket.
    pub fn record_consumption(
        &self,
        now_secs: u64,
        beer_name: &str,
        delta_ml: f64,
    ) -> AnalyticsResult<UsageBucket> {
        let bucket_start = hour_bucket(now_secs);
        let bucket = self.state.add_usage(bucket_start, beer_name, delta_ml)?;
        debug!(bucket_start, %beer_name, delta_ml, total_ml = bucket.volume_ml, "usage recorded");
        Ok(bucket)
    }

    /// Efficiency over the last 24 hours. `None` means insufficient data.
    pub fn efficiency(&self, now_ms: u64) -> AnalyticsResult<Option<f64>> {
        let since = now_ms.saturating_sub(EFFICIENCY_WINDOW.as_millis() as u64);
        let samples = self.state.list_telemetry_since(since)?;
        Ok(efficiency(&samples))
    }

    /// Forecast how many days the keg will last at the trailing 7-day rate.
    pub fn depletion_forecast(
        &self,
        tap_id: &str,
        keg_id: &str,
        now_secs: u64,
    ) -> AnalyticsResult<DepletionForecast> {
        let record = self
            .state
            .get_inventory(tap_id, keg_id)?
            .ok_or_else(|| AnalyticsError::KegNotFound {
                tap_id: tap_id.to_string(),
                keg_id: keg_id.to_string(),
            })?;

        let since = now_secs.saturating_sub(FORECAST_DAYS * DAY_SECS);
        let usage = self.state.sum_usage_for_beer(&record.beer_name, since)?;
        let avg_daily_ml = usage / FORECAST_DAYS as f64;

        Ok(DepletionForecast {
            tap_id: record.tap_id,
            keg_id: record.keg_id,
            beer_name: record.beer_name,
            current_volume_ml: record.remaining_volume_ml,
            avg_daily_ml,
            days_remaining: forecast_days(record.remaining_volume_ml, usage),
        })
    }

    /// Forecasts for every keg in the inventory.
    pub fn forecast_all(&self, now_secs: u64) -> AnalyticsResult<Vec<DepletionForecast>> {
        self.state
            .list_inventory()?
            .iter()
            .map(|r| self.depletion_forecast(&r.tap_id, &r.keg_id, now_secs))
            .collect()
    }

    /// Usage buckets starting within the last `hours` hours.
    pub fn usage_history(&self, now_secs: u64, hours: u64) -> AnalyticsResult<Vec<UsageBucket>> {
        let since = hour_bucket(now_secs.saturating_sub(hours * 3600));
        Ok(self.state.list_usage_since(since)?)
    }
}
