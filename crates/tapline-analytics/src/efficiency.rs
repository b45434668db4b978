//! Dispensing efficiency: cross-checks the flow meter against the
//! measured volume drop.

use std::time::Duration;

use tapline_core::flow_volume_ml;
use tapline_state::TelemetrySample;

/// Rolling window of telemetry considered by [`efficiency`].
pub const EFFICIENCY_WINDOW: Duration = Duration::from_secs(24 * 3600);

/// Efficiency (percent) over time-ordered samples.
///
/// For each consecutive pair, the flow-based estimate is
/// `prev.flow_lpm × Δt` and the actual volume is the drop in remaining
/// volume (never negative). Returns `None` for fewer than two samples or
/// when the flow meter saw nothing. The result is capped at 100.
pub fn efficiency(samples: &[TelemetrySample]) -> Option<f64> {
    if samples.len() < 2 {
        return None;
    }

    let (actual, estimated) = samples.windows(2).fold((0.0, 0.0), |(actual, estimated), pair| {
        let (prev, curr) = (&pair[0], &pair[1]);
        let dt_secs = curr.timestamp_ms.saturating_sub(prev.timestamp_ms) as f64 / 1000.0;
        let flow_volume = flow_volume_ml(prev.flow_lpm, dt_secs);
        let actual_volume = (prev.volume_remaining_ml - curr.volume_remaining_ml).max(0.0);
        (actual + actual_volume, estimated + flow_volume)
    });

    if estimated <= 0.0 {
        return None;
    }

    Some((actual / estimated * 100.0).min(100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(timestamp_ms: u64, volume: f64, flow_lpm: f64) -> TelemetrySample {
        TelemetrySample {
            timestamp_ms,
            tap_id: "tap-1".to_string(),
            keg_id: "keg-a".to_string(),
            volume_remaining_ml: volume,
            flow_lpm,
            temp_beer_c: 4.0,
        }
    }

    #[test]
    fn insufficient_data_for_zero_or_one_sample() {
        assert_eq!(efficiency(&[]), None);
        assert_eq!(efficiency(&[sample(0, 5000.0, 6.0)]), None);
    }

    #[test]
    fn insufficient_data_when_flow_is_zero() {
        let samples = [sample(0, 5000.0, 0.0), sample(1000, 4900.0, 0.0)];
        assert_eq!(efficiency(&samples), None);
    }

    #[test]
    fn perfect_agreement_is_one_hundred_percent() {
        // 6 L/min for 0.5 s = 50 ml.
        let samples = [
            sample(0, 5000.0, 6.0),
            sample(500, 4950.0, 6.0),
            sample(1000, 4900.0, 6.0),
        ];
        assert_relative_eq!(efficiency(&samples).unwrap(), 100.0);
    }

    #[test]
    fn partial_delivery() {
        // Flow meter says 100 ml, scale saw 80 ml.
        let samples = [sample(0, 5000.0, 6.0), sample(1000, 4920.0, 6.0)];
        assert_relative_eq!(efficiency(&samples).unwrap(), 80.0);
    }

    #[test]
    fn capped_at_one_hundred() {
        let samples = [sample(0, 5000.0, 6.0), sample(1000, 4000.0, 6.0)];
        assert_eq!(efficiency(&samples), Some(100.0));
    }

    #[test]
    fn volume_increase_never_goes_negative() {
        let samples = [
            sample(0, 5000.0, 6.0),
            sample(1000, 5100.0, 6.0),
            sample(2000, 5100.0, 6.0),
        ];
        let value = efficiency(&samples).unwrap();
        assert!(value >= 0.0);
        assert_eq!(value, 0.0);
    }

    #[test]
    fn result_stays_within_bounds() {
        let samples: Vec<TelemetrySample> = (0..50u64)
            .map(|i| {
                let volume = 10_000.0 - (i * i % 37) as f64 * 10.0;
                sample(i * 500, volume, (i % 7) as f64)
            })
            .collect();
        if let Some(value) = efficiency(&samples) {
            assert!((0.0..=100.0).contains(&value));
        }
    }
}
