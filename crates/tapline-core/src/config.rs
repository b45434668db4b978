//! tapline.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);
const DEFAULT_TICK: Duration = Duration::from_millis(500);
const DEFAULT_SWAP_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaplineConfig {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub keg: KegConfig,
    #[serde(default)]
    pub valve: ValveConfig,
    #[serde(default)]
    pub taps: Vec<TapConfig>,
}

/// Broker connection settings. Persisted by the aggregator so the
/// presentation layer can read and rewrite them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "tapline-aggregator".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatorConfig {
    /// Silence after which a tap is marked disconnected (e.g., "30s").
    pub heartbeat_timeout: String,
    /// Period of the liveness sweep (e.g., "10s").
    pub sweep_interval: String,
    /// Idle kegs below this volume trigger a reorder.
    pub low_stock_ml: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: "30s".to_string(),
            sweep_interval: "10s".to_string(),
            low_stock_ml: 2000.0,
        }
    }
}

impl AggregatorConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        non_zero(&self.heartbeat_timeout).unwrap_or(DEFAULT_HEARTBEAT_TIMEOUT)
    }

    pub fn sweep_interval(&self) -> Duration {
        non_zero(&self.sweep_interval).unwrap_or(DEFAULT_SWEEP_INTERVAL)
    }
}

/// Simulated keg hardware.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KegConfig {
    pub capacity_ml: f64,
    /// Nominal flow at full pump duty.
    pub flow_lpm: f64,
    pub temp_beer_c: f64,
    /// Simulation tick period (e.g., "500ms").
    pub tick: String,
}

impl Default for KegConfig {
    fn default() -> Self {
        Self {
            capacity_ml: 20_000.0,
            flow_lpm: 6.0,
            temp_beer_c: 4.0,
            tick: "500ms".to_string(),
        }
    }
}

impl KegConfig {
    pub fn tick(&self) -> Duration {
        non_zero(&self.tick).unwrap_or(DEFAULT_TICK)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValveConfig {
    /// Mechanical delay of a keg swap (e.g., "1s").
    pub swap_delay: String,
}

impl Default for ValveConfig {
    fn default() -> Self {
        Self {
            swap_delay: "1s".to_string(),
        }
    }
}

impl ValveConfig {
    pub fn swap_delay(&self) -> Duration {
        parse_duration(&self.swap_delay).unwrap_or(DEFAULT_SWAP_DELAY)
    }
}

/// One tap and the kegs plumbed into its valve box, in failover order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TapConfig {
    pub id: String,
    pub beer_name: String,
    pub kegs: Vec<String>,
}

impl TaplineConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: TaplineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check durations, volumes, and tap wiring.
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, value) in [
            ("aggregator.heartbeat_timeout", &self.aggregator.heartbeat_timeout),
            ("aggregator.sweep_interval", &self.aggregator.sweep_interval),
            ("keg.tick", &self.keg.tick),
        ] {
            if parse_duration(value)?.is_zero() {
                return Err(ConfigError::Invalid(format!("{name} must be non-zero")));
            }
        }
        parse_duration(&self.valve.swap_delay)?;

        if self.keg.capacity_ml <= 0.0 {
            return Err(ConfigError::Invalid("keg.capacity_ml must be positive".into()));
        }
        if self.keg.flow_lpm < 0.0 {
            return Err(ConfigError::Invalid("keg.flow_lpm must not be negative".into()));
        }

        let mut seen = std::collections::HashSet::new();
        for tap in &self.taps {
            if tap.id.is_empty() || tap.id.contains('/') {
                return Err(ConfigError::Invalid(format!("invalid tap id {:?}", tap.id)));
            }
            if !seen.insert(tap.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate tap id {}", tap.id)));
            }
            if tap.kegs.is_empty() {
                return Err(ConfigError::Invalid(format!("tap {} has no kegs", tap.id)));
            }
            if let Some(keg) = tap.kegs.iter().find(|k| k.is_empty() || k.contains('/')) {
                return Err(ConfigError::Invalid(format!(
                    "tap {} has invalid keg id {keg:?}",
                    tap.id
                )));
            }
        }
        Ok(())
    }

    /// Scaffold a config with a single two-keg tap.
    pub fn scaffold(tap_id: &str, beer_name: &str) -> Self {
        TaplineConfig {
            broker: BrokerConfig::default(),
            aggregator: AggregatorConfig::default(),
            keg: KegConfig::default(),
            valve: ValveConfig::default(),
            taps: vec![TapConfig {
                id: tap_id.to_string(),
                beer_name: beer_name.to_string(),
                kegs: vec!["keg-a".to_string(), "keg-b".to_string()],
            }],
        }
    }
}

fn non_zero(s: &str) -> Option<Duration> {
    parse_duration(s).ok().filter(|d| !d.is_zero())
}

/// Parse `"500ms"`, `"30s"`, `"5m"`, or `"1h"` into a `Duration`.
pub fn parse_duration(s: &str) -> ConfigResult<Duration> {
    let s = s.trim();
    let invalid = || ConfigError::Duration(s.to_string());

    let (digits, millis_per_unit) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 1)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1_000)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60_000)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3_600_000)
    } else {
        return Err(invalid());
    };

    let n: u64 = digits.parse().map_err(|_| invalid())?;
    n.checked_mul(millis_per_unit)
        .map(Duration::from_millis)
        .ok_or_else(invalid)
}
