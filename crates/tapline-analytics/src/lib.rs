//! tapline-analytics — consumption analytics over the Tapline store.
//!
//! # Architecture
//!
//! ```text
//! UsageAnalyzer (reads/writes StateStore)
//!   ├── record_consumption() → hourly UsageBucket (additive)
//!   ├── efficiency()         → flow-meter vs. volume cross-check, 24h window
//!   ├── depletion_forecast() → days left from trailing 7-day average
//!   └── usage_history()      → buckets for viewers and reports
//!
//! ConsumptionTracker (in-memory, per keg)
//!   └── observe() → delta only for strictly decreasing readings
//! ```
//!
//! The pure calculations (`hour_bucket`, `efficiency`, `forecast_days`) are
//! exposed separately so they can be checked without a store.

pub mod analyzer;
pub mod efficiency;
pub mod error;
pub mod forecast;
pub mod ledger;

pub use analyzer::UsageAnalyzer;
pub use efficiency::{efficiency, EFFICIENCY_WINDOW};
pub use error::{AnalyticsError, AnalyticsResult};
pub use forecast::{forecast_days, DepletionForecast, FORECAST_DAYS};
pub use ledger::{hour_bucket, ConsumptionTracker, HOUR_SECS};
