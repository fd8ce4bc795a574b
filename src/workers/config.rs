use std::collections::HashMap;
use std::env;

use tracing::warn;

use crate::klines::resolution::Resolution;

/// Runtime settings for the aggregation workers.
#[derive(Clone, Debug)]
pub struct MarketDataConfig {
    /// Master switch for the whole subsystem.
    pub enabled: bool,
    /// Local wall-clock time of the daily retention sweep, `HH:MM:SS`.
    pub cleanup_time: String,
    /// Days of candles kept per resolution. A missing entry or 0 means
    /// that resolution is kept forever.
    pub retention_days: HashMap<Resolution, i64>,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cleanup_time: "00:00:00".to_string(),
            retention_days: [
                (Resolution::OneMinute, 120),
                (Resolution::ThreeMinutes, 120),
                (Resolution::FiveMinutes, 120),
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl MarketDataConfig {
    /// Reads `MARKETDATA_ENABLED`, `MARKETDATA_CLEANUP_TIME` and
    /// `MARKETDATA_RETENTION_DAYS`. Retention is a JSON map keyed by
    /// resolution label, e.g. `{"1min":30,"3min":30,"5min":30}`.
    pub fn from_env() -> Self {
        let defaults = MarketDataConfig::default();

        let enabled = env::var("MARKETDATA_ENABLED")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(defaults.enabled);

        let cleanup_time = env::var("MARKETDATA_CLEANUP_TIME").unwrap_or(defaults.cleanup_time);

        let retention_days = match env::var("MARKETDATA_RETENTION_DAYS") {
            Ok(raw) => match serde_json::from_str::<HashMap<Resolution, i64>>(&raw) {
                Ok(map) => map,
                Err(error) => {
                    warn!(%error, "invalid MARKETDATA_RETENTION_DAYS, using defaults");
                    defaults.retention_days
                }
            },
            Err(_) => defaults.retention_days,
        };

        Self {
            enabled,
            cleanup_time,
            retention_days,
        }
    }

    /// Retention in days for one resolution, 0 meaning unbounded.
    pub fn kept_days(&self, resolution: Resolution) -> i64 {
        self.retention_days.get(&resolution).copied().unwrap_or(0)
    }
}
