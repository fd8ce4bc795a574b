use chrono::{DateTime, Utc};

/// Current wall-clock time as unix seconds.
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Compact time rendering for log lines.
pub fn time_string(ts: i64) -> String {
    match DateTime::from_timestamp(ts, 0) {
        Some(t) => t.format("%Y%m%d_%H%M%S").to_string(),
        None => format!("ts:{}", ts),
    }
}
