use thiserror::Error;

/// Error taxonomy of the market-data aggregation core.
///
/// Every condition is handled inside the owning worker; none of these are
/// ever escalated to a process-fatal error. `NoSourceData` marks an idle
/// round (nothing to process yet, anchor unchanged) so callers can tell it
/// apart from an actual failure.
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("no source data to process yet")]
    NoSourceData,

    #[error("store error: {0}")]
    Store(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
}

impl MarketDataError {
    /// Idle conditions are reported, not retried or logged as failures.
    pub fn is_idle(&self) -> bool {
        matches!(self, MarketDataError::NoSourceData)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_source_data_is_idle_not_failure() {
        assert!(MarketDataError::NoSourceData.is_idle());
        assert!(!MarketDataError::InvalidRange("end 1 <= start 2".into()).is_idle());
    }
}
