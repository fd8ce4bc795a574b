use tracing::debug;

use crate::klines::anchor;
use crate::klines::ohlc;
use crate::klines::resolution::Resolution;
use crate::store::{trade_queries, CandleStore};
use crate::utils::errors::MarketDataError;

/// What one builder or merger pass covered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub window_start: i64,
    pub window_end: i64,
    pub candles_written: usize,
}

/// Right edge of the settled region: buckets whose nominal end trails
/// the highest committed block timestamp by at least `settle_delay`, so
/// late writes have had time to land. Aligned down to the resolution.
pub fn settle_horizon(max_block_timestamp: i64, settle_delay: i64, resolution: Resolution) -> i64 {
    resolution.align(max_block_timestamp - settle_delay)
}

/// Builds 1-minute candles from raw trades over `[start, end)`.
///
/// `start` is advisory: the real start is resolved against what is
/// already persisted, so re-running over an unchanged range is a no-op.
/// Insert-only, settled buckets are never rebuilt.
pub async fn build_base_candles(
    store: &CandleStore,
    start: i64,
    end: i64,
) -> Result<BuildSummary, MarketDataError> {
    let resolution = Resolution::OneMinute;

    if end <= start {
        return Err(MarketDataError::InvalidRange(format!(
            "end {} <= start {}",
            end, start
        )));
    }

    let end = resolution.align(end);
    let actual_start = {
        let mut conn = store.conn()?;
        anchor::base_resume_point(start, &mut conn)?
    };

    if end <= actual_start {
        return Err(MarketDataError::NoSourceData);
    }

    let trades = {
        let mut conn = store.conn()?;
        trade_queries::trades_in_range(actual_start, end, &mut conn)?
    };

    if trades.is_empty() {
        return Err(MarketDataError::NoSourceData);
    }

    let candles: Vec<_> = ohlc::candles_from_trades(&trades, resolution)
        .into_iter()
        .filter(|c| c.is_valid())
        .collect();

    let written = store.insert_candles(&candles).await?;
    debug!(start = actual_start, end, written, "built base candles");

    Ok(BuildSummary {
        window_start: actual_start,
        window_end: end,
        candles_written: written,
    })
}
