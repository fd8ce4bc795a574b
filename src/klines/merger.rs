use tracing::debug;

use crate::klines::anchor;
use crate::klines::builder::BuildSummary;
use crate::klines::ohlc;
use crate::klines::resolution::Resolution;
use crate::store::{candle_queries, CandleStore};
use crate::utils::errors::MarketDataError;

/// Rolls settled 1-minute candles up into `target` buckets over
/// `[start, end)`.
///
/// Always reads the persisted 1-minute layer, never another merged
/// resolution, so a stale higher resolution can always be rebuilt from
/// scratch. Writes go through the replace-on-conflict path because a
/// recovering worker may recompute buckets it already wrote.
pub async fn merge_into(
    store: &CandleStore,
    target: Resolution,
    start: i64,
    end: i64,
) -> Result<BuildSummary, MarketDataError> {
    if target == Resolution::OneMinute {
        return Err(MarketDataError::InvalidRange(
            "cannot merge into the base resolution".to_string(),
        ));
    }
    if end <= start {
        return Err(MarketDataError::InvalidRange(format!(
            "end {} <= start {}",
            end, start
        )));
    }

    let end = target.align(end);
    let actual_start = {
        let mut conn = store.conn()?;
        anchor::merge_resume_point(target, start, &mut conn)?
    };

    if end <= actual_start {
        return Err(MarketDataError::NoSourceData);
    }

    let children = {
        let mut conn = store.conn()?;
        candle_queries::candles_in_range(Resolution::OneMinute, actual_start, end, &mut conn)?
    };

    if children.is_empty() {
        return Err(MarketDataError::NoSourceData);
    }

    let merged: Vec<_> = ohlc::merge_candles(&children, target)
        .into_iter()
        .filter(|c| c.is_valid())
        .collect();

    let written = store.upsert_candles(&merged).await?;
    debug!(
        resolution = target.label(),
        start = actual_start,
        end,
        written,
        "merged candles"
    );

    Ok(BuildSummary {
        window_start: actual_start,
        window_end: end,
        candles_written: written,
    })
}
