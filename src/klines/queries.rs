use bigdecimal::BigDecimal;

use crate::klines::db_types::{CandleRow, CandleView};
use crate::klines::padding::pad_candles;
use crate::klines::resolution::Resolution;
use crate::store::candle_queries;
use crate::utils::db::PgPooledConn;
use crate::utils::errors::MarketDataError;

pub const DEFAULT_CANDLE_LIMIT: i64 = 100;
pub const MAX_CANDLE_LIMIT: i64 = 1000;

pub fn clamp_limit(limit: Option<i64>) -> i64 {
    match limit {
        Some(limit) if limit > 0 => limit.min(MAX_CANDLE_LIMIT),
        _ => DEFAULT_CANDLE_LIMIT,
    }
}

/// Turns newest-first rows into an ascending, gap-padded series of at
/// most `limit` candles.
///
/// The padded range is bounded to `limit` buckets ending at the view
/// end, and a view end past the newest real bucket adds exactly one
/// flat candle; `as_of` is caller-controlled, so the range must stay
/// bounded for any input.
pub fn assemble_series(
    rows_desc: Vec<CandleRow>,
    resolution: Resolution,
    limit: i64,
    as_of: Option<i64>,
) -> Vec<CandleView> {
    let mut views: Vec<CandleView> = rows_desc.into_iter().map(CandleView::from).collect();
    views.reverse();

    let Some(last) = views.last() else {
        return Vec::new();
    };

    let step = resolution.seconds();
    let last_end = last.timestamp.saturating_add(step);
    let end = match as_of {
        Some(as_of) if resolution.align(as_of) > last.timestamp => {
            last_end.saturating_add(step)
        }
        _ => last_end,
    };

    // Real candles older than the window only contribute the close the
    // first padded bucket carries forward.
    let window_start = end.saturating_sub(step.saturating_mul(limit));
    let split = views.partition_point(|v| v.timestamp < window_start);
    let seed = (split > 0).then(|| views[split - 1].close.clone());
    let mut windowed = views.split_off(split);

    if windowed.first().map_or(true, |v| v.timestamp > window_start) {
        if let Some(close) = seed {
            windowed.insert(
                0,
                CandleView {
                    timestamp: window_start,
                    open: close.clone(),
                    high: close.clone(),
                    low: close.clone(),
                    close,
                    volume: BigDecimal::from(0),
                },
            );
        }
    }

    let padded = pad_candles(&windowed, resolution, end);
    let skip = padded.len().saturating_sub(limit as usize);
    padded.into_iter().skip(skip).collect()
}

/// Latest candles for a product at a resolution, ascending, padded.
/// `as_of` restricts the view to buckets strictly before it and pads the
/// tail up to it.
pub fn get_candles(
    product: &str,
    resolution: Resolution,
    limit: Option<i64>,
    as_of: Option<i64>,
    conn: &mut PgPooledConn,
) -> Result<Vec<CandleView>, MarketDataError> {
    let limit = clamp_limit(limit);
    let rows = candle_queries::latest_candles(product, resolution, limit, as_of, conn)?;
    Ok(assemble_series(rows, resolution, limit, as_of))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use uuid::Uuid;

    fn row(bucket_start: i64, open: i64, close: i64) -> CandleRow {
        CandleRow {
            id: Uuid::new_v4(),
            product: "btc_usdt".to_string(),
            bucket_start,
            resolution: 60,
            open: BigDecimal::from(open),
            high: BigDecimal::from(open.max(close)),
            low: BigDecimal::from(open.min(close)),
            close: BigDecimal::from(close),
            volume: BigDecimal::from(1),
            created_at: NaiveDateTime::default(),
        }
    }

    #[test]
    fn limits_fall_back_to_defaults() {
        assert_eq!(clamp_limit(None), 100);
        assert_eq!(clamp_limit(Some(0)), 100);
        assert_eq!(clamp_limit(Some(-5)), 100);
        assert_eq!(clamp_limit(Some(250)), 250);
        assert_eq!(clamp_limit(Some(5000)), 1000);
    }

    #[test]
    fn series_comes_back_ascending_and_padded() {
        // DB hands rows back newest first with minute 1 missing.
        let rows = vec![row(120, 104, 105), row(0, 100, 103)];

        let series = assemble_series(rows, Resolution::OneMinute, 100, None);
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].timestamp, 0);
        assert_eq!(series[1].timestamp, 60);
        assert_eq!(series[1].close, BigDecimal::from(103));
        assert_eq!(series[1].volume, BigDecimal::from(0));
        assert_eq!(series[2].timestamp, 120);
    }

    #[test]
    fn stale_view_end_adds_one_flat_candle() {
        let rows = vec![row(0, 100, 103)];

        let series = assemble_series(rows, Resolution::OneMinute, 100, Some(150));
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].timestamp, 60);
        assert_eq!(series[1].close, BigDecimal::from(103));
        assert_eq!(series[1].volume, BigDecimal::from(0));
    }

    #[test]
    fn extreme_view_end_stays_bounded() {
        let rows = vec![row(0, 100, 103)];

        let series = assemble_series(rows, Resolution::OneMinute, 10, Some(i64::MAX));
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].timestamp, 60);
        assert_eq!(series[1].volume, BigDecimal::from(0));

        let series = assemble_series(Vec::new(), Resolution::OneMinute, 10, Some(i64::MAX));
        assert!(series.is_empty());
    }

    #[test]
    fn distant_history_pads_only_the_window() {
        // Newest candle a year after the oldest; only `limit` buckets
        // come back, leading ones carrying the older close.
        let rows = vec![row(31_536_000, 104, 105), row(0, 100, 103)];

        let series = assemble_series(rows, Resolution::OneMinute, 10, None);
        assert_eq!(series.len(), 10);
        assert_eq!(series[0].timestamp, 31_536_000 - 9 * 60);
        assert_eq!(series[0].close, BigDecimal::from(103));
        assert_eq!(series[0].volume, BigDecimal::from(0));
        assert_eq!(series.last().map(|c| c.timestamp), Some(31_536_000));
        assert_eq!(series.last().map(|c| c.close.clone()), Some(BigDecimal::from(105)));
    }

    #[test]
    fn padding_never_pushes_the_series_past_the_limit() {
        // Two real candles ten minutes apart pad out to eleven buckets.
        let rows = vec![row(600, 104, 105), row(0, 100, 103)];

        let series = assemble_series(rows, Resolution::OneMinute, 4, None);
        assert_eq!(series.len(), 4);
        assert_eq!(series.last().map(|c| c.timestamp), Some(600));
        assert_eq!(series[0].timestamp, 420);
    }

    #[test]
    fn empty_rows_give_an_empty_series() {
        assert!(assemble_series(Vec::new(), Resolution::OneMinute, 100, None).is_empty());
    }
}
