use crate::klines::resolution::Resolution;
use crate::store::{candle_queries, trade_queries};
use crate::utils::db::PgPooledConn;
use crate::utils::errors::MarketDataError;

/// Picks the bucket a worker should resume from.
///
/// Already-built output wins: if a candle at this resolution exists at or
/// after `requested_start`, work resumes just past it. Otherwise a cold
/// start from zero anchors on the earliest upstream data, and an explicit
/// `requested_start` is honored as-is. No upstream data at all means there
/// is nothing to do yet.
pub fn resolve_resume_point(
    max_existing: Option<i64>,
    upstream_min: Option<i64>,
    requested_start: i64,
    resolution: Resolution,
) -> Result<i64, MarketDataError> {
    if let Some(max_bucket) = max_existing {
        return Ok(max_bucket + resolution.seconds());
    }

    if requested_start == 0 {
        let min = upstream_min.ok_or(MarketDataError::NoSourceData)?;
        return Ok(resolution.align(min));
    }

    Ok(resolution.align(requested_start))
}

/// Resume point for the base builder, anchored on raw trades.
pub fn base_resume_point(
    requested_start: i64,
    conn: &mut PgPooledConn,
) -> Result<i64, MarketDataError> {
    let resolution = Resolution::OneMinute;
    let max_existing = candle_queries::max_bucket_start(resolution, requested_start, conn)?;
    let upstream_min = trade_queries::min_timestamp(conn)?;
    resolve_resume_point(max_existing, upstream_min, requested_start, resolution)
}

/// Resume point for a merge worker, anchored on persisted base candles.
pub fn merge_resume_point(
    target: Resolution,
    requested_start: i64,
    conn: &mut PgPooledConn,
) -> Result<i64, MarketDataError> {
    let max_existing = candle_queries::max_bucket_start(target, requested_start, conn)?;
    let upstream_min = candle_queries::min_bucket_start(Resolution::OneMinute, conn)?;
    resolve_resume_point(max_existing, upstream_min, requested_start, target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resumes_past_latest_existing_bucket() {
        let resume =
            resolve_resume_point(Some(600), Some(0), 0, Resolution::OneMinute).unwrap();
        assert_eq!(resume, 660);
    }

    #[test]
    fn cold_start_anchors_on_earliest_upstream() {
        let resume =
            resolve_resume_point(None, Some(1_700_000_007), 0, Resolution::FiveMinutes).unwrap();
        assert_eq!(resume, Resolution::FiveMinutes.align(1_700_000_007));
    }

    #[test]
    fn cold_start_with_no_upstream_is_idle() {
        let err = resolve_resume_point(None, None, 0, Resolution::OneMinute).unwrap_err();
        assert!(err.is_idle());
    }

    #[test]
    fn explicit_start_is_honored_and_aligned() {
        let resume =
            resolve_resume_point(None, None, 1_700_000_030, Resolution::OneMinute).unwrap();
        assert_eq!(resume, Resolution::OneMinute.align(1_700_000_030));
        assert_eq!(resume % 60, 0);
    }
}
