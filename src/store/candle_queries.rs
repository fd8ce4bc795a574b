use diesel::prelude::*;

use crate::klines::db_types::{CandleRow, NewCandle};
use crate::klines::resolution::Resolution;
use crate::utils::db::PgPooledConn;
use crate::utils::errors::MarketDataError;

/// Latest persisted bucket start for a resolution, at or after `min_start`.
pub fn max_bucket_start(
    resolution: Resolution,
    min_start: i64,
    conn: &mut PgPooledConn,
) -> Result<Option<i64>, MarketDataError> {
    use crate::schema::candles::dsl;

    let max = dsl::candles
        .filter(
            dsl::resolution
                .eq(resolution.seconds() as i32)
                .and(dsl::bucket_start.ge(min_start)),
        )
        .select(diesel::dsl::max(dsl::bucket_start))
        .first::<Option<i64>>(conn)?;

    Ok(max)
}

/// Earliest persisted bucket start for a resolution.
pub fn min_bucket_start(
    resolution: Resolution,
    conn: &mut PgPooledConn,
) -> Result<Option<i64>, MarketDataError> {
    use crate::schema::candles::dsl;

    let min = dsl::candles
        .filter(dsl::resolution.eq(resolution.seconds() as i32))
        .select(diesel::dsl::min(dsl::bucket_start))
        .first::<Option<i64>>(conn)?;

    Ok(min)
}

/// All candles of a resolution inside `[start, end)`, ascending by bucket.
pub fn candles_in_range(
    resolution: Resolution,
    start: i64,
    end: i64,
    conn: &mut PgPooledConn,
) -> Result<Vec<CandleRow>, MarketDataError> {
    use crate::schema::candles::dsl;

    let rows = dsl::candles
        .filter(
            dsl::resolution
                .eq(resolution.seconds() as i32)
                .and(dsl::bucket_start.ge(start))
                .and(dsl::bucket_start.lt(end)),
        )
        .order(dsl::bucket_start.asc())
        .load::<CandleRow>(conn)?;

    Ok(rows)
}

/// Most recent candles for one product, newest first, optionally only
/// buckets strictly before `before`.
pub fn latest_candles(
    product: &str,
    resolution: Resolution,
    limit: i64,
    before: Option<i64>,
    conn: &mut PgPooledConn,
) -> Result<Vec<CandleRow>, MarketDataError> {
    use crate::schema::candles::dsl;

    let mut query = dsl::candles
        .filter(
            dsl::product
                .eq(product)
                .and(dsl::resolution.eq(resolution.seconds() as i32)),
        )
        .into_boxed();

    if let Some(before) = before {
        query = query.filter(dsl::bucket_start.lt(before));
    }

    let rows = query
        .order(dsl::bucket_start.desc())
        .limit(limit)
        .load::<CandleRow>(conn)?;

    Ok(rows)
}

pub fn insert_candles(
    candles: &[NewCandle],
    conn: &mut PgPooledConn,
) -> Result<usize, MarketDataError> {
    use crate::schema::candles::dsl;

    let inserted = diesel::insert_into(dsl::candles)
        .values(candles)
        .execute(conn)?;

    Ok(inserted)
}

/// Replaces each candle's row for its `(product, bucket_start, resolution)`
/// key. Runs delete and insert inside one transaction so readers never see
/// a bucket half replaced.
pub fn upsert_candles(
    candles: &[NewCandle],
    conn: &mut PgPooledConn,
) -> Result<usize, MarketDataError> {
    use crate::schema::candles::dsl;

    let replaced = conn.transaction::<usize, diesel::result::Error, _>(|conn| {
        for candle in candles {
            diesel::delete(
                dsl::candles.filter(
                    dsl::product
                        .eq(&candle.product)
                        .and(dsl::bucket_start.eq(candle.bucket_start))
                        .and(dsl::resolution.eq(candle.resolution)),
                ),
            )
            .execute(conn)?;
        }

        diesel::insert_into(dsl::candles).values(candles).execute(conn)
    })?;

    Ok(replaced)
}

/// Deletes candles of one resolution with buckets strictly before `cutoff`.
pub fn delete_candles_before(
    resolution: Resolution,
    cutoff: i64,
    conn: &mut PgPooledConn,
) -> Result<usize, MarketDataError> {
    use crate::schema::candles::dsl;

    let deleted = diesel::delete(
        dsl::candles.filter(
            dsl::resolution
                .eq(resolution.seconds() as i32)
                .and(dsl::bucket_start.lt(cutoff)),
        ),
    )
    .execute(conn)?;

    Ok(deleted)
}

/// Distinct products with at least one candle of a resolution whose
/// bucket falls inside `[start, end)`.
pub fn products_with_candles_in_range(
    resolution: Resolution,
    start: i64,
    end: i64,
    conn: &mut PgPooledConn,
) -> Result<Vec<String>, MarketDataError> {
    use crate::schema::candles::dsl;

    let products = dsl::candles
        .filter(
            dsl::resolution
                .eq(resolution.seconds() as i32)
                .and(dsl::bucket_start.ge(start))
                .and(dsl::bucket_start.lt(end)),
        )
        .select(dsl::product)
        .distinct()
        .order(dsl::product.asc())
        .load::<String>(conn)?;

    Ok(products)
}
