use diesel::prelude::*;

use crate::trades::db_types::{NewTrade, TradeRow};
use crate::utils::db::PgPooledConn;
use crate::utils::errors::MarketDataError;

/// Earliest trade timestamp on record, if any trade exists.
pub fn min_timestamp(conn: &mut PgPooledConn) -> Result<Option<i64>, MarketDataError> {
    use crate::schema::trades::dsl;

    let min = dsl::trades
        .select(diesel::dsl::min(dsl::timestamp))
        .first::<Option<i64>>(conn)?;

    Ok(min)
}

/// Latest trade timestamp on record, if any trade exists.
pub fn max_timestamp(conn: &mut PgPooledConn) -> Result<Option<i64>, MarketDataError> {
    use crate::schema::trades::dsl;

    let max = dsl::trades
        .select(diesel::dsl::max(dsl::timestamp))
        .first::<Option<i64>>(conn)?;

    Ok(max)
}

/// All trades inside `[start, end)`, ordered by `(timestamp, id)`.
pub fn trades_in_range(
    start: i64,
    end: i64,
    conn: &mut PgPooledConn,
) -> Result<Vec<TradeRow>, MarketDataError> {
    use crate::schema::trades::dsl;

    let rows = dsl::trades
        .filter(dsl::timestamp.ge(start).and(dsl::timestamp.lt(end)))
        .order((dsl::timestamp.asc(), dsl::id.asc()))
        .load::<TradeRow>(conn)?;

    Ok(rows)
}

/// Most recent trade for a product with `timestamp < before`.
pub fn latest_trade_before(
    product: &str,
    before: i64,
    conn: &mut PgPooledConn,
) -> Result<Option<TradeRow>, MarketDataError> {
    use crate::schema::trades::dsl;

    let row = dsl::trades
        .filter(dsl::product.eq(product).and(dsl::timestamp.lt(before)))
        .order((dsl::timestamp.desc(), dsl::id.desc()))
        .first::<TradeRow>(conn)
        .optional()?;

    Ok(row)
}

/// Distinct products that traded inside `[start, end)`.
pub fn products_in_range(
    start: i64,
    end: i64,
    conn: &mut PgPooledConn,
) -> Result<Vec<String>, MarketDataError> {
    use crate::schema::trades::dsl;

    let products = dsl::trades
        .filter(dsl::timestamp.ge(start).and(dsl::timestamp.lt(end)))
        .select(dsl::product)
        .distinct()
        .order(dsl::product.asc())
        .load::<String>(conn)?;

    Ok(products)
}

pub fn insert_trades(
    trades: &[NewTrade],
    conn: &mut PgPooledConn,
) -> Result<usize, MarketDataError> {
    use crate::schema::trades::dsl;

    let inserted = conn.transaction::<usize, diesel::result::Error, _>(|conn| {
        diesel::insert_into(dsl::trades).values(trades).execute(conn)
    })?;

    Ok(inserted)
}
