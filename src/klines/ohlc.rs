use std::collections::BTreeMap;
use std::ops::Add;

use bigdecimal::BigDecimal;

use crate::klines::db_types::{CandleRow, NewCandle};
use crate::klines::resolution::Resolution;
use crate::trades::db_types::TradeRow;

/// Folds raw trades into one candle per `(product, aligned bucket)`.
///
/// Trades are ordered by `(timestamp, id)` before folding so that open
/// and close are deterministic even when several trades share a second.
/// Returns candles sorted by product, then bucket start.
pub fn candles_from_trades(trades: &[TradeRow], resolution: Resolution) -> Vec<NewCandle> {
    if trades.is_empty() {
        return Vec::new();
    }

    let mut sorted_trades = trades.to_vec();
    sorted_trades.sort_by(|a, b| (a.timestamp, a.id).cmp(&(b.timestamp, b.id)));

    let mut buckets: BTreeMap<(String, i64), Vec<&TradeRow>> = BTreeMap::new();
    for trade in &sorted_trades {
        let bucket_start = resolution.align(trade.timestamp);
        buckets
            .entry((trade.product.clone(), bucket_start))
            .or_default()
            .push(trade);
    }

    buckets
        .into_iter()
        .map(|((product, bucket_start), bucket_trades)| {
            // Non-empty by construction, so first/last always hit.
            let open = bucket_trades
                .first()
                .map(|t| t.price.clone())
                .unwrap_or_default();
            let close = bucket_trades
                .last()
                .map(|t| t.price.clone())
                .unwrap_or_default();

            let high = bucket_trades
                .iter()
                .map(|t| t.price.clone())
                .max()
                .unwrap_or_default();

            let low = bucket_trades
                .iter()
                .map(|t| t.price.clone())
                .min()
                .unwrap_or_default();

            let volume = bucket_trades
                .iter()
                .fold(BigDecimal::from(0), |acc, t| acc.add(&t.quantity));

            NewCandle {
                product,
                bucket_start,
                resolution: resolution.seconds() as i32,
                open,
                high,
                low,
                close,
                volume,
            }
        })
        .collect()
}

/// Merges base candles into one candle per `(product, aligned target bucket)`.
///
/// - Open: open of the earliest child
/// - High: max high across children
/// - Low: min low across children
/// - Close: close of the latest child
/// - Volume: sum of child volumes
pub fn merge_candles(children: &[CandleRow], target: Resolution) -> Vec<NewCandle> {
    if children.is_empty() {
        return Vec::new();
    }

    let mut sorted_children = children.to_vec();
    sorted_children.sort_by(|a, b| a.bucket_start.cmp(&b.bucket_start));

    let mut buckets: BTreeMap<(String, i64), Vec<&CandleRow>> = BTreeMap::new();
    for child in &sorted_children {
        let bucket_start = target.align(child.bucket_start);
        buckets
            .entry((child.product.clone(), bucket_start))
            .or_default()
            .push(child);
    }

    buckets
        .into_iter()
        .map(|((product, bucket_start), bucket_children)| {
            let open = bucket_children
                .first()
                .map(|c| c.open.clone())
                .unwrap_or_default();
            let close = bucket_children
                .last()
                .map(|c| c.close.clone())
                .unwrap_or_default();

            let high = bucket_children
                .iter()
                .map(|c| c.high.clone())
                .max()
                .unwrap_or_default();

            let low = bucket_children
                .iter()
                .map(|c| c.low.clone())
                .min()
                .unwrap_or_default();

            let volume = bucket_children
                .iter()
                .fold(BigDecimal::from(0), |acc, c| acc.add(&c.volume));

            NewCandle {
                product,
                bucket_start,
                resolution: target.seconds() as i32,
                open,
                high,
                low,
                close,
                volume,
            }
        })
        .collect()
}
