use bigdecimal::BigDecimal;

use crate::klines::db_types::CandleView;
use crate::klines::resolution::Resolution;

/// Fills bucket gaps in an ascending candle series.
///
/// Every missing bucket between the first real candle and `end` becomes a
/// flat candle at the previous close with zero volume. Buckets before the
/// first real candle are left out; nothing is invented before a product's
/// first trade.
pub fn pad_candles(candles: &[CandleView], resolution: Resolution, end: i64) -> Vec<CandleView> {
    let step = resolution.seconds();
    let end = resolution.align(end);

    let Some(first) = candles.first() else {
        return Vec::new();
    };

    let mut padded = Vec::new();
    let mut prev_close = first.open.clone();
    let mut next_bucket = resolution.align(first.timestamp);
    let mut real = candles.iter().peekable();

    while next_bucket < end {
        match real.peek() {
            Some(candle) if candle.timestamp == next_bucket => {
                prev_close = candle.close.clone();
                padded.push((*candle).clone());
                real.next();
            }
            _ => {
                padded.push(CandleView {
                    timestamp: next_bucket,
                    open: prev_close.clone(),
                    high: prev_close.clone(),
                    low: prev_close.clone(),
                    close: prev_close.clone(),
                    volume: BigDecimal::from(0),
                });
            }
        }
        next_bucket += step;
    }

    padded
}
