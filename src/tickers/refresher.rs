use std::collections::HashSet;

use bigdecimal::{BigDecimal, RoundingMode};
use tokio::sync::Mutex;
use tracing::debug;

use crate::klines::db_types::CandleRow;
use crate::klines::resolution::{
    Resolution, BASE_SETTLE_DELAY_SECS, MERGE_SETTLE_DELAY_SECS, SECONDS_IN_A_DAY,
};
use crate::store::{candle_queries, trade_queries, CandleStore};
use crate::tickers::cache::TickerCache;
use crate::tickers::db_types::Ticker;
use crate::trades::db_types::TradeRow;
use crate::utils::errors::MarketDataError;

/// Segment boundaries for one refresh round ending at `end`.
///
/// The 24h window is stitched from three layers, coarse to fine: settled
/// 15-minute candles up to `anchor_15m`, settled 1-minute candles up to
/// `anchor_1m`, and raw trades for the unsettled tail. The candle layers
/// are stable between rounds and can be buffered; the tail is requeried
/// every round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshAnchors {
    pub window_start: i64,
    pub anchor_15m: i64,
    pub anchor_1m: i64,
    pub end: i64,
}

pub fn refresh_anchors(end: i64) -> RefreshAnchors {
    let window_start = Resolution::FifteenMinutes.align(end) - SECONDS_IN_A_DAY;
    let anchor_15m = (Resolution::FifteenMinutes.align(end - MERGE_SETTLE_DELAY_SECS)
        - Resolution::FifteenMinutes.seconds())
    .max(window_start);
    let anchor_1m = (Resolution::OneMinute.align(end - BASE_SETTLE_DELAY_SECS)
        - Resolution::OneMinute.seconds())
    .max(anchor_15m);

    RefreshAnchors {
        window_start,
        anchor_15m,
        anchor_1m,
        end,
    }
}

/// One price observation inside the window, in time order.
#[derive(Debug, Clone)]
pub struct Sample {
    pub open: BigDecimal,
    pub high: BigDecimal,
    pub low: BigDecimal,
    pub close: BigDecimal,
    pub volume: BigDecimal,
}

impl From<&CandleRow> for Sample {
    fn from(row: &CandleRow) -> Self {
        Sample {
            open: row.open.clone(),
            high: row.high.clone(),
            low: row.low.clone(),
            close: row.close.clone(),
            volume: row.volume.clone(),
        }
    }
}

impl From<&TradeRow> for Sample {
    fn from(trade: &TradeRow) -> Self {
        Sample {
            open: trade.price.clone(),
            high: trade.price.clone(),
            low: trade.price.clone(),
            close: trade.price.clone(),
            volume: trade.quantity.clone(),
        }
    }
}

pub fn format_change_percentage(open: &BigDecimal, change: &BigDecimal) -> String {
    if *open == BigDecimal::from(0) {
        return "0.00%".to_string();
    }

    let percentage = (change * BigDecimal::from(100) / open)
        .with_scale_round(2, RoundingMode::HalfUp);
    format!("{percentage}%")
}

/// Folds the window's samples into a ticker.
///
/// With no samples in the window, the last price ever traded carries
/// forward as a flat zero-volume ticker. A product that never traded at
/// all yields nothing.
pub fn compute_ticker(
    product: &str,
    samples: &[Sample],
    last_known_price: Option<BigDecimal>,
    timestamp: i64,
) -> Option<Ticker> {
    let Some(first) = samples.first() else {
        let price = last_known_price?;
        return Some(Ticker {
            product: product.to_string(),
            open: price.clone(),
            high: price.clone(),
            low: price.clone(),
            close: price.clone(),
            price: price.clone(),
            volume: BigDecimal::from(0),
            change: BigDecimal::from(0),
            change_percentage: "0.00%".to_string(),
            timestamp,
        });
    };

    let open = first.open.clone();
    let close = samples
        .last()
        .map(|s| s.close.clone())
        .unwrap_or_else(|| open.clone());

    let high = samples
        .iter()
        .map(|s| s.high.clone())
        .max()
        .unwrap_or_else(|| open.clone());

    let low = samples
        .iter()
        .map(|s| s.low.clone())
        .min()
        .unwrap_or_else(|| open.clone());

    let volume = samples
        .iter()
        .fold(BigDecimal::from(0), |acc, s| acc + &s.volume);

    let change = &close - &open;
    let change_percentage = format_change_percentage(&open, &change);

    Some(Ticker {
        product: product.to_string(),
        open,
        high,
        low,
        price: close.clone(),
        close,
        volume,
        change,
        change_percentage,
        timestamp,
    })
}

#[derive(Default)]
struct KlineBuffers {
    m15_epoch: Option<(i64, i64)>,
    m15: Vec<CandleRow>,
    m1_epoch: Option<(i64, i64)>,
    m1: Vec<CandleRow>,
}

/// Recomputes 24h tickers, buffering the settled candle segments between
/// rounds so only the raw tail hits the trades table every time.
pub struct TickerRefresher {
    buffers: Mutex<KlineBuffers>,
}

impl TickerRefresher {
    pub fn new() -> Self {
        TickerRefresher {
            buffers: Mutex::new(KlineBuffers::default()),
        }
    }

    /// Refreshes the tickers of `products` as of `end` and applies the
    /// round to the cache. Returns how many tickers were recomputed.
    pub async fn refresh(
        &self,
        store: &CandleStore,
        cache: &TickerCache,
        products: &[String],
        end: i64,
    ) -> Result<usize, MarketDataError> {
        let anchors = refresh_anchors(end);

        let mut buffers = self.buffers.lock().await;

        let m15_epoch = (anchors.window_start, anchors.anchor_15m);
        if buffers.m15_epoch != Some(m15_epoch) {
            let mut conn = store.conn()?;
            buffers.m15 = candle_queries::candles_in_range(
                Resolution::FifteenMinutes,
                anchors.window_start,
                anchors.anchor_15m,
                &mut conn,
            )?;
            buffers.m15_epoch = Some(m15_epoch);
        }

        let m1_epoch = (anchors.anchor_15m, anchors.anchor_1m);
        if buffers.m1_epoch != Some(m1_epoch) {
            let mut conn = store.conn()?;
            buffers.m1 = candle_queries::candles_in_range(
                Resolution::OneMinute,
                anchors.anchor_15m,
                anchors.anchor_1m,
                &mut conn,
            )?;
            buffers.m1_epoch = Some(m1_epoch);
        }

        // Unsettled tail, including the end second itself.
        let tail = {
            let mut conn = store.conn()?;
            trade_queries::trades_in_range(anchors.anchor_1m, anchors.end + 1, &mut conn)?
        };

        let mut computed = Vec::new();
        for product in products {
            let mut samples: Vec<Sample> = Vec::new();
            samples.extend(
                buffers
                    .m15
                    .iter()
                    .filter(|c| c.product == *product)
                    .map(Sample::from),
            );
            samples.extend(
                buffers
                    .m1
                    .iter()
                    .filter(|c| c.product == *product)
                    .map(Sample::from),
            );
            samples.extend(tail.iter().filter(|t| t.product == *product).map(Sample::from));

            let last_known_price = if samples.is_empty() {
                let mut conn = store.conn()?;
                trade_queries::latest_trade_before(product, anchors.end + 1, &mut conn)?
                    .map(|t| t.price)
            } else {
                None
            };

            if let Some(ticker) = compute_ticker(product, &samples, last_known_price, end) {
                computed.push(ticker);
            }
        }

        let refreshed = computed.len();
        let round: HashSet<String> = products.iter().cloned().collect();
        cache.apply_round(&round, computed, end).await;

        debug!(end, refreshed, "refreshed tickers");
        Ok(refreshed)
    }
}

impl Default for TickerRefresher {
    fn default() -> Self {
        TickerRefresher::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(open: i64, high: i64, low: i64, close: i64, volume: i64) -> Sample {
        Sample {
            open: BigDecimal::from(open),
            high: BigDecimal::from(high),
            low: BigDecimal::from(low),
            close: BigDecimal::from(close),
            volume: BigDecimal::from(volume),
        }
    }

    #[test]
    fn anchors_partition_the_window() {
        // 12:07:00 on some day.
        let end = 1_700_000_000 / 86_400 * 86_400 + 43_620;
        let anchors = refresh_anchors(end);

        assert_eq!(anchors.window_start % 900, 0);
        assert_eq!(anchors.anchor_15m % 900, 0);
        assert_eq!(anchors.anchor_1m % 60, 0);
        assert!(anchors.window_start <= anchors.anchor_15m);
        assert!(anchors.anchor_15m <= anchors.anchor_1m);
        assert!(anchors.anchor_1m <= anchors.end);
        assert_eq!(anchors.window_start, Resolution::FifteenMinutes.align(end) - SECONDS_IN_A_DAY);
    }

    #[test]
    fn anchors_clamp_near_the_epoch() {
        let anchors = refresh_anchors(120);
        assert!(anchors.anchor_15m >= anchors.window_start);
        assert!(anchors.anchor_1m >= anchors.anchor_15m);
    }

    #[test]
    fn ticker_folds_across_the_window() {
        let samples = vec![
            sample(100, 104, 99, 103, 5),
            sample(103, 108, 102, 107, 3),
            sample(107, 110, 101, 110, 2),
        ];

        let ticker = compute_ticker("btc_usdt", &samples, None, 1000).unwrap();
        assert_eq!(ticker.open, BigDecimal::from(100));
        assert_eq!(ticker.high, BigDecimal::from(110));
        assert_eq!(ticker.low, BigDecimal::from(99));
        assert_eq!(ticker.close, BigDecimal::from(110));
        assert_eq!(ticker.volume, BigDecimal::from(10));
        assert_eq!(ticker.change, BigDecimal::from(10));
        assert_eq!(ticker.change_percentage, "10.00%");
    }

    #[test]
    fn two_trades_make_a_two_sample_ticker() {
        // 100 for 2, then 101 for 3, inside the window.
        let samples = vec![sample(100, 100, 100, 100, 2), sample(101, 101, 101, 101, 3)];

        let ticker = compute_ticker("btc_usdt", &samples, None, 1000).unwrap();
        assert_eq!(ticker.open, BigDecimal::from(100));
        assert_eq!(ticker.close, BigDecimal::from(101));
        assert_eq!(ticker.price, ticker.close);
        assert_eq!(ticker.volume, BigDecimal::from(5));
        assert_eq!(ticker.change, BigDecimal::from(1));
        assert_eq!(ticker.change_percentage, "1.00%");
    }

    #[test]
    fn empty_window_carries_the_last_price_forward() {
        let ticker =
            compute_ticker("btc_usdt", &[], Some(BigDecimal::from(250)), 1000).unwrap();
        assert_eq!(ticker.open, BigDecimal::from(250));
        assert_eq!(ticker.close, BigDecimal::from(250));
        assert_eq!(ticker.price, BigDecimal::from(250));
        assert_eq!(ticker.volume, BigDecimal::from(0));
        assert_eq!(ticker.change_percentage, "0.00%");
    }

    #[test]
    fn product_that_never_traded_has_no_ticker() {
        assert!(compute_ticker("btc_usdt", &[], None, 1000).is_none());
    }

    #[test]
    fn zero_open_does_not_divide() {
        let samples = vec![sample(0, 5, 0, 5, 1)];
        let ticker = compute_ticker("btc_usdt", &samples, None, 1000).unwrap();
        assert_eq!(ticker.change_percentage, "0.00%");
    }

    #[test]
    fn negative_change_formats_with_sign() {
        let samples = vec![sample(200, 200, 150, 150, 1)];
        let ticker = compute_ticker("btc_usdt", &samples, None, 1000).unwrap();
        assert_eq!(ticker.change, BigDecimal::from(-50));
        assert_eq!(ticker.change_percentage, "-25.00%");
    }
}
