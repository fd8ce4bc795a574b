use std::collections::{BTreeMap, HashSet};

use tokio::sync::Mutex;

use crate::tickers::db_types::Ticker;

/// In-memory ticker snapshot, one entry per product.
///
/// Backed by a `BTreeMap` so listing always comes out in alphabetical
/// product order regardless of refresh order.
pub struct TickerCache {
    inner: Mutex<BTreeMap<String, Ticker>>,
}

impl TickerCache {
    pub fn new() -> Self {
        TickerCache {
            inner: Mutex::new(BTreeMap::new()),
        }
    }

    pub async fn get(&self, product: &str) -> Option<Ticker> {
        self.inner.lock().await.get(product).cloned()
    }

    pub async fn get_all(&self) -> Vec<Ticker> {
        self.inner.lock().await.values().cloned().collect()
    }

    pub async fn products(&self) -> Vec<String> {
        self.inner.lock().await.keys().cloned().collect()
    }

    /// Applies one refresh round.
    ///
    /// Freshly computed tickers replace their cache entries. Cached
    /// products missing from `round_products` traded nowhere in their
    /// window, so they degrade to a flat snapshot at the previous close.
    /// Products in the round for which no ticker could be computed are
    /// left untouched.
    pub async fn apply_round(
        &self,
        round_products: &HashSet<String>,
        computed: Vec<Ticker>,
        timestamp: i64,
    ) {
        let mut cache = self.inner.lock().await;

        for ticker in computed {
            cache.insert(ticker.product.clone(), ticker);
        }

        let degraded: Vec<Ticker> = cache
            .values()
            .filter(|t| !round_products.contains(&t.product) && t.timestamp < timestamp)
            .map(|t| t.degraded(timestamp))
            .collect();

        for ticker in degraded {
            cache.insert(ticker.product.clone(), ticker);
        }
    }
}

impl Default for TickerCache {
    fn default() -> Self {
        TickerCache::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    fn ticker(product: &str, open: i64, close: i64, volume: i64, timestamp: i64) -> Ticker {
        Ticker {
            product: product.to_string(),
            open: BigDecimal::from(open),
            high: BigDecimal::from(open.max(close)),
            low: BigDecimal::from(open.min(close)),
            close: BigDecimal::from(close),
            price: BigDecimal::from(close),
            volume: BigDecimal::from(volume),
            change: BigDecimal::from(close - open),
            change_percentage: "1.00%".to_string(),
            timestamp,
        }
    }

    #[tokio::test]
    async fn listing_is_alphabetical_regardless_of_insert_order() {
        let cache = TickerCache::new();
        let round: HashSet<String> =
            ["eth_usdt", "btc_usdt", "atom_usdt"].iter().map(|s| s.to_string()).collect();

        cache
            .apply_round(
                &round,
                vec![
                    ticker("eth_usdt", 1, 2, 1, 100),
                    ticker("btc_usdt", 1, 2, 1, 100),
                    ticker("atom_usdt", 1, 2, 1, 100),
                ],
                100,
            )
            .await;

        let products: Vec<String> =
            cache.get_all().await.into_iter().map(|t| t.product).collect();
        assert_eq!(products, vec!["atom_usdt", "btc_usdt", "eth_usdt"]);
    }

    #[tokio::test]
    async fn stale_products_degrade_to_a_flat_snapshot() {
        let cache = TickerCache::new();

        let first_round: HashSet<String> = ["btc_usdt".to_string()].into_iter().collect();
        cache
            .apply_round(&first_round, vec![ticker("btc_usdt", 100, 110, 5, 100)], 100)
            .await;

        // Next round btc_usdt traded nowhere in its window.
        let second_round: HashSet<String> = HashSet::new();
        cache.apply_round(&second_round, Vec::new(), 200).await;

        let btc = cache.get("btc_usdt").await.unwrap();
        assert_eq!(btc.open, BigDecimal::from(110));
        assert_eq!(btc.close, BigDecimal::from(110));
        assert_eq!(btc.volume, BigDecimal::from(0));
        assert_eq!(btc.change_percentage, "0.00%");
        assert_eq!(btc.timestamp, 200);
    }

    #[tokio::test]
    async fn products_in_the_round_without_a_result_are_untouched() {
        let cache = TickerCache::new();

        let round: HashSet<String> = ["btc_usdt".to_string()].into_iter().collect();
        cache
            .apply_round(&round, vec![ticker("btc_usdt", 100, 110, 5, 100)], 100)
            .await;

        // Same product in the round again, but computation found nothing.
        cache.apply_round(&round, Vec::new(), 200).await;

        let btc = cache.get("btc_usdt").await.unwrap();
        assert_eq!(btc.close, BigDecimal::from(110));
        assert_eq!(btc.volume, BigDecimal::from(5));
        assert_eq!(btc.timestamp, 100);
    }
}
