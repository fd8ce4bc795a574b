use crate::store::CandleStore;
use crate::tickers::cache::TickerCache;
use crate::tickers::db_types::Ticker;
use crate::tickers::refresher::TickerRefresher;
use crate::trades::commit::{self, CommitSummary};
use crate::trades::db_types::TradeEvent;
use crate::utils::db::PgPool;
use crate::utils::errors::MarketDataError;
use crate::workers::config::MarketDataConfig;

/// Everything the aggregation pipeline owns, passed around explicitly as
/// one shared handle. The binary wraps this in an `Arc` and hands clones
/// to the workers and the API router.
pub struct MarketDataContext {
    pub store: CandleStore,
    pub config: MarketDataConfig,
    pub tickers: TickerCache,
    pub refresher: TickerRefresher,
}

impl MarketDataContext {
    pub fn new(pool: PgPool, config: MarketDataConfig) -> Self {
        MarketDataContext {
            store: CandleStore::new(pool),
            config,
            tickers: TickerCache::new(),
            refresher: TickerRefresher::new(),
        }
    }

    /// Entry point for the ledger node: one committed block's trades.
    /// When the subsystem is disabled the block is dropped without
    /// touching the store or the ticker cache.
    pub async fn on_block_commit(
        &self,
        block_timestamp: i64,
        events: Vec<TradeEvent>,
    ) -> Result<CommitSummary, MarketDataError> {
        if !self.config.enabled {
            return Ok(CommitSummary {
                block_timestamp,
                trades_inserted: 0,
                products: Vec::new(),
                tickers_refreshed: 0,
            });
        }
        commit::on_block_commit(
            &self.store,
            &self.refresher,
            &self.tickers,
            block_timestamp,
            events,
        )
        .await
    }

    pub async fn get_tickers(&self) -> Vec<Ticker> {
        self.tickers.get_all().await
    }

    pub async fn get_ticker(&self, product: &str) -> Option<Ticker> {
        self.tickers.get(product).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use diesel::r2d2::ConnectionManager;
    use diesel::PgConnection;

    fn context(config: MarketDataConfig) -> MarketDataContext {
        let manager = ConnectionManager::<PgConnection>::new("postgres://unused/unused");
        let pool = PgPool::builder()
            .max_size(1)
            .min_idle(Some(0))
            .test_on_check_out(false)
            .build_unchecked(manager);
        MarketDataContext::new(pool, config)
    }

    #[tokio::test]
    async fn disabled_subsystem_drops_committed_blocks() {
        let ctx = context(MarketDataConfig {
            enabled: false,
            ..MarketDataConfig::default()
        });
        let events = vec![TradeEvent {
            product: "btc_usdt".to_string(),
            price: BigDecimal::from(100),
            quantity: BigDecimal::from(2),
            timestamp: 1_700_000_000,
            block_height: 42,
        }];

        let summary = ctx.on_block_commit(1_700_000_005, events).await.unwrap();

        assert_eq!(summary.trades_inserted, 0);
        assert!(summary.products.is_empty());
        assert_eq!(summary.tickers_refreshed, 0);
        assert_eq!(ctx.store.max_block_timestamp(), 0);
        assert!(ctx.get_tickers().await.is_empty());
    }
}
