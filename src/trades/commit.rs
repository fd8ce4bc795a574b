use std::collections::BTreeSet;

use tracing::info;

use crate::store::CandleStore;
use crate::tickers::cache::TickerCache;
use crate::tickers::refresher::TickerRefresher;
use crate::trades::db_types::{NewTrade, TradeEvent};
use crate::utils::errors::MarketDataError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub block_timestamp: i64,
    pub trades_inserted: usize,
    pub products: Vec<String>,
    pub tickers_refreshed: usize,
}

/// Ingests one committed block of trades.
///
/// The block timestamp is recorded before anything else so candle workers
/// see their settle horizon advance even on empty blocks. Trades are then
/// persisted and the tickers of every product the block touched are
/// refreshed as of the block time.
pub async fn on_block_commit(
    store: &CandleStore,
    refresher: &TickerRefresher,
    cache: &TickerCache,
    block_timestamp: i64,
    events: Vec<TradeEvent>,
) -> Result<CommitSummary, MarketDataError> {
    store.record_block_timestamp(block_timestamp);

    let products: Vec<String> = events
        .iter()
        .map(|e| e.product.clone())
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect();

    let new_trades: Vec<NewTrade> = events.into_iter().map(TradeEvent::into_new_trade).collect();
    let trades_inserted = store.insert_trades(&new_trades).await?;

    let tickers_refreshed = if products.is_empty() {
        0
    } else {
        refresher
            .refresh(store, cache, &products, block_timestamp)
            .await?
    };

    if trades_inserted > 0 {
        info!(
            block_timestamp,
            trades_inserted, tickers_refreshed, "committed block trades"
        );
    }

    Ok(CommitSummary {
        block_timestamp,
        trades_inserted,
        products,
        tickers_refreshed,
    })
}
