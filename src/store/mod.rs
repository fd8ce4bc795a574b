pub mod candle_queries;
pub mod trade_queries;

use std::sync::atomic::{AtomicI64, Ordering};

use tokio::sync::Mutex;

use crate::klines::db_types::NewCandle;
use crate::klines::resolution::Resolution;
use crate::trades::db_types::NewTrade;
use crate::utils::db::{get_conn, PgPool, PgPooledConn};
use crate::utils::errors::MarketDataError;

/// Shared handle to the market data store.
///
/// All writes to candles and trades go through `write_lock`, so only one
/// writer mutates aggregate state at a time. Reads take connections from
/// the pool directly and never contend with the lock.
pub struct CandleStore {
    pool: PgPool,
    write_lock: Mutex<()>,
    max_block_timestamp: AtomicI64,
}

impl CandleStore {
    pub fn new(pool: PgPool) -> Self {
        CandleStore {
            pool,
            write_lock: Mutex::new(()),
            max_block_timestamp: AtomicI64::new(0),
        }
    }

    pub fn conn(&self) -> Result<PgPooledConn, MarketDataError> {
        get_conn(&self.pool)
    }

    /// Highest committed block timestamp seen so far. Workers use this as
    /// the right edge of the window they are allowed to settle.
    pub fn max_block_timestamp(&self) -> i64 {
        self.max_block_timestamp.load(Ordering::Acquire)
    }

    pub fn record_block_timestamp(&self, timestamp: i64) {
        self.max_block_timestamp.fetch_max(timestamp, Ordering::AcqRel);
    }

    pub async fn insert_trades(&self, trades: &[NewTrade]) -> Result<usize, MarketDataError> {
        if trades.is_empty() {
            return Ok(0);
        }

        let _guard = self.write_lock.lock().await;
        let mut conn = self.conn()?;
        trade_queries::insert_trades(trades, &mut conn)
    }

    /// Insert-only path for freshly built base candles. The builder only
    /// advances past a bucket once it is settled, so these buckets never
    /// exist yet.
    pub async fn insert_candles(&self, candles: &[NewCandle]) -> Result<usize, MarketDataError> {
        if candles.is_empty() {
            return Ok(0);
        }

        let _guard = self.write_lock.lock().await;
        let mut conn = self.conn()?;
        candle_queries::insert_candles(candles, &mut conn)
    }

    /// Replace-on-conflict path for merged candles, which may legitimately
    /// recompute a bucket that already exists.
    pub async fn upsert_candles(&self, candles: &[NewCandle]) -> Result<usize, MarketDataError> {
        if candles.is_empty() {
            return Ok(0);
        }

        let _guard = self.write_lock.lock().await;
        let mut conn = self.conn()?;
        candle_queries::upsert_candles(candles, &mut conn)
    }

    pub async fn delete_candles_before(
        &self,
        resolution: Resolution,
        cutoff: i64,
    ) -> Result<usize, MarketDataError> {
        let _guard = self.write_lock.lock().await;
        let mut conn = self.conn()?;
        candle_queries::delete_candles_before(resolution, cutoff, &mut conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::r2d2::ConnectionManager;
    use diesel::PgConnection;

    fn store() -> CandleStore {
        let manager = ConnectionManager::<PgConnection>::new("postgres://unused/unused");
        let pool = PgPool::builder()
            .max_size(1)
            .min_idle(Some(0))
            .test_on_check_out(false)
            .build_unchecked(manager);
        CandleStore::new(pool)
    }

    #[test]
    fn block_timestamp_only_moves_forward() {
        let store = store();
        assert_eq!(store.max_block_timestamp(), 0);

        store.record_block_timestamp(1_700_000_000);
        store.record_block_timestamp(1_600_000_000);

        assert_eq!(store.max_block_timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn empty_batches_do_not_touch_the_pool() {
        let store = store();
        assert_eq!(store.insert_trades(&[]).await.unwrap(), 0);
        assert_eq!(store.insert_candles(&[]).await.unwrap(), 0);
        assert_eq!(store.upsert_candles(&[]).await.unwrap(), 0);
    }
}
