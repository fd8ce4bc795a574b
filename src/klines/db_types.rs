use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use diesel::{Identifiable, Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::candles as CandlesTable;

/// A persisted candle. Unique per `(product, bucket_start, resolution)`;
/// `bucket_start` is always aligned to `resolution`.
#[derive(Deserialize, Serialize, Queryable, Identifiable, Selectable, Debug, Clone)]
#[diesel(table_name = CandlesTable)]
pub struct CandleRow {
    pub id: Uuid,
    pub product: String,
    pub bucket_start: i64,
    pub resolution: i32,
    pub open: BigDecimal,
    pub high: BigDecimal,
    pub low: BigDecimal,
    pub close: BigDecimal,
    pub volume: BigDecimal,
    pub created_at: NaiveDateTime,
}

#[derive(Deserialize, Serialize, Insertable, Debug, Clone)]
#[diesel(table_name = CandlesTable)]
pub struct NewCandle {
    pub product: String,
    pub bucket_start: i64,
    pub resolution: i32,
    pub open: BigDecimal,
    pub high: BigDecimal,
    pub low: BigDecimal,
    pub close: BigDecimal,
    pub volume: BigDecimal,
}

impl NewCandle {
    /// OHLC sanity: `low <= open <= high`, `low <= close <= high`,
    /// non-negative volume.
    pub fn is_valid(&self) -> bool {
        self.low <= self.open
            && self.open <= self.high
            && self.low <= self.close
            && self.close <= self.high
            && self.volume >= BigDecimal::from(0)
    }
}

/// Candle shape served to API callers, timestamped by bucket start.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CandleView {
    pub timestamp: i64,
    pub open: BigDecimal,
    pub high: BigDecimal,
    pub low: BigDecimal,
    pub close: BigDecimal,
    pub volume: BigDecimal,
}

impl From<CandleRow> for CandleView {
    fn from(row: CandleRow) -> Self {
        CandleView {
            timestamp: row.bucket_start,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(open: i64, high: i64, low: i64, close: i64, volume: i64) -> NewCandle {
        NewCandle {
            product: "btc_usdt".to_string(),
            bucket_start: 0,
            resolution: 60,
            open: BigDecimal::from(open),
            high: BigDecimal::from(high),
            low: BigDecimal::from(low),
            close: BigDecimal::from(close),
            volume: BigDecimal::from(volume),
        }
    }

    #[test]
    fn ohlc_invariant_holds_for_well_formed_candles() {
        assert!(candle(100, 101, 99, 100, 5).is_valid());
        assert!(candle(100, 100, 100, 100, 0).is_valid());
    }

    #[test]
    fn ohlc_invariant_rejects_inverted_bounds() {
        assert!(!candle(100, 99, 98, 99, 1).is_valid()); // open above high
        assert!(!candle(100, 101, 99, 102, 1).is_valid()); // close above high
        assert!(!candle(100, 101, 99, 100, -1).is_valid()); // negative volume
    }
}
