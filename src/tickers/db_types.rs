use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// Rolling 24-hour snapshot for one product.
///
/// `price` mirrors `close`, the last traded price in the window.
/// `change_percentage` is pre-formatted with two decimals and a trailing
/// percent sign so every consumer renders the same string.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Ticker {
    pub product: String,
    pub open: BigDecimal,
    pub high: BigDecimal,
    pub low: BigDecimal,
    pub close: BigDecimal,
    pub price: BigDecimal,
    pub volume: BigDecimal,
    pub change: BigDecimal,
    pub change_percentage: String,
    pub timestamp: i64,
}

impl Ticker {
    /// Flat copy of this ticker: no volume, no change, OHLC pinned to the
    /// previous close. Used when a product leaves its whole 24h window
    /// without trading.
    pub fn degraded(&self, timestamp: i64) -> Ticker {
        Ticker {
            product: self.product.clone(),
            open: self.close.clone(),
            high: self.close.clone(),
            low: self.close.clone(),
            close: self.close.clone(),
            price: self.close.clone(),
            volume: BigDecimal::from(0),
            change: BigDecimal::from(0),
            change_percentage: "0.00%".to_string(),
            timestamp,
        }
    }
}
