use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use diesel::{Identifiable, Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};

use crate::schema::trades as TradesTable;

/// A matched trade as persisted. `id` is a monotonically increasing
/// serial, so `(timestamp, id)` gives a total order over trades.
#[derive(Deserialize, Serialize, Queryable, Identifiable, Selectable, Debug, Clone)]
#[diesel(table_name = TradesTable)]
pub struct TradeRow {
    pub id: i64,
    pub product: String,
    pub price: BigDecimal,
    pub quantity: BigDecimal,
    pub timestamp: i64,
    pub block_height: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Deserialize, Serialize, Insertable, Debug, Clone)]
#[diesel(table_name = TradesTable)]
pub struct NewTrade {
    pub product: String,
    pub price: BigDecimal,
    pub quantity: BigDecimal,
    pub timestamp: i64,
    pub block_height: i64,
}

/// Trade as delivered by the matching engine at block commit.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TradeEvent {
    pub product: String,
    pub price: BigDecimal,
    pub quantity: BigDecimal,
    pub timestamp: i64,
    pub block_height: i64,
}

impl TradeEvent {
    pub fn into_new_trade(self) -> NewTrade {
        NewTrade {
            product: self.product,
            price: self.price,
            quantity: self.quantity,
            timestamp: self.timestamp,
            block_height: self.block_height,
        }
    }
}
