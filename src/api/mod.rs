pub mod error;
pub mod handlers;
pub mod response;

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::workers::context::MarketDataContext;
use handlers::{candles, health, tickers};

/// Read-only query surface over the aggregated market data.
pub fn router(ctx: Arc<MarketDataContext>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/candles", get(candles::get_candles))
        .route("/tickers", get(tickers::get_tickers))
        .route("/tickers/:product", get(tickers::get_ticker))
        .with_state(ctx)
}
