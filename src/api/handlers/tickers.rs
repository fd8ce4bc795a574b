use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::api::{error::ApiError, response::ApiResponse};
use crate::tickers::db_types::Ticker;
use crate::workers::context::MarketDataContext;

#[derive(Debug, Deserialize)]
pub struct TickerParams {
    /// Comma-separated product filter.
    pub products: Option<String>,
    /// Max entries returned, alphabetical order kept.
    pub limit: Option<usize>,
}

/// GET /tickers - cached tickers, alphabetical by product
pub async fn get_tickers(
    State(ctx): State<Arc<MarketDataContext>>,
    Query(params): Query<TickerParams>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<Ticker>>>), ApiError> {
    let mut tickers = ctx.get_tickers().await;

    if let Some(products) = &params.products {
        let wanted: Vec<&str> = products.split(',').map(str::trim).collect();
        tickers.retain(|t| wanted.contains(&t.product.as_str()));
    }

    if let Some(limit) = params.limit {
        tickers.truncate(limit);
    }

    Ok((StatusCode::OK, Json(ApiResponse::success(tickers))))
}

/// GET /tickers/:product - one product's ticker
pub async fn get_ticker(
    State(ctx): State<Arc<MarketDataContext>>,
    Path(product): Path<String>,
) -> Result<(StatusCode, Json<ApiResponse<Ticker>>), ApiError> {
    let ticker = ctx
        .get_ticker(&product)
        .await
        .ok_or_else(|| ApiError::not_found(format!("ticker for {}", product)))?;

    Ok((StatusCode::OK, Json(ApiResponse::success(ticker))))
}
