use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::api::{error::ApiError, response::ApiResponse};
use crate::klines::db_types::CandleView;
use crate::klines::queries;
use crate::klines::resolution::Resolution;
use crate::workers::context::MarketDataContext;

/// Query parameters for candle history.
#[derive(Debug, Deserialize)]
pub struct CandleParams {
    pub product: String,
    /// Bucket width in seconds, one of the supported resolutions.
    pub granularity: i64,
    /// Max candles returned, newest kept. Defaults to 100, capped at 1000.
    pub size: Option<i64>,
    /// View-end unix second. Only buckets before it are returned and the
    /// series is padded up to it.
    pub as_of: Option<i64>,
}

/// GET /candles - gap-padded candle history for one product
pub async fn get_candles(
    State(ctx): State<Arc<MarketDataContext>>,
    Query(params): Query<CandleParams>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<CandleView>>>), ApiError> {
    if params.product.is_empty() {
        return Err(ApiError::bad_request("product must not be empty"));
    }

    let resolution = Resolution::from_seconds(params.granularity).ok_or_else(|| {
        ApiError::bad_request(format!(
            "unsupported granularity: {}",
            params.granularity
        ))
    })?;

    let mut conn = ctx.store.conn()?;
    let candles = queries::get_candles(
        &params.product,
        resolution,
        params.size,
        params.as_of,
        &mut conn,
    )?;

    Ok((StatusCode::OK, Json(ApiResponse::success(candles))))
}
