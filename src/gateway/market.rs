//! Market data routes (public Kraken endpoints)

use super::error::ApiError;
use super::params::{present, unsigned, ApiQuery};
use super::AppState;
use crate::kraken::Params;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

type ApiResult = Result<Json<Value>, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct AssetsQuery {
    pub asset: Option<String>,
    pub aclass: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AssetPairsQuery {
    pub pair: Option<String>,
    pub info: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PairQuery {
    pub pair: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OhlcQuery {
    pub pair: Option<String>,
    pub interval: Option<String>,
    pub since: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DepthQuery {
    pub pair: Option<String>,
    pub count: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SinceQuery {
    pub pair: Option<String>,
    pub since: Option<String>,
}

fn require_pair(pair: Option<String>, example: &str) -> Result<String, ApiError> {
    present(pair).ok_or_else(|| ApiError::missing_parameter("pair parameter is required", example))
}

fn push_opt(params: &mut Params, name: &'static str, value: Option<String>) {
    if let Some(value) = present(value) {
        params.push((name, value));
    }
}

pub async fn server_time(State(state): State<AppState>) -> ApiResult {
    let result = state
        .delegate("Time", state.kraken.time())
        .await
        .map_err(ApiError::upstream("Failed to get server time", None))?;
    Ok(Json(result))
}

pub async fn system_status(State(state): State<AppState>) -> ApiResult {
    let result = state
        .delegate("SystemStatus", state.kraken.system_status())
        .await
        .map_err(ApiError::upstream("Failed to get system status", None))?;
    Ok(Json(result))
}

pub async fn assets(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AssetsQuery>,
) -> ApiResult {
    let mut params = Params::new();
    push_opt(&mut params, "asset", query.asset);
    push_opt(&mut params, "aclass", query.aclass);

    let result = state
        .delegate("Assets", state.kraken.assets(params))
        .await
        .map_err(ApiError::upstream(
            "Failed to get assets",
            Some("Optional query parameters: asset (comma-separated), aclass (currency class)"),
        ))?;
    Ok(Json(result))
}

pub async fn asset_pairs(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<AssetPairsQuery>,
) -> ApiResult {
    let mut params = Params::new();
    push_opt(&mut params, "pair", query.pair);
    push_opt(&mut params, "info", query.info);

    let result = state
        .delegate("AssetPairs", state.kraken.asset_pairs(params))
        .await
        .map_err(ApiError::upstream(
            "Failed to get asset pairs",
            Some("Optional query parameters: pair (comma-separated), info (leverage|fees|margin)"),
        ))?;
    Ok(Json(result))
}

pub async fn ticker(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PairQuery>,
) -> ApiResult {
    let pair = require_pair(query.pair, "/api/ticker?pair=XXBTZUSD")?;

    let result = state
        .delegate("Ticker", state.kraken.ticker(vec![("pair", pair)]))
        .await
        .map_err(ApiError::upstream(
            "Failed to get ticker",
            Some("Required query parameter: pair (e.g., XXBTZUSD, XETHZUSD)"),
        ))?;
    Ok(Json(result))
}

pub async fn ohlc(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<OhlcQuery>,
) -> ApiResult {
    let pair = require_pair(query.pair, "/api/ohlc?pair=XXBTZUSD&interval=60")?;
    let interval = unsigned("interval", query.interval)?;

    let mut params = vec![("pair", pair)];
    if let Some(interval) = interval {
        params.push(("interval", interval.to_string()));
    }
    push_opt(&mut params, "since", query.since);

    let result = state
        .delegate("OHLC", state.kraken.ohlc(params))
        .await
        .map_err(ApiError::upstream(
            "Failed to get OHLC data",
            Some("Required: pair. Optional: interval (1,5,15,30,60,240,1440,10080,21600), since (timestamp)"),
        ))?;
    Ok(Json(result))
}

pub async fn depth(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DepthQuery>,
) -> ApiResult {
    let pair = require_pair(query.pair, "/api/depth?pair=XXBTZUSD&count=10")?;
    let count = unsigned("count", query.count)?;

    let mut params = vec![("pair", pair)];
    if let Some(count) = count {
        params.push(("count", count.to_string()));
    }

    let result = state
        .delegate("Depth", state.kraken.depth(params))
        .await
        .map_err(ApiError::upstream(
            "Failed to get order book depth",
            Some("Required: pair. Optional: count (maximum number of asks/bids, default 100)"),
        ))?;
    Ok(Json(result))
}

pub async fn trades(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SinceQuery>,
) -> ApiResult {
    let pair = require_pair(query.pair, "/api/trades?pair=XXBTZUSD")?;

    let mut params = vec![("pair", pair)];
    push_opt(&mut params, "since", query.since);

    let result = state
        .delegate("Trades", state.kraken.trades(params))
        .await
        .map_err(ApiError::upstream(
            "Failed to get recent trades",
            Some("Required: pair. Optional: since (timestamp)"),
        ))?;
    Ok(Json(result))
}

pub async fn spread(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SinceQuery>,
) -> ApiResult {
    let pair = require_pair(query.pair, "/api/spread?pair=XXBTZUSD")?;

    let mut params = vec![("pair", pair)];
    push_opt(&mut params, "since", query.since);

    let result = state
        .delegate("Spread", state.kraken.spread(params))
        .await
        .map_err(ApiError::upstream(
            "Failed to get spread data",
            Some("Required: pair. Optional: since (timestamp)"),
        ))?;
    Ok(Json(result))
}
