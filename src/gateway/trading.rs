//! Account and trading routes (private Kraken endpoints)
//!
//! Every route here checks for configured credentials before looking at its
//! parameters.

use super::error::ApiError;
use super::params::{field, json_object};
use super::AppState;
use crate::kraken::Params;
use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Map, Value};

type ApiResult = Result<Json<Value>, ApiError>;

/// Largest accepted dead man's switch timeout (24 hours)
pub const MAX_CANCEL_AFTER_SECS: u32 = 86_400;

const ORDER_REQUIRED: [&str; 4] = ["pair", "type", "ordertype", "volume"];
const ORDER_OPTIONAL: [&str; 8] = [
    "price", "price2", "leverage", "oflags", "starttm", "expiretm", "userref", "validate",
];

fn ensure_credentials(state: &AppState) -> Result<(), ApiError> {
    if state.kraken.has_credentials() {
        Ok(())
    } else {
        Err(ApiError::MissingCredentials)
    }
}

pub async fn balance(State(state): State<AppState>) -> ApiResult {
    ensure_credentials(&state)?;

    let result = state
        .delegate("Balance", state.kraken.balance())
        .await
        .map_err(ApiError::upstream(
            "Failed to get account balance",
            Some("Make sure your API key has \"Query Funds\" permission"),
        ))?;
    Ok(Json(result))
}

fn order_params(body: &Map<String, Value>) -> Result<Params, ApiError> {
    let required: Vec<Option<String>> = ORDER_REQUIRED.iter().map(|name| field(body, name)).collect();
    if required.iter().any(Option::is_none) {
        return Err(ApiError::validation(
            "Missing required parameters",
            "pair, type, ordertype, and volume are required",
        )
        .with(
            "required",
            json!({
                "pair": "Asset pair (e.g., XXBTZUSD)",
                "type": "Order type (buy or sell)",
                "ordertype": "Order type (market, limit, stop-loss, etc.)",
                "volume": "Order volume in base asset"
            }),
        )
        .with(
            "optional",
            json!({
                "price": "Price for limit orders",
                "price2": "Secondary price for stop orders",
                "leverage": "Leverage ratio",
                "oflags": "Order flags (viqc, fcib, fciq, nompp, post)",
                "starttm": "Scheduled start time",
                "expiretm": "Expiration time",
                "userref": "User reference id",
                "validate": "Validate inputs only (true/false)"
            }),
        ));
    }

    let mut params: Params = ORDER_REQUIRED.iter().copied().zip(required.into_iter().flatten()).collect();
    params.extend(
        ORDER_OPTIONAL
            .iter()
            .filter_map(|name| field(body, name).map(|value| (*name, value))),
    );
    Ok(params)
}

pub async fn add_order(State(state): State<AppState>, body: Bytes) -> ApiResult {
    ensure_credentials(&state)?;
    let body = json_object(&body)?;
    let params = order_params(&body)?;

    let result = state
        .delegate("AddOrder", state.kraken.add_order(params))
        .await
        .map_err(ApiError::upstream(
            "Failed to add order",
            Some("Make sure your API key has \"Create & Modify Orders\" permission"),
        ))?;
    Ok(Json(result))
}

pub async fn cancel_order(State(state): State<AppState>, body: Bytes) -> ApiResult {
    ensure_credentials(&state)?;
    let body = json_object(&body)?;

    let txid = field(&body, "txid").ok_or_else(|| {
        ApiError::validation("Missing required parameter", "txid is required")
            .with("required", json!({ "txid": "Transaction ID of the order to cancel" }))
            .with("example", json!({ "txid": "OQCLML-BW3P3-BUCMWZ" }))
    })?;

    let result = state
        .delegate("CancelOrder", state.kraken.cancel_order(&txid))
        .await
        .map_err(ApiError::upstream(
            "Failed to cancel order",
            Some("Make sure your API key has \"Cancel Orders\" permission and the order ID is valid"),
        ))?;
    Ok(Json(result))
}

pub async fn cancel_all(State(state): State<AppState>) -> ApiResult {
    ensure_credentials(&state)?;

    let result = state
        .delegate("CancelAll", state.kraken.cancel_all())
        .await
        .map_err(ApiError::upstream(
            "Failed to cancel all orders",
            Some("Make sure your API key has \"Cancel Orders\" permission"),
        ))?;
    Ok(Json(result))
}

/// Validate the dead man's switch timeout: a whole number in `0..=86400`
fn cancel_after_timeout(body: &Map<String, Value>) -> Result<u32, ApiError> {
    let provided = match body.get("timeout") {
        None | Some(Value::Null) => {
            return Err(
                ApiError::validation("Missing required parameter", "timeout is required")
                    .with(
                        "required",
                        json!({ "timeout": "Timeout in seconds (0 to disable, max 86400)" }),
                    )
                    .with(
                        "examples",
                        json!({
                            "disable": { "timeout": 0 },
                            "oneHour": { "timeout": 3600 },
                            "oneDay": { "timeout": 86400 }
                        }),
                    ),
            )
        }
        Some(value) => value,
    };

    let seconds = match provided {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    seconds
        .and_then(|s| u32::try_from(s).ok())
        .filter(|s| *s <= MAX_CANCEL_AFTER_SECS)
        .ok_or_else(|| {
            ApiError::validation(
                "Invalid timeout value",
                "Timeout must be between 0 and 86400 seconds (24 hours)",
            )
            .with("provided", provided.clone())
        })
}

pub async fn cancel_all_orders_after(State(state): State<AppState>, body: Bytes) -> ApiResult {
    ensure_credentials(&state)?;
    let body = json_object(&body)?;
    let timeout = cancel_after_timeout(&body)?;

    let result = state
        .delegate(
            "CancelAllOrdersAfter",
            state.kraken.cancel_all_orders_after(timeout),
        )
        .await
        .map_err(ApiError::upstream(
            "Failed to set cancel-all-orders-after",
            Some("Make sure your API key has \"Cancel Orders\" permission"),
        ))?;
    Ok(Json(result))
}
