//! Request parameter helpers
//!
//! Query values count as present when non-empty. JSON body values count as
//! present when they are non-empty scalars; numbers and booleans are forwarded
//! in their textual form.

use super::error::ApiError;
use axum::body::Bytes;
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// `Query` extractor that rejects with a JSON validation error
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| ApiQuery(value))
            .map_err(|rejection| {
                ApiError::validation("Invalid query string", rejection.body_text())
            })
    }
}

/// Non-empty query value
pub fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Parse an optional unsigned integer query value
pub fn unsigned(name: &'static str, value: Option<String>) -> Result<Option<u32>, ApiError> {
    present(value)
        .map(|raw| {
            raw.trim().parse::<u32>().map_err(|_| {
                ApiError::validation(
                    "Invalid parameter",
                    format!("{} must be a non-negative integer", name),
                )
                .with("provided", raw)
            })
        })
        .transpose()
}

/// Parse a POST body as a JSON object; an empty body is `{}`
pub fn json_object(body: &Bytes) -> Result<Map<String, Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ApiError::validation(
            "Invalid request body",
            "Request body must be a JSON object",
        )),
        Err(e) => Err(ApiError::validation(
            "Invalid request body",
            format!("Request body is not valid JSON: {}", e),
        )),
    }
}

/// Textual form of a body field, `None` when absent, null or empty
pub fn field(body: &Map<String, Value>, name: &str) -> Option<String> {
    body.get(name).and_then(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        // Kraken takes comma separated lists (e.g. oflags)
        Value::Array(items) if !items.is_empty() => items
            .iter()
            .map(scalar_text)
            .collect::<Option<Vec<_>>>()
            .map(|parts| parts.join(",")),
        _ => None,
    }
}
