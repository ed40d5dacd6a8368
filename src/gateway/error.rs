//! Error responses produced by gateway handlers

use crate::kraken::KrakenError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{error, warn};

/// Handler error, rendered as a JSON body
#[derive(Error, Debug)]
pub enum ApiError {
    /// Client input failed validation (400)
    #[error("{error}: {message}")]
    Validation {
        error: &'static str,
        message: String,
        context: Map<String, Value>,
    },

    /// A private route was called while no credentials are configured (400)
    #[error("Kraken API credentials not configured")]
    MissingCredentials,

    /// The delegated Kraken call failed (500)
    #[error("{action}: {source}")]
    Upstream {
        action: &'static str,
        hint: Option<&'static str>,
        source: KrakenError,
    },

    /// No route matched (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// The self-test run could not be executed (500)
    #[error("Self-test failed: {0}")]
    SelfTest(String),
}

impl ApiError {
    /// Validation error with an empty context
    pub fn validation(error: &'static str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            error,
            message: message.into(),
            context: Map::new(),
        }
    }

    /// Missing required parameter, with an example request
    pub fn missing_parameter(message: impl Into<String>, example: impl Into<Value>) -> Self {
        Self::validation("Missing required parameter", message).with("example", example)
    }

    /// Attach an extra field to a validation body; no-op for other variants
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let ApiError::Validation { context, .. } = &mut self {
            context.insert(key.to_string(), value.into());
        }
        self
    }

    /// Build a mapper from a Kraken error to an upstream failure
    pub fn upstream(
        action: &'static str,
        hint: Option<&'static str>,
    ) -> impl FnOnce(KrakenError) -> ApiError {
        move |source| ApiError::Upstream {
            action,
            hint,
            source,
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::MissingCredentials => StatusCode::BAD_REQUEST,
            ApiError::Upstream { .. } | ApiError::SelfTest(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn body(&self) -> Value {
        match self {
            ApiError::Validation {
                error,
                message,
                context,
            } => {
                let mut body = Map::new();
                body.insert("error".to_string(), json!(error));
                body.insert("message".to_string(), json!(message));
                body.extend(context.clone());
                Value::Object(body)
            }
            ApiError::MissingCredentials => json!({
                "error": "Kraken API credentials not configured",
                "message": "Please set KRAKEN_API_KEY and KRAKEN_API_SECRET environment variables"
            }),
            ApiError::Upstream {
                action,
                hint,
                source,
            } => {
                let mut body = json!({ "error": action, "details": source.to_string() });
                if let Some(hint) = hint {
                    body["hint"] = json!(hint);
                }
                body
            }
            ApiError::NotFound(path) => json!({ "error": "Not found", "path": path }),
            ApiError::SelfTest(details) => {
                json!({ "error": "Self-test failed", "details": details })
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Upstream { action, source, .. } => error!("{}: {}", action, source),
            ApiError::SelfTest(details) => error!("Self-test failed: {}", details),
            other => warn!("Rejected request: {}", other),
        }
        (self.status(), Json(self.body())).into_response()
    }
}
