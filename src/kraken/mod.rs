//! Kraken REST client
//!
//! Thin async client for the Kraken spot REST API. Public endpoints are plain
//! `GET /0/public/<Method>` calls; private endpoints are signed
//! `POST /0/private/<Method>` calls with a form encoded body. Every call
//! unwraps Kraken's `{ "error": [...], "result": ... }` envelope and returns the
//! `result` value unchanged.

mod error;
mod private;
mod public;
pub mod signature;

pub use error::{KrakenError, Result};

use crate::config::KrakenConfig;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::Value;
use signature::NonceGenerator;
use std::time::Duration;
use tracing::debug;

/// Request parameters, forwarded to Kraken as-is
pub type Params = Vec<(&'static str, String)>;

const USER_AGENT: &str = concat!("kraken-gateway/", env!("CARGO_PKG_VERSION"));

/// API key and base64 encoded secret
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: Option<Value>,
}

/// Kraken REST client
#[derive(Debug)]
pub struct KrakenClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Option<Credentials>,
    nonces: NonceGenerator,
}

impl KrakenClient {
    /// Create a client from configuration; credentials are taken when both are non-empty
    pub fn new(config: &KrakenConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(USER_AGENT)
            .build()?;

        let credentials = match (&config.api_key, &config.api_secret) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Some(Credentials {
                    api_key: key.clone(),
                    api_secret: secret.clone(),
                })
            }
            _ => None,
        };

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            nonces: NonceGenerator::new(),
        })
    }

    /// Whether private endpoints can be called
    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn public(&self, method: &str, params: Params) -> Result<Value> {
        let url = format!("{}/0/public/{}", self.base_url, method);
        debug!("Kraken public call {} ({} params)", method, params.len());

        let response = self.http.get(&url).query(&params).send().await?;
        Self::unwrap_envelope(response).await
    }

    async fn private(&self, method: &str, params: Params) -> Result<Value> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(KrakenError::MissingCredentials)?;

        let path = format!("/0/private/{}", method);
        let nonce = self.nonces.next();

        let mut form: Vec<(&str, String)> = Vec::with_capacity(params.len() + 1);
        form.push(("nonce", nonce.to_string()));
        form.extend(params);
        let body = serde_urlencoded::to_string(&form)?;

        let api_sign = signature::sign(&path, nonce, &body, &credentials.api_secret)?;
        debug!("Kraken private call {} (nonce {})", method, nonce);

        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("API-Key", &credentials.api_key)
            .header("API-Sign", api_sign)
            .body(body)
            .send()
            .await?;
        Self::unwrap_envelope(response).await
    }

    async fn unwrap_envelope(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let text = response.text().await?;

        let envelope: Envelope = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(KrakenError::Status {
                    status: status.as_u16(),
                    body: text,
                })
            }
            Err(e) => return Err(e.into()),
        };

        if !envelope.error.is_empty() {
            return Err(KrakenError::Api(envelope.error));
        }
        if !status.is_success() {
            return Err(KrakenError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(envelope.result.unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn test_client(base_url: &str, with_credentials: bool) -> KrakenClient {
        let config = KrakenConfig {
            base_url: base_url.to_string(),
            api_key: with_credentials.then(|| "test-key".to_string()),
            api_secret: with_credentials.then(|| "c2VjcmV0LXNlY3JldA==".to_string()),
            timeout: 5,
        };
        KrakenClient::new(&config).unwrap()
    }

    #[test]
    fn test_credentials_require_both_values() {
        let config = KrakenConfig {
            api_key: Some("key".to_string()),
            api_secret: Some(String::new()),
            ..KrakenConfig::default()
        };
        assert!(!KrakenClient::new(&config).unwrap().has_credentials());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = test_client("http://localhost:1234/", false);
        assert_eq!(client.base_url(), "http://localhost:1234");
    }

    #[tokio::test]
    async fn test_public_call_returns_result() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(Method::GET).path("/0/public/Time");
            then.status(200)
                .json_body(json!({"error": [], "result": {"unixtime": 1688669448, "rfc1123": "Thu, 06 Jul 23 18:50:48 +0000"}}));
        });

        let client = test_client(&server.base_url(), false);
        let result = client.time().await.unwrap();

        mock.assert();
        assert_eq!(result["unixtime"], 1688669448);
    }

    #[tokio::test]
    async fn test_api_error_is_surfaced() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(Method::GET).path("/0/public/Ticker");
            then.status(200)
                .json_body(json!({"error": ["EQuery:Unknown asset pair"]}));
        });

        let client = test_client(&server.base_url(), false);
        let err = client.ticker(vec![("pair", "NOPE".to_string())]).await.unwrap_err();

        assert!(matches!(err, KrakenError::Api(_)));
        assert_eq!(err.to_string(), "EQuery:Unknown asset pair");
    }

    #[tokio::test]
    async fn test_non_json_error_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(Method::GET).path("/0/public/SystemStatus");
            then.status(503).body("Service Unavailable");
        });

        let client = test_client(&server.base_url(), false);
        let err = client.system_status().await.unwrap_err();

        match err {
            KrakenError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "Service Unavailable");
            }
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_private_call_is_signed() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(Method::POST)
                .path("/0/private/Balance")
                .header("API-Key", "test-key")
                .header_exists("API-Sign")
                .header("content-type", "application/x-www-form-urlencoded")
                .body_includes("nonce=");
            then.status(200)
                .json_body(json!({"error": [], "result": {"ZUSD": "171288.6158"}}));
        });

        let client = test_client(&server.base_url(), true);
        let result = client.balance().await.unwrap();

        mock.assert();
        assert_eq!(result, json!({"ZUSD": "171288.6158"}));
    }

    #[tokio::test]
    async fn test_private_call_without_credentials() {
        let client = test_client("http://127.0.0.1:9", false);
        let err = client.cancel_all().await.unwrap_err();
        assert!(matches!(err, KrakenError::MissingCredentials));
    }
}
