//! HTTP surface of the gateway
//!
//! Each `/api/*` route validates its parameters, performs one delegated
//! Kraken call and returns the call's `result` unchanged (200), a validation
//! error (400) or the upstream failure (500).

pub mod error;
mod market;
pub mod params;
mod trading;

pub use error::ApiError;

use crate::config::GatewayConfig;
use crate::health::HealthChecker;
use crate::kraken::{self, KrakenClient};
use crate::metrics::{GatewayMetrics, UNMATCHED_ROUTE};
use crate::selftest::{ReportFormat, SelfTester};
use axum::extract::{MatchedPath, Request, State};
use axum::http::{StatusCode, Uri};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use params::ApiQuery;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub kraken: Arc<KrakenClient>,
    pub metrics: Arc<GatewayMetrics>,
    pub health: Arc<HealthChecker>,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    pub fn new(config: GatewayConfig, kraken: KrakenClient, metrics: GatewayMetrics) -> Self {
        Self {
            kraken: Arc::new(kraken),
            metrics: Arc::new(metrics),
            health: Arc::new(HealthChecker::new()),
            config: Arc::new(config),
        }
    }

    /// Await a delegated Kraken call and record its outcome
    pub async fn delegate<F>(&self, endpoint: &'static str, call: F) -> kraken::Result<Value>
    where
        F: Future<Output = kraken::Result<Value>>,
    {
        let result = call.await;
        self.metrics.record_upstream_call(endpoint, result.is_ok());
        result
    }
}

/// Build the gateway router
pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/time", get(market::server_time))
        .route("/api/system-status", get(market::system_status))
        .route("/api/assets", get(market::assets))
        .route("/api/asset-pairs", get(market::asset_pairs))
        .route("/api/ticker", get(market::ticker))
        .route("/api/ohlc", get(market::ohlc))
        .route("/api/depth", get(market::depth))
        .route("/api/trades", get(market::trades))
        .route("/api/spread", get(market::spread))
        .route("/api/balance", get(trading::balance))
        .route("/api/add-order", post(trading::add_order))
        .route("/api/cancel-order", post(trading::cancel_order))
        .route("/api/cancel-all", post(trading::cancel_all))
        .route(
            "/api/cancel-all-orders-after",
            post(trading::cancel_all_orders_after),
        )
        .route("/test", get(self_test_handler));

    if state.config.metrics.enabled {
        app = app.route(&state.config.metrics.path, get(metrics_handler));
    }

    app.fallback(not_found_handler)
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Log and measure every request
async fn track_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());

    info!("{} {}", method, path);
    let response = next.run(req).await;

    state
        .metrics
        .record_request(&method, &route, response.status().as_u16(), start.elapsed());
    response
}

/// Health check handler
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.health.liveness())
}

/// Metrics handler
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics.prometheus_output() {
        Ok(output) => (StatusCode::OK, output).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response(),
    }
}

async fn not_found_handler(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}

#[derive(Debug, Default, Deserialize)]
pub struct SelfTestQuery {
    pub format: Option<String>,
    pub timeout: Option<String>,
}

/// Run the self-test plan against this gateway and render the report
async fn self_test_handler(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SelfTestQuery>,
) -> Result<Response, ApiError> {
    let format = match params::present(query.format) {
        Some(raw) => raw.parse::<ReportFormat>().map_err(|_| {
            ApiError::validation("Invalid format", "format must be one of: json, summary, html")
                .with("provided", raw)
        })?,
        None => ReportFormat::Json,
    };

    let timeout_ms = match params::unsigned("timeout", query.timeout)? {
        Some(0) => {
            return Err(ApiError::validation(
                "Invalid parameter",
                "timeout must be greater than 0 milliseconds",
            ))
        }
        Some(ms) => u64::from(ms),
        None => state.config.self_test.timeout_ms,
    };

    let tester = SelfTester::new(
        state.config.self_test_base_url(),
        Duration::from_millis(timeout_ms),
        state.config.self_test.max_failures,
    )
    .map_err(|e| ApiError::SelfTest(e.to_string()))?;

    info!("Running self-test against {}", tester.base_url());
    let report = tester.run().await;

    let response = match format {
        ReportFormat::Json => Json(report).into_response(),
        ReportFormat::Summary => Json(report.summary_view()).into_response(),
        ReportFormat::Html => Html(report.to_html()).into_response(),
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KrakenConfig;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use httpmock::prelude::{MockServer, GET as MOCK_GET, POST as MOCK_POST};
    use serde_json::json;
    use tower::ServiceExt;

    fn app(kraken_url: &str, with_credentials: bool) -> Router {
        let mut config = GatewayConfig::default();
        config.kraken = KrakenConfig {
            base_url: kraken_url.to_string(),
            api_key: with_credentials.then(|| "test-key".to_string()),
            api_secret: with_credentials.then(|| "c2VjcmV0LXNlY3JldA==".to_string()),
            timeout: 5,
        };
        let kraken = KrakenClient::new(&config.kraken).unwrap();
        router(AppState::new(config, kraken, GatewayMetrics::new().unwrap()))
    }

    async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(app("http://127.0.0.1:9", false), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "OK");
        assert_eq!(body["service"], "Kraken API Service");
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (status, body) = send(app("http://127.0.0.1:9", false), Method::GET, "/api/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["path"], "/api/nope");
    }

    #[tokio::test]
    async fn test_pair_required_on_market_routes() {
        for route in ["/api/ticker", "/api/ohlc", "/api/depth", "/api/trades", "/api/spread", "/api/ticker?pair="] {
            let (status, body) = send(app("http://127.0.0.1:9", false), Method::GET, route, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", route);
            assert_eq!(body["error"], "Missing required parameter");
            assert_eq!(body["message"], "pair parameter is required");
            assert!(body["example"].as_str().unwrap().contains("pair=XXBTZUSD"));
        }
    }

    #[tokio::test]
    async fn test_ticker_forwards_result_unchanged() {
        let server = MockServer::start();
        let ticker = json!({"XXBTZUSD": {"a": ["30300.10000", "1", "1.000"], "c": ["30303.20000", "0.00067643"]}});
        let mock = server.mock(|when, then| {
            when.method(MOCK_GET)
                .path("/0/public/Ticker")
                .query_param("pair", "XXBTZUSD");
            then.status(200).json_body(json!({"error": [], "result": ticker.clone()}));
        });

        let (status, body) = send(app(&server.base_url(), false), Method::GET, "/api/ticker?pair=XXBTZUSD", None).await;

        mock.assert();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, ticker);
    }

    #[tokio::test]
    async fn test_depth_rejects_non_numeric_count() {
        let (status, body) = send(
            app("http://127.0.0.1:9", false),
            Method::GET,
            "/api/depth?pair=XXBTZUSD&count=ten",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["provided"], "ten");
    }

    #[tokio::test]
    async fn test_upstream_error_is_500_with_details() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(MOCK_GET).path("/0/public/Trades");
            then.status(200).json_body(json!({"error": ["EQuery:Unknown asset pair"]}));
        });

        let (status, body) = send(app(&server.base_url(), false), Method::GET, "/api/trades?pair=NOPE", None).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to get recent trades");
        assert_eq!(body["details"], "EQuery:Unknown asset pair");
        assert_eq!(body["hint"], "Required: pair. Optional: since (timestamp)");
    }

    #[tokio::test]
    async fn test_private_routes_require_credentials() {
        let routes = [
            (Method::GET, "/api/balance"),
            (Method::POST, "/api/add-order"),
            (Method::POST, "/api/cancel-order"),
            (Method::POST, "/api/cancel-all"),
            (Method::POST, "/api/cancel-all-orders-after"),
        ];
        for (method, route) in routes {
            let (status, body) = send(app("http://127.0.0.1:9", false), method, route, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", route);
            assert_eq!(body["error"], "Kraken API credentials not configured");
        }
    }

    #[tokio::test]
    async fn test_add_order_missing_params() {
        let (status, body) = send(app("http://127.0.0.1:9", true), Method::POST, "/api/add-order", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required parameters");
        assert!(body["required"]["volume"].is_string());
        assert!(body["optional"]["validate"].is_string());
    }

    #[tokio::test]
    async fn test_add_order_validate_only() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(MOCK_POST)
                .path("/0/private/AddOrder")
                .header_exists("API-Sign")
                .body_includes("pair=XXBTZUSD&type=buy&ordertype=limit&volume=0.001&price=30000&validate=true");
            then.status(200).json_body(json!({
                "error": [],
                "result": {"descr": {"order": "buy 0.00100000 XBTUSD @ limit 30000.0"}}
            }));
        });

        let order = json!({
            "pair": "XXBTZUSD",
            "type": "buy",
            "ordertype": "limit",
            "volume": "0.001",
            "price": "30000",
            "validate": true
        });
        let (status, body) = send(app(&server.base_url(), true), Method::POST, "/api/add-order", Some(order)).await;

        mock.assert();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["descr"]["order"], "buy 0.00100000 XBTUSD @ limit 30000.0");
    }

    #[tokio::test]
    async fn test_cancel_order_missing_txid() {
        let (status, body) = send(app("http://127.0.0.1:9", true), Method::POST, "/api/cancel-order", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "txid is required");
        assert_eq!(body["example"]["txid"], "OQCLML-BW3P3-BUCMWZ");
    }

    #[tokio::test]
    async fn test_cancel_all_orders_after_range() {
        let (status, body) = send(
            app("http://127.0.0.1:9", true),
            Method::POST,
            "/api/cancel-all-orders-after",
            Some(json!({"timeout": 99999})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid timeout value");
        assert_eq!(body["provided"], 99999);

        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(MOCK_POST)
                .path("/0/private/CancelAllOrdersAfter")
                .body_includes("timeout=0");
            then.status(200).json_body(json!({
                "error": [],
                "result": {"currentTime": "2023-03-24T17:41:56Z", "triggerTime": "0"}
            }));
        });
        let (status, body) = send(
            app(&server.base_url(), true),
            Method::POST,
            "/api/cancel-all-orders-after",
            Some(json!({"timeout": 0})),
        )
        .await;

        mock.assert();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["triggerTime"], "0");
    }

    #[tokio::test]
    async fn test_duplicate_query_key_is_json_400() {
        for route in ["/api/ticker?pair=XXBTZUSD&pair=XETHZUSD", "/test?format=json&format=html"] {
            let (status, body) = send(app("http://127.0.0.1:9", false), Method::GET, route, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", route);
            assert_eq!(body["error"], "Invalid query string");
            assert!(body["message"].as_str().unwrap().contains("duplicate field"));
        }
    }

    #[tokio::test]
    async fn test_cancel_all_orders_after_accepts_whole_float() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(MOCK_POST)
                .path("/0/private/CancelAllOrdersAfter")
                .body_includes("timeout=3600");
            then.status(200).json_body(json!({
                "error": [],
                "result": {"currentTime": "2023-03-24T17:41:56Z", "triggerTime": "2023-03-24T18:41:56Z"}
            }));
        });

        let (status, _) = send(
            app(&server.base_url(), true),
            Method::POST,
            "/api/cancel-all-orders-after",
            Some(json!({"timeout": 3600.0})),
        )
        .await;

        mock.assert();
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_invalid_json_body() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/cancel-order")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{broken"))
            .unwrap();
        let response = app("http://127.0.0.1:9", true).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_self_test_rejects_unknown_format() {
        let (status, body) = send(app("http://127.0.0.1:9", false), Method::GET, "/test?format=xml", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["provided"], "xml");
    }

    #[tokio::test]
    async fn test_self_test_rejects_zero_timeout() {
        let (status, _) = send(app("http://127.0.0.1:9", false), Method::GET, "/test?timeout=0", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = app("http://127.0.0.1:9", false);
        let _ = send(app.clone(), Method::GET, "/api/ticker", None).await;

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("path=\"/api/ticker\""));
        assert!(text.contains("status=\"400\""));
    }
}
