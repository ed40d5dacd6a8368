//! Self-test harness
//!
//! Drives a fixed sequence of calls against a running gateway and records
//! whether each call returned the status it should. Used by the `self-test`
//! CLI command and by the gateway's own `GET /test` route.

mod report;

pub use report::{
    escape_html, LogEntry, LogLevel, Outcome, ReportFormat, RunStatus, Summary, SummaryView,
    TestReport, TestResult,
};

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Pairs exercised by the market data cases
pub const TEST_PAIRS: [&str; 3] = ["XXBTZUSD", "XETHZUSD", "ADAUSD"];

/// One call in the plan
#[derive(Debug, Clone)]
pub struct TestCase {
    pub method: Method,
    pub endpoint: String,
    pub body: Option<Value>,
    pub description: String,
    pub expected_status: u16,
}

impl TestCase {
    fn get(endpoint: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            endpoint: endpoint.into(),
            body: None,
            description: description.into(),
            expected_status: 200,
        }
    }

    fn post(endpoint: impl Into<String>, body: Value, description: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            endpoint: endpoint.into(),
            body: Some(body),
            description: description.into(),
            expected_status: 200,
        }
    }

    fn expect_status(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }
}

/// The fixed call sequence
pub fn plan() -> Vec<TestCase> {
    let mut cases = vec![
        TestCase::get("/health", "Health Check"),
        TestCase::get("/api/time", "Server Time"),
        TestCase::get("/api/system-status", "System Status"),
        TestCase::get("/api/assets", "All Assets"),
        TestCase::get("/api/assets?asset=XBT,ETH", "Specific Assets (XBT,ETH)"),
        TestCase::get("/api/asset-pairs", "All Asset Pairs"),
        TestCase::get(
            "/api/asset-pairs?pair=XXBTZUSD,XETHZUSD",
            "Specific Asset Pairs",
        ),
    ];

    for pair in TEST_PAIRS {
        cases.push(TestCase::get(
            format!("/api/ticker?pair={}", pair),
            format!("Ticker for {}", pair),
        ));
    }
    for pair in &TEST_PAIRS[..2] {
        cases.push(TestCase::get(
            format!("/api/ohlc?pair={}&interval=60", pair),
            format!("OHLC for {} (1h)", pair),
        ));
    }
    for pair in &TEST_PAIRS[..2] {
        cases.push(TestCase::get(
            format!("/api/depth?pair={}&count=5", pair),
            format!("Order Book for {} (top 5)", pair),
        ));
    }
    cases.push(TestCase::get(
        format!("/api/trades?pair={}", TEST_PAIRS[0]),
        format!("Recent Trades for {}", TEST_PAIRS[0]),
    ));
    cases.push(TestCase::get(
        format!("/api/spread?pair={}", TEST_PAIRS[0]),
        format!("Spread Data for {}", TEST_PAIRS[0]),
    ));

    cases.extend([
        TestCase::get("/api/ticker", "Ticker without pair validation").expect_status(400),
        TestCase::get("/api/balance", "Account Balance"),
        TestCase::post(
            "/api/add-order",
            json!({
                "pair": "XXBTZUSD",
                "type": "buy",
                "ordertype": "limit",
                "volume": "0.001",
                "price": "30000",
                "validate": true
            }),
            "Add Order (validation only)",
        ),
        TestCase::post("/api/add-order", json!({}), "Add Order (missing params)").expect_status(400),
        TestCase::post("/api/cancel-order", json!({}), "Cancel Order (missing txid)").expect_status(400),
        TestCase::post(
            "/api/cancel-all-orders-after",
            json!({ "timeout": 99999 }),
            "Cancel All After (invalid timeout)",
        )
        .expect_status(400),
        TestCase::post(
            "/api/cancel-all-orders-after",
            json!({ "timeout": 0 }),
            "Cancel All After (disable timer)",
        ),
    ]);

    cases
}

/// Runs the plan against a gateway
pub struct SelfTester {
    client: reqwest::Client,
    base_url: String,
    max_failures: usize,
}

impl SelfTester {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        max_failures: usize,
    ) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_failures,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the gateway answers `/health` with a success status
    pub async fn is_reachable(&self) -> bool {
        match self.client.get(format!("{}/health", self.base_url)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!("Gateway at {} is not reachable: {}", self.base_url, e);
                false
            }
        }
    }

    /// Execute every case in order
    pub async fn run(&self) -> TestReport {
        let mut log = RunLog::default();
        log.push(LogLevel::Info, "Kraken API endpoint self-test started");
        log.push(LogLevel::Info, format!("Target: {}", self.base_url));
        log.push(LogLevel::Info, format!("Test pairs: {}", TEST_PAIRS.join(", ")));

        let mut results = Vec::new();
        for case in plan() {
            results.push(self.run_case(&case, &mut log).await);
        }

        let summary = Summary::from_results(&results, self.max_failures);
        log.push(
            LogLevel::Info,
            format!(
                "Passed: {}, Failed: {}, Total: {}, Success Rate: {:.1}%",
                summary.passed, summary.failed, summary.total, summary.success_rate
            ),
        );
        for failed in results.iter().filter(|r| r.status == Outcome::Fail) {
            log.push(
                LogLevel::Error,
                format!("Failed: {} {} - {}", failed.method, failed.endpoint, failed.description),
            );
        }
        log.push(LogLevel::Info, "Self-test completed");

        TestReport {
            summary,
            results,
            logs: log.entries,
            timestamp: Utc::now(),
        }
    }

    async fn run_case(&self, case: &TestCase, log: &mut RunLog) -> TestResult {
        let url = format!("{}{}", self.base_url, case.endpoint);
        log.push(LogLevel::Info, format!("Testing: {}", case.description));
        log.push(LogLevel::Debug, format!("{} {}", case.method, url));

        let mut request = self.client.request(case.method.clone(), &url);
        if let Some(body) = &case.body {
            log.push(LogLevel::Debug, format!("Request body: {}", body));
            request = request.json(body);
        }

        let mut result = TestResult {
            endpoint: case.endpoint.clone(),
            method: case.method.to_string(),
            status: Outcome::Fail,
            expected_status: case.expected_status,
            http_status: None,
            description: case.description.clone(),
            error: None,
        };

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                log.push(LogLevel::Error, format!("Request error: {}", e));
                result.error = Some(Value::String(e.to_string()));
                return result;
            }
        };

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .ok()
            .map(|text| serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text)));
        result.http_status = Some(status);

        if status == case.expected_status {
            result.status = Outcome::Pass;
            log.push(LogLevel::Success, format!("PASS ({})", status));
            if let Some(keys) = body.as_ref().and_then(response_keys) {
                log.push(LogLevel::Info, format!("Response keys: {}", keys));
            }
        } else {
            log.push(
                LogLevel::Error,
                format!("FAIL: expected {}, got {}", case.expected_status, status),
            );
            result.error = body;
        }
        debug!("{} {} -> {}", case.method, case.endpoint, status);
        result
    }
}

/// First ten keys of an object body
fn response_keys(body: &Value) -> Option<String> {
    let object = body.as_object()?;
    let mut keys: Vec<&str> = object.keys().take(10).map(String::as_str).collect();
    if object.len() > 10 {
        keys.push("...");
    }
    Some(keys.join(", "))
}

#[derive(Default)]
struct RunLog {
    entries: Vec<LogEntry>,
}

impl RunLog {
    fn push(&mut self, level: LogLevel, message: impl Into<String>) {
        self.entries.push(LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GatewayConfig, KrakenConfig};
    use crate::gateway::{self, AppState};
    use crate::kraken::KrakenClient;
    use crate::metrics::GatewayMetrics;
    use httpmock::prelude::MockServer;

    #[test]
    fn test_plan_shape() {
        let cases = plan();
        assert_eq!(cases.len(), 23);
        assert_eq!(cases[0].endpoint, "/health");

        let bad_requests: Vec<_> = cases
            .iter()
            .filter(|c| c.expected_status == 400)
            .map(|c| c.endpoint.as_str())
            .collect();
        assert_eq!(
            bad_requests,
            vec![
                "/api/ticker",
                "/api/add-order",
                "/api/cancel-order",
                "/api/cancel-all-orders-after"
            ]
        );
        assert!(cases
            .iter()
            .filter(|c| c.method == Method::POST)
            .all(|c| c.body.is_some()));
    }

    #[test]
    fn test_response_keys() {
        assert_eq!(
            response_keys(&json!({"unixtime": 1, "rfc1123": "x"})).as_deref(),
            Some("rfc1123, unixtime")
        );
        assert_eq!(response_keys(&json!([1, 2])), None);
    }

    /// Serve the real router on an ephemeral port, backed by a fake exchange
    async fn spawn_gateway(kraken_url: &str) -> String {
        let mut config = GatewayConfig::default();
        config.kraken = KrakenConfig {
            base_url: kraken_url.to_string(),
            api_key: Some("test-key".to_string()),
            api_secret: Some("c2VjcmV0LXNlY3JldA==".to_string()),
            timeout: 5,
        };
        let kraken = KrakenClient::new(&config.kraken).unwrap();
        let app = gateway::router(AppState::new(config, kraken, GatewayMetrics::new().unwrap()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_run_against_gateway() {
        let exchange = MockServer::start();
        let upstream = exchange.mock(|_when, then| {
            then.status(200).json_body(json!({"error": [], "result": {"ok": true}}));
        });

        let base_url = spawn_gateway(&exchange.base_url()).await;
        let tester = SelfTester::new(base_url, Duration::from_secs(5), 0).unwrap();
        assert!(tester.is_reachable().await);

        let report = tester.run().await;
        let failed: Vec<_> = report.failed().map(|r| r.description.clone()).collect();
        assert!(failed.is_empty(), "unexpected failures: {:?}", failed);
        assert_eq!(report.summary.passed, 23);
        assert_eq!(report.summary.status, RunStatus::Healthy);

        // health and the four rejected calls never reach the exchange
        upstream.assert_calls(18);
        assert!(report.logs.iter().any(|l| l.message == "Response keys: ok"));
    }

    #[tokio::test]
    async fn test_upstream_failures_are_reported() {
        let exchange = MockServer::start();
        exchange.mock(|_when, then| {
            then.status(200).json_body(json!({"error": ["EGeneral:Internal error"]}));
        });

        let base_url = spawn_gateway(&exchange.base_url()).await;
        let report = SelfTester::new(base_url, Duration::from_secs(5), 0)
            .unwrap()
            .run()
            .await;

        assert_eq!(report.summary.passed, 5);
        assert_eq!(report.summary.failed, 18);
        assert_eq!(report.summary.status, RunStatus::IssuesDetected);
        let first = report.failed().next().unwrap();
        assert_eq!(first.endpoint, "/api/time");
        assert_eq!(first.http_status, Some(500));
        assert_eq!(first.error.as_ref().unwrap()["details"], "EGeneral:Internal error");
    }

    #[tokio::test]
    async fn test_unreachable_gateway_fails_every_case() {
        let tester = SelfTester::new("http://127.0.0.1:9", Duration::from_millis(500), 0).unwrap();
        assert!(!tester.is_reachable().await);

        let report = tester.run().await;
        assert_eq!(report.summary.failed, 23);
        assert_eq!(report.summary.status, RunStatus::IssuesDetected);
        assert!(report.results.iter().all(|r| r.http_status.is_none() && r.error.is_some()));
    }
}
