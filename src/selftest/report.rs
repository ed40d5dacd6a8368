//! Self-test report model and renderers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write as _;
use std::str::FromStr;

/// Output format of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Summary,
    Html,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "summary" => Ok(ReportFormat::Summary),
            "html" => Ok(ReportFormat::Html),
            other => Err(format!("unknown report format '{}'", other)),
        }
    }
}

/// Per-case outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Pass,
    Fail,
}

/// Overall verdict of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Healthy,
    IssuesDetected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Debug,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub endpoint: String,
    pub method: String,
    pub status: Outcome,
    pub expected_status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
    pub success_rate: f64,
    pub status: RunStatus,
}

impl Summary {
    pub fn from_results(results: &[TestResult], max_failures: usize) -> Self {
        let passed = results.iter().filter(|r| r.status == Outcome::Pass).count();
        let total = results.len();
        let failed = total - passed;
        let success_rate = if total == 0 {
            0.0
        } else {
            (passed as f64 / total as f64 * 1000.0).round() / 10.0
        };

        Self {
            passed,
            failed,
            total,
            success_rate,
            status: if failed <= max_failures {
                RunStatus::Healthy
            } else {
                RunStatus::IssuesDetected
            },
        }
    }
}

/// Full result of one self-test run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub summary: Summary,
    pub results: Vec<TestResult>,
    pub logs: Vec<LogEntry>,
    pub timestamp: DateTime<Utc>,
}

/// Summary plus the failed cases only
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryView {
    pub summary: Summary,
    pub failed_tests: Vec<TestResult>,
    pub timestamp: DateTime<Utc>,
}

impl TestReport {
    pub fn failed(&self) -> impl Iterator<Item = &TestResult> {
        self.results.iter().filter(|r| r.status == Outcome::Fail)
    }

    pub fn summary_view(&self) -> SummaryView {
        SummaryView {
            summary: self.summary.clone(),
            failed_tests: self.failed().cloned().collect(),
            timestamp: self.timestamp,
        }
    }

    /// Plain text rendering for terminals
    pub fn to_console(&self) -> String {
        let mut out = String::new();
        for result in &self.results {
            let mark = match result.status {
                Outcome::Pass => "✓",
                Outcome::Fail => "✗",
            };
            let observed = result
                .http_status
                .map_or_else(|| "no response".to_string(), |s| s.to_string());
            let _ = writeln!(
                out,
                "  {} {} {} - {} (expected {}, got {})",
                mark, result.method, result.endpoint, result.description, result.expected_status, observed
            );
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Passed: {}", self.summary.passed);
        let _ = writeln!(out, "Failed: {}", self.summary.failed);
        let _ = writeln!(out, "Total: {}", self.summary.total);
        let _ = writeln!(out, "Success Rate: {:.1}%", self.summary.success_rate);
        let _ = writeln!(out, "Status: {}", status_label(self.summary.status));
        out
    }

    /// Self-contained HTML page
    pub fn to_html(&self) -> String {
        let mut rows = String::new();
        for result in &self.results {
            let (class, label) = match result.status {
                Outcome::Pass => ("pass", "PASS"),
                Outcome::Fail => ("fail", "FAIL"),
            };
            let observed = result
                .http_status
                .map_or_else(|| "-".to_string(), |s| s.to_string());
            let error = result
                .error
                .as_ref()
                .map(|e| match e {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .unwrap_or_default();
            let _ = write!(
                rows,
                "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td><code>{}</code></td></tr>\n",
                class,
                label,
                escape_html(&result.method),
                escape_html(&result.endpoint),
                escape_html(&result.description),
                result.expected_status,
                observed,
                escape_html(&error),
            );
        }

        let mut logs = String::new();
        for entry in &self.logs {
            let _ = writeln!(
                logs,
                "<li class=\"{:?}\"><span>{}</span> {}</li>",
                entry.level,
                entry.timestamp.to_rfc3339(),
                escape_html(&entry.message),
            );
        }

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Kraken Gateway Self-Test</title>
<style>
body {{ font-family: sans-serif; margin: 2rem; }}
table {{ border-collapse: collapse; width: 100%; }}
th, td {{ border: 1px solid #ccc; padding: 4px 8px; text-align: left; }}
tr.pass td:first-child {{ color: #1a7f37; font-weight: bold; }}
tr.fail td:first-child {{ color: #cf222e; font-weight: bold; }}
.healthy {{ color: #1a7f37; }}
.issues_detected {{ color: #cf222e; }}
ul.logs {{ font-family: monospace; font-size: 0.85rem; }}
</style>
</head>
<body>
<h1>Kraken Gateway Self-Test</h1>
<p>Run at {timestamp}</p>
<h2 class="{status}">{status_label}</h2>
<p>Passed: {passed} &middot; Failed: {failed} &middot; Total: {total} &middot; Success rate: {rate:.1}%</p>
<table>
<thead><tr><th>Result</th><th>Method</th><th>Endpoint</th><th>Description</th><th>Expected</th><th>Status</th><th>Error</th></tr></thead>
<tbody>
{rows}</tbody>
</table>
<h2>Log</h2>
<ul class="logs">
{logs}</ul>
</body>
</html>
"#,
            timestamp = self.timestamp.to_rfc3339(),
            status = status_class(self.summary.status),
            status_label = status_label(self.summary.status),
            passed = self.summary.passed,
            failed = self.summary.failed,
            total = self.summary.total,
            rate = self.summary.success_rate,
            rows = rows,
            logs = logs,
        )
    }
}

fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Healthy => "Healthy",
        RunStatus::IssuesDetected => "Issues detected",
    }
}

fn status_class(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Healthy => "healthy",
        RunStatus::IssuesDetected => "issues_detected",
    }
}

/// Escape text for HTML element and attribute content
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
