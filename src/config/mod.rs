//! Configuration module for the gateway service
//!
//! Configuration is read from an optional TOML file and then overridden by
//! environment variables (`PORT`, `KRAKEN_BASE_URL`, `KRAKEN_API_KEY`,
//! `KRAKEN_API_SECRET`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Environment variables that must be set before the gateway starts
pub const REQUIRED_ENV_VARS: [&str; 2] = ["KRAKEN_API_KEY", "KRAKEN_API_SECRET"];

/// Paths served by the gateway besides `/api/*`
const RESERVED_PATHS: [&str; 2] = ["/health", "/test"];

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3240
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Kraken exchange client configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct KrakenConfig {
    /// REST API base URL
    #[serde(default = "default_kraken_base_url")]
    pub base_url: String,
    /// API key (usually supplied through `KRAKEN_API_KEY`)
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Base64 encoded API secret (usually supplied through `KRAKEN_API_SECRET`)
    #[serde(default, skip_serializing)]
    pub api_secret: Option<String>,
    /// Upstream request timeout in seconds
    #[serde(default = "default_kraken_timeout")]
    pub timeout: u64,
}

fn default_kraken_base_url() -> String {
    "https://api.kraken.com".to_string()
}

fn default_kraken_timeout() -> u64 {
    30
}

impl Default for KrakenConfig {
    fn default() -> Self {
        Self {
            base_url: default_kraken_base_url(),
            api_key: None,
            api_secret: None,
            timeout: default_kraken_timeout(),
        }
    }
}

// Keeps credentials out of logs.
impl std::fmt::Debug for KrakenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KrakenConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl KrakenConfig {
    /// Names of the credential variables that are missing or empty
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let values = [&self.api_key, &self.api_secret];
        REQUIRED_ENV_VARS
            .iter()
            .zip(values)
            .filter(|(_, value)| value.as_deref().map_or(true, str::is_empty))
            .map(|(name, _)| *name)
            .collect()
    }
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics are enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Path to expose metrics
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

fn default_enabled() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_metrics_path(),
        }
    }
}

/// Self-test configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfTestConfig {
    /// Gateway URL the `/test` route runs against (defaults to the local listener)
    #[serde(default)]
    pub base_url: Option<String>,
    /// Per-call timeout in milliseconds
    #[serde(default = "default_self_test_timeout_ms")]
    pub timeout_ms: u64,
    /// Failed cases tolerated before the run is reported as `issues_detected`
    #[serde(default)]
    pub max_failures: usize,
}

fn default_self_test_timeout_ms() -> u64 {
    10_000
}

impl Default for SelfTestConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: default_self_test_timeout_ms(),
            max_failures: 0,
        }
    }
}

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub kraken: KrakenConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub self_test: SelfTestConfig,
}

impl GatewayConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Load configuration from a TOML string
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        let config: GatewayConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file if given, apply process environment overrides, validate
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup function
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(port) = lookup("PORT") {
            match port.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(e) => tracing::warn!("Ignoring invalid PORT value '{}': {}", port, e),
            }
        }
        if let Some(base_url) = lookup("KRAKEN_BASE_URL") {
            self.kraken.base_url = base_url;
        }
        if let Some(key) = lookup("KRAKEN_API_KEY") {
            self.kraken.api_key = Some(key);
        }
        if let Some(secret) = lookup("KRAKEN_API_SECRET") {
            self.kraken.api_secret = Some(secret);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }
        if self.kraken.base_url.trim().is_empty() {
            anyhow::bail!("Kraken base URL must not be empty");
        }
        if !self.kraken.base_url.starts_with("http://") && !self.kraken.base_url.starts_with("https://")
        {
            anyhow::bail!(
                "Kraken base URL '{}' must start with http:// or https://",
                self.kraken.base_url
            );
        }
        if self.kraken.timeout == 0 {
            anyhow::bail!("Kraken request timeout must be greater than 0");
        }
        if self.self_test.timeout_ms == 0 {
            anyhow::bail!("Self-test timeout must be greater than 0");
        }
        if self.metrics.enabled {
            let path = self.metrics.path.as_str();
            if !path.starts_with('/') {
                anyhow::bail!("Metrics path '{}' must start with '/'", path);
            }
            if RESERVED_PATHS.contains(&path) || path == "/api" || path.starts_with("/api/") {
                anyhow::bail!("Metrics path '{}' conflicts with a gateway route", path);
            }
        }
        Ok(())
    }

    /// Fail unless both Kraken credentials are configured
    pub fn require_credentials(&self) -> anyhow::Result<()> {
        let missing = self.kraken.missing_credentials();
        if !missing.is_empty() {
            anyhow::bail!(
                "Missing required environment variables: {}",
                missing.join(", ")
            );
        }
        Ok(())
    }

    /// Get server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// URL the self-test runs against
    pub fn self_test_base_url(&self) -> String {
        match &self.self_test.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://127.0.0.1:{}", self.server.port),
        }
    }
}
