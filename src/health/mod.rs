//! Health check module
//!
//! Liveness payload served at `/health`.

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Service name reported by the health endpoint
pub const SERVICE_NAME: &str = "Kraken API Service";

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Health checker service
#[derive(Debug, Clone)]
pub struct HealthChecker {
    start_time: Instant,
    version: String,
}

impl HealthChecker {
    /// Create a new health checker
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Get liveness status (always OK while the process serves requests)
    pub fn liveness(&self) -> HealthResponse {
        HealthResponse {
            status: "OK".to_string(),
            service: SERVICE_NAME.to_string(),
            version: self.version.clone(),
            uptime_seconds: self.uptime_seconds(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liveness() {
        let checker = HealthChecker::new();
        let health = checker.liveness();

        assert_eq!(health.status, "OK");
        assert_eq!(health.service, "Kraken API Service");
        assert!(!health.version.is_empty());
        assert_eq!(health.uptime_seconds, 0);
    }
}
