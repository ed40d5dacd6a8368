//! Kraken Gateway - An HTTP gateway for the Kraken exchange REST API
//!
//! This service provides:
//! - Public market data routes (time, assets, ticker, OHLC, depth, trades, spread)
//! - Signed private routes (balance, order placement and cancellation)
//! - Parameter validation with descriptive 400 responses
//! - A self-test harness that exercises every route (`GET /test`, `self-test` CLI)
//! - Prometheus metrics
//! - Health checks

pub mod config;
pub mod gateway;
pub mod health;
pub mod kraken;
pub mod metrics;
pub mod selftest;

pub use config::GatewayConfig;
pub use kraken::KrakenClient;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
