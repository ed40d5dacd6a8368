//! Public market data endpoints (no authentication)

use super::{KrakenClient, Params, Result};
use serde_json::Value;

impl KrakenClient {
    /// Server time
    ///
    /// GET /0/public/Time
    pub async fn time(&self) -> Result<Value> {
        self.public("Time", Params::new()).await
    }

    /// Exchange system status
    ///
    /// GET /0/public/SystemStatus
    pub async fn system_status(&self) -> Result<Value> {
        self.public("SystemStatus", Params::new()).await
    }

    /// Asset info; optional `asset`, `aclass`
    ///
    /// GET /0/public/Assets
    pub async fn assets(&self, params: Params) -> Result<Value> {
        self.public("Assets", params).await
    }

    /// Tradable asset pairs; optional `pair`, `info`
    ///
    /// GET /0/public/AssetPairs
    pub async fn asset_pairs(&self, params: Params) -> Result<Value> {
        self.public("AssetPairs", params).await
    }

    /// Ticker information; requires `pair`
    ///
    /// GET /0/public/Ticker
    pub async fn ticker(&self, params: Params) -> Result<Value> {
        self.public("Ticker", params).await
    }

    /// OHLC candles; requires `pair`, optional `interval`, `since`
    ///
    /// GET /0/public/OHLC
    pub async fn ohlc(&self, params: Params) -> Result<Value> {
        self.public("OHLC", params).await
    }

    /// Order book; requires `pair`, optional `count`
    ///
    /// GET /0/public/Depth
    pub async fn depth(&self, params: Params) -> Result<Value> {
        self.public("Depth", params).await
    }

    /// Recent trades; requires `pair`, optional `since`
    ///
    /// GET /0/public/Trades
    pub async fn trades(&self, params: Params) -> Result<Value> {
        self.public("Trades", params).await
    }

    /// Recent spreads; requires `pair`, optional `since`
    ///
    /// GET /0/public/Spread
    pub async fn spread(&self, params: Params) -> Result<Value> {
        self.public("Spread", params).await
    }
}
