//! Private account and trading endpoints (signed)

use super::{KrakenClient, Params, Result};
use serde_json::Value;

impl KrakenClient {
    /// Account balances
    ///
    /// POST /0/private/Balance
    pub async fn balance(&self) -> Result<Value> {
        self.private("Balance", Params::new()).await
    }

    /// Place an order; requires `pair`, `type`, `ordertype`, `volume`
    ///
    /// POST /0/private/AddOrder
    pub async fn add_order(&self, params: Params) -> Result<Value> {
        self.private("AddOrder", params).await
    }

    /// Cancel one order by `txid`
    ///
    /// POST /0/private/CancelOrder
    pub async fn cancel_order(&self, txid: &str) -> Result<Value> {
        self.private("CancelOrder", vec![("txid", txid.to_string())])
            .await
    }

    /// Cancel every open order
    ///
    /// POST /0/private/CancelAll
    pub async fn cancel_all(&self) -> Result<Value> {
        self.private("CancelAll", Params::new()).await
    }

    /// Dead man's switch: cancel all orders after `timeout` seconds, 0 disables
    ///
    /// POST /0/private/CancelAllOrdersAfter
    pub async fn cancel_all_orders_after(&self, timeout: u32) -> Result<Value> {
        self.private(
            "CancelAllOrdersAfter",
            vec![("timeout", timeout.to_string())],
        )
        .await
    }
}
