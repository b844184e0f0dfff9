//! Chain RPC client
//!
//! JSON-RPC 2.0 over HTTP against an EVM-compatible node. The [`ChainRpc`]
//! trait is the seam the dispatcher and service talk through; tests inject a
//! mock in its place.

use crate::error::{FaucetError, FaucetResult};
use ande_common::{Address, Hash};
use async_trait::async_trait;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// The subset of a transaction receipt the faucet cares about.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub transaction_hash: Hash,
    pub block_number: Option<String>,
    pub gas_used: Option<String>,
    /// "0x1" success, "0x0" reverted; absent on pre-Byzantium chains.
    pub status: Option<String>,
}

impl TxReceipt {
    pub fn succeeded(&self) -> bool {
        !matches!(self.status.as_deref(), Some("0x0"))
    }
}

#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn get_balance(&self, address: &Address) -> FaucetResult<u128>;

    /// Pending-state nonce for the account.
    async fn get_transaction_count(&self, address: &Address) -> FaucetResult<u64>;

    async fn send_raw_transaction(&self, raw: &[u8]) -> FaucetResult<Hash>;

    async fn get_transaction_receipt(&self, hash: &Hash) -> FaucetResult<Option<TxReceipt>>;

    async fn chain_id(&self) -> FaucetResult<u64>;
}

/// reqwest-backed [`ChainRpc`] implementation.
pub struct HttpRpcClient {
    rpc_url: String,
    client: reqwest::Client,
}

impl HttpRpcClient {
    pub fn new(rpc_url: String, timeout: Duration) -> FaucetResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FaucetError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { rpc_url, client })
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> FaucetResult<serde_json::Value> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| FaucetError::Network(format!("RPC request failed: {}", e)))?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FaucetError::Network(format!("Invalid RPC response: {}", e)))?;

        if let Some(error) = json.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown RPC error");
            return Err(classify_rpc_error(message));
        }

        Ok(json
            .get("result")
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl ChainRpc for HttpRpcClient {
    async fn get_balance(&self, address: &Address) -> FaucetResult<u128> {
        let result = self
            .call(
                "eth_getBalance",
                serde_json::json!([address.to_string(), "latest"]),
            )
            .await?;
        parse_quantity(&result)
    }

    async fn get_transaction_count(&self, address: &Address) -> FaucetResult<u64> {
        let result = self
            .call(
                "eth_getTransactionCount",
                serde_json::json!([address.to_string(), "pending"]),
            )
            .await?;
        parse_quantity(&result).map(|n| n as u64)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> FaucetResult<Hash> {
        let result = self
            .call(
                "eth_sendRawTransaction",
                serde_json::json!([format!("0x{}", hex::encode(raw))]),
            )
            .await?;
        let hash = result
            .as_str()
            .ok_or_else(|| FaucetError::Network("expected transaction hash".to_string()))?;
        Hash::from_str(hash)
            .map_err(|e| FaucetError::Network(format!("Malformed transaction hash: {}", e)))
    }

    async fn get_transaction_receipt(&self, hash: &Hash) -> FaucetResult<Option<TxReceipt>> {
        let result = self
            .call(
                "eth_getTransactionReceipt",
                serde_json::json!([hash.to_string()]),
            )
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        serde_json::from_value(result)
            .map(Some)
            .map_err(|e| FaucetError::Network(format!("Malformed receipt: {}", e)))
    }

    async fn chain_id(&self) -> FaucetResult<u64> {
        let result = self.call("eth_chainId", serde_json::json!([])).await?;
        parse_quantity(&result).map(|n| n as u64)
    }
}

/// Map a JSON-RPC error message onto the dispatch error taxonomy.
fn classify_rpc_error(message: &str) -> FaucetError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("insufficient funds") {
        FaucetError::InsufficientFaucetFunds
    } else if lower.contains("underpriced") || lower.contains("gas price") {
        FaucetError::GasPriceTooLow
    } else if lower.contains("nonce") {
        FaucetError::NonceExpired
    } else {
        FaucetError::Dispatch(message.to_string())
    }
}

fn parse_quantity(value: &serde_json::Value) -> FaucetResult<u128> {
    let s = value
        .as_str()
        .ok_or_else(|| FaucetError::Network("expected hex quantity".to_string()))?;
    u128::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| FaucetError::Network(format!("Malformed hex quantity {}: {}", s, e)))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_rpc_error_messages() {
        assert!(matches!(
            classify_rpc_error("insufficient funds for gas * price + value"),
            FaucetError::InsufficientFaucetFunds
        ));
        assert!(matches!(
            classify_rpc_error("transaction underpriced"),
            FaucetError::GasPriceTooLow
        ));
        assert!(matches!(
            classify_rpc_error("nonce too low"),
            FaucetError::NonceExpired
        ));
        assert!(matches!(
            classify_rpc_error("execution aborted"),
            FaucetError::Dispatch(_)
        ));
    }

    #[test]
    fn parses_hex_quantities() {
        assert_eq!(
            parse_quantity(&serde_json::json!("0x5208")).unwrap(),
            21_000
        );
        assert_eq!(parse_quantity(&serde_json::json!("0x0")).unwrap(), 0);
        assert!(parse_quantity(&serde_json::json!(null)).is_err());
        assert!(parse_quantity(&serde_json::json!("0xzz")).is_err());
    }

    #[test]
    fn receipt_status_interpretation() {
        let mut receipt = TxReceipt {
            transaction_hash: Hash::default(),
            block_number: Some("0x1".to_string()),
            gas_used: None,
            status: Some("0x1".to_string()),
        };
        assert!(receipt.succeeded());

        receipt.status = Some("0x0".to_string());
        assert!(!receipt.succeeded());

        // Chains without receipt status report success by inclusion alone.
        receipt.status = None;
        assert!(receipt.succeeded());
    }
}
