//! # Token RPC
//!
//! The three node calls the ledger needs: a read-only `eth_call`, a
//! transaction sent from a node-managed account, and a receipt lookup.

use alloy_primitives::{hex, Address, B256};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::{ChainError, ChainResult};

/// Outcome of a mined transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Receipt {
    /// Whether execution succeeded.
    pub success: bool,
    /// Block the transaction was mined in.
    pub block_number: u64,
}

/// Node access used by the chain ledger.
pub trait TokenRpc: Send + Sync {
    /// Executes a read-only call against `to`.
    fn call(&self, to: Address, data: &[u8]) -> ChainResult<Vec<u8>>;

    /// Sends a transaction from a node-managed account. Returns its hash.
    fn send_transaction(&self, from: Address, to: Address, data: &[u8]) -> ChainResult<B256>;

    /// Receipt of `tx_hash`, `None` while pending.
    fn receipt(&self, tx_hash: B256) -> ChainResult<Option<Receipt>>;
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    status: Option<String>,
    block_number: Option<String>,
}

/// JSON-RPC over HTTP.
///
/// Blocking: call it from a worker thread, never from an async task.
#[derive(Debug)]
pub struct HttpRpc {
    url: String,
    client: reqwest::blocking::Client,
    next_id: AtomicU64,
}

impl HttpRpc {
    /// Creates a client for the node at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Transport`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> ChainResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            url: url.into(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    fn request(&self, method: &str, params: Value) -> ChainResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        tracing::trace!("{} -> {}", method, self.url);
        let resp = self.client.post(&self.url).json(&body).send()?;
        if !resp.status().is_success() {
            return Err(ChainError::Transport(format!(
                "{method} failed: HTTP {}",
                resp.status()
            )));
        }

        let resp: RpcResponse = resp.json()?;
        if let Some(err) = resp.error {
            return Err(ChainError::from_rpc(err.code, err.message));
        }
        Ok(resp.result.unwrap_or(Value::Null))
    }
}

impl TokenRpc for HttpRpc {
    fn call(&self, to: Address, data: &[u8]) -> ChainResult<Vec<u8>> {
        let result = self.request(
            "eth_call",
            json!([
                { "to": hex::encode_prefixed(to), "data": hex::encode_prefixed(data) },
                "latest"
            ]),
        )?;
        decode_hex(expect_str(&result, "eth_call")?)
    }

    fn send_transaction(&self, from: Address, to: Address, data: &[u8]) -> ChainResult<B256> {
        let result = self.request(
            "eth_sendTransaction",
            json!([{
                "from": hex::encode_prefixed(from),
                "to": hex::encode_prefixed(to),
                "data": hex::encode_prefixed(data),
            }]),
        )?;
        let bytes = decode_hex(expect_str(&result, "eth_sendTransaction")?)?;
        if bytes.len() != 32 {
            return Err(ChainError::Transport(format!(
                "transaction hash has {} bytes",
                bytes.len()
            )));
        }
        Ok(B256::from_slice(&bytes))
    }

    fn receipt(&self, tx_hash: B256) -> ChainResult<Option<Receipt>> {
        let result = self.request(
            "eth_getTransactionReceipt",
            json!([hex::encode_prefixed(tx_hash)]),
        )?;
        if result.is_null() {
            return Ok(None);
        }

        let raw: RawReceipt = serde_json::from_value(result)
            .map_err(|e| ChainError::Transport(format!("bad receipt: {e}")))?;
        // Pending receipts on some nodes carry no block number yet.
        let Some(block_number) = raw.block_number.as_deref() else {
            return Ok(None);
        };

        Ok(Some(Receipt {
            success: raw.status.as_deref().map(parse_quantity).transpose()? == Some(1),
            block_number: parse_quantity(block_number)?,
        }))
    }
}

fn expect_str<'a>(value: &'a Value, method: &str) -> ChainResult<&'a str> {
    value
        .as_str()
        .ok_or_else(|| ChainError::Transport(format!("{method} returned {value}")))
}

fn decode_hex(s: &str) -> ChainResult<Vec<u8>> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| ChainError::Transport(format!("bad hex {s:?}: {e}")))
}

fn parse_quantity(s: &str) -> ChainResult<u64> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16)
        .map_err(|e| ChainError::Transport(format!("bad quantity {s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x1").unwrap(), 1);
        assert_eq!(parse_quantity("0x1b4").unwrap(), 436);
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode_hex("0x0a0b").unwrap(), [10, 11]);
        assert_eq!(decode_hex("0x").unwrap(), Vec::<u8>::new());
        assert!(decode_hex("0x0").is_err());
    }

    #[test]
    fn test_rpc_error_object() {
        let resp: RpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": 3, "message": "execution reverted" }
        }))
        .unwrap();
        let err = resp.error.unwrap();
        assert!(matches!(
            ChainError::from_rpc(err.code, err.message),
            ChainError::Reverted(_)
        ));
    }

    #[test]
    fn test_unreachable_node() {
        let rpc = HttpRpc::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        let err = rpc.call(Address::ZERO, &[]).unwrap_err();
        assert!(matches!(err, ChainError::Transport(_) | ChainError::Timeout(_)));
    }
}
