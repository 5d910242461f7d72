//! Ethereum JSON-RPC over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pinvault_core::{PinvaultError, PinvaultResult, TxErrorKind};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::address::Address;
use crate::client::{CallRequest, LedgerClient, TxReceipt};
use crate::units::{parse_quantity, parse_quantity_u64, to_quantity};

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    transaction_hash: String,
    #[serde(default)]
    status: Option<String>,
    gas_used: String,
    block_number: Option<String>,
    #[serde(default)]
    effective_gas_price: Option<String>,
}

/// Why a request failed: the node was unreachable, or it answered with an error.
enum RpcFailure {
    Transport(String),
    Node { code: i64, message: String },
}

impl RpcFailure {
    fn into_ledger(self, method: &str) -> PinvaultError {
        match self {
            RpcFailure::Transport(m) => PinvaultError::ledger(format!("{method}: {m}")),
            RpcFailure::Node { code, message } => {
                PinvaultError::ledger(format!("{method}: node error {code}: {message}"))
            }
        }
    }

    fn message(&self) -> &str {
        match self {
            RpcFailure::Transport(m) => m,
            RpcFailure::Node { message, .. } => message,
        }
    }
}

pub struct JsonRpcLedger {
    url: String,
    client: Client,
    poll_interval: Duration,
    next_id: AtomicU64,
}

impl JsonRpcLedger {
    pub fn new(
        url: impl Into<String>,
        request_timeout: Duration,
        poll_interval: Duration,
    ) -> PinvaultResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PinvaultError::ledger(format!("building HTTP client: {e}")))?;
        Ok(JsonRpcLedger {
            url: url.into(),
            client,
            poll_interval,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, RpcFailure> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        trace!(method, id, "json-rpc request");

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcFailure::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let t = resp.text().await.unwrap_or_default();
            return Err(RpcFailure::Transport(format!("HTTP {status} {}", t.trim())));
        }
        let parsed: RpcResponse<T> = resp
            .json()
            .await
            .map_err(|e| RpcFailure::Transport(format!("bad response: {e}")))?;
        if let Some(err) = parsed.error {
            return Err(RpcFailure::Node {
                code: err.code,
                message: err.message,
            });
        }
        Ok(parsed.result)
    }

    async fn request_required<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> PinvaultResult<T> {
        self.request(method, params)
            .await
            .map_err(|f| f.into_ledger(method))?
            .ok_or_else(|| PinvaultError::ledger(format!("{method}: empty result")))
    }

    async fn quantity(&self, method: &str, params: Value) -> PinvaultResult<u128> {
        let q: String = self.request_required(method, params).await?;
        parse_quantity(&q)
    }

    async fn receipt(&self, tx_hash: &str) -> PinvaultResult<Option<TxReceipt>> {
        let raw: Option<RawReceipt> = self
            .request("eth_getTransactionReceipt", json!([tx_hash]))
            .await
            .map_err(|f| f.into_ledger("eth_getTransactionReceipt"))?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        // Pending receipts on some nodes come back without a block number.
        let Some(block) = raw.block_number else {
            return Ok(None);
        };
        Ok(Some(TxReceipt {
            tx_hash: raw.transaction_hash,
            status: raw.status.as_deref().map(parse_quantity).transpose()? == Some(1),
            gas_used: parse_quantity_u64(&raw.gas_used)?,
            block_number: parse_quantity_u64(&block)?,
            effective_gas_price: raw
                .effective_gas_price
                .as_deref()
                .map(parse_quantity)
                .transpose()?,
        }))
    }
}

fn call_object(req: &CallRequest) -> Value {
    let mut obj = json!({
        "to": req.to.to_checksum(),
        "data": format!("0x{}", hex::encode(&req.data)),
    });
    if let Some(from) = &req.from {
        obj["from"] = json!(from.to_checksum());
    }
    if req.value > 0 {
        obj["value"] = json!(to_quantity(req.value));
    }
    obj
}

#[async_trait]
impl LedgerClient for JsonRpcLedger {
    async fn chain_id(&self) -> PinvaultResult<u64> {
        let id = self.quantity("eth_chainId", json!([])).await?;
        u64::try_from(id).map_err(|_| PinvaultError::ledger("chain id exceeds u64"))
    }

    async fn gas_price(&self) -> PinvaultResult<u128> {
        self.quantity("eth_gasPrice", json!([])).await
    }

    async fn balance(&self, address: &Address) -> PinvaultResult<u128> {
        self.quantity("eth_getBalance", json!([address.to_checksum(), "latest"]))
            .await
    }

    async fn nonce(&self, address: &Address) -> PinvaultResult<u64> {
        let n = self
            .quantity(
                "eth_getTransactionCount",
                json!([address.to_checksum(), "pending"]),
            )
            .await?;
        u64::try_from(n).map_err(|_| PinvaultError::ledger("nonce exceeds u64"))
    }

    async fn call(&self, request: &CallRequest) -> PinvaultResult<Vec<u8>> {
        let out: String = self
            .request_required("eth_call", json!([call_object(request), "latest"]))
            .await?;
        hex::decode(out.trim_start_matches("0x"))
            .map_err(|e| PinvaultError::ledger(format!("eth_call: bad return data: {e}")))
    }

    async fn estimate_gas(&self, request: &CallRequest) -> PinvaultResult<u64> {
        let q: String = self
            .request("eth_estimateGas", json!([call_object(request)]))
            .await
            .map_err(|f| PinvaultError::GasEstimation(f.message().to_string()))?
            .ok_or_else(|| PinvaultError::GasEstimation("empty result".into()))?;
        parse_quantity_u64(&q).map_err(|e| PinvaultError::GasEstimation(e.to_string()))
    }

    async fn send_raw(&self, raw: &[u8]) -> PinvaultResult<String> {
        let hash: String = self
            .request(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(raw))]),
            )
            .await
            .map_err(|f| match f {
                RpcFailure::Transport(m) => PinvaultError::ledger(m),
                RpcFailure::Node { message, .. } => PinvaultError::transaction(message),
            })?
            .ok_or_else(|| PinvaultError::ledger("eth_sendRawTransaction: empty result"))?;
        debug!(tx = %hash, "transaction broadcast");
        Ok(hash)
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: &str,
        timeout: Duration,
    ) -> PinvaultResult<TxReceipt> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(receipt) = self.receipt(tx_hash).await? {
                return Ok(receipt);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(PinvaultError::Transaction {
                    kind: TxErrorKind::Timeout,
                    message: format!(
                        "no receipt for {tx_hash} after {}s",
                        timeout.as_secs()
                    ),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_object_shape() {
        let req = CallRequest {
            from: Some(Address::from_bytes([0x11; 20])),
            to: Address::from_bytes([0x22; 20]),
            data: vec![0xde, 0xad],
            value: 255,
        };
        let obj = call_object(&req);
        assert_eq!(obj["data"], "0xdead");
        assert_eq!(obj["value"], "0xff");
        assert_eq!(obj["from"], "0x1111111111111111111111111111111111111111");

        let view = CallRequest { from: None, value: 0, ..req };
        let obj = call_object(&view);
        assert!(obj.get("from").is_none());
        assert!(obj.get("value").is_none());
    }

    #[test]
    fn parses_receipt_body() {
        let body = r#"{"jsonrpc":"2.0","id":1,"result":{
            "transactionHash":"0xabc","status":"0x1","gasUsed":"0x5208",
            "blockNumber":"0x10","effectiveGasPrice":"0x3b9aca00"}}"#;
        let parsed: RpcResponse<RawReceipt> = serde_json::from_str(body).unwrap();
        let raw = parsed.result.unwrap();
        assert_eq!(raw.gas_used, "0x5208");
        assert_eq!(raw.block_number.as_deref(), Some("0x10"));
    }

    #[test]
    fn parses_error_body() {
        let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"nonce too low"}}"#;
        let parsed: RpcResponse<String> = serde_json::from_str(body).unwrap();
        assert!(parsed.result.is_none());
        assert_eq!(parsed.error.unwrap().message, "nonce too low");
    }

    #[tokio::test]
    async fn unreachable_node_is_connectivity_error() {
        let ledger = JsonRpcLedger::new(
            "http://127.0.0.1:9",
            Duration::from_millis(500),
            Duration::from_millis(10),
        )
        .unwrap();
        let err = ledger.chain_id().await.unwrap_err();
        assert!(matches!(err, PinvaultError::Connectivity { .. }));
    }
}
