//! The ledger seam used by the pinning orchestrator.
//!
//! [`JsonRpcLedger`](crate::rpc::JsonRpcLedger) talks to a real node;
//! [`MockLedger`](crate::mock::MockLedger) (feature `mock`) scripts responses
//! for tests.

use std::time::Duration;

use async_trait::async_trait;
use pinvault_core::PinvaultResult;

use crate::address::Address;

/// A message call: used for both `eth_call` and `eth_estimateGas`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub data: Vec<u8>,
    pub value: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: String,
    /// `true` when the transaction executed without reverting
    pub status: bool,
    pub gas_used: u64,
    pub block_number: u64,
    pub effective_gas_price: Option<u128>,
}

/// Async ledger access. Implementations do not retry internally.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn chain_id(&self) -> PinvaultResult<u64>;

    async fn gas_price(&self) -> PinvaultResult<u128>;

    async fn balance(&self, address: &Address) -> PinvaultResult<u128>;

    /// Pending transaction count, i.e. the next nonce to use.
    async fn nonce(&self, address: &Address) -> PinvaultResult<u64>;

    /// Execute a read-only call and return the raw return data.
    async fn call(&self, request: &CallRequest) -> PinvaultResult<Vec<u8>>;

    /// Errors are reported as `GasEstimation`.
    async fn estimate_gas(&self, request: &CallRequest) -> PinvaultResult<u64>;

    /// Broadcast a signed transaction and return its hash.
    async fn send_raw(&self, raw: &[u8]) -> PinvaultResult<String>;

    /// Poll until a receipt is available or `timeout` elapses
    /// (`Transaction { kind: Timeout }`).
    async fn wait_for_receipt(&self, tx_hash: &str, timeout: Duration)
        -> PinvaultResult<TxReceipt>;
}
