//! Scriptable in-memory ledger for tests.
//!
//! Every call is served from mutex-guarded state; broadcasts are decoded and
//! recorded so tests can assert on nonce, gas limit and value per
//! transaction. Lock poisoning is reported as a ledger error.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use pinvault_core::{PinvaultError, PinvaultResult, TxErrorKind};

use crate::abi::selector;
use crate::address::Address;
use crate::client::{CallRequest, LedgerClient, TxReceipt};

/// A decoded broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTx {
    pub hash: String,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub value: u128,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReceiptScript {
    Success,
    Revert,
    Timeout,
}

struct State {
    chain_id: u64,
    gas_price: u128,
    balance: u128,
    next_nonce: u64,
    estimate: u64,
    gas_used: u64,
    views: HashMap<[u8; 4], u128>,
    estimate_calls: u32,
    failing_estimates: HashSet<u32>,
    send_attempts: u32,
    failing_sends: HashMap<u32, String>,
    receipt_scripts: HashMap<u32, ReceiptScript>,
    receipts: HashMap<String, ReceiptScript>,
    sent: Vec<SentTx>,
}

pub struct MockLedger {
    state: Mutex<State>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    /// Chain 11155111, 1 gwei gas price, 10 ether balance, 200k estimate.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                chain_id: 11_155_111,
                gas_price: 1_000_000_000,
                balance: 10_000_000_000_000_000_000,
                next_nonce: 0,
                estimate: 200_000,
                gas_used: 150_000,
                views: HashMap::new(),
                estimate_calls: 0,
                failing_estimates: HashSet::new(),
                send_attempts: 0,
                failing_sends: HashMap::new(),
                receipt_scripts: HashMap::new(),
                receipts: HashMap::new(),
                sent: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> PinvaultResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|e| PinvaultError::ledger(format!("mock state poisoned: {e}")))
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut guard = match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    pub fn set_chain_id(&self, id: u64) -> &Self {
        self.with(|s| s.chain_id = id);
        self
    }

    pub fn set_gas_price(&self, wei: u128) -> &Self {
        self.with(|s| s.gas_price = wei);
        self
    }

    pub fn set_balance(&self, wei: u128) -> &Self {
        self.with(|s| s.balance = wei);
        self
    }

    pub fn set_nonce(&self, nonce: u64) -> &Self {
        self.with(|s| s.next_nonce = nonce);
        self
    }

    pub fn set_estimate(&self, gas: u64) -> &Self {
        self.with(|s| s.estimate = gas);
        self
    }

    /// Return `value` (as one uint256 word) for calls to `signature`.
    pub fn set_view_uint(&self, signature: &str, value: u128) -> &Self {
        let sel = selector(signature);
        self.with(|s| s.views.insert(sel, value));
        self
    }

    /// Make the `n`th `estimate_gas` call (1-based) fail.
    pub fn fail_estimate(&self, n: u32) -> &Self {
        self.with(|s| s.failing_estimates.insert(n));
        self
    }

    /// Make the `n`th broadcast attempt (1-based) be rejected with `message`.
    pub fn fail_send(&self, n: u32, message: &str) -> &Self {
        self.with(|s| s.failing_sends.insert(n, message.to_string()));
        self
    }

    /// The `n`th broadcast attempt gets a reverted receipt.
    pub fn revert_receipt(&self, n: u32) -> &Self {
        self.with(|s| s.receipt_scripts.insert(n, ReceiptScript::Revert));
        self
    }

    /// The `n`th broadcast attempt never gets a receipt.
    pub fn withhold_receipt(&self, n: u32) -> &Self {
        self.with(|s| s.receipt_scripts.insert(n, ReceiptScript::Timeout));
        self
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.with(|s| s.sent.clone())
    }

    pub fn estimate_calls(&self) -> u32 {
        self.with(|s| s.estimate_calls)
    }

    pub fn send_attempts(&self) -> u32 {
        self.with(|s| s.send_attempts)
    }
}

fn decode_sent(raw: &[u8], hash: String) -> PinvaultResult<SentTx> {
    let bad = |e: rlp::DecoderError| PinvaultError::transaction(format!("undecodable tx: {e}"));
    let rlp = rlp::Rlp::new(raw);
    Ok(SentTx {
        hash,
        nonce: rlp.val_at(0).map_err(bad)?,
        gas_price: rlp.val_at(1).map_err(bad)?,
        gas_limit: rlp.val_at(2).map_err(bad)?,
        value: rlp.val_at(4).map_err(bad)?,
        data: rlp.val_at(5).map_err(bad)?,
    })
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn chain_id(&self) -> PinvaultResult<u64> {
        Ok(self.lock()?.chain_id)
    }

    async fn gas_price(&self) -> PinvaultResult<u128> {
        Ok(self.lock()?.gas_price)
    }

    async fn balance(&self, _address: &Address) -> PinvaultResult<u128> {
        Ok(self.lock()?.balance)
    }

    async fn nonce(&self, _address: &Address) -> PinvaultResult<u64> {
        Ok(self.lock()?.next_nonce)
    }

    async fn call(&self, request: &CallRequest) -> PinvaultResult<Vec<u8>> {
        let state = self.lock()?;
        let sel: [u8; 4] = request
            .data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| PinvaultError::transaction("execution reverted: no selector"))?;
        let value = state
            .views
            .get(&sel)
            .copied()
            .ok_or_else(|| PinvaultError::transaction("execution reverted: unknown function"))?;
        let mut word = vec![0u8; 32];
        word[16..].copy_from_slice(&value.to_be_bytes());
        Ok(word)
    }

    async fn estimate_gas(&self, _request: &CallRequest) -> PinvaultResult<u64> {
        let mut state = self.lock()?;
        state.estimate_calls += 1;
        if state.failing_estimates.contains(&state.estimate_calls) {
            return Err(PinvaultError::GasEstimation(
                "execution reverted: estimation scripted to fail".into(),
            ));
        }
        Ok(state.estimate)
    }

    async fn send_raw(&self, raw: &[u8]) -> PinvaultResult<String> {
        let mut state = self.lock()?;
        state.send_attempts += 1;
        let n = state.send_attempts;
        if let Some(message) = state.failing_sends.get(&n) {
            return Err(PinvaultError::transaction(message.clone()));
        }

        let hash = format!("0x{n:064x}");
        let sent = decode_sent(raw, hash.clone())?;
        if sent.nonce != state.next_nonce {
            return Err(PinvaultError::transaction(format!(
                "nonce too low: next nonce {}, tx nonce {}",
                state.next_nonce, sent.nonce
            )));
        }
        let spend = sent.value + u128::from(sent.gas_limit) * sent.gas_price;
        if spend > state.balance {
            return Err(PinvaultError::transaction(
                "insufficient funds for gas * price + value",
            ));
        }

        let script = state
            .receipt_scripts
            .get(&n)
            .copied()
            .unwrap_or(ReceiptScript::Success);
        if script != ReceiptScript::Timeout {
            let gas_cost = u128::from(state.gas_used.min(sent.gas_limit)) * sent.gas_price;
            let debit = if script == ReceiptScript::Success {
                sent.value + gas_cost
            } else {
                gas_cost
            };
            state.balance = state.balance.saturating_sub(debit);
        }
        state.next_nonce += 1;
        state.receipts.insert(hash.clone(), script);
        state.sent.push(sent);
        Ok(hash)
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: &str,
        timeout: Duration,
    ) -> PinvaultResult<TxReceipt> {
        let (script, gas_used, block) = {
            let state = self.lock()?;
            let script = state.receipts.get(tx_hash).copied().ok_or_else(|| {
                PinvaultError::ledger(format!("unknown transaction {tx_hash}"))
            })?;
            (script, state.gas_used, state.sent.len() as u64)
        };
        match script {
            ReceiptScript::Timeout => Err(PinvaultError::Transaction {
                kind: TxErrorKind::Timeout,
                message: format!("no receipt for {tx_hash} after {}s", timeout.as_secs()),
            }),
            ReceiptScript::Success | ReceiptScript::Revert => Ok(TxReceipt {
                tx_hash: tx_hash.to_string(),
                status: script == ReceiptScript::Success,
                gas_used,
                block_number: 1_000 + block,
                effective_gas_price: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::PinningContract;
    use crate::tx::LegacyTx;
    use crate::wallet::Wallet;
    use std::sync::Arc;

    #[tokio::test]
    async fn contract_views_through_mock() {
        let mock = Arc::new(MockLedger::new());
        mock.set_view_uint("calculatePinCost(uint256,uint256)", 12_345)
            .set_view_uint("pricePerGBPerDay()", 7);
        let contract = PinningContract::new(mock.clone(), Address::from_bytes([1; 20]));

        assert_eq!(contract.calculate_pin_cost(10, 86_400).await.unwrap(), 12_345);
        assert_eq!(contract.price_per_gb_per_day().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn records_and_enforces_nonce() {
        let mock = MockLedger::new();
        let wallet = Wallet::generate();
        let tx = LegacyTx {
            nonce: 0,
            gas_price: 2_000_000_000,
            gas_limit: 240_000,
            to: Address::from_bytes([2; 20]),
            value: 5,
            data: vec![1, 2, 3],
            chain_id: 11_155_111,
        };
        let signed = tx.sign(&wallet).unwrap();

        let hash = mock.send_raw(&signed.raw).await.unwrap();
        let receipt = mock.wait_for_receipt(&hash, Duration::from_secs(1)).await.unwrap();
        assert!(receipt.status);
        assert_eq!(mock.sent()[0].gas_limit, 240_000);
        assert_eq!(mock.sent()[0].data, vec![1, 2, 3]);

        // replaying nonce 0 is rejected
        let err = mock.send_raw(&signed.raw).await.unwrap_err();
        assert_eq!(err.tx_kind(), TxErrorKind::Nonce);
    }

    #[tokio::test]
    async fn scripted_failures() {
        let mock = MockLedger::new();
        mock.fail_estimate(2).fail_send(1, "replacement transaction underpriced");
        let req = CallRequest {
            from: None,
            to: Address::default(),
            data: vec![],
            value: 0,
        };
        assert!(mock.estimate_gas(&req).await.is_ok());
        assert!(matches!(
            mock.estimate_gas(&req).await,
            Err(PinvaultError::GasEstimation(_))
        ));
        let err = mock.send_raw(&[0xc0]).await.unwrap_err();
        assert_eq!(err.tx_kind(), TxErrorKind::GasPrice);
    }
}
