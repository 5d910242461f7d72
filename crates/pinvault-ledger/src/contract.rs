//! Typed access to the pinning contract.

use std::sync::Arc;

use pinvault_core::PinvaultResult;
use tracing::debug;

use crate::abi::{decode_uint, encode_call, Token};
use crate::address::Address;
use crate::client::{CallRequest, LedgerClient};

const PIN_FILE: &str = "pinFile(string,string,uint256,uint256,string)";
const CALCULATE_PIN_COST: &str = "calculatePinCost(uint256,uint256)";
const PRICE_PER_GB_PER_DAY: &str = "pricePerGBPerDay()";

/// Arguments of `pinFile`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinFileCall {
    pub content_id: String,
    pub metadata_id: String,
    pub file_size: u64,
    pub duration_secs: u64,
    pub name: String,
}

impl PinFileCall {
    pub fn calldata(&self) -> Vec<u8> {
        encode_call(
            PIN_FILE,
            &[
                Token::String(self.content_id.clone()),
                Token::String(self.metadata_id.clone()),
                Token::Uint(u128::from(self.file_size)),
                Token::Uint(u128::from(self.duration_secs)),
                Token::String(self.name.clone()),
            ],
        )
    }
}

#[derive(Clone)]
pub struct PinningContract {
    ledger: Arc<dyn LedgerClient>,
    address: Address,
}

impl PinningContract {
    pub fn new(ledger: Arc<dyn LedgerClient>, address: Address) -> Self {
        Self { ledger, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }

    async fn view_uint(&self, data: Vec<u8>) -> PinvaultResult<u128> {
        let out = self
            .ledger
            .call(&CallRequest {
                from: None,
                to: self.address,
                data,
                value: 0,
            })
            .await?;
        decode_uint(&out)
    }

    /// Price in wei for pinning `file_size` bytes for `duration_secs`.
    pub async fn calculate_pin_cost(&self, file_size: u64, duration_secs: u64) -> PinvaultResult<u128> {
        let cost = self
            .view_uint(encode_call(
                CALCULATE_PIN_COST,
                &[
                    Token::Uint(u128::from(file_size)),
                    Token::Uint(u128::from(duration_secs)),
                ],
            ))
            .await?;
        debug!(file_size, duration_secs, cost_wei = %cost, "pin cost quoted");
        Ok(cost)
    }

    pub async fn price_per_gb_per_day(&self) -> PinvaultResult<u128> {
        self.view_uint(encode_call(PRICE_PER_GB_PER_DAY, &[])).await
    }

    /// Call request for `pinFile`, paying `value` wei from `from`.
    pub fn pin_file_request(&self, call: &PinFileCall, from: Address, value: u128) -> CallRequest {
        CallRequest {
            from: Some(from),
            to: self.address,
            data: call.calldata(),
            value,
        }
    }
}
