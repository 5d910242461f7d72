//! pinvault-ledger: the on-chain side of pinning
//!
//! ```text
//! PinningContract ──abi──► calldata ──LegacyTx──► Wallet::sign (EIP-155)
//!        │                                             │
//!        └──────── LedgerClient (JSON-RPC / mock) ◄────┘ send_raw, wait_for_receipt
//! ```
//!
//! Amounts are carried as `u128` wei throughout.

pub mod abi;
pub mod address;
pub mod client;
pub mod contract;
pub mod network;
pub mod rpc;
pub mod tx;
pub mod units;
pub mod wallet;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

use sha3::{Digest, Keccak256};

pub use address::Address;
pub use client::{CallRequest, LedgerClient, TxReceipt};
pub use contract::{PinFileCall, PinningContract};
pub use network::{Network, NetworkSpec};
pub use rpc::JsonRpcLedger;
pub use tx::{LegacyTx, SignedTx};
pub use wallet::Wallet;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak_empty() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }
}
