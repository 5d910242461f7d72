//! Legacy (type 0) transactions with EIP-155 replay protection.
//!
//! Signing preimage and wire form are both 9-item RLP lists:
//! ```text
//! preimage: [nonce, gasPrice, gas, to, value, data, chainId, 0, 0]
//! signed:   [nonce, gasPrice, gas, to, value, data, v, r, s]
//! v = recovery_id + 35 + 2 * chainId
//! ```

use rlp::RlpStream;

use pinvault_core::PinvaultResult;

use crate::address::Address;
use crate::keccak256;
use crate::wallet::Wallet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTx {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: u128,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

#[derive(Debug, Clone)]
pub struct SignedTx {
    pub raw: Vec<u8>,
    pub hash: [u8; 32],
}

impl SignedTx {
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }

    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.hash))
    }
}

impl LegacyTx {
    fn append_body(&self, s: &mut RlpStream) {
        s.append(&self.nonce);
        s.append(&self.gas_price);
        s.append(&self.gas_limit);
        s.append(&self.to.as_bytes().to_vec());
        s.append(&self.value);
        s.append(&self.data);
    }

    pub fn signing_preimage(&self) -> Vec<u8> {
        let mut s = RlpStream::new_list(9);
        self.append_body(&mut s);
        s.append(&self.chain_id);
        s.append(&0u8);
        s.append(&0u8);
        s.out().to_vec()
    }

    pub fn signing_hash(&self) -> [u8; 32] {
        keccak256(&self.signing_preimage())
    }

    pub fn sign(&self, wallet: &Wallet) -> PinvaultResult<SignedTx> {
        let (sig, recid) = wallet.sign_prehash(&self.signing_hash())?;
        let v = u64::from(recid.to_byte()) + 35 + 2 * self.chain_id;
        let (r, s) = sig.split_bytes();

        let mut stream = RlpStream::new_list(9);
        self.append_body(&mut stream);
        stream.append(&v);
        stream.append(&trim_leading_zeros(&r));
        stream.append(&trim_leading_zeros(&s));
        let raw = stream.out().to_vec();

        Ok(SignedTx {
            hash: keccak256(&raw),
            raw,
        })
    }
}

/// Scalars are RLP integers: big-endian with no leading zero bytes.
fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}
