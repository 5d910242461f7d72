//! Minimal Solidity ABI encoding for the pinning contract's functions.
//!
//! Only the shapes the contract uses are supported: `uint256`, `address`
//! and dynamic `string`.

use pinvault_core::{PinvaultError, PinvaultResult};

use crate::address::Address;
use crate::keccak256;

const WORD: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Uint(u128),
    Address(Address),
    String(String),
}

impl Token {
    fn is_dynamic(&self) -> bool {
        matches!(self, Token::String(_))
    }
}

/// First four bytes of keccak256 of the canonical signature,
/// e.g. `transfer(address,uint256)`.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// `selector || encode(tokens)`
pub fn encode_call(signature: &str, tokens: &[Token]) -> Vec<u8> {
    let mut out = selector(signature).to_vec();
    out.extend(encode(tokens));
    out
}

/// Head/tail encoding of a top-level argument tuple.
pub fn encode(tokens: &[Token]) -> Vec<u8> {
    let head_len = tokens.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for token in tokens {
        if token.is_dynamic() {
            head.extend(uint_word((head_len + tail.len()) as u128));
            tail.extend(encode_tail(token));
        } else {
            head.extend(encode_static(token));
        }
    }
    head.extend(tail);
    head
}

fn encode_static(token: &Token) -> [u8; WORD] {
    match token {
        Token::Uint(v) => uint_word(*v),
        Token::Address(a) => {
            let mut w = [0u8; WORD];
            w[12..].copy_from_slice(a.as_bytes());
            w
        }
        Token::String(_) => [0u8; WORD],
    }
}

fn encode_tail(token: &Token) -> Vec<u8> {
    match token {
        Token::String(s) => {
            let bytes = s.as_bytes();
            let padded = bytes.len().div_ceil(WORD) * WORD;
            let mut out = Vec::with_capacity(WORD + padded);
            out.extend(uint_word(bytes.len() as u128));
            out.extend_from_slice(bytes);
            out.resize(WORD + padded, 0);
            out
        }
        _ => Vec::new(),
    }
}

fn uint_word(v: u128) -> [u8; WORD] {
    let mut w = [0u8; WORD];
    w[16..].copy_from_slice(&v.to_be_bytes());
    w
}

/// Decode the first return word as an unsigned integer. Values that do not
/// fit in 128 bits are rejected.
pub fn decode_uint(data: &[u8]) -> PinvaultResult<u128> {
    if data.len() < WORD {
        return Err(PinvaultError::ledger(format!(
            "return data too short for uint256: {} bytes",
            data.len()
        )));
    }
    if data[..16].iter().any(|b| *b != 0) {
        return Err(PinvaultError::ledger(
            "uint256 return value exceeds 128 bits",
        ));
    }
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&data[16..WORD]);
    Ok(u128::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_selectors() {
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
        assert_eq!(hex::encode(selector("balanceOf(address)")), "70a08231");
    }

    #[test]
    fn encode_static_args() {
        let data = encode_call("calculatePinCost(uint256,uint256)", &[
            Token::Uint(1024),
            Token::Uint(2_592_000),
        ]);
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[4 + 30..4 + 32], &[0x04, 0x00]);
        assert_eq!(decode_uint(&data[4 + 32..]).unwrap(), 2_592_000);
    }

    #[test]
    fn encode_dynamic_string() {
        let enc = encode(&[Token::Uint(7), Token::String("hello".into())]);
        // head: uint, offset(64); tail: len(5), "hello" padded
        assert_eq!(enc.len(), 4 * 32);
        assert_eq!(decode_uint(&enc[32..64]).unwrap(), 64);
        assert_eq!(decode_uint(&enc[64..96]).unwrap(), 5);
        assert_eq!(&enc[96..101], b"hello");
        assert!(enc[101..].iter().all(|b| *b == 0));
    }

    #[test]
    fn offsets_account_for_earlier_tails() {
        let long = "x".repeat(40);
        let enc = encode(&[Token::String(long), Token::String("y".into())]);
        // first tail: 32 (len) + 64 (40 bytes padded) = 96
        assert_eq!(decode_uint(&enc[0..32]).unwrap(), 64);
        assert_eq!(decode_uint(&enc[32..64]).unwrap(), 64 + 96);
    }

    #[test]
    fn decode_rejects_wide_values() {
        let mut word = [0u8; 32];
        word[0] = 1;
        assert!(decode_uint(&word).is_err());
        assert!(decode_uint(&[0u8; 8]).is_err());
    }
}
