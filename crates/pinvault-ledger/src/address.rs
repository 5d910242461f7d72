//! 20-byte account addresses with EIP-55 checksum display.

use std::fmt;
use std::str::FromStr;

use k256::ecdsa::VerifyingKey;
use pinvault_core::PinvaultError;

use crate::keccak256;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Last 20 bytes of keccak256 over the uncompressed public key (sans 0x04 tag).
    pub fn from_public_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        let mut out = [0u8; 20];
        out.copy_from_slice(&hash[12..]);
        Self(out)
    }

    /// EIP-55 mixed-case hex, `0x`-prefixed.
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl FromStr for Address {
    type Err = PinvaultError;

    /// Accepts 40 hex digits with or without `0x`. Mixed-case input must
    /// carry a valid checksum.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.len() != 40 {
            return Err(PinvaultError::InvalidInput(format!(
                "address must be 40 hex digits: {s}"
            )));
        }
        let bytes = hex::decode(digits)
            .map_err(|e| PinvaultError::InvalidInput(format!("address {s}: {e}")))?;
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        let addr = Address(out);

        let mixed = digits.chars().any(|c| c.is_ascii_lowercase())
            && digits.chars().any(|c| c.is_ascii_uppercase());
        if mixed && addr.to_checksum()[2..] != *digits {
            return Err(PinvaultError::InvalidInput(format!(
                "address checksum mismatch: {s}"
            )));
        }
        Ok(addr)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_vectors() {
        for s in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        ] {
            let addr: Address = s.to_lowercase().parse().unwrap();
            assert_eq!(addr.to_checksum(), s);
            assert_eq!(s.parse::<Address>().unwrap(), addr);
        }
    }

    #[test]
    fn rejects_bad_checksum_and_length() {
        assert!("0x5AAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse::<Address>().is_err());
        assert!("0x1234".parse::<Address>().is_err());
        assert!("0xzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz".parse::<Address>().is_err());
    }

    #[test]
    fn accepts_missing_prefix() {
        let a: Address = "3535353535353535353535353535353535353535".parse().unwrap();
        assert_eq!(a.as_bytes(), &[0x35u8; 20]);
        assert!(!a.is_zero());
    }

    #[test]
    fn address_of_private_key_one() {
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        let key = k256::ecdsa::SigningKey::from_slice(&bytes).unwrap();
        let addr = Address::from_public_key(key.verifying_key());
        assert_eq!(addr.to_checksum(), "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf");
    }
}
