//! Local signing key. The key never leaves the process; only signatures do.

use k256::ecdsa::{RecoveryId, Signature, SigningKey};
use pinvault_core::{PinvaultError, PinvaultResult, TxErrorKind};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use crate::address::Address;

pub struct Wallet {
    key: SigningKey,
    address: Address,
}

impl Wallet {
    pub fn from_signing_key(key: SigningKey) -> Self {
        let address = Address::from_public_key(key.verifying_key());
        Self { key, address }
    }

    /// Import a 32-byte hex private key, with or without `0x`.
    pub fn from_hex(private_key: &SecretString) -> PinvaultResult<Self> {
        let raw = private_key.expose_secret().trim();
        let digits = raw.strip_prefix("0x").unwrap_or(raw);
        let mut bytes = hex::decode(digits)
            .map_err(|_| PinvaultError::InvalidInput("private key is not valid hex".into()))?;
        let key = SigningKey::from_slice(&bytes);
        bytes.zeroize();
        let key = key.map_err(|_| {
            PinvaultError::InvalidInput("private key is not a valid secp256k1 scalar".into())
        })?;
        Ok(Self::from_signing_key(key))
    }

    /// Fresh random key from the OS RNG.
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut rand::rngs::OsRng))
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// `0x`-prefixed private key hex, for backing up a generated wallet.
    pub fn export_hex(&self) -> SecretString {
        let mut bytes: [u8; 32] = self.key.to_bytes().into();
        let out = format!("0x{}", hex::encode(bytes));
        bytes.zeroize();
        SecretString::from(out)
    }

    /// Recoverable ECDSA signature over a 32-byte digest.
    pub fn sign_prehash(&self, digest: &[u8; 32]) -> PinvaultResult<(Signature, RecoveryId)> {
        self.key
            .sign_prehash_recoverable(digest)
            .map_err(|e| PinvaultError::Transaction {
                kind: TxErrorKind::Signing,
                message: format!("signing failed: {e}"),
            })
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn import_known_key() {
        let w = Wallet::from_hex(&SecretString::from(KEY)).unwrap();
        assert_eq!(
            w.address().to_checksum(),
            "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23"
        );

        let bare = Wallet::from_hex(&SecretString::from(&KEY[2..])).unwrap();
        assert_eq!(bare.address(), w.address());
    }

    #[test]
    fn rejects_invalid_keys() {
        assert!(Wallet::from_hex(&SecretString::from("0x1234")).is_err());
        assert!(Wallet::from_hex(&SecretString::from("not hex")).is_err());
        assert!(Wallet::from_hex(&SecretString::from("0x".to_string() + &"00".repeat(32))).is_err());
    }

    #[test]
    fn generated_wallet_reimports() {
        let w = Wallet::generate();
        let again = Wallet::from_hex(&w.export_hex()).unwrap();
        assert_eq!(w.address(), again.address());
    }

    #[test]
    fn debug_hides_key() {
        let w = Wallet::from_hex(&SecretString::from(KEY)).unwrap();
        let dbg = format!("{w:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("4c0883a6"));
    }
}
