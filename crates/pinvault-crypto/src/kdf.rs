//! Key derivation: password → 256-bit key via PBKDF2-HMAC-SHA256

use pbkdf2::pbkdf2_hmac;
use pinvault_core::{PinvaultError, PinvaultResult};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::{KEY_SIZE, SALT_SIZE};

/// Default PBKDF2 iteration count.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// A 256-bit key derived from a password.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derive a key from `password`. A fresh random salt is generated when
/// `salt` is `None`; the salt actually used is returned with the key.
pub fn derive_key(
    password: &SecretString,
    salt: Option<&[u8; SALT_SIZE]>,
    iterations: u32,
) -> (DerivedKey, [u8; SALT_SIZE]) {
    let salt = match salt {
        Some(s) => *s,
        None => {
            let mut s = [0u8; SALT_SIZE];
            rand::thread_rng().fill_bytes(&mut s);
            s
        }
    };

    let key = stretch(password.expose_secret().as_bytes(), &salt, iterations);
    (key, salt)
}

fn stretch(password: &[u8], salt: &[u8], iterations: u32) -> DerivedKey {
    let mut key = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut key);
    DerivedKey::from_bytes(key)
}

/// Parse a hex salt as stored in file metadata.
pub fn parse_salt(salt_hex: &str) -> PinvaultResult<[u8; SALT_SIZE]> {
    let bytes = hex::decode(salt_hex.trim())
        .map_err(|e| PinvaultError::InvalidInput(format!("salt is not valid hex: {e}")))?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        PinvaultError::InvalidInput(format!(
            "salt must be {SALT_SIZE} bytes, got {}",
            b.len()
        ))
    })
}
