//! Whole-file XChaCha20-Poly1305 sealing
//!
//! Sealed blob format (binary):
//! ```text
//! [24 bytes: random nonce][N bytes: ciphertext][16 bytes: Poly1305 tag]
//! AAD = KDF salt (16 bytes)
//! ```
//!
//! Binding the salt as AAD means a blob paired with the wrong metadata
//! document fails authentication instead of decrypting under a different key.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use pinvault_core::{PinvaultError, PinvaultResult};
use rand::RngCore;

use crate::kdf::DerivedKey;
use crate::{NONCE_SIZE, TAG_SIZE};

/// Encrypt `plaintext` under `key`.
///
/// Returns: `[24-byte nonce][ciphertext][16-byte tag]`
pub fn seal(key: &DerivedKey, aad: &[u8], plaintext: &[u8]) -> PinvaultResult<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| PinvaultError::Encryption(format!("seal failed: {e}")))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Decrypt a blob produced by [`seal`].
///
/// Any authentication failure (wrong key, wrong AAD, truncated or modified
/// bytes) yields `DecryptionFailed`.
pub fn open(key: &DerivedKey, aad: &[u8], sealed: &[u8]) -> PinvaultResult<Vec<u8>> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(PinvaultError::DecryptionFailed);
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
    let nonce = XNonce::from_slice(nonce_bytes);
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| PinvaultError::DecryptionFailed)
}
