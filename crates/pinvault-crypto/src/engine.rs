//! High-level encrypt/decrypt entry points used by the upload and download
//! lifecycle.

use std::path::Path;

use chrono::Utc;
use pinvault_core::types::StoredFileMetadata;
use pinvault_core::{PinvaultError, PinvaultResult};
use secrecy::SecretString;
use tracing::debug;

use crate::cipher::{open, seal};
use crate::integrity::{sha256_hex, verify_integrity};
use crate::kdf::{derive_key, DerivedKey, DEFAULT_ITERATIONS};
use crate::SALT_SIZE;

/// Output of sealing one file.
#[derive(Debug, Clone)]
pub struct EncryptionResult {
    pub ciphertext: Vec<u8>,
    pub salt: [u8; SALT_SIZE],
    /// SHA-256 of the plaintext, lowercase hex
    pub content_hash: String,
    pub original_name: String,
    pub original_size: u64,
    pub ciphertext_size: u64,
}

impl EncryptionResult {
    /// Metadata document to publish beside the ciphertext.
    pub fn metadata(&self) -> StoredFileMetadata {
        StoredFileMetadata {
            salt: hex::encode(self.salt),
            content_hash: self.content_hash.clone(),
            original_name: self.original_name.clone(),
            original_size: self.original_size,
            ciphertext_size: self.ciphertext_size,
            upload_timestamp: Utc::now(),
            file_cid: None,
        }
    }
}

/// Password-based file encryption. Holds nothing but the KDF cost.
#[derive(Debug, Clone, Copy)]
pub struct CryptoEngine {
    iterations: u32,
}

impl Default for CryptoEngine {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

impl CryptoEngine {
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn derive_key(
        &self,
        password: &SecretString,
        salt: Option<&[u8; SALT_SIZE]>,
    ) -> (DerivedKey, [u8; SALT_SIZE]) {
        derive_key(password, salt, self.iterations)
    }

    /// Encrypt `data` under a fresh salt derived key.
    pub fn encrypt(
        &self,
        data: &[u8],
        original_name: &str,
        password: &SecretString,
    ) -> PinvaultResult<EncryptionResult> {
        if data.is_empty() {
            return Err(PinvaultError::InvalidInput(format!(
                "{original_name}: cannot encrypt an empty file"
            )));
        }

        let content_hash = sha256_hex(data);
        let (key, salt) = self.derive_key(password, None);
        let ciphertext = seal(&key, &salt, data)?;

        debug!(
            name = %original_name,
            plain = data.len(),
            sealed = ciphertext.len(),
            "file encrypted"
        );

        Ok(EncryptionResult {
            ciphertext_size: ciphertext.len() as u64,
            ciphertext,
            salt,
            content_hash,
            original_name: original_name.to_string(),
            original_size: data.len() as u64,
        })
    }

    /// Read and encrypt the file at `path`; the file name becomes `original_name`.
    pub fn encrypt_file(
        &self,
        path: &Path,
        password: &SecretString,
    ) -> PinvaultResult<EncryptionResult> {
        if !path.is_file() {
            return Err(PinvaultError::InvalidInput(format!(
                "file not found: {}",
                path.display()
            )));
        }
        let data = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.encrypt(&data, &name, password)
    }

    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        password: &SecretString,
        salt: &[u8; SALT_SIZE],
    ) -> PinvaultResult<Vec<u8>> {
        let (key, _) = self.derive_key(password, Some(salt));
        open(&key, salt, ciphertext)
    }

    pub fn verify_integrity(&self, data: &[u8], expected_hash: &str) -> bool {
        verify_integrity(data, expected_hash)
    }
}
