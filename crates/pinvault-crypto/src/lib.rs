//! pinvault-crypto: client-side encryption for pinvault
//!
//! Every uploaded file is sealed before it leaves the machine:
//!
//! ```text
//! password ──PBKDF2-HMAC-SHA256(salt, iterations)──► 256-bit key
//! plaintext ──XChaCha20-Poly1305(key, random nonce, AAD=salt)──► [nonce][ciphertext][tag]
//! plaintext ──SHA-256──► content_hash (file identity + integrity proof)
//! ```
//!
//! Only the salt and content hash travel with the ciphertext; the nonce is
//! embedded in the sealed blob.

pub mod cipher;
pub mod engine;
pub mod integrity;
pub mod kdf;

pub use cipher::{open, seal};
pub use engine::{CryptoEngine, EncryptionResult};
pub use integrity::{sha256_hex, verify_integrity};
pub use kdf::{derive_key, parse_salt, DerivedKey, DEFAULT_ITERATIONS};

/// Size of a derived key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of a KDF salt in bytes
pub const SALT_SIZE: usize = 16;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;
