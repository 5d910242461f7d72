//! Content lifecycle: upload, download and delete.
//!
//!   - `upload`: size check → encrypt → store ciphertext + metadata → register
//!   - `download`: registry lookup → fetch metadata + ciphertext → decrypt →
//!     verify integrity → atomic write (temp file + rename)
//!   - `delete`: guarded registry removal, optional best-effort unpin
//!
//! Nothing is written to the destination unless decryption and the
//! integrity check both succeed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::Utc;
use pinvault_core::config::CryptoConfig;
use pinvault_core::types::{file_id_from_hash, FileRecord};
use pinvault_core::{PinvaultError, PinvaultResult};
use pinvault_crypto::{parse_salt, sha256_hex, CryptoEngine};
use pinvault_storage::ContentStore;
use secrecy::SecretString;
use tracing::{debug, info, warn};

use crate::registry::SharedRegistry;

/// Progress callback type (step_done, step_total, message)
pub type ProgressFn = Box<dyn Fn(u64, u64, &str) + Send + Sync>;

/// Result of uploading a single file
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub file_id: String,
    pub content_id: String,
    pub metadata_id: String,
    pub gateway_url: Option<String>,
    pub content_hash: String,
    pub original_size: u64,
    pub ciphertext_size: u64,
}

/// Result of downloading a single file
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub file_id: String,
    pub local_path: PathBuf,
    pub bytes: u64,
    /// false when integrity checking is disabled in config
    pub verified: bool,
}

pub struct Lifecycle {
    store: Arc<dyn ContentStore>,
    crypto: CryptoEngine,
    registry: SharedRegistry,
    max_file_size: u64,
    verify_integrity: bool,
    /// file ids with an upload between the duplicate check and registration
    in_flight: Arc<Mutex<HashSet<String>>>,
}

/// Releases an in-flight upload reservation on drop, success or not.
struct Reservation {
    ids: Arc<Mutex<HashSet<String>>>,
    file_id: String,
}

impl Drop for Reservation {
    fn drop(&mut self) {
        let mut ids = self.ids.lock().unwrap_or_else(|p| p.into_inner());
        ids.remove(&self.file_id);
    }
}

fn report(progress: Option<&ProgressFn>, done: u64, total: u64, msg: &str) {
    if let Some(cb) = progress {
        cb(done, total, msg);
    }
}

impl Lifecycle {
    pub fn new(store: Arc<dyn ContentStore>, registry: SharedRegistry, cfg: &CryptoConfig) -> Self {
        Self {
            store,
            crypto: CryptoEngine::new(cfg.pbkdf2_iterations),
            registry,
            max_file_size: cfg.max_file_size_bytes(),
            verify_integrity: cfg.verify_integrity,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    fn check_size(&self, name: &str, size: u64) -> PinvaultResult<()> {
        if size > self.max_file_size {
            return Err(PinvaultError::InvalidInput(format!(
                "{name}: {size} bytes exceeds the {} byte upload limit",
                self.max_file_size
            )));
        }
        Ok(())
    }

    /// Claim `file_id` for one upload. Fails when the id is registered or
    /// another upload of the same content has not finished yet.
    async fn reserve(&self, file_id: &str) -> PinvaultResult<Reservation> {
        let registry = self.registry.lock().await;
        let mut ids = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
        if registry.contains(file_id) || !ids.insert(file_id.to_string()) {
            return Err(PinvaultError::DuplicateId(file_id.to_string()));
        }
        Ok(Reservation {
            ids: Arc::clone(&self.in_flight),
            file_id: file_id.to_string(),
        })
    }

    /// Encrypt and publish the file at `path`.
    pub async fn upload(
        &self,
        path: &Path,
        password: &SecretString,
        progress: Option<&ProgressFn>,
    ) -> PinvaultResult<UploadResult> {
        let meta = match tokio::fs::metadata(path).await {
            Ok(m) if m.is_file() => m,
            _ => {
                return Err(PinvaultError::InvalidInput(format!(
                    "file not found: {}",
                    path.display()
                )))
            }
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.check_size(&name, meta.len())?;

        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        self.upload_bytes(&data, &name, password, progress).await
    }

    /// Encrypt and publish an in-memory file under `name`.
    pub async fn upload_bytes(
        &self,
        data: &[u8],
        name: &str,
        password: &SecretString,
        progress: Option<&ProgressFn>,
    ) -> PinvaultResult<UploadResult> {
        self.check_size(name, data.len() as u64)?;

        report(progress, 0, 3, "encrypting");
        let sealed = self.crypto.encrypt(data, name, password)?;
        let file_id = file_id_from_hash(&sealed.content_hash);

        // refuse re-uploads before publishing anything
        let _reservation = self.reserve(&file_id).await?;

        report(progress, 1, 3, "storing");
        let metadata = sealed.metadata();
        let stored = self.store.store(sealed.ciphertext, &metadata).await?;
        let gateway_url = self.store.gateway_url(&stored.content_id);

        report(progress, 2, 3, "registering");
        let record = FileRecord {
            file_id: file_id.clone(),
            content_id: stored.content_id.clone(),
            metadata_id: stored.metadata_id.clone(),
            original_name: sealed.original_name,
            original_size: sealed.original_size,
            upload_date: Utc::now(),
            file_hash: sealed.content_hash.clone(),
            gateway_url: gateway_url.clone(),
            blockchain_pinned: false,
            pin_tx: None,
            pin_date: None,
            pin_duration_days: None,
            pin_network: None,
            pin_gas_used: None,
            pin_gas_price_gwei: None,
        };
        self.registry.lock().await.create(record)?;
        report(progress, 3, 3, "done");

        info!(
            file_id = %file_id,
            content_id = %stored.content_id,
            size = sealed.original_size,
            "file uploaded"
        );
        Ok(UploadResult {
            file_id,
            content_id: stored.content_id,
            metadata_id: stored.metadata_id,
            gateway_url,
            content_hash: sealed.content_hash,
            original_size: sealed.original_size,
            ciphertext_size: sealed.ciphertext_size,
        })
    }

    /// Fetch, decrypt and verify `file_id`, then write it to `dest`. When
    /// `dest` is an existing directory the original file name is used.
    pub async fn download(
        &self,
        file_id: &str,
        dest: &Path,
        password: &SecretString,
        progress: Option<&ProgressFn>,
    ) -> PinvaultResult<DownloadResult> {
        let record = self
            .registry
            .lock()
            .await
            .get(file_id)
            .cloned()
            .ok_or_else(|| PinvaultError::NotFound(file_id.to_string()))?;

        report(progress, 0, 4, "fetching metadata");
        let metadata = self.store.retrieve_metadata(&record.metadata_id).await?;
        if let Some(cid) = &metadata.file_cid {
            if cid != &record.content_id {
                warn!(
                    file_id,
                    metadata_cid = %cid,
                    record_cid = %record.content_id,
                    "metadata points at a different content id"
                );
            }
        }

        report(progress, 1, 4, "fetching ciphertext");
        let ciphertext = self.store.retrieve(&record.content_id).await?;

        report(progress, 2, 4, "decrypting");
        let salt = parse_salt(&metadata.salt)?;
        let plaintext = self.crypto.decrypt(&ciphertext, password, &salt)?;

        if self.verify_integrity && !self.crypto.verify_integrity(&plaintext, &metadata.content_hash) {
            return Err(PinvaultError::Integrity {
                expected: metadata.content_hash.to_ascii_lowercase(),
                actual: sha256_hex(&plaintext),
            });
        }

        report(progress, 3, 4, "writing");
        let local_path = if dest.is_dir() {
            let name = safe_file_name(&metadata.original_name)
                .or_else(|| safe_file_name(&record.original_name))
                .unwrap_or(file_id);
            dest.join(name)
        } else {
            dest.to_path_buf()
        };
        write_atomic(&local_path, &plaintext).await?;
        report(progress, 4, 4, "done");

        info!(file_id, path = %local_path.display(), bytes = plaintext.len(), "file downloaded");
        Ok(DownloadResult {
            file_id: file_id.to_string(),
            local_path,
            bytes: plaintext.len() as u64,
            verified: self.verify_integrity,
        })
    }

    /// Remove `file_id` from the registry. Pinned records need `force`;
    /// `unpin` additionally releases the local store pins (failures are
    /// logged, not returned).
    pub async fn delete(&self, file_id: &str, force: bool, unpin: bool) -> PinvaultResult<FileRecord> {
        let removed = {
            let mut registry = self.registry.lock().await;
            let record = registry
                .get(file_id)
                .ok_or_else(|| PinvaultError::NotFound(file_id.to_string()))?;
            if record.blockchain_pinned && !force {
                return Err(PinvaultError::InvalidInput(format!(
                    "{file_id} is pinned on-chain; deleting only forgets the local entry (use force)"
                )));
            }
            registry.delete(file_id)?
        };

        if unpin {
            for cid in [&removed.content_id, &removed.metadata_id] {
                if let Err(e) = self.store.unpin(cid).await {
                    warn!(file_id, cid = %cid, "unpin failed: {e}");
                }
            }
        }
        debug!(file_id, pinned = removed.blockchain_pinned, "registry entry deleted");
        Ok(removed)
    }
}

/// Final path component of a stored name, so a name like `../x` or
/// `/etc/x` cannot leave the destination directory.
fn safe_file_name(name: &str) -> Option<&str> {
    let base = Path::new(name).file_name()?.to_str()?;
    (!base.is_empty()).then_some(base)
}

async fn write_atomic(path: &Path, data: &[u8]) -> PinvaultResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating dir: {}", parent.display()))?;
        }
    }

    let tmp = path.with_extension("pinvault_tmp");
    tokio::fs::write(&tmp, data)
        .await
        .with_context(|| format!("writing tmp: {}", tmp.display()))?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(anyhow::Error::new(e)
            .context(format!("renaming to: {}", path.display()))
            .into());
    }
    Ok(())
}
