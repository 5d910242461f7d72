//! File registry: file id → [`FileRecord`], persisted as one JSON object.
//!
//! The whole map is loaded at open and rewritten atomically (temp + rename)
//! after every mutation. A mutation whose write fails is rolled back in
//! memory so the map never runs ahead of disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pinvault_core::types::{FileRecord, PinUpdate};
use pinvault_core::{PinvaultError, PinvaultResult};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Registry handle shared between the CLI, the lifecycle and pin recording.
/// The mutex is the single-writer discipline.
pub type SharedRegistry = Arc<Mutex<FileRegistry>>;

#[derive(Debug)]
pub struct FileRegistry {
    path: PathBuf,
    entries: BTreeMap<String, FileRecord>,
}

impl FileRegistry {
    /// Load the registry at `path`. A missing or empty file is an empty registry.
    pub fn open(path: &Path) -> PinvaultResult<Self> {
        let mut entries: BTreeMap<String, FileRecord> = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).map_err(|e| {
                    PinvaultError::Config(format!("parsing registry {}: {e}", path.display()))
                })?
            }
        } else {
            BTreeMap::new()
        };

        for (id, record) in entries.iter_mut() {
            if record.file_id.is_empty() {
                record.file_id = id.clone();
            }
        }
        debug!(path = %path.display(), files = entries.len(), "registry loaded");

        Ok(FileRegistry {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(Mutex::new(self))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, file_id: &str) -> Option<&FileRecord> {
        self.entries.get(file_id)
    }

    pub fn contains(&self, file_id: &str) -> bool {
        self.entries.contains_key(file_id)
    }

    /// Records in file id order.
    pub fn list(&self) -> Vec<&FileRecord> {
        self.entries.values().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn create(&mut self, record: FileRecord) -> PinvaultResult<()> {
        if record.file_id.is_empty() {
            return Err(PinvaultError::InvalidInput("record has no file id".into()));
        }
        if self.entries.contains_key(&record.file_id) {
            return Err(PinvaultError::DuplicateId(record.file_id));
        }
        if record.blockchain_pinned && record.pin_tx.is_none() {
            return Err(PinvaultError::InvalidInput(format!(
                "{}: cannot register as pinned without a pin transaction",
                record.file_id
            )));
        }

        let id = record.file_id.clone();
        self.entries.insert(id.clone(), record);
        if let Err(e) = self.persist() {
            self.entries.remove(&id);
            return Err(e);
        }
        Ok(())
    }

    /// Merge `update` into an existing record and return the new state.
    pub fn update_pin_status(
        &mut self,
        file_id: &str,
        update: &PinUpdate,
    ) -> PinvaultResult<FileRecord> {
        let current = self
            .entries
            .get(file_id)
            .ok_or_else(|| PinvaultError::NotFound(file_id.to_string()))?;
        let mut next = current.clone();
        next.apply(update)?;

        let previous = self.entries.insert(file_id.to_string(), next.clone());
        if let Err(e) = self.persist() {
            if let Some(prev) = previous {
                self.entries.insert(file_id.to_string(), prev);
            }
            return Err(e);
        }
        Ok(next)
    }

    /// Remove a record. Whether a pinned record may be removed is the
    /// caller's decision.
    pub fn delete(&mut self, file_id: &str) -> PinvaultResult<FileRecord> {
        let removed = self
            .entries
            .remove(file_id)
            .ok_or_else(|| PinvaultError::NotFound(file_id.to_string()))?;
        if let Err(e) = self.persist() {
            self.entries.insert(file_id.to_string(), removed);
            return Err(e);
        }
        Ok(removed)
    }

    /// Atomic write: temp file in the same directory, then rename.
    fn persist(&self) -> PinvaultResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(&self.entries)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(|e| {
            warn!(path = %tmp_path.display(), "registry write failed: {e}");
            PinvaultError::Io(e)
        })?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: &str) -> FileRecord {
        FileRecord {
            file_id: id.into(),
            content_id: format!("Qm{id}"),
            metadata_id: format!("QmMeta{id}"),
            original_name: format!("{id}.bin"),
            original_size: 10,
            upload_date: Utc::now(),
            file_hash: format!("{id}{}", "0".repeat(48)),
            gateway_url: None,
            blockchain_pinned: false,
            pin_tx: None,
            pin_date: None,
            pin_duration_days: None,
            pin_network: None,
            pin_gas_used: None,
            pin_gas_price_gwei: None,
        }
    }

    #[test]
    fn test_missing_and_empty_file_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        assert!(FileRegistry::open(&path).unwrap().is_empty());

        std::fs::write(&path, "  \n").unwrap();
        assert!(FileRegistry::open(&path).unwrap().is_empty());
    }

    #[test]
    fn test_create_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/registry.json");

        let mut reg = FileRegistry::open(&path).unwrap();
        reg.create(record("aaaaaaaaaaaaaaaa")).unwrap();
        reg.create(record("bbbbbbbbbbbbbbbb")).unwrap();

        let reloaded = FileRegistry::open(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(
            reloaded.get("aaaaaaaaaaaaaaaa").unwrap().original_name,
            "aaaaaaaaaaaaaaaa.bin"
        );
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = FileRegistry::open(&dir.path().join("r.json")).unwrap();
        reg.create(record("aaaaaaaaaaaaaaaa")).unwrap();
        assert!(matches!(
            reg.create(record("aaaaaaaaaaaaaaaa")),
            Err(PinvaultError::DuplicateId(_))
        ));
    }

    #[test]
    fn test_update_and_delete_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = FileRegistry::open(&dir.path().join("r.json")).unwrap();
        assert!(matches!(
            reg.update_pin_status("missing", &PinUpdate::default()),
            Err(PinvaultError::NotFound(_))
        ));
        assert!(matches!(reg.delete("missing"), Err(PinvaultError::NotFound(_))));
    }

    #[test]
    fn test_update_is_additive_and_durable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.json");
        let mut reg = FileRegistry::open(&path).unwrap();
        reg.create(record("aaaaaaaaaaaaaaaa")).unwrap();

        let update = PinUpdate::confirmed("0xfeed", 30, "sepolia", 180_000, 1.1);
        let rec = reg.update_pin_status("aaaaaaaaaaaaaaaa", &update).unwrap();
        assert!(rec.blockchain_pinned);
        assert_eq!(rec.original_size, 10);

        let reloaded = FileRegistry::open(&path).unwrap();
        let rec = reloaded.get("aaaaaaaaaaaaaaaa").unwrap();
        assert_eq!(rec.pin_tx.as_deref(), Some("0xfeed"));
        assert_eq!(rec.pin_gas_used, Some(180_000));
    }

    #[test]
    fn test_delete_removes_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.json");
        let mut reg = FileRegistry::open(&path).unwrap();
        reg.create(record("aaaaaaaaaaaaaaaa")).unwrap();
        reg.delete("aaaaaaaaaaaaaaaa").unwrap();

        assert!(FileRegistry::open(&path).unwrap().is_empty());
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        // registry path is a directory: rename over it fails
        let path = dir.path().join("occupied");
        std::fs::create_dir_all(path.join("child")).unwrap();

        let mut reg = FileRegistry {
            path: path.clone(),
            entries: BTreeMap::new(),
        };
        assert!(reg.create(record("aaaaaaaaaaaaaaaa")).is_err());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_reads_legacy_registry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file_registry.json");
        std::fs::write(
            &path,
            r#"{
  "0123456789abcdef": {
    "file_cid": "QmFile",
    "metadata_cid": "QmMeta",
    "gateway_url": "https://ipfs.io/ipfs/QmFile",
    "original_name": "a.txt",
    "original_size": 10,
    "upload_date": "2024-05-01T12:00:00.000001",
    "file_hash": "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef",
    "blockchain_pinned": true,
    "pin_tx": "abcdef",
    "pin_date": "2024-05-02T08:30:00",
    "pin_duration_days": 30,
    "pin_network": "sepolia",
    "pin_gas_used": 175000,
    "pin_gas_price_gwei": 1.5
  }
}"#,
        )
        .unwrap();

        let reg = FileRegistry::open(&path).unwrap();
        let rec = reg.get("0123456789abcdef").unwrap();
        assert_eq!(rec.file_id, "0123456789abcdef");
        assert_eq!(rec.content_id, "QmFile");
        assert!(rec.blockchain_pinned);
        assert!(rec.pin_date.is_some());
    }
}
