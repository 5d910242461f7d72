//! The content store seam: everything above this trait is backend agnostic.

use async_trait::async_trait;
use chrono::Utc;
use pinvault_core::types::StoredFileMetadata;
use pinvault_core::{PinvaultError, PinvaultResult};
use tracing::info;

use crate::health::StoreStatus;

/// Ids of a stored ciphertext and its metadata document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content_id: String,
    pub metadata_id: String,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Add `bytes` to the store (pinned locally) and return its content id.
    async fn add(&self, bytes: Vec<u8>, name: &str) -> PinvaultResult<String>;

    async fn cat(&self, content_id: &str) -> PinvaultResult<Vec<u8>>;

    async fn pin(&self, content_id: &str) -> PinvaultResult<()>;

    async fn unpin(&self, content_id: &str) -> PinvaultResult<()>;

    async fn status(&self) -> PinvaultResult<StoreStatus>;

    /// Shareable URL for a content id, when the backend has one.
    fn gateway_url(&self, _content_id: &str) -> Option<String> {
        None
    }

    /// Publish ciphertext followed by its metadata document. The metadata is
    /// stamped with the upload time and the ciphertext's id before upload.
    async fn store(
        &self,
        ciphertext: Vec<u8>,
        metadata: &StoredFileMetadata,
    ) -> PinvaultResult<StoredObject> {
        let content_id = self.add(ciphertext, "encrypted_file").await?;

        let mut doc = metadata.clone();
        doc.upload_timestamp = Utc::now();
        doc.file_cid = Some(content_id.clone());
        let json = serde_json::to_vec_pretty(&doc)?;
        let metadata_id = self.add(json, "metadata.json").await?;

        info!(content_id = %content_id, metadata_id = %metadata_id, "stored encrypted file");
        Ok(StoredObject {
            content_id,
            metadata_id,
        })
    }

    async fn retrieve(&self, content_id: &str) -> PinvaultResult<Vec<u8>> {
        self.cat(content_id).await
    }

    async fn retrieve_metadata(&self, metadata_id: &str) -> PinvaultResult<StoredFileMetadata> {
        let raw = self.cat(metadata_id).await?;
        serde_json::from_slice(&raw).map_err(|e| {
            PinvaultError::InvalidInput(format!("metadata {metadata_id} is not valid: {e}"))
        })
    }
}
