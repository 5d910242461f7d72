//! OpenDAL-backed content store for offline use and tests.
//!
//! Layout under the operator root:
//! ```text
//! blobs/<blake3-hex>   object bytes, id = BLAKE3 of the bytes
//! pins/<blake3-hex>    empty marker, present while pinned
//! ```

use std::path::Path;

use async_trait::async_trait;
use opendal::{ErrorKind, Operator};
use pinvault_core::{PinvaultError, PinvaultResult};
use tracing::debug;

use crate::content::ContentStore;
use crate::health::{check_health, StoreStatus};

#[derive(Clone)]
pub struct OperatorStore {
    op: Operator,
    label: String,
}

impl OperatorStore {
    pub fn new(op: Operator, label: impl Into<String>) -> Self {
        Self {
            op,
            label: label.into(),
        }
    }

    /// Filesystem-backed store rooted at `root`.
    pub fn open_dir(root: &Path) -> PinvaultResult<Self> {
        let root_str = root.to_string_lossy().into_owned();
        let builder = opendal::services::Fs::default().root(&root_str);
        let op = Operator::new(builder)
            .map_err(|e| PinvaultError::content_store(format!("creating fs operator: {e}")))?
            .layer(opendal::layers::LoggingLayer::default())
            .finish();
        Ok(Self::new(op, root_str))
    }

    /// In-memory store; contents vanish with the value.
    pub fn memory() -> PinvaultResult<Self> {
        let op = Operator::new(opendal::services::Memory::default())
            .map_err(|e| PinvaultError::content_store(format!("creating memory operator: {e}")))?
            .finish();
        Ok(Self::new(op, "memory"))
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    pub async fn is_pinned(&self, content_id: &str) -> PinvaultResult<bool> {
        match self.op.stat(&pin_path(content_id)).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(PinvaultError::content_store(e.to_string())),
        }
    }

    pub async fn list_pins(&self) -> PinvaultResult<Vec<String>> {
        let entries = match self.op.list("pins/").await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PinvaultError::content_store(e.to_string())),
        };
        let mut ids: Vec<String> = entries
            .into_iter()
            .map(|e| e.name().to_string())
            .filter(|n| !n.is_empty() && !n.ends_with('/'))
            .collect();
        ids.sort();
        Ok(ids)
    }
}

fn blob_path(id: &str) -> String {
    format!("blobs/{id}")
}

fn pin_path(id: &str) -> String {
    format!("pins/{id}")
}

fn validate_id(id: &str) -> PinvaultResult<()> {
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(PinvaultError::InvalidInput(format!(
            "not a local content id: {id}"
        )));
    }
    Ok(())
}

#[async_trait]
impl ContentStore for OperatorStore {
    async fn add(&self, bytes: Vec<u8>, name: &str) -> PinvaultResult<String> {
        let id = blake3::hash(&bytes).to_hex().to_string();
        let len = bytes.len();
        self.op
            .write(&blob_path(&id), bytes)
            .await
            .map_err(|e| PinvaultError::content_store(format!("write {name}: {e}")))?;
        self.pin(&id).await?;
        debug!(id = %id, name = %name, bytes = len, "stored object");
        Ok(id)
    }

    async fn cat(&self, content_id: &str) -> PinvaultResult<Vec<u8>> {
        validate_id(content_id)?;
        match self.op.read(&blob_path(content_id)).await {
            Ok(buf) => Ok(buf.to_vec()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(PinvaultError::NotFound(content_id.to_string()))
            }
            Err(e) => Err(PinvaultError::content_store(format!("read {content_id}: {e}"))),
        }
    }

    async fn pin(&self, content_id: &str) -> PinvaultResult<()> {
        validate_id(content_id)?;
        match self.op.stat(&blob_path(content_id)).await {
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PinvaultError::NotFound(content_id.to_string()))
            }
            Err(e) => return Err(PinvaultError::content_store(e.to_string())),
        }
        self.op
            .write(&pin_path(content_id), Vec::<u8>::new())
            .await
            .map_err(|e| PinvaultError::content_store(format!("pin {content_id}: {e}")))?;
        Ok(())
    }

    async fn unpin(&self, content_id: &str) -> PinvaultResult<()> {
        validate_id(content_id)?;
        self.op
            .delete(&pin_path(content_id))
            .await
            .map_err(|e| PinvaultError::content_store(format!("unpin {content_id}: {e}")))
    }

    async fn status(&self) -> PinvaultResult<StoreStatus> {
        check_health(&self.op).await?;
        let pins = self.list_pins().await?.len();
        Ok(StoreStatus {
            backend: "local",
            detail: format!("{} ({pins} pinned objects)", self.label),
        })
    }
}
