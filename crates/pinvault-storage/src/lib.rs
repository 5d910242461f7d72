//! pinvault-storage: content-addressed storage backends
//!
//! Ciphertext and its metadata document are published as two separate
//! objects; the returned ids are what the registry and the pinning contract
//! refer to.

pub mod content;
pub mod health;
pub mod ipfs;
pub mod local;

use std::path::Path;
use std::sync::Arc;

use pinvault_core::config::{StorageBackend, StorageConfig};
use pinvault_core::PinvaultResult;

pub use content::{ContentStore, StoredObject};
pub use health::{check_health, is_healthy, StoreStatus};
pub use ipfs::{IpfsClient, NodeInfo, ObjectStat};
pub use local::OperatorStore;

/// Build the configured backend. `local_root` is the already expanded
/// `storage.local_root`.
pub fn build_content_store(
    cfg: &StorageConfig,
    local_root: &Path,
) -> PinvaultResult<Arc<dyn ContentStore>> {
    match cfg.backend {
        StorageBackend::Ipfs => Ok(Arc::new(IpfsClient::from_config(cfg)?)),
        StorageBackend::Local => Ok(Arc::new(OperatorStore::open_dir(local_root)?)),
    }
}
