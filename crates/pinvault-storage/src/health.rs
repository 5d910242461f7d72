//! Storage health check

use opendal::Operator;
use pinvault_core::{PinvaultError, PinvaultResult};

/// Human-readable backend summary for `pinvault status`.
#[derive(Debug, Clone)]
pub struct StoreStatus {
    pub backend: &'static str,
    pub detail: String,
}

/// Verify the storage root is reachable by listing it
pub async fn check_health(op: &Operator) -> PinvaultResult<()> {
    op.list("/")
        .await
        .map(|_| ())
        .map_err(|e| PinvaultError::content_store(format!("storage health check failed: {e}")))
}

/// Returns true if storage is reachable, false otherwise (non-panicking)
pub async fn is_healthy(op: &Operator) -> bool {
    check_health(op).await.is_ok()
}
