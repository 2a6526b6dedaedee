//! Storage health check

use opendal::Operator;

use crate::error::{StorageError, StorageResult};

/// Verify the storage endpoint is reachable by listing the root
pub async fn check_health(op: &Operator) -> StorageResult<()> {
    op.list("/")
        .await
        .map(|_| ())
        .map_err(|e| StorageError::Backend(format!("storage health check failed: {e}")))
}

/// Returns true if storage is reachable, false otherwise (non-panicking)
pub async fn is_healthy(op: &Operator) -> bool {
    check_health(op).await.is_ok()
}
