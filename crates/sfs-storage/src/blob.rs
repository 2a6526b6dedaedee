//! Opaque blob repository: put bytes, get a handle back

use async_trait::async_trait;
use opendal::Operator;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::{StorageError, StorageResult};

/// Handle to one stored blob (the object key inside the backend).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(String);

impl BlobRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Storage for opaque ciphertext payloads.
///
/// Implementations must give read-your-writes consistency: a `get` after a
/// successful `put` returns the same bytes.
#[async_trait]
pub trait BlobRepository: Send + Sync {
    /// Store `data` under a freshly allocated handle.
    async fn put(&self, data: &[u8]) -> StorageResult<BlobRef>;

    /// Retrieve a blob.
    ///
    /// Returns `StorageError::NotFound` if the blob doesn't exist.
    async fn get(&self, blob: &BlobRef) -> StorageResult<Vec<u8>>;

    /// Delete a blob.
    ///
    /// Returns `Ok(())` even if the blob didn't exist (idempotent).
    async fn delete(&self, blob: &BlobRef) -> StorageResult<()>;

    /// Check if a blob exists
    async fn exists(&self, blob: &BlobRef) -> StorageResult<bool>;
}

/// Blob repository on top of any OpenDAL operator.
///
/// Blobs live at `{prefix}/{uuid}`; names never derive from user input.
#[derive(Clone)]
pub struct OpendalBlobStore {
    op: Operator,
    prefix: String,
}

impl OpendalBlobStore {
    pub fn new(op: Operator, prefix: &str) -> Self {
        Self {
            op,
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    fn allocate(&self) -> BlobRef {
        let id = uuid::Uuid::new_v4();
        if self.prefix.is_empty() {
            BlobRef(id.to_string())
        } else {
            BlobRef(format!("{}/{id}", self.prefix))
        }
    }
}

#[async_trait]
impl BlobRepository for OpendalBlobStore {
    async fn put(&self, data: &[u8]) -> StorageResult<BlobRef> {
        let blob = self.allocate();
        self.op.write(blob.as_str(), data.to_vec()).await?;
        debug!(blob = %blob, bytes = data.len(), "blob written");
        Ok(blob)
    }

    async fn get(&self, blob: &BlobRef) -> StorageResult<Vec<u8>> {
        let buf = self.op.read(blob.as_str()).await?;
        Ok(buf.to_vec())
    }

    async fn delete(&self, blob: &BlobRef) -> StorageResult<()> {
        match self.op.delete(blob.as_str()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::from(e)),
        }
    }

    async fn exists(&self, blob: &BlobRef) -> StorageResult<bool> {
        Ok(self.op.exists(blob.as_str()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store() -> OpendalBlobStore {
        let op = Operator::new(opendal::services::Memory::default())
            .expect("memory operator")
            .finish();
        OpendalBlobStore::new(op, "blobs")
    }

    #[tokio::test]
    async fn test_put_get() {
        let store = memory_store();
        let blob = store.put(b"ciphertext").await.unwrap();

        assert!(blob.as_str().starts_with("blobs/"));
        assert_eq!(store.get(&blob).await.unwrap(), b"ciphertext");
    }

    #[tokio::test]
    async fn test_each_put_gets_fresh_ref() {
        let store = memory_store();
        let a = store.put(b"same").await.unwrap();
        let b = store.put(b"same").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_not_found() {
        let store = memory_store();
        let result = store.get(&BlobRef::new("blobs/missing")).await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_idempotent() {
        let store = memory_store();
        let blob = store.put(b"deleteme").await.unwrap();

        store.delete(&blob).await.unwrap();
        assert!(!store.exists(&blob).await.unwrap());

        // Delete again, still succeeds
        store.delete(&blob).await.unwrap();
    }

    #[tokio::test]
    async fn test_fs_backend() {
        let tmp = tempfile::TempDir::new().unwrap();
        let builder = opendal::services::Fs::default().root(&tmp.path().to_string_lossy());
        let op = Operator::new(builder).unwrap().finish();
        let store = OpendalBlobStore::new(op, "/nested/prefix/");

        let blob = store.put(b"on disk").await.unwrap();
        assert!(blob.as_str().starts_with("nested/prefix/"));
        assert_eq!(store.get(&blob).await.unwrap(), b"on disk");
    }
}
