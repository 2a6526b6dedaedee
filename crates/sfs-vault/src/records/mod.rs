//! Persistent records for files, share grants, and known users.
//!
//! Two backends are available:
//!   - **memory**: `RwLock`-guarded maps, lost on drop.
//!   - **JSON**: whole catalog in memory, written through to disk on every
//!     mutation via temp+rename.
//!
//! Both implement `RecordStore` and share the same `Catalog` logic, so the
//! cascade and idempotency rules cannot drift between them.

mod catalog;
pub mod json;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sfs_core::{unix_now, FileId, GrantId, SfsResult, UserId};
use sfs_crypto::{ContentDigest, WrappedKey};
use sfs_storage::BlobRef;

pub use json::JsonRecordStore;
pub use memory::InMemoryRecordStore;

/// One uploaded file. The key is only ever held wrapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: FileId,
    pub owner: UserId,
    /// Untrusted, display-only.
    pub display_name: String,
    pub size_bytes: u64,
    pub wrapped_key: WrappedKey,
    pub blob: BlobRef,
    /// BLAKE3 of the ciphertext blob
    pub digest: ContentDigest,
    pub created_at: u64,
}

/// Read access to one file, from its owner to another user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareGrant {
    pub id: GrantId,
    pub from_user: UserId,
    pub to_user: UserId,
    pub file: FileId,
    pub created_at: u64,
}

impl ShareGrant {
    pub fn new(from_user: UserId, to_user: UserId, file: FileId) -> Self {
        Self {
            id: GrantId::new(),
            from_user,
            to_user,
            file,
            created_at: unix_now(),
        }
    }
}

/// Outcome of a cascading file delete.
#[derive(Debug, Clone)]
pub struct RemovedFile {
    pub file: StoredFile,
    pub grants_removed: usize,
}

/// Typed query surface over the record store.
///
/// Every mutating method is atomic with respect to the others: a reader
/// never sees a file without its grants or a grant without its file.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Remember an identity as a possible share target. Idempotent.
    async fn register_user(&self, user: &UserId) -> SfsResult<()>;

    async fn user_exists(&self, user: &UserId) -> SfsResult<bool>;

    /// Known users other than `user`, sorted.
    async fn find_users_excluding(&self, user: &UserId) -> SfsResult<Vec<UserId>>;

    /// Insert a new file record. Fails if the id is already taken.
    async fn insert_file(&self, file: StoredFile) -> SfsResult<()>;

    async fn get_file(&self, id: &FileId) -> SfsResult<Option<StoredFile>>;

    /// Files owned by `owner`, oldest first.
    async fn find_files_by_owner(&self, owner: &UserId) -> SfsResult<Vec<StoredFile>>;

    /// Remove a file and every grant that references it in one step.
    ///
    /// Returns `None` if the file was already gone.
    async fn delete_file_cascade(&self, id: &FileId) -> SfsResult<Option<RemovedFile>>;

    /// Insert `grant` unless one already exists for the same (file, to_user)
    /// pair, in which case the existing grant is returned unchanged.
    ///
    /// Fails with `NotFound` if the file no longer exists.
    async fn insert_grant_if_absent(&self, grant: ShareGrant) -> SfsResult<ShareGrant>;

    async fn get_grant(&self, id: &GrantId) -> SfsResult<Option<ShareGrant>>;

    async fn find_grant(&self, file: &FileId, to_user: &UserId) -> SfsResult<Option<ShareGrant>>;

    /// Grants addressed to `user`, oldest first.
    async fn find_grants_to(&self, user: &UserId) -> SfsResult<Vec<ShareGrant>>;

    async fn find_grants_for_file(&self, file: &FileId) -> SfsResult<Vec<ShareGrant>>;
}
