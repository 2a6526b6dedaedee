//! File store: encrypt → digest → blob write → record, and the reverse
//!
//! Upload order keeps the catalog honest: the blob is written first and the
//! record second, so a failed blob write leaves no record behind. Delete
//! runs the other way round: records (file + grants) go in one step, then
//! the blob is removed best-effort. An orphaned blob is garbage; a record
//! pointing at a missing blob would not be.

use std::sync::Arc;

use sfs_core::config::LimitsConfig;
use sfs_core::{unix_now, FileId, SfsError, SfsResult, UserId};
use sfs_crypto::{CryptoError, KeyManager};
use sfs_storage::{BlobRepository, StorageError};
use tracing::{debug, info, warn};

use crate::records::{RecordStore, RemovedFile, StoredFile};

pub struct FileStore {
    blobs: Arc<dyn BlobRepository>,
    records: Arc<dyn RecordStore>,
    keys: KeyManager,
    limits: LimitsConfig,
}

impl FileStore {
    pub fn new(
        blobs: Arc<dyn BlobRepository>,
        records: Arc<dyn RecordStore>,
        keys: KeyManager,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            blobs,
            records,
            keys,
            limits,
        }
    }

    pub fn records(&self) -> &Arc<dyn RecordStore> {
        &self.records
    }

    /// Encrypt and store a new file owned by `owner`.
    pub async fn upload(
        &self,
        owner: &UserId,
        display_name: &str,
        plaintext: &[u8],
    ) -> SfsResult<StoredFile> {
        validate_display_name(display_name, self.limits.max_display_name_len)?;
        if plaintext.is_empty() {
            return Err(SfsError::Validation("file is empty".into()));
        }
        if plaintext.len() as u64 > self.limits.max_file_size {
            return Err(SfsError::Validation(format!(
                "file exceeds the {} byte limit",
                self.limits.max_file_size
            )));
        }

        let id = FileId::new();
        let key = self.keys.generate_key();
        let ciphertext = sfs_crypto::encrypt(&key, plaintext).map_err(crypto_error)?;
        let digest = sfs_crypto::digest(&ciphertext);
        let wrapped_key = self
            .keys
            .wrap_key(&key, id.as_uuid().as_bytes())
            .map_err(crypto_error)?;

        let blob = self.blobs.put(&ciphertext).await.map_err(storage_error)?;

        let record = StoredFile {
            id,
            owner: owner.clone(),
            display_name: display_name.to_string(),
            size_bytes: plaintext.len() as u64,
            wrapped_key,
            blob: blob.clone(),
            digest,
            created_at: unix_now(),
        };

        if let Err(e) = self.records.insert_file(record.clone()).await {
            if let Err(cleanup) = self.blobs.delete(&blob).await {
                warn!(blob = %blob, "orphaned blob after failed record insert: {cleanup}");
            }
            return Err(e);
        }

        info!(
            file_id = %id,
            owner = %owner,
            bytes = record.size_bytes,
            "file stored"
        );
        Ok(record)
    }

    /// Look up a file record.
    pub async fn get(&self, id: &FileId) -> SfsResult<StoredFile> {
        self.records
            .get_file(id)
            .await?
            .ok_or_else(|| SfsError::NotFound("file".into()))
    }

    pub async fn owned_by(&self, owner: &UserId) -> SfsResult<Vec<StoredFile>> {
        self.records.find_files_by_owner(owner).await
    }

    /// Decrypt a file for `requester` if they own it or hold a grant for it.
    pub async fn retrieve(&self, requester: &UserId, id: &FileId) -> SfsResult<Vec<u8>> {
        let file = self.get(id).await?;
        if &file.owner != requester
            && self.records.find_grant(id, requester).await?.is_none()
        {
            return Err(SfsError::PermissionDenied("no access to file".into()));
        }
        self.read_plaintext(&file).await
    }

    /// The raw decrypt path. Callers must have authorized the read already.
    ///
    /// Blob → digest check → unwrap key → AEAD decrypt. The digest is
    /// compared before any decryption is attempted.
    pub async fn read_plaintext(&self, file: &StoredFile) -> SfsResult<Vec<u8>> {
        let ciphertext = self.blobs.get(&file.blob).await.map_err(storage_error)?;

        if !sfs_crypto::verify(&ciphertext, &file.digest) {
            warn!(file_id = %file.id, "stored ciphertext failed digest verification");
            return Err(SfsError::Integrity("digest mismatch".into()));
        }

        let key = self
            .keys
            .unwrap_key(&file.wrapped_key, file.id.as_uuid().as_bytes())
            .map_err(|e| {
                warn!(file_id = %file.id, "wrapped file key rejected: {e}");
                crypto_error(e)
            })?;

        let plaintext = sfs_crypto::decrypt(&key, &ciphertext).map_err(|e| {
            warn!(file_id = %file.id, "authenticated decryption failed");
            crypto_error(e)
        })?;

        debug!(file_id = %file.id, bytes = plaintext.len(), "file decrypted");
        Ok(plaintext)
    }

    /// Delete a file, its grants, and its blob. Owner only.
    pub async fn delete(&self, requester: &UserId, id: &FileId) -> SfsResult<RemovedFile> {
        let file = self.get(id).await?;
        if &file.owner != requester {
            return Err(SfsError::PermissionDenied("only the owner may delete".into()));
        }

        let removed = self
            .records
            .delete_file_cascade(id)
            .await?
            .ok_or_else(|| SfsError::NotFound("file".into()))?;

        if let Err(e) = self.blobs.delete(&removed.file.blob).await {
            warn!(file_id = %id, blob = %removed.file.blob, "blob delete failed, left as garbage: {e}");
        }

        info!(
            file_id = %id,
            owner = %requester,
            grants_removed = removed.grants_removed,
            "file deleted"
        );
        Ok(removed)
    }
}

/// Display names are shown to users and used as download file names, never as paths.
pub fn validate_display_name(name: &str, max_len: usize) -> SfsResult<()> {
    if name.trim().is_empty() {
        return Err(SfsError::Validation("file name is empty".into()));
    }
    if name.chars().count() > max_len {
        return Err(SfsError::Validation(format!(
            "file name exceeds {max_len} characters"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(SfsError::Validation(
            "file name contains control characters".into(),
        ));
    }
    Ok(())
}

pub(crate) fn crypto_error(e: CryptoError) -> SfsError {
    if e.is_integrity_failure() {
        SfsError::Integrity(e.to_string())
    } else {
        SfsError::Other(anyhow::Error::new(e))
    }
}

/// A blob vanishing under a live record means a concurrent delete won.
fn storage_error(e: StorageError) -> SfsError {
    match e {
        StorageError::NotFound(_) => SfsError::NotFound("file".into()),
        other => other.into(),
    }
}
