//! In-memory record store

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use sfs_core::{FileId, GrantId, SfsError, SfsResult, UserId};

use super::catalog::Catalog;
use super::{RecordStore, RemovedFile, ShareGrant, StoredFile};

/// Thread-safe via `RwLock`. Not persistent: data is lost on drop.
#[derive(Default)]
pub struct InMemoryRecordStore {
    catalog: RwLock<Catalog>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored file records
    pub fn file_count(&self) -> usize {
        self.read().map(|c| c.file_count()).unwrap_or(0)
    }

    /// Number of stored grants
    pub fn grant_count(&self) -> usize {
        self.read().map(|c| c.grant_count()).unwrap_or(0)
    }

    fn read(&self) -> SfsResult<RwLockReadGuard<'_, Catalog>> {
        self.catalog
            .read()
            .map_err(|_| SfsError::Storage("record store lock poisoned".into()))
    }

    fn write(&self) -> SfsResult<RwLockWriteGuard<'_, Catalog>> {
        self.catalog
            .write()
            .map_err(|_| SfsError::Storage("record store lock poisoned".into()))
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn register_user(&self, user: &UserId) -> SfsResult<()> {
        self.write()?.register_user(user);
        Ok(())
    }

    async fn user_exists(&self, user: &UserId) -> SfsResult<bool> {
        Ok(self.read()?.user_exists(user))
    }

    async fn find_users_excluding(&self, user: &UserId) -> SfsResult<Vec<UserId>> {
        Ok(self.read()?.users_excluding(user))
    }

    async fn insert_file(&self, file: StoredFile) -> SfsResult<()> {
        self.write()?.insert_file(file)
    }

    async fn get_file(&self, id: &FileId) -> SfsResult<Option<StoredFile>> {
        Ok(self.read()?.get_file(id).cloned())
    }

    async fn find_files_by_owner(&self, owner: &UserId) -> SfsResult<Vec<StoredFile>> {
        Ok(self.read()?.files_by_owner(owner))
    }

    async fn delete_file_cascade(&self, id: &FileId) -> SfsResult<Option<RemovedFile>> {
        Ok(self.write()?.delete_file_cascade(id))
    }

    async fn insert_grant_if_absent(&self, grant: ShareGrant) -> SfsResult<ShareGrant> {
        self.write()?.insert_grant_if_absent(grant)
    }

    async fn get_grant(&self, id: &GrantId) -> SfsResult<Option<ShareGrant>> {
        Ok(self.read()?.get_grant(id).cloned())
    }

    async fn find_grant(&self, file: &FileId, to_user: &UserId) -> SfsResult<Option<ShareGrant>> {
        Ok(self.read()?.find_grant(file, to_user).cloned())
    }

    async fn find_grants_to(&self, user: &UserId) -> SfsResult<Vec<ShareGrant>> {
        Ok(self.read()?.grants_to(user))
    }

    async fn find_grants_for_file(&self, file: &FileId) -> SfsResult<Vec<ShareGrant>> {
        Ok(self.read()?.grants_for_file(file))
    }
}
