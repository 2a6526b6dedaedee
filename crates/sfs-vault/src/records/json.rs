//! JSON-file record store
//!
//! Mutations are applied to a copy of the catalog, written to disk with an
//! atomic temp+rename, and only then swapped in. A failed write leaves both
//! the file and the in-memory view at the previous state.

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use sfs_core::{FileId, GrantId, SfsError, SfsResult, UserId};
use tracing::debug;

use super::catalog::Catalog;
use super::{RecordStore, RemovedFile, ShareGrant, StoredFile};

pub struct JsonRecordStore {
    /// Path to the JSON catalog on disk
    path: PathBuf,
    catalog: RwLock<Catalog>,
}

impl JsonRecordStore {
    /// Load or create a catalog at the given path.
    /// If the file doesn't exist, starts empty (nothing is written until the first mutation).
    pub fn open(path: &Path) -> SfsResult<Self> {
        let catalog = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading catalog: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("parsing catalog: {}", path.display()))?
        } else {
            Catalog::default()
        };

        Ok(Self {
            path: path.to_path_buf(),
            catalog: RwLock::new(catalog),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// (file records, grants) currently stored
    pub fn counts(&self) -> SfsResult<(usize, usize)> {
        let c = self.read()?;
        Ok((c.file_count(), c.grant_count()))
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

    /// Apply `f` to a copy, persist it, then publish it.
    fn mutate<T>(&self, f: impl FnOnce(&mut Catalog) -> SfsResult<T>) -> SfsResult<T> {
        let mut guard = self.write()?;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        self.persist(&next)?;
        *guard = next;
        Ok(out)
    }

    fn persist(&self, catalog: &Catalog) -> SfsResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating catalog dir: {}", parent.display()))?;
            }
        }

        let json = serde_json::to_string_pretty(catalog).context("serializing catalog")?;

        // Atomic write: write to temp file, then rename
        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, &json)
            .with_context(|| format!("writing catalog temp: {}", tmp_path.display()))
            .map_err(|e| SfsError::Storage(format!("{e:#}")))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("renaming catalog: {}", self.path.display()))
            .map_err(|e| SfsError::Storage(format!("{e:#}")))?;

        debug!(path = %self.path.display(), bytes = json.len(), "catalog flushed");
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonRecordStore {
    async fn register_user(&self, user: &UserId) -> SfsResult<()> {
        if self.read()?.user_exists(user) {
            return Ok(());
        }
        self.mutate(|c| {
            c.register_user(user);
            Ok(())
        })
    }

    async fn user_exists(&self, user: &UserId) -> SfsResult<bool> {
        Ok(self.read()?.user_exists(user))
    }

    async fn find_users_excluding(&self, user: &UserId) -> SfsResult<Vec<UserId>> {
        Ok(self.read()?.users_excluding(user))
    }

    async fn insert_file(&self, file: StoredFile) -> SfsResult<()> {
        self.mutate(|c| c.insert_file(file))
    }

    async fn get_file(&self, id: &FileId) -> SfsResult<Option<StoredFile>> {
        Ok(self.read()?.get_file(id).cloned())
    }

    async fn find_files_by_owner(&self, owner: &UserId) -> SfsResult<Vec<StoredFile>> {
        Ok(self.read()?.files_by_owner(owner))
    }

    async fn delete_file_cascade(&self, id: &FileId) -> SfsResult<Option<RemovedFile>> {
        if self.read()?.get_file(id).is_none() {
            return Ok(None);
        }
        self.mutate(|c| Ok(c.delete_file_cascade(id)))
    }

    async fn insert_grant_if_absent(&self, grant: ShareGrant) -> SfsResult<ShareGrant> {
        self.mutate(|c| c.insert_grant_if_absent(grant))
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
