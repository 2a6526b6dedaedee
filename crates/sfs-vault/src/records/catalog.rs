use serde::{Deserialize, Serialize};
use sfs_core::{FileId, GrantId, SfsError, SfsResult, UserId};
use std::collections::{BTreeMap, BTreeSet};

use super::{RemovedFile, ShareGrant, StoredFile};

/// The full record set. Backends guard one of these behind a lock.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    users: BTreeSet<UserId>,
    files: BTreeMap<FileId, StoredFile>,
    grants: BTreeMap<GrantId, ShareGrant>,
}

impl Catalog {
    pub fn register_user(&mut self, user: &UserId) -> bool {
        self.users.insert(user.clone())
    }

    pub fn user_exists(&self, user: &UserId) -> bool {
        self.users.contains(user)
    }

    pub fn users_excluding(&self, user: &UserId) -> Vec<UserId> {
        self.users.iter().filter(|u| *u != user).cloned().collect()
    }

    pub fn insert_file(&mut self, file: StoredFile) -> SfsResult<()> {
        if self.files.contains_key(&file.id) {
            return Err(SfsError::Storage("duplicate file id".into()));
        }
        self.files.insert(file.id, file);
        Ok(())
    }

    pub fn get_file(&self, id: &FileId) -> Option<&StoredFile> {
        self.files.get(id)
    }

    pub fn files_by_owner(&self, owner: &UserId) -> Vec<StoredFile> {
        let mut files: Vec<StoredFile> = self
            .files
            .values()
            .filter(|f| &f.owner == owner)
            .cloned()
            .collect();
        files.sort_by_key(|f| (f.created_at, f.id));
        files
    }

    pub fn delete_file_cascade(&mut self, id: &FileId) -> Option<RemovedFile> {
        let file = self.files.remove(id)?;
        let before = self.grants.len();
        self.grants.retain(|_, g| &g.file != id);
        Some(RemovedFile {
            file,
            grants_removed: before - self.grants.len(),
        })
    }

    pub fn insert_grant_if_absent(&mut self, grant: ShareGrant) -> SfsResult<ShareGrant> {
        if !self.files.contains_key(&grant.file) {
            return Err(SfsError::NotFound("file".into()));
        }
        if let Some(existing) = self.find_grant(&grant.file, &grant.to_user) {
            return Ok(existing.clone());
        }
        self.grants.insert(grant.id, grant.clone());
        Ok(grant)
    }

    pub fn get_grant(&self, id: &GrantId) -> Option<&ShareGrant> {
        self.grants.get(id)
    }

    pub fn find_grant(&self, file: &FileId, to_user: &UserId) -> Option<&ShareGrant> {
        self.grants
            .values()
            .find(|g| &g.file == file && &g.to_user == to_user)
    }

    pub fn grants_to(&self, user: &UserId) -> Vec<ShareGrant> {
        let mut grants: Vec<ShareGrant> = self
            .grants
            .values()
            .filter(|g| &g.to_user == user)
            .cloned()
            .collect();
        grants.sort_by_key(|g| (g.created_at, g.id));
        grants
    }

    pub fn grants_for_file(&self, file: &FileId) -> Vec<ShareGrant> {
        self.grants
            .values()
            .filter(|g| &g.file == file)
            .cloned()
            .collect()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn grant_count(&self) -> usize {
        self.grants.len()
    }
}
