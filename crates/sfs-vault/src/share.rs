//! Share registry: owner-issued read grants
//!
//! Grants never transfer ownership and have no delete path of their own;
//! they disappear only when the file they point at is deleted.

use std::sync::Arc;

use sfs_core::{FileId, GrantId, SfsError, SfsResult, UserId};
use tracing::{debug, info};

use crate::file_store::FileStore;
use crate::records::{RecordStore, ShareGrant};

pub struct ShareRegistry {
    files: Arc<FileStore>,
    records: Arc<dyn RecordStore>,
}

impl ShareRegistry {
    pub fn new(files: Arc<FileStore>) -> Self {
        let records = Arc::clone(files.records());
        Self { files, records }
    }

    /// Let `to_user` read `file_id`. Only the owner may grant.
    ///
    /// Granting the same (file, user) pair twice returns the first grant.
    pub async fn grant(
        &self,
        owner: &UserId,
        file_id: &FileId,
        to_user: &UserId,
    ) -> SfsResult<ShareGrant> {
        let file = self.files.get(file_id).await?;
        if &file.owner != owner {
            return Err(SfsError::PermissionDenied("only the owner may share".into()));
        }
        if to_user == owner {
            return Err(SfsError::Validation("cannot share a file with yourself".into()));
        }
        if to_user.is_empty() {
            return Err(SfsError::Validation("share target is empty".into()));
        }
        if !self.records.user_exists(to_user).await? {
            return Err(SfsError::NotFound("user".into()));
        }

        let grant = self
            .records
            .insert_grant_if_absent(ShareGrant::new(owner.clone(), to_user.clone(), *file_id))
            .await?;

        info!(
            grant_id = %grant.id,
            file_id = %file_id,
            from = %owner,
            to = %to_user,
            "file shared"
        );
        Ok(grant)
    }

    /// Grants addressed to `user` (files shared *with* them).
    pub async fn list_grants_for(&self, user: &UserId) -> SfsResult<Vec<ShareGrant>> {
        self.records.find_grants_to(user).await
    }

    /// Every grant issued on `file_id`. Only the owner may ask.
    pub async fn grants_on(&self, owner: &UserId, file_id: &FileId) -> SfsResult<Vec<ShareGrant>> {
        let file = self.files.get(file_id).await?;
        if &file.owner != owner {
            return Err(SfsError::PermissionDenied("only the owner may list grants".into()));
        }
        self.records.find_grants_for_file(file_id).await
    }

    /// True if `user` owns `file_id` or holds a grant for it.
    ///
    /// A missing file authorizes nobody.
    pub async fn is_authorized(&self, user: &UserId, file_id: &FileId) -> SfsResult<bool> {
        let Some(file) = self.records.get_file(file_id).await? else {
            return Ok(false);
        };
        if &file.owner == user {
            return Ok(true);
        }
        Ok(self.records.find_grant(file_id, user).await?.is_some())
    }

    /// Fetch a grant and confirm it is addressed to `user`. Never cached.
    pub async fn resolve_grant(&self, user: &UserId, grant_id: &GrantId) -> SfsResult<ShareGrant> {
        let grant = self
            .records
            .get_grant(grant_id)
            .await?
            .ok_or_else(|| SfsError::NotFound("shared file".into()))?;

        if &grant.to_user != user {
            debug!(grant_id = %grant_id, user = %user, "grant addressed to another user");
            return Err(SfsError::PermissionDenied("grant belongs to another user".into()));
        }
        Ok(grant)
    }
}
