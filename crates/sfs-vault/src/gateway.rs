//! Access gateway: the one surface the presentation layer talks to
//!
//! Every call takes the acting identity from the caller, re-checks
//! permissions from the records (nothing is cached between calls), and
//! returns either a payload or an `AccessError` whose message is fixed per
//! kind. Internal detail stays in the logs.

use std::fmt;
use std::sync::Arc;

use sfs_core::{ErrorKind, FileId, GrantId, SfsError, UserId};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::file_store::FileStore;
use crate::records::{RecordStore, ShareGrant, StoredFile};
use crate::share::ShareRegistry;

/// Content type for every download; the core never sniffs file contents.
pub const BINARY_CONTENT_TYPE: &str = "application/octet-stream";

/// User-facing failure. Messages are constant per variant except for
/// validation text, which only ever describes the caller's own input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("{0}")]
    Validation(String),

    #[error("file does not exist")]
    NotFound,

    #[error("permission denied: you do not have access to this file")]
    PermissionDenied,

    #[error("file failed an integrity check and was not decrypted")]
    Integrity,

    #[error("storage is temporarily unavailable")]
    Storage,
}

impl AccessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccessError::Validation(_) => ErrorKind::Validation,
            AccessError::NotFound => ErrorKind::NotFound,
            AccessError::PermissionDenied => ErrorKind::PermissionDenied,
            AccessError::Integrity => ErrorKind::Integrity,
            AccessError::Storage => ErrorKind::Storage,
        }
    }
}

impl From<SfsError> for AccessError {
    fn from(e: SfsError) -> Self {
        match e {
            SfsError::Validation(msg) => AccessError::Validation(msg),
            SfsError::NotFound(_) => AccessError::NotFound,
            SfsError::PermissionDenied(_) => AccessError::PermissionDenied,
            SfsError::Integrity(detail) => {
                warn!(%detail, "integrity failure surfaced to caller");
                AccessError::Integrity
            }
            other => {
                error!("storage failure: {other}");
                AccessError::Storage
            }
        }
    }
}

pub type AccessResult<T> = Result<T, AccessError>;

/// Listing view of a file. Carries no key material or blob handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub id: FileId,
    pub owner: UserId,
    pub display_name: String,
    pub size_bytes: u64,
    pub created_at: u64,
}

impl From<&StoredFile> for FileSummary {
    fn from(f: &StoredFile) -> Self {
        Self {
            id: f.id,
            owner: f.owner.clone(),
            display_name: f.display_name.clone(),
            size_bytes: f.size_bytes,
            created_at: f.created_at,
        }
    }
}

/// A file shared with the caller, addressed by grant id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedEntry {
    pub grant_id: GrantId,
    pub from_user: UserId,
    pub file: FileSummary,
    pub shared_at: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    pub own_files: Vec<FileSummary>,
    pub shared_with_me: Vec<SharedEntry>,
}

/// Decrypted file ready to hand back to the user.
pub struct Download {
    /// Untrusted display string; see [`Download::content_disposition`].
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Download {
    /// `attachment; filename="..."` with quotes, backslashes, and control
    /// characters replaced so the name cannot break out of the header.
    ///
    /// The header value is always ASCII. A non-ASCII name gets `_` in the
    /// plain `filename` and travels intact in an RFC 5987 `filename*`.
    pub fn content_disposition(&self) -> String {
        let cleaned: String = self
            .file_name
            .chars()
            .map(|c| match c {
                '"' | '\\' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect();

        if cleaned.is_ascii() {
            return format!("attachment; filename=\"{cleaned}\"");
        }

        let fallback: String = cleaned
            .chars()
            .map(|c| if c.is_ascii() { c } else { '_' })
            .collect();
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            percent_encode_attr(&cleaned)
        )
    }
}

/// Percent-encode everything outside RFC 5987 `attr-char`.
fn percent_encode_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for b in value.bytes() {
        match b {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'!'
            | b'#'
            | b'$'
            | b'&'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

impl fmt::Debug for Download {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Download")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

pub struct AccessGateway {
    files: Arc<FileStore>,
    shares: ShareRegistry,
    records: Arc<dyn RecordStore>,
}

impl AccessGateway {
    pub fn new(files: Arc<FileStore>) -> Self {
        let records = Arc::clone(files.records());
        let shares = ShareRegistry::new(Arc::clone(&files));
        Self {
            files,
            shares,
            records,
        }
    }

    pub fn shares(&self) -> &ShareRegistry {
        &self.shares
    }

    /// Record an identity on first contact so others can share with it.
    pub async fn ensure_user(&self, user: &UserId) -> AccessResult<()> {
        check_actor(user)?;
        self.records.register_user(user).await?;
        Ok(())
    }

    pub async fn upload_file(
        &self,
        user: &UserId,
        display_name: &str,
        bytes: &[u8],
    ) -> AccessResult<FileSummary> {
        self.ensure_user(user).await?;
        let file = self.files.upload(user, display_name, bytes).await?;
        Ok(FileSummary::from(&file))
    }

    pub async fn share_file(
        &self,
        user: &UserId,
        file_id: &FileId,
        to_user: &UserId,
    ) -> AccessResult<ShareGrant> {
        check_actor(user)?;
        Ok(self.shares.grant(user, file_id, to_user).await?)
    }

    /// Download a file the caller owns.
    pub async fn download_own_file(&self, user: &UserId, file_id: &FileId) -> AccessResult<Download> {
        check_actor(user)?;
        let file = self.files.get(file_id).await?;
        if &file.owner != user {
            info!(file_id = %file_id, user = %user, "download of foreign file refused");
            return Err(AccessError::PermissionDenied);
        }
        self.decrypt_for_download(&file).await
    }

    /// Download a file through a grant addressed to the caller.
    ///
    /// The grant is re-read on every call, so a grant that vanished with
    /// its file stops working immediately.
    pub async fn download_shared_file(
        &self,
        user: &UserId,
        grant_id: &GrantId,
    ) -> AccessResult<Download> {
        check_actor(user)?;
        let grant = self.shares.resolve_grant(user, grant_id).await?;
        let file = self.files.get(&grant.file).await?;
        if file.owner != grant.from_user {
            error!(grant_id = %grant_id, "grant issuer no longer matches file owner");
            return Err(AccessError::PermissionDenied);
        }
        self.decrypt_for_download(&file).await
    }

    pub async fn delete_file(&self, user: &UserId, file_id: &FileId) -> AccessResult<()> {
        check_actor(user)?;
        self.files.delete(user, file_id).await?;
        Ok(())
    }

    /// Own files plus everything shared with the caller.
    pub async fn dashboard(&self, user: &UserId) -> AccessResult<Dashboard> {
        self.ensure_user(user).await?;

        let own_files = self
            .files
            .owned_by(user)
            .await?
            .iter()
            .map(FileSummary::from)
            .collect();

        let mut shared_with_me = Vec::new();
        for grant in self.shares.list_grants_for(user).await? {
            // Cascade delete keeps these in step; a miss is a lost race.
            let Some(file) = self.records.get_file(&grant.file).await? else {
                continue;
            };
            shared_with_me.push(SharedEntry {
                grant_id: grant.id,
                from_user: grant.from_user,
                file: FileSummary::from(&file),
                shared_at: grant.created_at,
            });
        }

        Ok(Dashboard {
            own_files,
            shared_with_me,
        })
    }

    /// Who the caller has shared `file_id` with.
    pub async fn file_grants(&self, user: &UserId, file_id: &FileId) -> AccessResult<Vec<ShareGrant>> {
        check_actor(user)?;
        Ok(self.shares.grants_on(user, file_id).await?)
    }

    /// Users the caller could share with (everyone but themselves).
    pub async fn share_targets(&self, user: &UserId) -> AccessResult<Vec<UserId>> {
        check_actor(user)?;
        Ok(self.records.find_users_excluding(user).await?)
    }

    async fn decrypt_for_download(&self, file: &StoredFile) -> AccessResult<Download> {
        let bytes = self.files.read_plaintext(file).await?;
        Ok(Download {
            file_name: file.display_name.clone(),
            content_type: BINARY_CONTENT_TYPE,
            bytes,
        })
    }
}

fn check_actor(user: &UserId) -> AccessResult<()> {
    if user.is_empty() {
        return Err(AccessError::PermissionDenied);
    }
    Ok(())
}
