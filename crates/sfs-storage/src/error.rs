use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("storage config error: {0}")]
    Config(String),
}

impl From<opendal::Error> for StorageError {
    fn from(e: opendal::Error) -> Self {
        match e.kind() {
            opendal::ErrorKind::NotFound => StorageError::NotFound(e.to_string()),
            _ => StorageError::Backend(e.to_string()),
        }
    }
}

impl From<StorageError> for sfs_core::SfsError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(_) => sfs_core::SfsError::NotFound("blob".into()),
            StorageError::Backend(msg) => sfs_core::SfsError::Storage(msg),
            StorageError::Config(msg) => sfs_core::SfsError::Config(msg),
        }
    }
}
