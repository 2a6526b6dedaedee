//! sfs-storage: blob repository over OpenDAL (memory, local fs, S3)

pub mod blob;
pub mod error;
pub mod health;
pub mod operator;

pub use blob::{BlobRef, BlobRepository, OpendalBlobStore};
pub use error::{StorageError, StorageResult};
pub use health::{check_health, is_healthy};
pub use operator::{build_operator, S3Credentials};
