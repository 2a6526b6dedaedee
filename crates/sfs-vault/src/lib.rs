//! sfs-vault: encrypted file catalog with owner-issued read grants
//!
//! ```text
//! AccessGateway ──► ShareRegistry ──► FileStore ──► KeyManager / cipher / digest
//!       │                                 │
//!       └──────────── RecordStore ◄───────┴──► BlobRepository
//! ```

pub mod file_store;
pub mod gateway;
pub mod records;
pub mod share;

#[cfg(test)]
mod testing;

pub use file_store::FileStore;
pub use gateway::{
    AccessError, AccessGateway, AccessResult, Dashboard, Download, FileSummary, SharedEntry,
};
pub use records::{InMemoryRecordStore, JsonRecordStore, RecordStore, ShareGrant, StoredFile};
pub use share::ShareRegistry;
