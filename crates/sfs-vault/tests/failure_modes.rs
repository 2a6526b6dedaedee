//! Storage failures and concurrent access
//!
//! A blob store that can be told to fail shows that no record survives a
//! failed upload, a record store that refuses inserts shows that no blob
//! survives either, and a download racing a delete ends in a clean error
//! rather than partial data.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use opendal::Operator;
use sfs_core::config::LimitsConfig;
use sfs_core::{ErrorKind, FileId, GrantId, SfsError, SfsResult, UserId};
use sfs_crypto::{KeyManager, MasterKey};
use sfs_storage::{BlobRef, BlobRepository, OpendalBlobStore, StorageError, StorageResult};
use sfs_vault::records::{RecordStore, RemovedFile, ShareGrant, StoredFile};
use sfs_vault::{AccessGateway, FileStore, InMemoryRecordStore};

#[derive(Clone)]
struct FlakyBlobs {
    inner: OpendalBlobStore,
    fail_puts: Arc<AtomicBool>,
    fail_deletes: Arc<AtomicBool>,
    last_put: Arc<Mutex<Option<BlobRef>>>,
}

impl FlakyBlobs {
    fn new() -> Self {
        let op = Operator::new(opendal::services::Memory::default())
            .expect("memory operator")
            .finish();
        Self {
            inner: OpendalBlobStore::new(op, "blobs"),
            fail_puts: Arc::new(AtomicBool::new(false)),
            fail_deletes: Arc::new(AtomicBool::new(false)),
            last_put: Arc::new(Mutex::new(None)),
        }
    }
}

#[async_trait]
impl BlobRepository for FlakyBlobs {
    async fn put(&self, data: &[u8]) -> StorageResult<BlobRef> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected put failure".into()));
        }
        let blob = self.inner.put(data).await?;
        *self.last_put.lock().unwrap() = Some(blob.clone());
        Ok(blob)
    }

    async fn get(&self, blob: &BlobRef) -> StorageResult<Vec<u8>> {
        self.inner.get(blob).await
    }

    async fn delete(&self, blob: &BlobRef) -> StorageResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("injected delete failure".into()));
        }
        self.inner.delete(blob).await
    }

    async fn exists(&self, blob: &BlobRef) -> StorageResult<bool> {
        self.inner.exists(blob).await
    }
}

/// Delegates to the in-memory store but refuses every new file record.
struct RejectingRecords {
    inner: InMemoryRecordStore,
}

#[async_trait]
impl RecordStore for RejectingRecords {
    async fn register_user(&self, user: &UserId) -> SfsResult<()> {
        self.inner.register_user(user).await
    }

    async fn user_exists(&self, user: &UserId) -> SfsResult<bool> {
        self.inner.user_exists(user).await
    }

    async fn find_users_excluding(&self, user: &UserId) -> SfsResult<Vec<UserId>> {
        self.inner.find_users_excluding(user).await
    }

    async fn insert_file(&self, _file: StoredFile) -> SfsResult<()> {
        Err(SfsError::Storage("catalog write refused".into()))
    }

    async fn get_file(&self, id: &FileId) -> SfsResult<Option<StoredFile>> {
        self.inner.get_file(id).await
    }

    async fn find_files_by_owner(&self, owner: &UserId) -> SfsResult<Vec<StoredFile>> {
        self.inner.find_files_by_owner(owner).await
    }

    async fn delete_file_cascade(&self, id: &FileId) -> SfsResult<Option<RemovedFile>> {
        self.inner.delete_file_cascade(id).await
    }

    async fn insert_grant_if_absent(&self, grant: ShareGrant) -> SfsResult<ShareGrant> {
        self.inner.insert_grant_if_absent(grant).await
    }

    async fn get_grant(&self, id: &GrantId) -> SfsResult<Option<ShareGrant>> {
        self.inner.get_grant(id).await
    }

    async fn find_grant(&self, file: &FileId, to_user: &UserId) -> SfsResult<Option<ShareGrant>> {
        self.inner.find_grant(file, to_user).await
    }

    async fn find_grants_to(&self, user: &UserId) -> SfsResult<Vec<ShareGrant>> {
        self.inner.find_grants_to(user).await
    }

    async fn find_grants_for_file(&self, file: &FileId) -> SfsResult<Vec<ShareGrant>> {
        self.inner.find_grants_for_file(file).await
    }
}

fn setup() -> (FlakyBlobs, Arc<InMemoryRecordStore>, Arc<FileStore>) {
    let blobs = FlakyBlobs::new();
    let records = Arc::new(InMemoryRecordStore::new());
    let keys = KeyManager::new(&MasterKey::from_bytes([3u8; 32])).unwrap();
    let files = Arc::new(FileStore::new(
        Arc::new(blobs.clone()),
        records.clone(),
        keys,
        LimitsConfig::default(),
    ));
    (blobs, records, files)
}

#[tokio::test]
async fn failed_blob_write_leaves_no_record() {
    let (blobs, records, files) = setup();
    blobs.fail_puts.store(true, Ordering::SeqCst);

    let err = files
        .upload(&UserId::new("alice"), "x.txt", b"data")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(records.file_count(), 0);
    assert!(records
        .find_files_by_owner(&UserId::new("alice"))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn failed_record_insert_removes_written_blob() {
    let blobs = FlakyBlobs::new();
    let keys = KeyManager::new(&MasterKey::from_bytes([3u8; 32])).unwrap();
    let files = FileStore::new(
        Arc::new(blobs.clone()),
        Arc::new(RejectingRecords {
            inner: InMemoryRecordStore::new(),
        }),
        keys,
        LimitsConfig::default(),
    );

    let err = files
        .upload(&UserId::new("alice"), "x.txt", b"data")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);

    let written = blobs
        .last_put
        .lock()
        .unwrap()
        .clone()
        .expect("blob was written before the record insert");
    assert!(!blobs.exists(&written).await.unwrap());
}

#[tokio::test]
async fn failed_blob_delete_still_removes_records() {
    let (blobs, records, files) = setup();
    let alice = UserId::new("alice");
    records.register_user(&"bob".into()).await.unwrap();
    let f = files.upload(&alice, "x.txt", b"data").await.unwrap();
    let gateway = AccessGateway::new(Arc::clone(&files));
    gateway.share_file(&alice, &f.id, &"bob".into()).await.unwrap();

    blobs.fail_deletes.store(true, Ordering::SeqCst);
    let removed = files.delete(&alice, &f.id).await.unwrap();

    assert_eq!(removed.grants_removed, 1);
    assert_eq!(records.file_count(), 0);
    assert_eq!(records.grant_count(), 0);
    // The orphan is still there, but nothing points at it
    assert!(blobs.exists(&f.blob).await.unwrap());
}

#[tokio::test]
async fn missing_blob_under_live_record_is_not_found() {
    let (blobs, _records, files) = setup();
    let alice = UserId::new("alice");
    let f = files.upload(&alice, "x.txt", b"data").await.unwrap();

    blobs.inner.delete(&f.blob).await.unwrap();

    let err = files.retrieve(&alice, &f.id).await.unwrap_err();
    assert!(matches!(err, SfsError::NotFound(_)));
}

#[tokio::test]
async fn concurrent_uploads_are_independent() {
    let (_blobs, records, files) = setup();

    let mut handles = Vec::new();
    for i in 0..16 {
        let files = Arc::clone(&files);
        handles.push(tokio::spawn(async move {
            let owner = UserId::new(format!("user-{}", i % 4));
            let body = format!("payload {i}").into_bytes();
            let f = files.upload(&owner, "p.txt", &body).await.unwrap();
            (owner, f.id, body)
        }));
    }

    for h in handles {
        let (owner, id, body) = h.await.unwrap();
        assert_eq!(files.retrieve(&owner, &id).await.unwrap(), body);
    }
    assert_eq!(records.file_count(), 16);
}

#[tokio::test]
async fn download_racing_delete_never_returns_partial_data() {
    let (_blobs, _records, files) = setup();
    let alice = UserId::new("alice");
    let body: Vec<u8> = (0..64 * 1024).map(|i| (i % 255) as u8).collect();

    for _ in 0..8 {
        let f = files.upload(&alice, "race.bin", &body).await.unwrap();

        let reader = {
            let files = Arc::clone(&files);
            let alice = alice.clone();
            tokio::spawn(async move { files.retrieve(&alice, &f.id).await })
        };
        let deleter = {
            let files = Arc::clone(&files);
            let alice = alice.clone();
            tokio::spawn(async move { files.delete(&alice, &f.id).await })
        };

        deleter.await.unwrap().unwrap();
        match reader.await.unwrap() {
            Ok(bytes) => assert_eq!(bytes, body),
            Err(e) => assert!(
                matches!(e.kind(), ErrorKind::NotFound | ErrorKind::Storage),
                "unexpected error kind: {e}"
            ),
        }
    }
}
