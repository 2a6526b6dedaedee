use opendal::Operator;
use sfs_crypto::{KeyManager, MasterKey};
use sfs_storage::OpendalBlobStore;

pub(crate) fn memory_blobs() -> OpendalBlobStore {
    let op = Operator::new(opendal::services::Memory::default())
        .expect("memory operator")
        .finish();
    OpendalBlobStore::new(op, "blobs")
}

pub(crate) fn test_keys() -> KeyManager {
    KeyManager::new(&MasterKey::from_bytes([42u8; 32])).expect("key manager")
}
