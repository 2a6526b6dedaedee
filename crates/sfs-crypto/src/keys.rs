//! Per-file keys and the key manager that wraps them for storage

use base64::{engine::general_purpose::STANDARD, Engine};
use hkdf::Hkdf;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::cipher::{open, seal};
use crate::error::{CryptoError, CryptoResult};
use crate::master::MasterKey;
use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

const WRAP_DOMAIN: &[u8] = b"sfs-key-wrap";

/// A per-file 256-bit encryption key. Zeroized on drop.
#[derive(Clone)]
pub struct FileKey {
    bytes: [u8; KEY_SIZE],
}

impl FileKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for FileKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random 256-bit file encryption key from the OS-seeded CSPRNG.
pub fn generate_file_key() -> FileKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    FileKey::from_bytes(bytes)
}

/// A file key encrypted under the key-wrapping key.
///
/// Layout: `[24-byte nonce][32-byte key ciphertext][16-byte tag]`.
/// Serialized as base64 so records stay plain JSON.
#[derive(Clone, PartialEq, Eq)]
pub struct WrappedKey(Vec<u8>);

impl WrappedKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for WrappedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WrappedKey({} bytes)", self.0.len())
    }
}

impl Serialize for WrappedKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for WrappedKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(WrappedKey)
            .map_err(serde::de::Error::custom)
    }
}

/// Generates file keys and wraps/unwraps them for persistence.
///
/// The wrapping key is derived from the master key, so the raw master key
/// never touches an AEAD directly.
pub struct KeyManager {
    wrapping_key: [u8; KEY_SIZE],
}

impl KeyManager {
    pub fn new(master: &MasterKey) -> CryptoResult<Self> {
        let hkdf = Hkdf::<Sha256>::new(None, master.as_bytes());
        let mut wrapping_key = [0u8; KEY_SIZE];
        hkdf.expand(WRAP_DOMAIN, &mut wrapping_key)
            .map_err(|e| CryptoError::KeyDerivation(format!("HKDF expand failed: {e}")))?;
        Ok(Self { wrapping_key })
    }

    /// Fresh key for a new file. Persisting it is the caller's job.
    pub fn generate_key(&self) -> FileKey {
        generate_file_key()
    }

    /// Wrap `key`, binding it to `context` (the owning file's id).
    pub fn wrap_key(&self, key: &FileKey, context: &[u8]) -> CryptoResult<WrappedKey> {
        seal(&self.wrapping_key, key.as_bytes(), context).map(WrappedKey)
    }

    /// Unwrap a key stored by [`KeyManager::wrap_key`] under the same `context`.
    pub fn unwrap_key(&self, wrapped: &WrappedKey, context: &[u8]) -> CryptoResult<FileKey> {
        let expected = NONCE_SIZE + KEY_SIZE + TAG_SIZE;
        if wrapped.0.len() != expected {
            return Err(CryptoError::Malformed(format!(
                "wrapped key is {} bytes (expected {expected})",
                wrapped.0.len()
            )));
        }

        let mut plaintext = open(&self.wrapping_key, &wrapped.0, context)?;

        let mut key_bytes = [0u8; KEY_SIZE];
        key_bytes.copy_from_slice(&plaintext);
        plaintext.zeroize();

        Ok(FileKey::from_bytes(key_bytes))
    }
}

impl Drop for KeyManager {
    fn drop(&mut self) {
        self.wrapping_key.zeroize();
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("wrapping_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_manager() -> KeyManager {
        KeyManager::new(&MasterKey::from_bytes([42u8; KEY_SIZE])).unwrap()
    }

    #[test]
    fn test_file_key_generation() {
        let k1 = generate_file_key();
        let k2 = generate_file_key();
        assert_ne!(k1.as_bytes(), k2.as_bytes(), "random keys must differ");
    }

    #[test]
    fn test_key_wrap_unwrap_roundtrip() {
        let km = test_manager();
        let file_key = km.generate_key();

        let wrapped = km.wrap_key(&file_key, b"file-1").unwrap();
        let unwrapped = km.unwrap_key(&wrapped, b"file-1").unwrap();

        assert_eq!(file_key.as_bytes(), unwrapped.as_bytes());
    }

    #[test]
    fn test_wrapped_key_does_not_contain_raw_key() {
        let km = test_manager();
        let file_key = km.generate_key();
        let wrapped = km.wrap_key(&file_key, b"file-1").unwrap();

        assert!(!wrapped
            .as_bytes()
            .windows(KEY_SIZE)
            .any(|w| w == file_key.as_bytes()));
    }

    #[test]
    fn test_key_unwrap_wrong_master() {
        let km1 = KeyManager::new(&MasterKey::from_bytes([1u8; KEY_SIZE])).unwrap();
        let km2 = KeyManager::new(&MasterKey::from_bytes([2u8; KEY_SIZE])).unwrap();
        let file_key = generate_file_key();

        let wrapped = km1.wrap_key(&file_key, b"file-1").unwrap();
        let result = km2.unwrap_key(&wrapped, b"file-1");

        assert!(matches!(result, Err(CryptoError::Authentication)));
    }

    #[test]
    fn test_key_unwrap_wrong_context() {
        let km = test_manager();
        let wrapped = km.wrap_key(&generate_file_key(), b"file-1").unwrap();

        let result = km.unwrap_key(&wrapped, b"file-2");
        assert!(result.is_err(), "wrapped key must not move between files");
    }

    #[test]
    fn test_wrapped_key_size() {
        let km = test_manager();
        let wrapped = km.wrap_key(&generate_file_key(), b"f").unwrap();

        // nonce (24) + key (32) + tag (16) = 72
        assert_eq!(wrapped.as_bytes().len(), NONCE_SIZE + KEY_SIZE + TAG_SIZE);
    }

    #[test]
    fn test_truncated_wrapped_key() {
        let km = test_manager();
        let wrapped = km.wrap_key(&generate_file_key(), b"f").unwrap();
        let short = WrappedKey::from_bytes(wrapped.as_bytes()[..40].to_vec());

        assert!(matches!(
            km.unwrap_key(&short, b"f"),
            Err(CryptoError::Malformed(_))
        ));
    }

    #[test]
    fn test_wrapped_key_serde_base64() {
        let km = test_manager();
        let wrapped = km.wrap_key(&generate_file_key(), b"f").unwrap();

        let json = serde_json::to_string(&wrapped).unwrap();
        let back: WrappedKey = serde_json::from_str(&json).unwrap();
        assert_eq!(wrapped, back);
    }

    #[test]
    fn test_debug_redacts() {
        let key = generate_file_key();
        assert!(format!("{key:?}").contains("REDACTED"));
        assert!(format!("{:?}", test_manager()).contains("REDACTED"));
    }
}
