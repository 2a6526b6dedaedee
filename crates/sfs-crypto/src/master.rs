//! Master key: generation and base64 key-file persistence

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use std::path::Path;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::KEY_SIZE;

/// A 256-bit master key. Every file key is wrapped under a key derived from it.
///
/// Zeroized on drop to prevent secrets lingering in memory.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_bytes(bytes)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.bytes)
    }

    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let mut decoded = STANDARD
            .decode(encoded.trim().as_bytes())
            .map_err(|e| CryptoError::InvalidKey(format!("master key is not base64: {e}")))?;

        if decoded.len() != KEY_SIZE {
            let len = decoded.len();
            decoded.zeroize();
            return Err(CryptoError::InvalidKey(format!(
                "master key is {len} bytes (expected {KEY_SIZE})"
            )));
        }

        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self::from_bytes(bytes))
    }

    /// Read a key file written by [`MasterKey::save`].
    pub fn load(path: &Path) -> CryptoResult<Self> {
        let mut content = std::fs::read_to_string(path)?;
        let key = Self::from_base64(&content);
        content.zeroize();
        key
    }

    /// Write the key as base64. Refuses to overwrite an existing file.
    pub fn save(&self, path: &Path) -> CryptoResult<()> {
        use std::io::Write;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(path)?;
        let mut encoded = self.to_base64();
        let written = file.write_all(encoded.as_bytes());
        encoded.zeroize();
        written?;
        file.sync_all()?;

        tracing::info!(path = %path.display(), "master key written");
        Ok(())
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_base64_roundtrip() {
        let key = MasterKey::generate();
        let back = MasterKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(key.as_bytes(), back.as_bytes());
    }

    #[test]
    fn test_wrong_length_rejected() {
        let short = STANDARD.encode([1u8; 16]);
        assert!(matches!(
            MasterKey::from_base64(&short),
            Err(CryptoError::InvalidKey(_))
        ));
        assert!(MasterKey::from_base64("***").is_err());
    }

    #[test]
    fn test_save_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("keys/master.key");
        let key = MasterKey::generate();

        key.save(&path).unwrap();
        let loaded = MasterKey::load(&path).unwrap();
        assert_eq!(key.as_bytes(), loaded.as_bytes());
    }

    #[test]
    fn test_save_refuses_overwrite() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("master.key");

        MasterKey::generate().save(&path).unwrap();
        assert!(MasterKey::generate().save(&path).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("master.key");
        MasterKey::generate().save(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
