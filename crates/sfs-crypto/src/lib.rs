//! sfs-crypto: encryption at rest for sfs
//!
//! Pipeline: plaintext → XChaCha20-Poly1305 (per-file key) → BLAKE3 digest of ciphertext → blob store
//!
//! Key hierarchy:
//! ```text
//! Master Key (256-bit, random, kept in a key file)
//!   └── Key-Wrapping Key (HKDF-SHA256 from master key, domain="sfs-key-wrap")
//!       └── File Encryption Key (per-file, 256-bit random, stored wrapped, AAD=file id)
//!           └── Blob AEAD: XChaCha20-Poly1305 (key=file_key, nonce=random_192bit)
//! ```

pub mod cipher;
pub mod error;
pub mod integrity;
pub mod keys;
pub mod master;

pub use cipher::{decrypt, encrypt};
pub use error::{CryptoError, CryptoResult};
pub use integrity::{digest, verify, ContentDigest};
pub use keys::{generate_file_key, FileKey, KeyManager, WrappedKey};
pub use master::MasterKey;

/// Size of every symmetric key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;
