//! XChaCha20-Poly1305 blob encryption/decryption
//!
//! Encrypted blob format (binary):
//! ```text
//! [24 bytes: random nonce][N bytes: ciphertext][16 bytes: Poly1305 tag]
//! ```
//!
//! A fresh random 192-bit nonce per call makes nonce reuse under one key
//! negligible, so identical plaintexts never produce identical blobs.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::FileKey;
use crate::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// Encrypt a whole file payload under its file key.
///
/// Returns: `[24-byte nonce][ciphertext][16-byte tag]`
pub fn encrypt(key: &FileKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    seal(key.as_bytes(), plaintext, b"")
}

/// Decrypt a payload produced by [`encrypt`].
///
/// Nothing is returned unless the tag verifies; truncated input, flipped
/// bits, or a different key all yield an error.
pub fn decrypt(key: &FileKey, encrypted: &[u8]) -> CryptoResult<Vec<u8>> {
    open(key.as_bytes(), encrypted, b"")
}

pub(crate) fn seal(key: &[u8; KEY_SIZE], plaintext: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(key.into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| CryptoError::Encryption)?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

pub(crate) fn open(key: &[u8; KEY_SIZE], encrypted: &[u8], aad: &[u8]) -> CryptoResult<Vec<u8>> {
    if encrypted.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Malformed(format!(
            "{} bytes (minimum {})",
            encrypted.len(),
            NONCE_SIZE + TAG_SIZE
        )));
    }

    let (nonce_bytes, ciphertext) = encrypted.split_at(NONCE_SIZE);
    let nonce = XNonce::from_slice(nonce_bytes);
    let cipher = XChaCha20Poly1305::new(key.into());

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::Authentication)
}
