use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Tag check failed: wrong key, tampered bytes, or wrong context.
    #[error("authenticated decryption failed")]
    Authentication,

    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    #[error("encryption failed")]
    Encryption,

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CryptoError {
    /// True when the bytes themselves are untrustworthy (as opposed to a local setup problem).
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, CryptoError::Authentication | CryptoError::Malformed(_))
    }
}
