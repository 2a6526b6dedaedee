use thiserror::Error;

pub type SfsResult<T> = Result<T, SfsError>;

/// Coarse error category, stable across internal detail changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    PermissionDenied,
    Integrity,
    Storage,
}

#[derive(Debug, Error)]
pub enum SfsError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Digest mismatch or authenticated-decryption failure. Never retried.
    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SfsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SfsError::Validation(_) => ErrorKind::Validation,
            SfsError::NotFound(_) => ErrorKind::NotFound,
            SfsError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            SfsError::Integrity(_) => ErrorKind::Integrity,
            SfsError::Storage(_)
            | SfsError::Config(_)
            | SfsError::Io(_)
            | SfsError::Other(_) => ErrorKind::Storage,
        }
    }

    /// Only storage-layer failures are worth retrying.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(SfsError::Validation("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(SfsError::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            SfsError::PermissionDenied("x".into()).kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(SfsError::Integrity("x".into()).kind(), ErrorKind::Integrity);
        assert_eq!(
            SfsError::Other(anyhow::anyhow!("boom")).kind(),
            ErrorKind::Storage
        );
    }

    #[test]
    fn integrity_and_permission_are_not_transient() {
        assert!(!SfsError::Integrity("tag".into()).is_transient());
        assert!(!SfsError::PermissionDenied("nope".into()).is_transient());
        assert!(SfsError::Storage("timeout".into()).is_transient());
    }
}
