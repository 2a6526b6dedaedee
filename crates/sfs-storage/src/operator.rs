//! OpenDAL Operator factory for sfs storage backends

use opendal::Operator;
use sfs_core::config::{StorageBackend, StorageConfig};

use crate::error::{StorageError, StorageResult};

/// S3 credentials, resolved by the caller (env vars or secrets store)
#[derive(Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

/// Build an OpenDAL Operator for the configured backend.
///
/// `credentials` is only consulted for the S3 backend. If `enforce_tls` is
/// set and the S3 endpoint uses HTTP, this returns an error; otherwise a
/// warning is logged for non-HTTPS endpoints.
pub fn build_operator(
    cfg: &StorageConfig,
    credentials: Option<&S3Credentials>,
) -> StorageResult<Operator> {
    let op = match cfg.backend {
        StorageBackend::Memory => Operator::new(opendal::services::Memory::default())?.finish(),
        StorageBackend::Fs => {
            let root = cfg.root.to_string_lossy();
            Operator::new(opendal::services::Fs::default().root(&root))?
                .layer(opendal::layers::LoggingLayer::default())
                .finish()
        }
        StorageBackend::S3 => build_s3(cfg, credentials)?,
    };
    Ok(op)
}

fn build_s3(cfg: &StorageConfig, credentials: Option<&S3Credentials>) -> StorageResult<Operator> {
    let creds = credentials.ok_or_else(|| {
        StorageError::Config("S3 backend requires access key credentials".into())
    })?;

    if cfg.endpoint.starts_with("http://") {
        if cfg.enforce_tls {
            return Err(StorageError::Config(format!(
                "S3 endpoint uses plaintext HTTP ({}), but enforce_tls is enabled. \
                 Use an HTTPS endpoint or set storage.enforce_tls = false for local development.",
                cfg.endpoint
            )));
        }
        tracing::warn!(
            endpoint = %cfg.endpoint,
            "S3 endpoint uses plaintext HTTP; credentials are transmitted unencrypted. \
             Set storage.enforce_tls = true and use HTTPS in production."
        );
    }

    // opendal 0.55: S3 builder uses consuming pattern (methods take `self`, return `Self`)
    let builder = opendal::services::S3::default()
        .endpoint(&cfg.endpoint)
        .region(&cfg.region)
        .bucket(&cfg.bucket)
        .access_key_id(&creds.access_key_id)
        .secret_access_key(&creds.secret_access_key);

    let op = Operator::new(builder)?
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(5)
                .with_jitter(),
        )
        .finish();

    Ok(op)
}
