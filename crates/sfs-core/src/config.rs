use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration (loaded from sfs.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SfsConfig {
    pub storage: StorageConfig,
    pub catalog: CatalogConfig,
    pub crypto: CryptoConfig,
    pub limits: LimitsConfig,
    pub log: LogConfig,
}

/// Which OpenDAL service holds the ciphertext blobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local, lost on exit (tests, demos)
    Memory,
    /// Local directory tree under `root`
    Fs,
    /// Any S3-compatible endpoint
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the fs backend
    pub root: PathBuf,
    /// Key prefix for blob objects (default: blobs)
    pub prefix: String,
    /// S3 endpoint
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// S3 bucket name
    pub bucket: String,
    /// Refuse plaintext HTTP S3 endpoints
    pub enforce_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON file holding file and share records
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Base64 master key used to wrap per-file keys
    pub master_key_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest accepted plaintext upload in bytes
    pub max_file_size: u64,
    /// Longest accepted display name in characters
    pub max_display_name_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Fs,
            root: PathBuf::from("sfs-data/blobs"),
            prefix: "blobs".into(),
            endpoint: "http://localhost:8333".into(),
            region: "us-east-1".into(),
            bucket: "sfs".into(),
            enforce_tls: false,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("sfs-data/catalog.json"),
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            master_key_file: PathBuf::from("sfs-data/master.key"),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size: 100 * 1024 * 1024,
            max_display_name_len: 255,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[storage]
backend = "s3"
endpoint = "https://s3.example.com"
region = "eu-west-1"
bucket = "vault"
prefix = "objects"
enforce_tls = true

[catalog]
path = "/var/lib/sfs/catalog.json"

[crypto]
master_key_file = "/etc/sfs/master.key"

[limits]
max_file_size = 1048576
max_display_name_len = 128

[log]
level = "debug"
format = "json"
"#;
        let config: SfsConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.storage.bucket, "vault");
        assert_eq!(config.storage.prefix, "objects");
        assert!(config.storage.enforce_tls);
        assert_eq!(
            config.catalog.path,
            PathBuf::from("/var/lib/sfs/catalog.json")
        );
        assert_eq!(
            config.crypto.master_key_file,
            PathBuf::from("/etc/sfs/master.key")
        );
        assert_eq!(config.limits.max_file_size, 1048576);
        assert_eq!(config.limits.max_display_name_len, 128);
        assert_eq!(config.log.format, "json");
    }

    #[test]
    fn test_parse_defaults() {
        let config: SfsConfig = toml::from_str("").unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Fs);
        assert_eq!(config.storage.prefix, "blobs");
        assert!(!config.storage.enforce_tls);
        assert_eq!(config.limits.max_display_name_len, 255);
        assert_eq!(config.limits.max_file_size, 100 * 1024 * 1024);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[storage]
backend = "memory"
"#;
        let config: SfsConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.region, "us-east-1");
        assert_eq!(config.catalog.path, PathBuf::from("sfs-data/catalog.json"));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result: Result<SfsConfig, _> = toml::from_str("[storage]\nbackend = \"ftp\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = SfsConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: SfsConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.storage.backend, parsed.storage.backend);
        assert_eq!(config.catalog.path, parsed.catalog.path);
        assert_eq!(config.limits.max_file_size, parsed.limits.max_file_size);
    }
}
