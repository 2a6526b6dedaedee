//! sfs: encrypted file sharing CLI
//!
//! Commands:
//!   init                          - generate the master key file
//!   status                        - storage health and catalog counts
//!   config show                   - display current configuration
//!   whoami                        - print the acting user
//!   upload <path> [--name]        - encrypt and store a local file
//!   share <file-id> <user>        - grant another user read access
//!   list                          - own files and files shared with you
//!   grants <file-id>              - who one of your files is shared with
//!   users                         - users you can share with
//!   download <file-id> [-o]       - download one of your own files
//!   download-shared <grant-id>    - download a file shared with you
//!   delete <file-id>              - delete a file and all its grants
//!
//! The acting user comes from `--user` / `SFS_USER`. The CLI trusts it as
//! given: authentication belongs to whatever fronts this tool.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use sfs_core::config::{SfsConfig, StorageBackend};
use sfs_core::{FileId, GrantId, UserId};
use sfs_crypto::{KeyManager, MasterKey};
use sfs_storage::{OpendalBlobStore, S3Credentials};
use sfs_vault::{AccessGateway, Download, FileStore, InMemoryRecordStore, JsonRecordStore, RecordStore};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "sfs",
    version,
    about = "Encrypted file storage with per-user sharing",
    long_about = "sfs: upload files encrypted at rest, share them with other users, download and delete them"
)]
struct Cli {
    /// Path to sfs.toml configuration file
    #[arg(long, short = 'c', env = "SFS_CONFIG", default_value = "sfs.toml")]
    config: PathBuf,

    /// Acting user for this invocation
    #[arg(long, short = 'u', env = "SFS_USER")]
    user: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides [log] level
    #[arg(long, env = "SFS_LOG")]
    log: Option<String>,

    /// Log format (json, text); overrides [log] format
    #[arg(long, env = "SFS_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a new master key at crypto.master_key_file
    Init,

    /// Show storage and catalog status
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Print the acting user
    Whoami,

    /// Encrypt and upload a local file
    Upload {
        /// Local file to upload
        path: PathBuf,
        /// Display name (default: the local file name)
        #[arg(long, short = 'n')]
        name: Option<String>,
    },

    /// Give another user read access to one of your files
    Share {
        file_id: FileId,
        to_user: String,
    },

    /// List your files and the files shared with you
    List,

    /// Show who one of your files is shared with
    Grants { file_id: FileId },

    /// List the users you can share with
    Users,

    /// Download one of your own files
    Download {
        file_id: FileId,
        /// Output path (default: the display name, in the current directory)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Download a file shared with you, by grant id
    #[command(name = "download-shared")]
    DownloadShared {
        grant_id: GrantId,
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Delete one of your files; every grant on it goes with it
    Delete { file_id: FileId },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;

    let level = cli.log.as_deref().unwrap_or(&config.log.level);
    let format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| LogFormat::from_config(&config.log.format));
    init_logging(level, &format);

    match cli.command {
        Commands::Init => cmd_init(&config),
        Commands::Status => cmd_status(&config).await,
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
        Commands::Whoami => {
            println!("{}", acting_user(cli.user.as_deref())?);
            Ok(())
        }
        Commands::Upload { path, name } => {
            let user = acting_user(cli.user.as_deref())?;
            cmd_upload(&config, &user, &path, name.as_deref()).await
        }
        Commands::Share { file_id, to_user } => {
            let user = acting_user(cli.user.as_deref())?;
            let gateway = open_gateway(&config)?;
            let grant = gateway
                .share_file(&user, &file_id, &UserId::new(to_user))
                .await?;
            println!("shared {} with {}", grant.file, grant.to_user);
            println!("  grant: {}", grant.id);
            Ok(())
        }
        Commands::List => {
            let user = acting_user(cli.user.as_deref())?;
            cmd_list(&config, &user).await
        }
        Commands::Grants { file_id } => {
            let user = acting_user(cli.user.as_deref())?;
            let gateway = open_gateway(&config)?;
            let grants = gateway.file_grants(&user, &file_id).await?;
            if grants.is_empty() {
                println!("not shared");
            }
            for g in grants {
                println!("  {}  {}", g.id, g.to_user);
            }
            Ok(())
        }
        Commands::Users => {
            let user = acting_user(cli.user.as_deref())?;
            let gateway = open_gateway(&config)?;
            for other in gateway.share_targets(&user).await? {
                println!("{other}");
            }
            Ok(())
        }
        Commands::Download { file_id, output } => {
            let user = acting_user(cli.user.as_deref())?;
            let gateway = open_gateway(&config)?;
            let dl = gateway.download_own_file(&user, &file_id).await?;
            write_download(&dl, output.as_deref()).await
        }
        Commands::DownloadShared { grant_id, output } => {
            let user = acting_user(cli.user.as_deref())?;
            let gateway = open_gateway(&config)?;
            let dl = gateway.download_shared_file(&user, &grant_id).await?;
            write_download(&dl, output.as_deref()).await
        }
        Commands::Delete { file_id } => {
            let user = acting_user(cli.user.as_deref())?;
            let gateway = open_gateway(&config)?;
            gateway.delete_file(&user, &file_id).await?;
            println!("deleted {file_id}");
            Ok(())
        }
    }
}

impl LogFormat {
    fn from_config(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

async fn load_config(path: &Path) -> Result<SfsConfig> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))
    } else {
        Ok(SfsConfig::default())
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so stdout stays clean for listings
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn acting_user(flag: Option<&str>) -> Result<UserId> {
    let user = UserId::new(flag.unwrap_or_default().trim());
    if user.is_empty() {
        anyhow::bail!("no acting user: pass --user <name> or set SFS_USER");
    }
    Ok(user)
}

// ── Wiring ────────────────────────────────────────────────────────────────────

/// Read S3 credentials from AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY.
fn s3_credentials_from_env() -> Result<S3Credentials> {
    let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").context(
        "S3 credentials not set\n\
         Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY environment variables.",
    )?;
    let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
        .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;
    Ok(S3Credentials {
        access_key_id,
        secret_access_key,
    })
}

fn build_operator(config: &SfsConfig) -> Result<opendal::Operator> {
    let creds = match config.storage.backend {
        StorageBackend::S3 => Some(s3_credentials_from_env()?),
        _ => None,
    };
    sfs_storage::build_operator(&config.storage, creds.as_ref()).context("building storage operator")
}

fn open_records(config: &SfsConfig) -> Result<Arc<dyn RecordStore>> {
    if config.storage.backend == StorageBackend::Memory {
        warn!("memory backend: catalog and blobs are discarded when this process exits");
        return Ok(Arc::new(InMemoryRecordStore::new()));
    }
    let store = JsonRecordStore::open(&config.catalog.path)
        .with_context(|| format!("opening catalog: {}", config.catalog.path.display()))?;
    Ok(Arc::new(store))
}

fn open_gateway(config: &SfsConfig) -> Result<AccessGateway> {
    let key_path = &config.crypto.master_key_file;
    let master = MasterKey::load(key_path).with_context(|| {
        format!(
            "loading master key: {} (run `sfs init` first)",
            key_path.display()
        )
    })?;
    let keys = KeyManager::new(&master).context("deriving key-wrapping key")?;

    let op = build_operator(config)?;
    let blobs = Arc::new(OpendalBlobStore::new(op, &config.storage.prefix));
    let records = open_records(config)?;

    let files = Arc::new(FileStore::new(blobs, records, keys, config.limits.clone()));
    Ok(AccessGateway::new(files))
}

// ── `sfs init` ────────────────────────────────────────────────────────────────

fn cmd_init(config: &SfsConfig) -> Result<()> {
    let path = &config.crypto.master_key_file;
    if path.exists() {
        anyhow::bail!(
            "master key already exists at {}; refusing to overwrite",
            path.display()
        );
    }
    MasterKey::generate()
        .save(path)
        .with_context(|| format!("writing master key: {}", path.display()))?;

    println!("master key written to {}", path.display());
    println!("  back it up: every stored file key is wrapped with it");
    Ok(())
}

// ── `sfs status` ──────────────────────────────────────────────────────────────

async fn cmd_status(config: &SfsConfig) -> Result<()> {
    println!("sfs v{}", env!("CARGO_PKG_VERSION"));

    let backend = match config.storage.backend {
        StorageBackend::Memory => "memory".to_string(),
        StorageBackend::Fs => format!("fs ({})", config.storage.root.display()),
        StorageBackend::S3 => format!("s3 ({}/{})", config.storage.endpoint, config.storage.bucket),
    };
    let reachable = match build_operator(config) {
        Ok(op) => {
            if sfs_storage::is_healthy(&op).await {
                "ok".to_string()
            } else {
                "UNREACHABLE".to_string()
            }
        }
        Err(e) => format!("not configured: {e:#}"),
    };
    println!("  storage:       {backend} [{reachable}]");

    let key_path = &config.crypto.master_key_file;
    println!(
        "  master key:    {} [{}]",
        key_path.display(),
        if key_path.exists() { "present" } else { "MISSING" }
    );

    if config.storage.backend == StorageBackend::Memory {
        println!("  catalog:       in memory");
    } else {
        let catalog = JsonRecordStore::open(&config.catalog.path)
            .with_context(|| format!("opening catalog: {}", config.catalog.path.display()))?;
        let (files, grants) = catalog.counts()?;
        println!("  catalog:       {}", catalog.path().display());
        println!("  files:         {files}");
        println!("  grants:        {grants}");
    }
    Ok(())
}

fn cmd_config_show(config: &SfsConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── `sfs upload` ──────────────────────────────────────────────────────────────

async fn cmd_upload(config: &SfsConfig, user: &UserId, path: &Path, name: Option<&str>) -> Result<()> {
    let display_name = match name {
        Some(n) => n.to_string(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .with_context(|| format!("cannot derive a file name from {}", path.display()))?,
    };

    let meta = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    if meta.len() > config.limits.max_file_size {
        anyhow::bail!(
            "{} is {}, over the {} upload limit",
            path.display(),
            fmt_bytes(meta.len()),
            fmt_bytes(config.limits.max_file_size)
        );
    }
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    let gateway = open_gateway(config)?;
    let file = gateway.upload_file(user, &display_name, &bytes).await?;

    println!("uploaded {}", file.display_name);
    println!("  id:    {}", file.id);
    println!("  size:  {}", fmt_bytes(file.size_bytes));
    Ok(())
}

// ── `sfs list` ────────────────────────────────────────────────────────────────

async fn cmd_list(config: &SfsConfig, user: &UserId) -> Result<()> {
    let gateway = open_gateway(config)?;
    let dash = gateway.dashboard(user).await?;

    println!("Your files:");
    if dash.own_files.is_empty() {
        println!("  (none)");
    }
    for f in &dash.own_files {
        println!("  {}  {:>10}  {}", f.id, fmt_bytes(f.size_bytes), f.display_name);
    }

    println!();
    println!("Shared with you:");
    if dash.shared_with_me.is_empty() {
        println!("  (none)");
    }
    for s in &dash.shared_with_me {
        println!(
            "  {}  {:>10}  {}  (from {})",
            s.grant_id,
            fmt_bytes(s.file.size_bytes),
            s.file.display_name,
            s.from_user
        );
    }
    Ok(())
}

// ── `sfs download` / `sfs download-shared` ────────────────────────────────────

/// Pick the output path for a download.
///
/// Without `-o`, only the final component of the display name is used, so
/// a stored name like `../../etc/passwd` lands as `passwd` in the current
/// directory.
fn output_path(dl: &Download, output: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = output {
        return Ok(p.to_path_buf());
    }
    let name = Path::new(&dl.file_name)
        .file_name()
        .context("stored file name is not usable as a local file name; pass -o <path>")?;
    Ok(PathBuf::from(name))
}

async fn write_download(dl: &Download, output: Option<&Path>) -> Result<()> {
    let target = output_path(dl, output)?;

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
        .await
        .with_context(|| format!("creating {} (refusing to overwrite)", target.display()))?;
    file.write_all(&dl.bytes)
        .await
        .with_context(|| format!("writing {}", target.display()))?;
    file.flush().await?;

    info!(path = %target.display(), bytes = dl.bytes.len(), "download written");
    println!("{} → {} ({})", dl.file_name, target.display(), fmt_bytes(dl.bytes.len() as u64));
    Ok(())
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
