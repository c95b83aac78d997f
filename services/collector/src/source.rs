use std::net::ToSocketAddrs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use suppaftp::types::FileType;
use suppaftp::FtpStream;
use tokio::fs;

use crate::{CollectError, FtpConfig};

/// Raw bytes of the published file, exactly as transferred.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub content_hash: String,
    pub fetched_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let content_hash = content_hash(&bytes);
        Self {
            file_name: file_name.into(),
            bytes,
            content_hash,
            fetched_at: Utc::now(),
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }
}

/// Anything that can hand over the whole published file in one piece.
#[async_trait]
pub trait FileSource: Send + Sync {
    async fn fetch(&self) -> Result<Artifact, CollectError>;
}

pub struct FtpSource {
    config: FtpConfig,
}

impl FtpSource {
    pub fn new(config: FtpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FtpConfig {
        &self.config
    }
}

#[async_trait]
impl FileSource for FtpSource {
    async fn fetch(&self) -> Result<Artifact, CollectError> {
        let config = self.config.clone();
        log::info!("Connecting to {}...", config.address());

        let bytes = tokio::task::spawn_blocking(move || download(&config)).await??;

        log::info!("Downloaded {} ({} bytes)", self.config.file_name, bytes.len());
        Ok(Artifact::new(self.config.file_name.clone(), bytes))
    }
}

/// Connect, log in, pull the file in binary mode, disconnect.
fn download(config: &FtpConfig) -> Result<Vec<u8>, CollectError> {
    let address = config.address();
    let socket_addr = address
        .to_socket_addrs()
        .map_err(|source| CollectError::Resolve {
            address: address.clone(),
            source,
        })?
        .next()
        .ok_or_else(|| CollectError::Resolve {
            address: address.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no address records"),
        })?;

    let mut ftp = FtpStream::connect_timeout(socket_addr, config.timeout)
        .map_err(|source| CollectError::Connect { address, source })?;
    log::debug!("Connected, logging in as {}", config.user);

    ftp.login(&config.user, &config.password)
        .map_err(CollectError::Login)?;
    ftp.transfer_type(FileType::Binary)
        .map_err(|source| CollectError::Transfer {
            file: config.file_name.clone(),
            source,
        })?;

    let buffer = ftp
        .retr_as_buffer(&config.file_name)
        .map_err(|source| CollectError::Transfer {
            file: config.file_name.clone(),
            source,
        })?;

    // The file is already in memory; a failed QUIT does not invalidate it.
    if let Err(e) = ftp.quit() {
        log::warn!("FTP quit failed: {}", e);
    }

    Ok(buffer.into_inner())
}

/// `sha256:<hex>` digest of the raw bytes
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{:x}", hasher.finalize())
}

/// Save the raw artifact under `dir`, named after its capture time.
pub async fn save_to_fs(dir: &Path, artifact: &Artifact) -> Result<PathBuf, CollectError> {
    fs::create_dir_all(dir).await?;

    let filename = format!(
        "{}-{}",
        artifact.fetched_at.format("%Y%m%dT%H%M%SZ"),
        artifact.file_name
    );
    let path = dir.join(filename);

    fs::write(&path, &artifact.bytes).await?;

    Ok(path)
}
