//! Filesystem-backed capabilities
//!
//! - [`FsFetcher`] resolves locators as paths below a root directory
//! - [`FsUploader`] "uploads" by copying files into a destination directory
//!   chunk by chunk, reporting progress after every chunk

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use vmp_core::{AssetFetcher, FileHandle, FileSource, FileUploader, NetworkError, ProgressSink, UploadError};

/// Bytes written between two progress reports
pub const DEFAULT_CHUNK_BYTES: usize = 64 * 1024;

/// Fetches assets from a local directory
#[derive(Debug, Clone)]
pub struct FsFetcher {
    root: PathBuf,
}

impl FsFetcher {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait::async_trait]
impl AssetFetcher for FsFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, NetworkError> {
        let path = self.root.join(locator);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(NetworkError::NotFound {
                locator: locator.to_string(),
            }),
            Err(e) => Err(NetworkError::transport(locator, e.to_string())),
        }
    }
}

/// Copies files into a destination directory
#[derive(Debug, Clone)]
pub struct FsUploader {
    dest: PathBuf,
    chunk_bytes: usize,
    chunk_delay: Option<Duration>,
}

impl FsUploader {
    #[must_use]
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Self {
            dest: dest.into(),
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            chunk_delay: None,
        }
    }

    /// Write in chunks of `bytes` (at least 1)
    #[must_use]
    pub fn with_chunk_bytes(mut self, bytes: usize) -> Self {
        self.chunk_bytes = bytes.max(1);
        self
    }

    /// Pause after every chunk, to make progress visible
    #[must_use]
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    #[inline]
    #[must_use]
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    async fn read_source(file: &FileHandle) -> Result<std::sync::Arc<[u8]>, UploadError> {
        match &file.source {
            FileSource::Memory(bytes) => Ok(bytes.clone()),
            FileSource::Path(path) => tokio::fs::read(path).await.map(Into::into).map_err(|e| UploadError::Read {
                name: file.name.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

fn rejected(target: &Path, e: &std::io::Error) -> UploadError {
    UploadError::Rejected {
        reason: format!("cannot write {}: {e}", target.display()),
    }
}

#[async_trait::async_trait]
impl FileUploader for FsUploader {
    async fn upload(&self, file: &FileHandle, progress: ProgressSink) -> Result<(), UploadError> {
        let bytes = Self::read_source(file).await?;
        let target = self.dest.join(&file.name);
        let mut out = tokio::fs::File::create(&target)
            .await
            .map_err(|e| rejected(&target, &e))?;

        let total = bytes.len() as u64;
        let mut sent = 0u64;
        for chunk in bytes.chunks(self.chunk_bytes) {
            out.write_all(chunk).await.map_err(|e| rejected(&target, &e))?;
            sent += chunk.len() as u64;
            progress.report_bytes(sent, total);
            if let Some(delay) = self.chunk_delay {
                tokio::time::sleep(delay).await;
            }
        }
        out.flush().await.map_err(|e| rejected(&target, &e))?;
        if total == 0 {
            progress.report(100.0);
        }
        Ok(())
    }
}
