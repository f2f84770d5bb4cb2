//! Raw byte storage for uploaded files.
//!
//! One flat file per filename under a single directory. The original filename
//! is the storage key, so same-name uploads from different users collide and
//! the last completed write wins. Writes land in a temporary sibling first and
//! are renamed into place, so readers see either the old or the new bytes.

use async_trait::async_trait;
use axum::body::Bytes;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("invalid blob name: {0:?}")]
    InvalidName(String),
    #[error("blob I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// An open blob ready to be streamed.
pub struct Blob {
    pub len: u64,
    pub reader: Pin<Box<dyn AsyncRead + Send>>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `name`, replacing any existing blob.
    async fn put(&self, name: &str, bytes: Bytes) -> Result<(), BlobError>;

    /// Open `name` for streaming.
    async fn open(&self, name: &str) -> Result<Blob, BlobError>;
}

/// Filesystem-backed blob store rooted at one directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Use `root` as the upload directory, creating it if needed.
    pub async fn open_dir(root: impl Into<PathBuf>) -> Result<Self, BlobError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, BlobError> {
        if !is_flat_name(name) {
            return Err(BlobError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, name: &str, bytes: Bytes) -> Result<(), BlobError> {
        let path = self.resolve(name)?;
        let staging = self
            .root
            .join(format!(".upload-{}.part", uuid::Uuid::new_v4().simple()));

        if let Err(e) = tokio::fs::write(&staging, &bytes).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }
        tracing::debug!(name = name, bytes = bytes.len(), "Blob written");
        Ok(())
    }

    async fn open(&self, name: &str) -> Result<Blob, BlobError> {
        let path = self.resolve(name)?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BlobError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let len = file.metadata().await?.len();
        Ok(Blob {
            len,
            reader: Box::pin(file),
        })
    }
}

/// True if `name` is a single, ordinary path component.
pub fn is_flat_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
