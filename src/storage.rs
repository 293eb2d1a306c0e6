//! Blob storage for uploaded files.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;

/// Directory prefix for stored document files.
const DOCUMENTS_PREFIX: &str = "documents";

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("blob not found: {0}")]
    NotFound(String),
    #[error("invalid blob path: {0}")]
    InvalidPath(String),
    #[error("blob io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BlobError> for AppError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::NotFound(_) => AppError::not_found("file not found"),
            other => AppError::internal(other.to_string()),
        }
    }
}

/// Opaque file storage addressed by the path returned from `put`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes and return the path they can be fetched from.
    async fn put(&self, bytes: Vec<u8>, extension: &str) -> Result<String, BlobError>;

    async fn get(&self, path: &str) -> Result<Vec<u8>, BlobError>;

    async fn exists(&self, path: &str) -> Result<bool, BlobError>;

    /// Remove a blob. Removing a path that does not exist is not an error.
    async fn delete(&self, path: &str) -> Result<(), BlobError>;
}

fn new_blob_path(extension: &str) -> String {
    if extension.is_empty() {
        format!("{DOCUMENTS_PREFIX}/{}", Uuid::new_v4())
    } else {
        format!("{DOCUMENTS_PREFIX}/{}.{extension}", Uuid::new_v4())
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub root: PathBuf,
}

impl StorageConfig {
    pub fn from_env() -> Self {
        let root = std::env::var("STORAGE_DIR").unwrap_or_else(|_| "storage".to_string());
        Self { root: PathBuf::from(root) }
    }
}

/// Files on the local disk beneath a root directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.root.clone())
    }

    /// Stored paths are relative and may not climb out of the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, BlobError> {
        let relative = Path::new(path);
        let clean = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if path.is_empty() || !clean {
            return Err(BlobError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, bytes: Vec<u8>, extension: &str) -> Result<String, BlobError> {
        let path = new_blob_path(extension);
        let full = self.resolve(&path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;
        Ok(path)
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, BlobError> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(BlobError::NotFound(path.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, BlobError> {
        let full = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&full).await?)
    }

    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-memory blob store for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bytes: Vec<u8>, extension: &str) -> Result<String, BlobError> {
        let path = new_blob_path(extension);
        self.blobs.write().await.insert(path.clone(), bytes);
        Ok(path)
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, BlobError> {
        self.blobs
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(path.to_string()))
    }

    async fn exists(&self, path: &str) -> Result<bool, BlobError> {
        Ok(self.blobs.read().await.contains_key(path))
    }

    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        self.blobs.write().await.remove(path);
        Ok(())
    }
}
