//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::keys;
use crate::DeploymentMode;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use stowage_core::AppError;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(msg) => AppError::NotFound(msg),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::AlreadyExists(key) => {
                AppError::InvalidInput(format!("File already exists: {}", key))
            }
            StorageError::UnknownAttribute(name) => {
                AppError::InvalidInput(format!("Unknown attribute: {}", name))
            }
            StorageError::UploadFailed(msg)
            | StorageError::DownloadFailed(msg)
            | StorageError::DeleteFailed(msg)
            | StorageError::BackendError(msg) => AppError::Storage(msg),
            StorageError::IoError(err) => AppError::Internal(format!("IO error: {}", err)),
            StorageError::ConfigError(msg) => AppError::Configuration(msg),
        }
    }
}

/// Upload content as an owned async reader.
pub type ContentReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Download content as a stream of chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Storage abstraction trait
///
/// Both backends (local filesystem, S3-compatible object store) implement this
/// trait so the router can pick one per call without knowing either.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write the reader's content to `storage_key`, replacing any existing file.
    /// Returns the number of bytes written.
    async fn put_stream(&self, storage_key: &str, reader: ContentReader) -> StorageResult<u64>;

    /// Store content under `prefix` with a backend-chosen file name and return its key.
    async fn store_under_prefix(
        &self,
        prefix: &str,
        extension: &str,
        reader: ContentReader,
    ) -> StorageResult<String> {
        let key = keys::generated_key(prefix, extension);
        self.put_stream(&key, reader).await?;
        Ok(key)
    }

    /// Download a file by its storage key
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Download a file as a stream (for serving without buffering)
    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream>;

    /// Delete every key. Returns `true` only if the backend reports all deletions
    /// as successful; there is no per-key result.
    async fn delete(&self, storage_keys: &[String]) -> StorageResult<bool>;

    /// Check if a file exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// URL under which the file is served. Never checks that the file exists.
    fn url(&self, storage_key: &str) -> String;

    /// The mode this backend serves
    fn backend_type(&self) -> DeploymentMode;
}
