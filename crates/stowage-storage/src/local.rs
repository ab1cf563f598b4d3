use crate::traits::{ByteStream, ContentReader, Storage, StorageError, StorageResult};
use crate::DeploymentMode;
use async_trait::async_trait;
use futures::StreamExt;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Local filesystem storage implementation
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "storage/app")
    /// * `base_url` - URL of the file-serving endpoint (e.g., "http://localhost:4000/storage")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        let base_path = fs::canonicalize(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to canonicalize storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
        })
    }

    /// Canonical storage root
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Convert storage key to filesystem path with security validation
    ///
    /// A leading `/` is dropped so keys stay relative to the storage root. Every
    /// other component must be plain, and the deepest existing ancestor of the
    /// result must canonicalize to a path inside the storage root, so symlinks
    /// cannot lead out of it either.
    pub async fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if storage_key.is_empty() || storage_key.contains('\0') {
            return Err(StorageError::InvalidKey(
                "Storage key is empty or contains invalid characters".to_string(),
            ));
        }

        let mut relative = PathBuf::new();
        for (index, component) in Path::new(storage_key).components().enumerate() {
            match component {
                Component::Normal(part) => relative.push(part),
                Component::CurDir => {}
                Component::RootDir if index == 0 => {}
                _ => {
                    return Err(StorageError::InvalidKey(
                        "Storage key contains invalid characters".to_string(),
                    ))
                }
            }
        }
        if relative.as_os_str().is_empty() {
            return Err(StorageError::InvalidKey(
                "Storage key does not name a file".to_string(),
            ));
        }

        let path = self.base_path.join(&relative);

        let mut existing = path.clone();
        while !fs::try_exists(&existing).await.unwrap_or(false) {
            if !existing.pop() {
                break;
            }
        }

        let canonical = fs::canonicalize(&existing).await.map_err(|e| {
            StorageError::InvalidKey(format!("Failed to resolve storage key: {}", e))
        })?;

        if !canonical.starts_with(&self.base_path) {
            return Err(StorageError::InvalidKey(
                "Storage key resolves outside storage directory".to_string(),
            ));
        }

        Ok(path)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put_stream(&self, storage_key: &str, mut reader: ContentReader) -> StorageResult<u64> {
        let path = self.key_to_path(storage_key).await?;
        let start = std::time::Instant::now();

        self.ensure_parent_dir(&path).await?;

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        // A failing reader leaves whatever was copied so far; nothing is cleaned up.
        let bytes_copied = tokio::io::copy(&mut reader, &mut file).await?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = bytes_copied,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(bytes_copied)
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(storage_key).await?;

        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(storage_key.to_string()))
            }
            Err(e) => Err(StorageError::DownloadFailed(format!(
                "Failed to read file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream> {
        let path = self.key_to_path(storage_key).await?;

        if !fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false) {
            return Err(StorageError::NotFound(storage_key.to_string()));
        }

        let file = fs::File::open(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to open file {}: {}", path.display(), e))
        })?;

        let key = storage_key.to_string();
        let stream = tokio_util::io::ReaderStream::new(file).map(move |result| {
            result.map_err(|e| {
                tracing::error!(key = %key, error = %e, "Local storage stream download error");
                StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        Ok(Box::pin(stream))
    }

    async fn delete(&self, storage_keys: &[String]) -> StorageResult<bool> {
        let mut all_deleted = true;

        for storage_key in storage_keys {
            let path = self.key_to_path(storage_key).await?;

            match fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::info!(
                        path = %path.display(),
                        key = %storage_key,
                        "Local storage delete successful"
                    );
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!(key = %storage_key, "Local storage delete: file missing");
                    all_deleted = false;
                }
                Err(e) => {
                    return Err(StorageError::DeleteFailed(format!(
                        "Failed to delete file {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }

        Ok(all_deleted)
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key).await?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    fn url(&self, storage_key: &str) -> String {
        format!(
            "{}?path={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(storage_key)
        )
    }

    fn backend_type(&self) -> DeploymentMode {
        DeploymentMode::Local
    }
}
