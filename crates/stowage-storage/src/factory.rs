#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{OverwritePolicy, Storage, StorageError, StorageResult, StorageRouter};
use std::sync::Arc;
use stowage_core::Config;

/// Create the storage router based on configuration
///
/// The local backend is always built. The remote backend is built when
/// `S3_BUCKET` is set, and is required when the configured mode is remote.
pub async fn create_storage_router(config: &Config) -> StorageResult<StorageRouter> {
    let local = create_local_storage(config).await?;
    let remote = create_remote_storage(config).await?;

    let mode = config.mode_source();
    let current = mode.current_mode();
    if current.is_remote() && remote.is_none() {
        return Err(StorageError::ConfigError(
            "remote mode selected but S3_BUCKET is not configured".to_string(),
        ));
    }

    let overwrite = if config.overwrite_existing {
        OverwritePolicy::Overwrite
    } else {
        OverwritePolicy::Reject
    };

    let mut router = StorageRouter::new(local, mode).with_overwrite_policy(overwrite);
    if let Some(remote) = remote {
        router = router.with_remote(remote);
    }

    tracing::info!(
        mode = %current,
        remote_configured = router.has_remote(),
        overwrite = ?overwrite,
        "Storage router initialized"
    );

    Ok(router)
}

#[cfg(feature = "storage-local")]
async fn create_local_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    let storage = LocalStorage::new(
        config.local_storage_path.clone(),
        config.local_storage_base_url.clone(),
    )
    .await?;
    Ok(Arc::new(storage))
}

#[cfg(not(feature = "storage-local"))]
async fn create_local_storage(_config: &Config) -> StorageResult<Arc<dyn Storage>> {
    Err(StorageError::ConfigError(
        "Local storage backend not available (storage-local feature not enabled)".to_string(),
    ))
}

#[cfg(feature = "storage-s3")]
async fn create_remote_storage(config: &Config) -> StorageResult<Option<Arc<dyn Storage>>> {
    let Some(bucket) = config.s3_bucket().map(String::from) else {
        return Ok(None);
    };
    let region = config.s3_region().map(String::from).ok_or_else(|| {
        StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
    })?;
    let endpoint = config.s3_endpoint().map(String::from);

    let storage = S3Storage::new(bucket, region, endpoint).await?;
    Ok(Some(Arc::new(storage)))
}

#[cfg(not(feature = "storage-s3"))]
async fn create_remote_storage(config: &Config) -> StorageResult<Option<Arc<dyn Storage>>> {
    if config.remote_configured() {
        return Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        ));
    }
    Ok(None)
}
