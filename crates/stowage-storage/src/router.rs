//! Storage router
//!
//! Sends each upload, URL lookup and deletion to the local or the remote
//! backend according to the deployment mode at the time of the call.

use crate::keys;
use crate::model::Uploadable;
use crate::traits::{ContentReader, Storage, StorageError, StorageResult};
use std::path::Path;
use std::sync::Arc;
use stowage_core::{DeploymentMode, ModeSource};

/// What a local upload does when its derived key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// Replace the existing file without notice.
    #[default]
    Overwrite,
    /// Fail with [`StorageError::AlreadyExists`].
    Reject,
}

/// A file to upload: its content and the name the client gave it.
pub struct UploadRequest {
    content: ContentReader,
    original_file_name: String,
    original_extension: String,
}

impl UploadRequest {
    pub fn new(
        content: ContentReader,
        original_file_name: impl Into<String>,
        original_extension: impl Into<String>,
    ) -> Self {
        Self {
            content,
            original_file_name: original_file_name.into(),
            original_extension: original_extension.into(),
        }
    }

    pub fn from_bytes(
        data: impl Into<Vec<u8>>,
        original_file_name: impl Into<String>,
        original_extension: impl Into<String>,
    ) -> Self {
        Self::new(
            Box::pin(std::io::Cursor::new(data.into())),
            original_file_name,
            original_extension,
        )
    }

    /// Open a file on disk; its file name and extension become the original ones.
    pub async fn from_file(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;

        let original_file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let original_extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self::new(Box::pin(file), original_file_name, original_extension))
    }

    pub fn original_file_name(&self) -> &str {
        &self.original_file_name
    }

    pub fn original_extension(&self) -> &str {
        &self.original_extension
    }
}

/// A single name or an ordered list of names (storage keys or attribute names).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    One(String),
    Many(Vec<String>),
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        match self {
            Selection::One(name) => name.is_empty(),
            Selection::Many(names) => names.is_empty(),
        }
    }

    pub fn into_vec(self) -> Vec<String> {
        match self {
            Selection::One(name) => vec![name],
            Selection::Many(names) => names,
        }
    }
}

impl From<&str> for Selection {
    fn from(name: &str) -> Self {
        Selection::One(name.to_string())
    }
}

impl From<String> for Selection {
    fn from(name: String) -> Self {
        Selection::One(name)
    }
}

impl From<Vec<String>> for Selection {
    fn from(names: Vec<String>) -> Self {
        Selection::Many(names)
    }
}

impl From<Vec<&str>> for Selection {
    fn from(names: Vec<&str>) -> Self {
        Selection::Many(names.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for Selection {
    fn from(names: &[&str]) -> Self {
        Selection::Many(names.iter().map(|n| n.to_string()).collect())
    }
}

impl From<&[String]> for Selection {
    fn from(names: &[String]) -> Self {
        Selection::Many(names.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for Selection {
    fn from(names: [&str; N]) -> Self {
        Selection::Many(names.iter().map(|n| n.to_string()).collect())
    }
}

/// Routes storage operations to the backend selected by the current mode.
///
/// The mode is asked for on every call. A key is only meaningful to the
/// backend that produced it, so changing mode between an upload and a later
/// lookup yields a URL on the other backend.
pub struct StorageRouter {
    local: Arc<dyn Storage>,
    remote: Option<Arc<dyn Storage>>,
    mode: Arc<dyn ModeSource>,
    overwrite: OverwritePolicy,
}

impl StorageRouter {
    pub fn new(local: Arc<dyn Storage>, mode: Arc<dyn ModeSource>) -> Self {
        Self {
            local,
            remote: None,
            mode,
            overwrite: OverwritePolicy::default(),
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn Storage>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_overwrite_policy(mut self, overwrite: OverwritePolicy) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn current_mode(&self) -> DeploymentMode {
        self.mode.current_mode()
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    fn backend(&self) -> StorageResult<(DeploymentMode, &dyn Storage)> {
        let mode = self.mode.current_mode();
        let backend = match mode {
            DeploymentMode::Local => self.local.as_ref(),
            DeploymentMode::Remote => self.remote.as_deref().ok_or_else(|| {
                StorageError::ConfigError("remote storage backend not configured".to_string())
            })?,
        };
        Ok((mode, backend))
    }

    /// Upload a file and return its storage key. Save the key on the model.
    ///
    /// `base_path` falls back to [`Uploadable::base_upload_path`] when absent or empty.
    #[tracing::instrument(
        skip(self, owner, request),
        fields(file_name = %request.original_file_name)
    )]
    pub async fn upload<M: Uploadable + ?Sized>(
        &self,
        owner: &M,
        request: UploadRequest,
        base_path: Option<&str>,
    ) -> StorageResult<String> {
        let base_path = match base_path {
            Some(path) if !path.is_empty() => path.to_string(),
            _ => owner.base_upload_path(),
        };

        let (mode, backend) = self.backend()?;
        let UploadRequest {
            content,
            original_file_name,
            original_extension,
        } = request;

        let key = match mode {
            DeploymentMode::Remote => {
                backend
                    .store_under_prefix(
                        keys::remote_prefix(&base_path),
                        &original_extension,
                        content,
                    )
                    .await?
            }
            DeploymentMode::Local => {
                let key = keys::local_key(&base_path, &original_file_name, &original_extension);
                if self.overwrite == OverwritePolicy::Reject && backend.exists(&key).await? {
                    return Err(StorageError::AlreadyExists(key));
                }
                backend.put_stream(&key, content).await?;
                key
            }
        };

        tracing::debug!(mode = %mode, key = %key, "Upload stored");
        Ok(key)
    }

    /// URL for a storage key, or an empty string when there is no key.
    pub fn resolve_url(&self, key: &str) -> StorageResult<String> {
        if key.is_empty() {
            return Ok(String::new());
        }
        let (_, backend) = self.backend()?;
        Ok(backend.url(key))
    }

    /// URL for the key held by a model attribute; empty when the attribute holds none.
    pub fn upload_url_for<M: Uploadable + ?Sized>(
        &self,
        owner: &M,
        attribute: &str,
    ) -> StorageResult<String> {
        match owner.attribute(attribute)? {
            Some(key) => self.resolve_url(key),
            None => Ok(String::new()),
        }
    }

    /// Delete one key or several. Returns the backend's aggregate result.
    pub async fn delete_by_key(&self, keys: impl Into<Selection>) -> StorageResult<bool> {
        let keys: Vec<String> = keys
            .into()
            .into_vec()
            .into_iter()
            .filter(|key| !key.is_empty())
            .collect();

        if keys.is_empty() {
            return Err(StorageError::ConfigError(
                "delete_by_key needs at least one key to delete".to_string(),
            ));
        }

        self.delete_keys(&keys).await
    }

    /// Delete the files held by one attribute or several.
    pub async fn delete_upload_for<M: Uploadable + ?Sized>(
        &self,
        owner: &M,
        attributes: impl Into<Selection>,
    ) -> StorageResult<bool> {
        let attributes = attributes.into();
        if attributes.is_empty() {
            return Err(StorageError::ConfigError(
                "delete_upload_for needs at least one attribute to delete".to_string(),
            ));
        }

        let names = attributes.into_vec();
        let keys = collect_keys(owner, names.iter().map(String::as_str))?;
        self.delete_collected(keys).await
    }

    /// Delete the files held by every tracked attribute of the model.
    pub async fn delete_all_tracked<M: Uploadable + ?Sized>(
        &self,
        owner: &M,
    ) -> StorageResult<bool> {
        let tracked = owner.uploadable_attributes();
        if tracked.is_empty() {
            return Err(StorageError::ConfigError(
                "cannot delete any file: no uploadable attributes declared".to_string(),
            ));
        }

        let keys = collect_keys(owner, tracked)?;
        self.delete_collected(keys).await
    }

    async fn delete_collected(&self, keys: Vec<String>) -> StorageResult<bool> {
        if keys.is_empty() {
            tracing::debug!("No stored files referenced by the selected attributes");
            return Ok(true);
        }
        self.delete_keys(&keys).await
    }

    async fn delete_keys(&self, keys: &[String]) -> StorageResult<bool> {
        let (mode, backend) = self.backend()?;
        tracing::debug!(mode = %mode, keys = keys.len(), "Deleting stored files");
        backend.delete(keys).await
    }
}

/// Keys held by the named attributes, skipping attributes that hold none.
fn collect_keys<'a, M, I>(owner: &M, names: I) -> StorageResult<Vec<String>>
where
    M: Uploadable + ?Sized,
    I: IntoIterator<Item = &'a str>,
{
    let mut keys = Vec::new();
    for name in names {
        if let Some(key) = owner.attribute(name)? {
            if !key.is_empty() {
                keys.push(key.to_string());
            }
        }
    }
    Ok(keys)
}

#[cfg(all(test, feature = "storage-local", feature = "storage-s3"))]
mod tests {
    use super::*;
    use crate::local::LocalStorage;
    use crate::model::AttributeRecord;
    use crate::s3::S3Storage;
    use object_store::memory::InMemory;
    use std::io;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::task::{Context, Poll};
    use stowage_core::FixedMode;
    use tempfile::{tempdir, TempDir};
    use tokio::io::{AsyncRead, ReadBuf};

    /// Mode source that tests can flip between calls.
    #[derive(Default)]
    struct SwitchableMode(AtomicBool);

    impl SwitchableMode {
        fn set(&self, mode: DeploymentMode) {
            self.0.store(mode.is_remote(), Ordering::SeqCst);
        }
    }

    impl ModeSource for SwitchableMode {
        fn current_mode(&self) -> DeploymentMode {
            if self.0.load(Ordering::SeqCst) {
                DeploymentMode::Remote
            } else {
                DeploymentMode::Local
            }
        }
    }

    struct FailingReader;

    impl AsyncRead for FailingReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::other("connection reset")))
        }
    }

    struct Fixture {
        _dir: TempDir,
        local: Arc<LocalStorage>,
        remote: Arc<S3Storage>,
        mode: Arc<SwitchableMode>,
        router: StorageRouter,
    }

    async fn fixture(mode: DeploymentMode) -> Fixture {
        let dir = tempdir().unwrap();
        let local = Arc::new(
            LocalStorage::new(dir.path(), "http://localhost:4000/storage".to_string())
                .await
                .unwrap(),
        );
        let remote = Arc::new(S3Storage::with_store(
            Arc::new(InMemory::new()),
            "uploads".to_string(),
            "eu-west-1".to_string(),
            None,
        ));
        let switch = Arc::new(SwitchableMode::default());
        switch.set(mode);

        let router = StorageRouter::new(local.clone(), switch.clone()).with_remote(remote.clone());

        Fixture {
            _dir: dir,
            local,
            remote,
            mode: switch,
            router,
        }
    }

    fn model() -> AttributeRecord {
        AttributeRecord::new("uploads/")
    }

    #[tokio::test]
    async fn local_upload_derives_key_from_file_name() {
        let f = fixture(DeploymentMode::Local).await;

        let key = f
            .router
            .upload(
                &model(),
                UploadRequest::from_bytes("hello", "a.txt", "txt"),
                Some("uploads/"),
            )
            .await
            .unwrap();

        assert_eq!(key, format!("uploads/{:x}.txt", md5::compute(b"a.txt")));
        assert_eq!(f.local.download(&key).await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn local_upload_is_deterministic_and_overwrites() {
        let f = fixture(DeploymentMode::Local).await;

        let first = f
            .router
            .upload(&model(), UploadRequest::from_bytes("v1", "report.pdf", "pdf"), None)
            .await
            .unwrap();
        let second = f
            .router
            .upload(&model(), UploadRequest::from_bytes("v2", "report.pdf", "pdf"), None)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(f.local.download(&second).await.unwrap(), b"v2");
    }

    #[tokio::test]
    async fn reject_policy_refuses_to_overwrite() {
        let f = fixture(DeploymentMode::Local).await;
        let router = StorageRouter::new(f.local.clone(), Arc::new(FixedMode(DeploymentMode::Local)))
            .with_overwrite_policy(OverwritePolicy::Reject);

        router
            .upload(&model(), UploadRequest::from_bytes("v1", "a.txt", "txt"), None)
            .await
            .unwrap();
        let result = router
            .upload(&model(), UploadRequest::from_bytes("v2", "a.txt", "txt"), None)
            .await;

        assert!(matches!(result, Err(StorageError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn upload_falls_back_to_model_base_path() {
        let f = fixture(DeploymentMode::Local).await;
        let owner = AttributeRecord::new("avatars/");

        let key = f
            .router
            .upload(&owner, UploadRequest::from_bytes("x", "me.png", "png"), Some(""))
            .await
            .unwrap();

        assert!(key.starts_with("avatars/"));
    }

    #[tokio::test]
    async fn remote_upload_uses_backend_naming() {
        let f = fixture(DeploymentMode::Remote).await;

        let key = f
            .router
            .upload(
                &model(),
                UploadRequest::from_bytes("hello", "a.txt", "txt"),
                Some("uploads//"),
            )
            .await
            .unwrap();

        assert!(key.starts_with("uploads/"));
        assert!(!key.starts_with("uploads//"));
        assert!(key.ends_with(".txt"));
        assert_ne!(key, format!("uploads/{:x}.txt", md5::compute(b"a.txt")));
        assert_eq!(f.remote.download(&key).await.unwrap(), b"hello");
        assert!(!f.local.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn failing_reader_surfaces_io_error() {
        let f = fixture(DeploymentMode::Local).await;

        let request = UploadRequest::new(Box::pin(FailingReader), "a.txt", "txt");
        let result = f.router.upload(&model(), request, None).await;

        assert!(matches!(result, Err(StorageError::IoError(_))));
    }

    #[tokio::test]
    async fn empty_key_resolves_to_empty_url_in_both_modes() {
        let f = fixture(DeploymentMode::Local).await;
        assert_eq!(f.router.resolve_url("").unwrap(), "");

        f.mode.set(DeploymentMode::Remote);
        assert_eq!(f.router.resolve_url("").unwrap(), "");
    }

    #[tokio::test]
    async fn empty_delete_is_a_configuration_error_in_both_modes() {
        let f = fixture(DeploymentMode::Local).await;

        for mode in [DeploymentMode::Local, DeploymentMode::Remote] {
            f.mode.set(mode);
            assert!(matches!(
                f.router.delete_by_key("").await,
                Err(StorageError::ConfigError(_))
            ));
            assert!(matches!(
                f.router.delete_by_key(Vec::<String>::new()).await,
                Err(StorageError::ConfigError(_))
            ));
        }
    }

    #[tokio::test]
    async fn delete_all_tracked_requires_tracked_attributes() {
        let f = fixture(DeploymentMode::Local).await;

        let result = f.router.delete_all_tracked(&model()).await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }

    #[tokio::test]
    async fn mode_switch_resolves_against_the_other_backend() {
        let f = fixture(DeploymentMode::Local).await;

        let key = f
            .router
            .upload(&model(), UploadRequest::from_bytes("hello", "a.txt", "txt"), None)
            .await
            .unwrap();
        assert_eq!(f.router.resolve_url(&key).unwrap(), f.local.url(&key));

        f.mode.set(DeploymentMode::Remote);
        let url = f.router.resolve_url(&key).unwrap();

        assert_eq!(url, f.remote.url(&key));
        assert!(url.starts_with("https://uploads.s3.eu-west-1.amazonaws.com/"));
        assert!(!f.remote.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn upload_delete_then_resolve_still_builds_url() {
        let f = fixture(DeploymentMode::Local).await;

        let key = f
            .router
            .upload(
                &model(),
                UploadRequest::from_bytes("hello", "a.txt", "txt"),
                Some("uploads/"),
            )
            .await
            .unwrap();
        assert_eq!(key, format!("uploads/{:x}.txt", md5::compute(b"a.txt")));

        assert!(f.router.delete_by_key(key.as_str()).await.unwrap());
        assert!(!f.local.exists(&key).await.unwrap());

        let url = f.router.resolve_url(&key).unwrap();
        assert_eq!(
            url,
            format!(
                "http://localhost:4000/storage?path=uploads%2F{:x}.txt",
                md5::compute(b"a.txt")
            )
        );
    }

    #[tokio::test]
    async fn attribute_operations_follow_the_model() {
        let f = fixture(DeploymentMode::Local).await;
        let mut owner = model().tracked("avatar").tracked("cover");

        assert_eq!(f.router.upload_url_for(&owner, "avatar").unwrap(), "");
        assert!(matches!(
            f.router.upload_url_for(&owner, "resume"),
            Err(StorageError::UnknownAttribute(_))
        ));

        let avatar = f
            .router
            .upload(&owner, UploadRequest::from_bytes("a", "me.png", "png"), None)
            .await
            .unwrap();
        let cover = f
            .router
            .upload(&owner, UploadRequest::from_bytes("c", "cover.jpg", "jpg"), None)
            .await
            .unwrap();
        owner.set("avatar", avatar.clone());
        owner.set("cover", cover.clone());

        assert_eq!(
            f.router.upload_url_for(&owner, "avatar").unwrap(),
            f.local.url(&avatar)
        );

        assert!(f.router.delete_upload_for(&owner, "avatar").await.unwrap());
        assert!(!f.local.exists(&avatar).await.unwrap());
        assert!(f.local.exists(&cover).await.unwrap());

        // The avatar file is already gone, so the aggregate result is false.
        assert!(!f.router.delete_all_tracked(&owner).await.unwrap());
        assert!(!f.local.exists(&cover).await.unwrap());
    }

    #[tokio::test]
    async fn delete_upload_for_rejects_empty_selection() {
        let f = fixture(DeploymentMode::Local).await;
        let owner = model().tracked("avatar");

        let result = f.router.delete_upload_for(&owner, Vec::<String>::new()).await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));

        // Attributes holding no key leave nothing to delete.
        assert!(f.router.delete_upload_for(&owner, ["avatar"]).await.unwrap());
    }

    #[tokio::test]
    async fn remote_mode_without_remote_backend_fails() {
        let f = fixture(DeploymentMode::Local).await;
        let router = StorageRouter::new(f.local.clone(), Arc::new(FixedMode(DeploymentMode::Remote)));

        assert!(!router.has_remote());
        assert!(matches!(
            router.resolve_url("uploads/a.txt"),
            Err(StorageError::ConfigError(_))
        ));
        assert!(matches!(
            router
                .upload(&model(), UploadRequest::from_bytes("x", "a.txt", "txt"), None)
                .await,
            Err(StorageError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn upload_from_file_uses_its_name() {
        let f = fixture(DeploymentMode::Local).await;
        let source = tempdir().unwrap();
        let path = source.path().join("notes.md");
        std::fs::write(&path, b"# notes").unwrap();

        let request = UploadRequest::from_file(&path).await.unwrap();
        assert_eq!(request.original_file_name(), "notes.md");
        assert_eq!(request.original_extension(), "md");

        let key = f.router.upload(&model(), request, None).await.unwrap();
        assert_eq!(key, format!("uploads/{:x}.md", md5::compute(b"notes.md")));
    }

    #[tokio::test]
    async fn local_upload_accepts_absolute_base_path() {
        let f = fixture(DeploymentMode::Local).await;

        let key = f
            .router
            .upload(
                &AttributeRecord::new("/avatars/"),
                UploadRequest::from_bytes("hi", "a.txt", "txt"),
                None,
            )
            .await
            .unwrap();

        assert_eq!(key, format!("/avatars/{:x}.txt", md5::compute(b"a.txt")));
        assert_eq!(f.local.download(&key).await.unwrap(), b"hi");
        assert!(f
            .local
            .base_path()
            .join(key.trim_start_matches('/'))
            .is_file());

        assert!(f.router.delete_by_key(key.as_str()).await.unwrap());
        assert!(!f.local.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn remote_mode_deletes_through_remote_backend() {
        let f = fixture(DeploymentMode::Remote).await;
        let mut owner = model().tracked("avatar").tracked("cover");

        let avatar = f
            .router
            .upload(&owner, UploadRequest::from_bytes("a", "a.png", "png"), None)
            .await
            .unwrap();
        let cover = f
            .router
            .upload(&owner, UploadRequest::from_bytes("c", "c.png", "png"), None)
            .await
            .unwrap();
        owner.set("avatar", avatar.clone());
        owner.set("cover", cover.clone());

        assert!(f.router.delete_by_key(avatar.as_str()).await.unwrap());
        assert!(!f.remote.exists(&avatar).await.unwrap());
        assert!(f.remote.exists(&cover).await.unwrap());

        assert!(f.router.delete_all_tracked(&owner).await.unwrap());
        assert!(!f.remote.exists(&cover).await.unwrap());
    }

    #[tokio::test]
    async fn empty_entries_in_key_list_are_skipped() {
        let f = fixture(DeploymentMode::Local).await;
        let key = f
            .router
            .upload(&model(), UploadRequest::from_bytes("x", "a.txt", "txt"), None)
            .await
            .unwrap();

        assert!(f
            .router
            .delete_by_key(vec!["".to_string(), key.clone()])
            .await
            .unwrap());
        assert!(!f.local.exists(&key).await.unwrap());

        assert!(matches!(
            f.router.delete_by_key(vec!["", ""]).await,
            Err(StorageError::ConfigError(_))
        ));
    }
}
