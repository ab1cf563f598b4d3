//! Stowage Storage Library
//!
//! This crate routes uploads, URL lookups and deletions for model attributes
//! to either the local filesystem or an S3-compatible object store, depending
//! on the deployment mode.
//!
//! # Storage key format
//!
//! - **Local mode**: `{base_path}{md5(original_file_name)}.{extension}`. The base
//!   path is concatenated as-is, so it normally ends with `/`. Uploading the same
//!   file name twice under the same base path replaces the first file.
//! - **Remote mode**: `{prefix}/{uuid}.{extension}`, where `prefix` is the base path
//!   without trailing slashes. The name is chosen by the backend.
//!
//! A key is only meaningful to the backend that produced it. Key generation is
//! centralized in the `keys` module.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod model;
pub mod router;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage_router;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use model::{AttributeRecord, Uploadable};
pub use router::{OverwritePolicy, Selection, StorageRouter, UploadRequest};
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use stowage_core::DeploymentMode;
pub use traits::{ByteStream, ContentReader, Storage, StorageError, StorageResult};
