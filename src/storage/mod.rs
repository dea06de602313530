//! Buckets are addressed by name on every call; blob names are bucket-relative
//! paths using `/` as separator. Every operation is a single attempt and
//! reports backend failures as `VideoError::Transport` with the original text.

pub mod cloud;
pub mod hash;
pub mod local;
pub mod records;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Settings, StorageBackend};
use crate::error::VideoResult;

pub use cloud::BucketStore;
pub use hash::compute_hash;
pub use local::LocalFileStorage;
pub use records::{GENERATED_VIDEOS_PREFIX, SAVED_PROMPTS_PREFIX, StoredPromptRecord};

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Copies a local file into the bucket and returns the blob's URI.
    async fn upload(&self, local_path: &Path, bucket: &str, blob_name: &str) -> VideoResult<String>;

    async fn download(&self, bucket: &str, blob_name: &str, local_path: &Path) -> VideoResult<()>;

    /// Blob names under `prefix`, sorted. No match is an empty list, not an error.
    async fn list(&self, bucket: &str, prefix: &str) -> VideoResult<Vec<String>>;
}

pub fn storage_from_settings(settings: &Settings) -> Arc<dyn ObjectStorage> {
    match settings.storage_backend {
        StorageBackend::Gcs => Arc::new(BucketStore::gcs()),
        StorageBackend::Local => Arc::new(LocalFileStorage::new(settings.storage_dir.clone())),
    }
}

pub(crate) fn normalize_blob_name(blob_name: &str) -> &str {
    blob_name.trim_start_matches('/')
}
