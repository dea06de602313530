use std::collections::HashMap;
use std::path::Path as LocalPath;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload};
use tokio::fs;
use tracing::{debug, error, info};

use super::{ObjectStorage, normalize_blob_name};
use crate::error::{VideoError, VideoResult};

type StoreFactory = dyn Fn(&str) -> object_store::Result<Arc<dyn ObjectStore>> + Send + Sync;

/// Cloud buckets through `object_store`. One store is built lazily per bucket
/// name and reused for the lifetime of this value.
pub struct BucketStore {
    scheme: &'static str,
    factory: Box<StoreFactory>,
    stores: Mutex<HashMap<String, Arc<dyn ObjectStore>>>,
}

impl BucketStore {
    /// Google Cloud Storage, credentials taken from the `GOOGLE_*` environment.
    pub fn gcs() -> Self {
        Self::with_factory("gs", |bucket| {
            let store = GoogleCloudStorageBuilder::from_env()
                .with_bucket_name(bucket)
                .build()?;
            Ok(Arc::new(store) as Arc<dyn ObjectStore>)
        })
    }

    /// Process-local buckets that vanish with this value.
    pub fn in_memory() -> Self {
        Self::with_factory("memory", |_| Ok(Arc::new(InMemory::new()) as Arc<dyn ObjectStore>))
    }

    pub fn with_factory<F>(scheme: &'static str, factory: F) -> Self
    where
        F: Fn(&str) -> object_store::Result<Arc<dyn ObjectStore>> + Send + Sync + 'static,
    {
        Self {
            scheme,
            factory: Box::new(factory),
            stores: Mutex::new(HashMap::new()),
        }
    }

    fn store(&self, bucket: &str) -> VideoResult<Arc<dyn ObjectStore>> {
        let bucket = bucket.trim();
        if bucket.is_empty() {
            return Err(VideoError::InvalidOption("bucket name must not be empty".to_string()));
        }
        let mut stores = self
            .stores
            .lock()
            .map_err(|_| VideoError::Transport("bucket store cache is poisoned".to_string()))?;
        if let Some(store) = stores.get(bucket) {
            return Ok(store.clone());
        }
        let store = (self.factory)(bucket)?;
        stores.insert(bucket.to_string(), store.clone());
        Ok(store)
    }

    pub fn uri(&self, bucket: &str, blob_name: &str) -> String {
        format!("{}://{}/{}", self.scheme, bucket.trim(), normalize_blob_name(blob_name))
    }
}

#[async_trait]
impl ObjectStorage for BucketStore {
    async fn upload(&self, local_path: &LocalPath, bucket: &str, blob_name: &str) -> VideoResult<String> {
        let store = self.store(bucket)?;
        let data = fs::read(local_path)
            .await
            .map_err(|err| VideoError::Transport(err.to_string()))?;
        let size = data.len();
        let location = Path::from(normalize_blob_name(blob_name));
        store
            .put(&location, PutPayload::from(Bytes::from(data)))
            .await
            .map_err(|err| {
                error!(bucket, blob_name, size_bytes = size, error = %err, "object upload failed");
                VideoError::from(err)
            })?;
        let uri = self.uri(bucket, blob_name);
        info!(source = %local_path.display(), %uri, size_bytes = size, "uploaded file to object storage");
        Ok(uri)
    }

    async fn download(&self, bucket: &str, blob_name: &str, local_path: &LocalPath) -> VideoResult<()> {
        let store = self.store(bucket)?;
        let location = Path::from(normalize_blob_name(blob_name));
        let fetched = match store.get(&location).await {
            Ok(response) => response.bytes().await,
            Err(err) => Err(err),
        };
        let bytes = fetched.map_err(|err| {
            error!(bucket, blob_name, error = %err, "object download failed");
            VideoError::from(err)
        })?;
        fs::write(local_path, &bytes)
            .await
            .map_err(|err| VideoError::Transport(err.to_string()))?;
        debug!(bucket, blob_name, destination = %local_path.display(), size_bytes = bytes.len(), "downloaded blob");
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> VideoResult<Vec<String>> {
        let store = self.store(bucket)?;
        let prefix = normalize_blob_name(prefix);
        // object_store lists whole segments; blob prefixes are plain string prefixes.
        let location = prefix
            .rfind('/')
            .map(|end| &prefix[..end])
            .filter(|parent| !parent.is_empty())
            .map(Path::from);
        let mut names: Vec<String> = store
            .list(location.as_ref())
            .map_ok(|meta| meta.location.to_string())
            .try_collect()
            .await
            .map_err(|err| {
                error!(bucket, prefix, error = %err, "object listing failed");
                VideoError::from(err)
            })?;
        names.retain(|name| name.starts_with(prefix));
        names.sort();
        debug!(bucket, prefix, count = names.len(), "listed blobs");
        Ok(names)
    }
}
