use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, error, info};

use super::{ObjectStorage, normalize_blob_name};
use crate::error::{VideoError, VideoResult};

/// Buckets as directories under a base directory. Used for local development
/// and for exercising the orchestrator without a cloud account.
#[derive(Clone, Debug)]
pub struct LocalFileStorage {
    base_dir: PathBuf,
}

impl LocalFileStorage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn resolve_path(&self, bucket: &str, blob_name: &str) -> VideoResult<PathBuf> {
        let bucket_dir = self.bucket_dir(bucket)?;
        let relative = Path::new(normalize_blob_name(blob_name));
        if relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
        {
            return Err(VideoError::InvalidOption(format!(
                "blob name must be a plain relative path: {blob_name}"
            )));
        }
        Ok(bucket_dir.join(relative))
    }

    fn bucket_dir(&self, bucket: &str) -> VideoResult<PathBuf> {
        let bucket = bucket.trim();
        if bucket.is_empty() || bucket.contains('/') || bucket.contains('\\') || bucket == ".." || bucket == "." {
            return Err(VideoError::InvalidOption(format!("invalid bucket name: {bucket:?}")));
        }
        Ok(self.base_dir.join(bucket))
    }

    fn uri_for(path: &Path) -> String {
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        format!("file://{}", absolute.display())
    }
}

#[async_trait]
impl ObjectStorage for LocalFileStorage {
    async fn upload(&self, local_path: &Path, bucket: &str, blob_name: &str) -> VideoResult<String> {
        let destination = self.resolve_path(bucket, blob_name)?;
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| VideoError::Transport(err.to_string()))?;
        }
        fs::copy(local_path, &destination).await.map_err(|err| {
            error!(source = %local_path.display(), bucket, blob_name, error = %err, "local upload failed");
            VideoError::Transport(err.to_string())
        })?;
        info!(source = %local_path.display(), bucket, blob_name, "uploaded file to local bucket");
        Ok(Self::uri_for(&destination))
    }

    async fn download(&self, bucket: &str, blob_name: &str, local_path: &Path) -> VideoResult<()> {
        let source = self.resolve_path(bucket, blob_name)?;
        fs::copy(&source, local_path).await.map_err(|err| {
            error!(bucket, blob_name, error = %err, "local download failed");
            VideoError::Transport(err.to_string())
        })?;
        debug!(bucket, blob_name, destination = %local_path.display(), "downloaded blob from local bucket");
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> VideoResult<Vec<String>> {
        let root = self.bucket_dir(bucket)?;
        let prefix = normalize_blob_name(prefix);
        let mut pending = vec![root.clone()];
        let mut names = Vec::new();

        while let Some(dir_path) = pending.pop() {
            let mut dir = match fs::read_dir(&dir_path).await {
                Ok(dir) => dir,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(VideoError::Transport(err.to_string())),
            };
            while let Some(entry) = dir
                .next_entry()
                .await
                .map_err(|err| VideoError::Transport(err.to_string()))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|err| VideoError::Transport(err.to_string()))?;
                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&root) else {
                    continue;
                };
                let name = relative
                    .components()
                    .map(|component| component.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if name.starts_with(prefix) {
                    names.push(name);
                }
            }
        }

        names.sort();
        Ok(names)
    }
}
