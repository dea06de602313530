use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tempfile::NamedTempFile;
use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::error::{VideoError, VideoResult};
use crate::generation::{
    GenerationRequest, GenerationResult, UploadOutcome, VideoGenerationClient, VideoGenerator, random_suffix,
};
use crate::media::{Concatenator, FfmpegBackend, VideoConcatenator};
use crate::prompt::{AspectRatio, ContentPolicy, Prompt};
use crate::storage::records::record_blob_name;
use crate::storage::{ObjectStorage, SAVED_PROMPTS_PREFIX, StoredPromptRecord, storage_from_settings};

const SCRATCH_PREFIX: &str = "temp_prompt_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedPrompt {
    pub blob_name: String,
    pub uri: String,
    pub record: StoredPromptRecord,
}

pub struct PromptOrchestrator {
    generator: Arc<dyn VideoGenerator>,
    concatenator: Arc<dyn VideoConcatenator>,
    storage: Arc<dyn ObjectStorage>,
    bucket: Option<String>,
    output_dir: PathBuf,
    scratch_dir: PathBuf,
}

impl PromptOrchestrator {
    pub fn new(
        settings: &Settings,
        generator: Arc<dyn VideoGenerator>,
        concatenator: Arc<dyn VideoConcatenator>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            generator,
            concatenator,
            storage,
            bucket: settings.bucket.clone(),
            output_dir: settings.output_dir.clone(),
            scratch_dir: settings.scratch_dir.clone(),
        }
    }

    /// Wires the production generation client, ffmpeg and the configured storage backend.
    pub fn from_settings(settings: &Settings) -> Self {
        let storage = storage_from_settings(settings);
        let generator = Arc::new(VideoGenerationClient::new(settings, storage.clone()));
        let concatenator = Arc::new(Concatenator::new(FfmpegBackend::new(
            settings.ffmpeg_path.clone(),
            settings.scratch_dir.clone(),
        )));
        Self::new(settings, generator, concatenator, storage)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub async fn process(
        &self,
        prompt: &str,
        aspect_ratio: Option<AspectRatio>,
        content_policy: Option<ContentPolicy>,
    ) -> GenerationResult {
        info!(prompt, ?aspect_ratio, ?content_policy, "received prompt");
        let prompt = Prompt::new(prompt)
            .inspect_err(|err| error!(error = %err, "rejected prompt"))?
            .with_aspect_ratio(aspect_ratio)
            .with_content_policy(content_policy);

        let request = GenerationRequest::from(&prompt);
        self.generator.generate(&request).await
    }

    /// Uploads a video from the output directory.
    pub async fn upload_video(&self, video_path: &Path, blob_name: Option<&str>) -> VideoResult<UploadOutcome> {
        let video_path = self.media_path(video_path).await?;
        self.generator.upload_result(&video_path, blob_name).await
    }

    /// Joins videos from the output directory into `{OUTPUT_DIR}/concatenated_{hex}.mp4`.
    pub async fn concatenate(&self, video_paths: &[PathBuf]) -> VideoResult<PathBuf> {
        if video_paths.len() < 2 {
            return Err(VideoError::InsufficientInput {
                provided: video_paths.len(),
            });
        }
        let mut inputs = Vec::with_capacity(video_paths.len());
        for path in video_paths {
            inputs.push(self.media_path(path).await?);
        }
        let output = self
            .output_dir
            .join(format!("concatenated_{}.mp4", random_suffix()));
        self.concatenator.concatenate(&inputs, &output).await
    }

    /// Resolves a caller-supplied path to an existing file inside the output
    /// directory. Relative paths are taken from the output directory.
    async fn media_path(&self, path: &Path) -> VideoResult<PathBuf> {
        let candidate = if path.is_relative() {
            self.output_dir.join(path)
        } else {
            path.to_path_buf()
        };
        let outside = || {
            warn!(path = %path.display(), "rejected path outside the output directory");
            VideoError::InvalidOption(format!(
                "{} is not inside the output directory {}",
                path.display(),
                self.output_dir.display()
            ))
        };

        let root = fs::canonicalize(&self.output_dir).await.map_err(|_| outside())?;
        match fs::canonicalize(&candidate).await {
            Ok(resolved) if resolved.starts_with(&root) => Ok(resolved),
            Ok(_) => Err(outside()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let inside = match (std::path::absolute(&candidate), std::path::absolute(&self.output_dir)) {
                    (Ok(candidate), Ok(output_dir)) => candidate.starts_with(output_dir),
                    _ => false,
                };
                if inside {
                    Err(VideoError::FileNotFound(path.to_path_buf()))
                } else {
                    Err(outside())
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Stores the prompt as a new record. Saving the same text twice yields two records.
    pub async fn save_prompt(&self, prompt: &str) -> VideoResult<SavedPrompt> {
        let prompt = Prompt::new(prompt).inspect_err(|_| warn!("received an empty prompt, nothing to save"))?;
        let bucket = self.bucket()?;

        let saved_at = Utc::now();
        let record = StoredPromptRecord::new(prompt.text(), saved_at);
        let blob_name = record_blob_name(&saved_at, prompt.text(), &random_suffix());

        let scratch = self.scratch_file().await?;
        fs::write(scratch.path(), record.to_json()?).await?;
        debug!(path = %scratch.path().display(), "prompt record written to scratch file");

        let uploaded = self.storage.upload(scratch.path(), bucket, &blob_name).await;
        remove_scratch(scratch);

        match uploaded {
            Ok(uri) => {
                info!(prompt = prompt.text(), %blob_name, "prompt saved");
                Ok(SavedPrompt { blob_name, uri, record })
            }
            Err(err) => {
                error!(prompt = prompt.text(), %blob_name, error = %err, "failed to save prompt");
                Err(err)
            }
        }
    }

    /// Prompt texts of all stored records, oldest first. Records that cannot be
    /// fetched or parsed are skipped.
    pub async fn list_saved_prompts(&self) -> VideoResult<Vec<String>> {
        let bucket = self.bucket()?;
        let blob_names = self.storage.list(bucket, SAVED_PROMPTS_PREFIX).await?;
        info!(count = blob_names.len(), "found saved prompt records");

        let mut prompts = Vec::with_capacity(blob_names.len());
        for blob_name in &blob_names {
            match self.read_record(bucket, blob_name).await {
                Ok(record) => prompts.push(record.prompt),
                Err(err) => warn!(%blob_name, error = %err, "skipping saved prompt record"),
            }
        }
        Ok(prompts)
    }

    async fn read_record(&self, bucket: &str, blob_name: &str) -> VideoResult<StoredPromptRecord> {
        let scratch = self.scratch_file().await?;
        let fetched = match self.storage.download(bucket, blob_name, scratch.path()).await {
            Ok(()) => fs::read(scratch.path()).await.map_err(VideoError::from),
            Err(err) => Err(err),
        };
        remove_scratch(scratch);
        StoredPromptRecord::parse(blob_name, &fetched?)
    }

    fn bucket(&self) -> VideoResult<&str> {
        self.bucket.as_deref().ok_or(VideoError::StorageNotConfigured)
    }

    async fn scratch_file(&self) -> VideoResult<NamedTempFile> {
        fs::create_dir_all(&self.scratch_dir).await?;
        let file = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .suffix(".json")
            .tempfile_in(&self.scratch_dir)?;
        Ok(file)
    }
}

fn remove_scratch(scratch: NamedTempFile) {
    let path = scratch.path().to_path_buf();
    match scratch.close() {
        Ok(()) => debug!(path = %path.display(), "scratch file removed"),
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove scratch file"),
    }
}
