//! Sends one generation request per call and writes the resulting video into
//! the output directory. The response contract is fixed by configuration
//! ([`ResponseMode`]): either the generate call streams the video back, or it
//! returns a generation id that is polled until the backend reports a video URL.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::{ResponseMode, Settings};
use crate::error::{VideoError, VideoResult};
use crate::prompt::{AspectRatio, ContentPolicy, Prompt};
use crate::storage::ObjectStorage;
use crate::storage::records::video_blob_name;

const PROMPT_SLUG_LEN: usize = 20;
const MAX_GENERATION_ID_FILENAME_LEN: usize = 64;

/// Built per call from a validated prompt and dropped once the response is consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub aspect_ratio: Option<AspectRatio>,
    pub content_policy: Option<ContentPolicy>,
}

impl From<&Prompt> for GenerationRequest {
    fn from(prompt: &Prompt) -> Self {
        Self {
            prompt: prompt.text().to_string(),
            aspect_ratio: prompt.aspect_ratio,
            content_policy: prompt.content_policy,
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    person_generation: Option<&'static str>,
}

impl<'a> From<&'a GenerationRequest> for GenerateBody<'a> {
    fn from(request: &'a GenerationRequest) -> Self {
        Self {
            prompt: &request.prompt,
            aspect_ratio: request.aspect_ratio.map(|ratio| ratio.as_str()),
            person_generation: request.content_policy.map(|policy| policy.as_str()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    generation_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerationStatusResponse {
    status: Option<String>,
    video_url: Option<String>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<String>,
    message: Option<String>,
}

/// A video that was written to local storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedVideo {
    pub path: PathBuf,
    pub generation_id: Option<String>,
    pub size_bytes: u64,
}

pub type GenerationResult = VideoResult<GeneratedVideo>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    Uploaded { uri: String, blob_name: String },
    Skipped { reason: String },
}

#[async_trait]
pub trait VideoGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> GenerationResult;

    /// Copies a generated video into the configured bucket.
    async fn upload_result(&self, video_path: &Path, blob_name: Option<&str>) -> VideoResult<UploadOutcome>;
}

pub struct VideoGenerationClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    response_mode: ResponseMode,
    poll_interval: Duration,
    poll_timeout: Duration,
    output_dir: PathBuf,
    storage: Arc<dyn ObjectStorage>,
    bucket: Option<String>,
}

impl fmt::Debug for VideoGenerationClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoGenerationClient")
            .field("base_url", &self.base_url.as_str())
            .field("response_mode", &self.response_mode)
            .field("output_dir", &self.output_dir)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl VideoGenerationClient {
    pub fn new(settings: &Settings, storage: Arc<dyn ObjectStorage>) -> Self {
        let client = Self {
            client: reqwest::Client::new(),
            base_url: settings.api_base_url.clone(),
            api_key: settings.api_key.clone(),
            response_mode: settings.response_mode,
            poll_interval: settings.poll_interval,
            poll_timeout: settings.poll_timeout,
            output_dir: settings.output_dir.clone(),
            storage,
            bucket: settings.bucket.clone(),
        };
        info!(
            endpoint = %client.base_url,
            output_dir = %client.output_dir.display(),
            bucket = ?client.bucket,
            "video generation client initialized"
        );
        client
    }

    /// Appends `segments` to the base URL, each percent-encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> VideoResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| VideoError::InvalidOption(format!("API base URL {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub fn generate_url(&self) -> VideoResult<Url> {
        self.endpoint(&["generate"])
    }

    pub fn status_url(&self, generation_id: &str) -> VideoResult<Url> {
        self.endpoint(&["generations", generation_id])
    }

    /// Only the API's own origin receives the bearer token.
    fn shares_api_origin(&self, url: &Url) -> bool {
        url.origin() == self.base_url.origin()
    }

    async fn generate_video(&self, request: &GenerationRequest) -> GenerationResult {
        let api_key = self.api_key.as_deref().ok_or(VideoError::MissingCredential)?;
        fs::create_dir_all(&self.output_dir).await?;

        let body = GenerateBody::from(request);
        let endpoint = self.generate_url()?;
        info!(%endpoint, body = ?body, "sending video generation request");
        let response = self
            .client
            .post(endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        let response = assert_ok_response(response).await?;

        match self.response_mode {
            ResponseMode::Stream => {
                let path = self.output_dir.join(stream_file_name(&request.prompt));
                let size_bytes = download_to(response, &path).await?;
                Ok(GeneratedVideo {
                    path,
                    generation_id: None,
                    size_bytes,
                })
            }
            ResponseMode::Tracked => {
                let submitted: SubmitResponse = response.json().await?;
                let generation_id = submitted
                    .generation_id
                    .filter(|id| !id.trim().is_empty())
                    .ok_or_else(|| VideoError::Transport("generation backend returned no generation_id".to_string()))?;
                info!(%generation_id, "generation submitted");

                let video_url = self.poll_generation(api_key, &generation_id).await?;
                let video_url = validate_download_url(&video_url)?;
                let download = if self.shares_api_origin(&video_url) {
                    self.client.get(video_url).bearer_auth(api_key)
                } else {
                    debug!(host = video_url.host_str().unwrap_or_default(), "downloading video without API credentials");
                    self.client.get(video_url)
                };
                let response = download.send().await?;
                let response = assert_ok_response(response).await?;

                let path = self
                    .output_dir
                    .join(format!("{}.mp4", sanitize_generation_id(&generation_id)));
                let size_bytes = download_to(response, &path).await?;
                Ok(GeneratedVideo {
                    path,
                    generation_id: Some(generation_id),
                    size_bytes,
                })
            }
        }
    }

    async fn poll_generation(&self, api_key: &str, generation_id: &str) -> VideoResult<String> {
        let status_url = self.status_url(generation_id)?;
        let deadline = Instant::now() + self.poll_timeout;
        let mut poll_count = 0u32;

        while Instant::now() <= deadline {
            poll_count += 1;
            let response = self
                .client
                .get(status_url.clone())
                .bearer_auth(api_key)
                .send()
                .await?;
            let response = assert_ok_response(response).await?;
            let payload: GenerationStatusResponse = response.json().await?;
            let status = payload
                .status
                .ok_or_else(|| VideoError::Transport("generation backend returned no status".to_string()))?;
            debug!(generation_id, poll_count, %status, "polled generation status");

            match status.to_ascii_lowercase().as_str() {
                "succeeded" | "completed" => {
                    return payload.video_url.ok_or_else(|| {
                        VideoError::Transport("generation succeeded without a video_url".to_string())
                    });
                }
                "failed" | "error" => {
                    let detail = payload
                        .error
                        .map(|err| {
                            format!(
                                "code={}, message={}",
                                err.code.unwrap_or_default(),
                                err.message.unwrap_or_default()
                            )
                        })
                        .unwrap_or_else(|| "unknown error".to_string());
                    return Err(VideoError::Transport(format!("video generation failed: {detail}")));
                }
                _ => sleep(self.poll_interval).await,
            }
        }

        Err(VideoError::Transport(format!(
            "video generation timed out (generation_id={generation_id}, poll_count={poll_count})"
        )))
    }
}

#[async_trait]
impl VideoGenerator for VideoGenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        match self.generate_video(request).await {
            Ok(video) => {
                info!(path = %video.path.display(), size_bytes = video.size_bytes, "video generation succeeded");
                Ok(video)
            }
            Err(err) => {
                error!(error = %err, "video generation failed");
                Err(err)
            }
        }
    }

    async fn upload_result(&self, video_path: &Path, blob_name: Option<&str>) -> VideoResult<UploadOutcome> {
        let Some(bucket) = self.bucket.as_deref() else {
            let reason = "storage bucket is not configured, skipping video upload".to_string();
            warn!(path = %video_path.display(), "{reason}");
            return Ok(UploadOutcome::Skipped { reason });
        };
        if !fs::try_exists(video_path).await.unwrap_or(false) {
            error!(path = %video_path.display(), "video file not found");
            return Err(VideoError::FileNotFound(video_path.to_path_buf()));
        }

        let blob_name = match blob_name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => name.to_string(),
            None => {
                let file_name = video_path
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
                    .ok_or_else(|| VideoError::FileNotFound(video_path.to_path_buf()))?;
                video_blob_name(&file_name)
            }
        };

        let uri = self.storage.upload(video_path, bucket, &blob_name).await?;
        info!(%uri, "video uploaded");
        Ok(UploadOutcome::Uploaded { uri, blob_name })
    }
}

async fn assert_ok_response(response: reqwest::Response) -> VideoResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let text: String = text.chars().take(500).collect();
    Err(VideoError::Transport(format!(
        "video generation request failed: {status} {text}"
    )))
}

/// Streams the body into a new file at `path`. An existing file is never
/// overwritten; a partially written one is removed on failure.
async fn download_to(response: reqwest::Response, path: &Path) -> VideoResult<u64> {
    let file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    match write_body(response, file, path).await {
        Ok(size) => Ok(size),
        Err(err) => {
            if let Err(remove_err) = fs::remove_file(path).await {
                debug!(path = %path.display(), error = %remove_err, "no partial download to remove");
            }
            Err(err)
        }
    }
}

async fn write_body(mut response: reqwest::Response, mut file: fs::File, path: &Path) -> VideoResult<u64> {
    debug!(path = %path.display(), "downloading generated video");
    let mut total_bytes = 0u64;
    while let Some(chunk) = response.chunk().await? {
        total_bytes = total_bytes.saturating_add(chunk.len() as u64);
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(total_bytes)
}

fn validate_download_url(raw: &str) -> VideoResult<Url> {
    let parsed = Url::parse(raw)
        .map_err(|err| VideoError::Transport(format!("invalid video_url {raw:?}: {err}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(VideoError::Transport(format!(
            "unsupported video_url scheme {scheme:?}, only http and https are allowed"
        ))),
    }
}

fn slug_char(c: char) -> char {
    if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' }
}

/// `veo_generated_{first 20 prompt chars}_{8 random hex}.mp4`
pub fn stream_file_name(prompt: &str) -> String {
    let slug: String = prompt.trim().chars().take(PROMPT_SLUG_LEN).map(slug_char).collect();
    format!("veo_generated_{slug}_{}.mp4", random_suffix())
}

pub fn random_suffix() -> String {
    hex::encode(rand::random::<[u8; 4]>())
}

fn sanitize_generation_id(generation_id: &str) -> String {
    let sanitized: String = generation_id
        .chars()
        .map(slug_char)
        .take(MAX_GENERATION_ID_FILENAME_LEN)
        .collect();
    if sanitized.is_empty() {
        format!("generated_video_{}", random_suffix())
    } else {
        sanitized
    }
}
