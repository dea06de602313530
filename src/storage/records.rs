use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{VideoError, VideoResult};
use crate::storage::compute_hash;

pub const SAVED_PROMPTS_PREFIX: &str = "saved_prompts/";
pub const GENERATED_VIDEOS_PREFIX: &str = "generated_videos/";

const NAME_HASH_LEN: usize = 12;

/// A saved prompt as written to the bucket. Never rewritten once uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredPromptRecord {
    pub prompt: String,
    pub saved_at: String,
}

// Older records carried a compact timestamp and some have no timestamp at all,
// so only `prompt` is required when reading.
#[derive(Deserialize)]
struct RawPromptRecord {
    prompt: Option<String>,
    saved_at: Option<String>,
}

impl StoredPromptRecord {
    pub fn new(prompt: &str, saved_at: DateTime<Utc>) -> Self {
        Self {
            prompt: prompt.to_string(),
            saved_at: saved_at.to_rfc3339(),
        }
    }

    pub fn to_json(&self) -> VideoResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|err| VideoError::Io(err.to_string()))
    }

    pub fn parse(blob_name: &str, bytes: &[u8]) -> VideoResult<Self> {
        let raw: RawPromptRecord = serde_json::from_slice(bytes).map_err(|err| VideoError::Parse {
            blob: blob_name.to_string(),
            reason: err.to_string(),
        })?;
        let prompt = raw
            .prompt
            .filter(|prompt| !prompt.trim().is_empty())
            .ok_or_else(|| VideoError::Parse {
                blob: blob_name.to_string(),
                reason: "no 'prompt' field".to_string(),
            })?;
        Ok(Self {
            prompt,
            saved_at: raw.saved_at.unwrap_or_default(),
        })
    }
}

/// `saved_prompts/prompt_{YYYYmmdd_HHMMSS}_{hash}.json`. The nonce keeps two
/// saves of the same text within one second apart.
pub fn record_blob_name(saved_at: &DateTime<Utc>, prompt: &str, nonce: &str) -> String {
    let stamp = saved_at.format("%Y%m%d_%H%M%S");
    let nanos = saved_at.timestamp_nanos_opt().unwrap_or_default().to_string();
    let hash = compute_hash(&[&nanos, prompt, nonce]);
    format!("{SAVED_PROMPTS_PREFIX}prompt_{stamp}_{}.json", &hash[..NAME_HASH_LEN])
}

/// Default destination for an uploaded video.
pub fn video_blob_name(file_name: &str) -> String {
    format!("{GENERATED_VIDEOS_PREFIX}{file_name}")
}
