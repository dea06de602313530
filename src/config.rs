use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use url::Url;

const APP_DIR: &str = "video-prompt-rmcp";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
const DEFAULT_POLL_TIMEOUT_MS: u64 = 5 * 60 * 1_000;

/// How the generation backend hands back the video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// The generate call answers with the video bytes.
    Stream,
    /// The generate call answers with a generation id that is polled.
    Tracked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Gcs,
    Local,
}

/// Process-wide configuration, built once and handed to every component.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base_url: Url,
    pub api_key: Option<String>,
    pub response_mode: ResponseMode,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub bucket: Option<String>,
    pub storage_backend: StorageBackend,
    pub storage_dir: PathBuf,
    pub output_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub port: u16,
    pub secret_key: Option<String>,
    pub media_base_url: String,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let raw_base_url = get("VEO_API_BASE_URL").ok_or_else(|| anyhow!("VEO_API_BASE_URL is not set"))?;
        let api_base_url = Url::parse(&raw_base_url)
            .with_context(|| format!("VEO_API_BASE_URL is not a valid URL: {raw_base_url}"))?;

        let response_mode = match get("VEO_RESPONSE_MODE").as_deref() {
            None | Some("stream") => ResponseMode::Stream,
            Some("tracked") => ResponseMode::Tracked,
            Some(other) => return Err(anyhow!("VEO_RESPONSE_MODE must be stream or tracked, got {other}")),
        };

        let storage_backend = match get("STORAGE_BACKEND").as_deref() {
            None | Some("gcs") => StorageBackend::Gcs,
            Some("local") => StorageBackend::Local,
            Some(other) => return Err(anyhow!("STORAGE_BACKEND must be gcs or local, got {other}")),
        };

        let poll_interval = parse_millis(get("VEO_POLL_INTERVAL_MS"), DEFAULT_POLL_INTERVAL_MS, "VEO_POLL_INTERVAL_MS")?;
        let poll_timeout = parse_millis(get("VEO_POLL_TIMEOUT_MS"), DEFAULT_POLL_TIMEOUT_MS, "VEO_POLL_TIMEOUT_MS")?;

        let port = match get("MCP_PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("MCP_PORT is not a valid port: {value}"))?,
            None => DEFAULT_PORT,
        };
        let bind_address = format!("0.0.0.0:{port}");

        let storage_dir = get("STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| platform_dir(dirs::data_dir(), "buckets"));
        let output_dir = get("OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| platform_dir(dirs::cache_dir(), "temp_generated_videos"));
        let scratch_dir = get("SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir);

        let media_base_url = resolve_media_base_url(get("MEDIA_URL"), get("DOMAIN"), &bind_address);

        Ok(Self {
            api_base_url,
            api_key: get("VEO_API_KEY"),
            response_mode,
            poll_interval,
            poll_timeout,
            bucket: get("GCS_BUCKET_NAME"),
            storage_backend,
            storage_dir,
            output_dir,
            scratch_dir,
            ffmpeg_path: get("FFMPEG_PATH").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("ffmpeg")),
            port,
            secret_key: get("SECRET_KEY"),
            media_base_url,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    pub fn mcp_path(&self) -> String {
        match self.secret_key.as_deref() {
            Some(secret) => format!("/{secret}/mcp"),
            None => "/mcp".to_string(),
        }
    }

    /// Public URL for a file that lives directly in the output directory.
    pub fn media_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.media_base_url, file_name.trim_start_matches('/'))
    }
}

fn parse_millis(raw: Option<String>, default: u64, key: &str) -> Result<Duration> {
    let millis = match raw {
        Some(value) => value
            .parse::<u64>()
            .with_context(|| format!("{key} must be a number of milliseconds, got {value}"))?,
        None => default,
    };
    Ok(Duration::from_millis(millis))
}

fn platform_dir(base: Option<PathBuf>, leaf: &str) -> PathBuf {
    let mut dir = base.unwrap_or_else(|| PathBuf::from("."));
    dir.push(APP_DIR);
    dir.push(leaf);
    dir
}

fn resolve_media_base_url(media_url: Option<String>, domain: Option<String>, bind_address: &str) -> String {
    if let Some(media_url) = media_url {
        return format!("{}/media", normalize_base_url(&media_url));
    }
    let domain = domain.unwrap_or_else(|| bind_address.to_string());
    format!("{}/media", normalize_base_url(&domain))
}

/// Adds a scheme when missing and collapses accidentally doubled schemes.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let mut rest = trimmed;
    let mut scheme = None;
    loop {
        if let Some(stripped) = rest.strip_prefix("https://") {
            scheme = Some("https://");
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix("http://") {
            scheme = Some("http://");
            rest = stripped;
        } else {
            break;
        }
    }
    format!("{}{}", scheme.unwrap_or("http://"), rest)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_base_url_is_set() {
        let settings = settings(&[("VEO_API_BASE_URL", "https://veo.internal/v1")]).unwrap();
        assert_eq!(settings.response_mode, ResponseMode::Stream);
        assert_eq!(settings.storage_backend, StorageBackend::Gcs);
        assert!(settings.api_key.is_none());
        assert!(settings.bucket.is_none());
        assert_eq!(settings.port, 3000);
        assert_eq!(settings.mcp_path(), "/mcp");
        assert_eq!(settings.media_base_url, "http://0.0.0.0:3000/media");
    }

    #[test]
    fn missing_base_url_is_an_error() {
        assert!(settings(&[("VEO_API_KEY", "key")]).is_err());
    }

    #[test]
    fn blank_values_count_as_unset() {
        let settings = settings(&[
            ("VEO_API_BASE_URL", "https://veo.internal"),
            ("VEO_API_KEY", "   "),
            ("GCS_BUCKET_NAME", ""),
        ])
        .unwrap();
        assert!(settings.api_key.is_none());
        assert!(settings.bucket.is_none());
    }

    #[test]
    fn unknown_modes_are_rejected() {
        assert!(settings(&[("VEO_API_BASE_URL", "https://veo.internal"), ("VEO_RESPONSE_MODE", "json")]).is_err());
        assert!(settings(&[("VEO_API_BASE_URL", "https://veo.internal"), ("STORAGE_BACKEND", "s3")]).is_err());
    }

    #[test]
    fn secret_key_guards_mcp_path_and_media_url_is_normalized() {
        let settings = settings(&[
            ("VEO_API_BASE_URL", "https://veo.internal"),
            ("SECRET_KEY", "s3cr3t"),
            ("MEDIA_URL", "http://https://media.example.org/"),
        ])
        .unwrap();
        assert_eq!(settings.mcp_path(), "/s3cr3t/mcp");
        assert_eq!(
            settings.media_url("clip.mp4"),
            "https://media.example.org/media/clip.mp4"
        );
    }

    #[test]
    fn normalize_adds_scheme() {
        assert_eq!(normalize_base_url("example.org/"), "http://example.org");
        assert_eq!(normalize_base_url("https://https://a.b"), "https://a.b");
    }
}
