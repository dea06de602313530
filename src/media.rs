//! Joins an ordered list of videos into one file with a fixed encoding policy.
//! Each input is opened as a clip handle before encoding; the handles are owned
//! by [`Concatenator::concatenate`] and released when it returns, whichever
//! way it returns.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;
use tracing::{error, info};

use crate::error::{VideoError, VideoResult};

pub const VIDEO_CODEC: &str = "libx264";
pub const AUDIO_CODEC: &str = "aac";

#[async_trait]
pub trait MediaBackend: Send + Sync {
    type Clip: Send + Sync;

    async fn open(&self, path: &Path) -> VideoResult<Self::Clip>;

    /// Writes the clips, in order, to `output`.
    async fn encode(&self, clips: &[Self::Clip], output: &Path) -> VideoResult<()>;
}

#[async_trait]
pub trait VideoConcatenator: Send + Sync {
    async fn concatenate(&self, inputs: &[PathBuf], output: &Path) -> VideoResult<PathBuf>;
}

pub struct Concatenator<B> {
    backend: B,
}

impl<B: MediaBackend> Concatenator<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl<B: MediaBackend> VideoConcatenator for Concatenator<B> {
    async fn concatenate(&self, inputs: &[PathBuf], output: &Path) -> VideoResult<PathBuf> {
        info!(?inputs, output = %output.display(), "concatenating videos");
        if inputs.len() < 2 {
            error!(provided = inputs.len(), "not enough videos to concatenate");
            return Err(VideoError::InsufficientInput { provided: inputs.len() });
        }
        if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut clips = Vec::with_capacity(inputs.len());
        for input in inputs {
            clips.push(self.backend.open(input).await?);
        }

        let encoded = self.backend.encode(&clips, output).await;
        drop(clips);

        match encoded {
            Ok(()) => {
                info!(output = %output.display(), "videos concatenated");
                Ok(output.to_path_buf())
            }
            Err(err) => {
                error!(output = %output.display(), error = %err, "video concatenation failed");
                Err(err)
            }
        }
    }
}

/// An input held open for the duration of one encode.
#[derive(Debug)]
pub struct FfmpegClip {
    path: PathBuf,
    _handle: fs::File,
}

impl FfmpegClip {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Encodes through an `ffmpeg` binary using the concat demuxer.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg_path: PathBuf,
    scratch_dir: PathBuf,
}

impl FfmpegBackend {
    pub fn new(ffmpeg_path: PathBuf, scratch_dir: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            scratch_dir,
        }
    }
}

/// One `file '<path>'` line per input; single quotes are escaped the way the
/// concat demuxer expects.
pub fn concat_manifest<'a>(paths: impl IntoIterator<Item = &'a Path>) -> String {
    paths
        .into_iter()
        .map(|path| {
            let escaped = path.to_string_lossy().replace('\'', r"'\''");
            format!("file '{escaped}'")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl MediaBackend for FfmpegBackend {
    type Clip = FfmpegClip;

    async fn open(&self, path: &Path) -> VideoResult<FfmpegClip> {
        let handle = match fs::File::open(path).await {
            Ok(handle) => handle,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(VideoError::FileNotFound(path.to_path_buf()));
            }
            Err(err) => return Err(err.into()),
        };
        let path = std::path::absolute(path)?;
        Ok(FfmpegClip { path, _handle: handle })
    }

    async fn encode(&self, clips: &[FfmpegClip], output: &Path) -> VideoResult<()> {
        fs::create_dir_all(&self.scratch_dir).await?;
        let mut manifest = tempfile::Builder::new()
            .prefix("concat_manifest_")
            .suffix(".txt")
            .tempfile_in(&self.scratch_dir)?;
        manifest.write_all(concat_manifest(clips.iter().map(FfmpegClip::path)).as_bytes())?;
        manifest.flush()?;

        let result = Command::new(&self.ffmpeg_path)
            .args(["-y", "-hide_banner", "-loglevel", "error", "-f", "concat", "-safe", "0", "-i"])
            .arg(manifest.path())
            .args(["-c:v", VIDEO_CODEC, "-c:a", AUDIO_CODEC])
            .arg(output)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| VideoError::Encoding(format!("failed to run {}: {err}", self.ffmpeg_path.display())))?;

        if result.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&result.stderr);
            Err(VideoError::Encoding(format!("{}: {}", result.status, stderr.trim())))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::ErrorKind;

    struct TrackedClip {
        bytes: Vec<u8>,
        open_handles: Arc<AtomicUsize>,
    }

    impl Drop for TrackedClip {
        fn drop(&mut self) {
            self.open_handles.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Writes clips byte-for-byte in order and counts live handles.
    struct TrackingBackend {
        open_handles: Arc<AtomicUsize>,
        opened: AtomicUsize,
        fail_encode: bool,
    }

    impl TrackingBackend {
        fn new(fail_encode: bool) -> Self {
            Self {
                open_handles: Arc::new(AtomicUsize::new(0)),
                opened: AtomicUsize::new(0),
                fail_encode,
            }
        }
    }

    #[async_trait]
    impl MediaBackend for TrackingBackend {
        type Clip = TrackedClip;

        async fn open(&self, path: &Path) -> VideoResult<TrackedClip> {
            let bytes = fs::read(path)
                .await
                .map_err(|_| VideoError::FileNotFound(path.to_path_buf()))?;
            self.open_handles.fetch_add(1, Ordering::SeqCst);
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(TrackedClip {
                bytes,
                open_handles: self.open_handles.clone(),
            })
        }

        async fn encode(&self, clips: &[TrackedClip], output: &Path) -> VideoResult<()> {
            let mut joined = Vec::new();
            for (index, clip) in clips.iter().enumerate() {
                if self.fail_encode && index == 1 {
                    return Err(VideoError::Encoding("encoder crashed".to_string()));
                }
                joined.extend_from_slice(&clip.bytes);
            }
            fs::write(output, joined).await?;
            Ok(())
        }
    }

    async fn inputs(dir: &Path) -> Vec<PathBuf> {
        let a = dir.join("a.mp4");
        let b = dir.join("b.mp4");
        fs::write(&a, b"AAA").await.unwrap();
        fs::write(&b, b"BBB").await.unwrap();
        vec![a, b]
    }

    #[tokio::test]
    async fn single_input_is_rejected_without_opening() {
        let dir = tempfile::tempdir().unwrap();
        let paths = inputs(dir.path()).await;
        let concatenator = Concatenator::new(TrackingBackend::new(false));

        let err = concatenator
            .concatenate(&paths[..1], &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert_eq!(err, VideoError::InsufficientInput { provided: 1 });
        assert_eq!(concatenator.backend.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn inputs_are_joined_in_order_and_released() {
        let dir = tempfile::tempdir().unwrap();
        let paths = inputs(dir.path()).await;
        let concatenator = Concatenator::new(TrackingBackend::new(false));
        let output = dir.path().join("nested/out.mp4");

        let written = concatenator.concatenate(&paths, &output).await.unwrap();
        assert_eq!(written, output);
        assert_eq!(fs::read(&output).await.unwrap(), b"AAABBB");
        assert_eq!(concatenator.backend.opened.load(Ordering::SeqCst), 2);
        assert_eq!(concatenator.backend.open_handles.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handles_are_released_when_encoder_fails() {
        let dir = tempfile::tempdir().unwrap();
        let paths = inputs(dir.path()).await;
        let concatenator = Concatenator::new(TrackingBackend::new(true));

        let err = concatenator
            .concatenate(&paths, &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);
        assert_eq!(concatenator.backend.opened.load(Ordering::SeqCst), 2);
        assert_eq!(concatenator.backend.open_handles.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handles_are_released_when_an_input_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = inputs(dir.path()).await;
        paths.push(dir.path().join("missing.mp4"));
        let concatenator = Concatenator::new(TrackingBackend::new(false));

        let err = concatenator
            .concatenate(&paths, &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        assert_eq!(concatenator.backend.open_handles.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ffmpeg_backend_reports_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FfmpegBackend::new(PathBuf::from("ffmpeg"), dir.path().to_path_buf());
        let err = backend.open(&dir.path().join("absent.mp4")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }

    #[tokio::test]
    async fn missing_encoder_binary_is_an_encoding_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = inputs(dir.path()).await;
        let backend = FfmpegBackend::new(dir.path().join("no-such-ffmpeg"), dir.path().join("scratch"));
        let concatenator = Concatenator::new(backend);

        let err = concatenator
            .concatenate(&paths, &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);

        let mut scratch = fs::read_dir(dir.path().join("scratch")).await.unwrap();
        assert!(scratch.next_entry().await.unwrap().is_none());
    }

    #[test]
    fn manifest_lists_inputs_in_order_with_escaping() {
        let a = PathBuf::from("/tmp/a.mp4");
        let b = PathBuf::from("/tmp/it's.mp4");
        let manifest = concat_manifest([a.as_path(), b.as_path()]);
        let lines: Vec<&str> = manifest.lines().collect();
        assert_eq!(lines, vec!["file '/tmp/a.mp4'", r"file '/tmp/it'\''s.mp4'"]);
    }
}
