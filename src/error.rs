use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single orchestration operation.
///
/// Every component returns this type instead of logging and swallowing, so the
/// presentation layer can branch on [`VideoError::kind`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VideoError {
    #[error("received an empty prompt")]
    EmptyPrompt,

    #[error("video generation API key is not configured")]
    MissingCredential,

    #[error("{0}")]
    Transport(String),

    #[error("failed to parse stored record {blob}: {reason}")]
    Parse { blob: String, reason: String },

    #[error("at least two videos are required for concatenation, got {provided}")]
    InsufficientInput { provided: usize },

    #[error("video file not found at {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("storage bucket is not configured")]
    StorageNotConfigured,

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("video encoding failed: {0}")]
    Encoding(String),

    #[error("local file error: {0}")]
    Io(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    EmptyPrompt,
    MissingCredential,
    Transport,
    Parse,
    InsufficientInput,
    FileNotFound,
    StorageNotConfigured,
    InvalidOption,
    Encoding,
    Io,
}

impl VideoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VideoError::EmptyPrompt => ErrorKind::EmptyPrompt,
            VideoError::MissingCredential => ErrorKind::MissingCredential,
            VideoError::Transport(_) => ErrorKind::Transport,
            VideoError::Parse { .. } => ErrorKind::Parse,
            VideoError::InsufficientInput { .. } => ErrorKind::InsufficientInput,
            VideoError::FileNotFound(_) => ErrorKind::FileNotFound,
            VideoError::StorageNotConfigured => ErrorKind::StorageNotConfigured,
            VideoError::InvalidOption(_) => ErrorKind::InvalidOption,
            VideoError::Encoding(_) => ErrorKind::Encoding,
            VideoError::Io(_) => ErrorKind::Io,
        }
    }

    /// Errors caused by what the user supplied rather than by a backend.
    pub fn is_user_input(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::EmptyPrompt
                | ErrorKind::InvalidOption
                | ErrorKind::InsufficientInput
                | ErrorKind::FileNotFound
        )
    }
}

impl From<std::io::Error> for VideoError {
    fn from(err: std::io::Error) -> Self {
        VideoError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for VideoError {
    fn from(err: reqwest::Error) -> Self {
        VideoError::Transport(err.to_string())
    }
}

impl From<object_store::Error> for VideoError {
    fn from(err: object_store::Error) -> Self {
        VideoError::Transport(err.to_string())
    }
}

pub type VideoResult<T> = Result<T, VideoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_message_is_passed_through_verbatim() {
        let err = VideoError::Transport("503 Service Unavailable".to_string());
        assert_eq!(err.to_string(), "503 Service Unavailable");
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn input_errors_are_classified() {
        assert!(VideoError::EmptyPrompt.is_user_input());
        assert!(VideoError::InsufficientInput { provided: 1 }.is_user_input());
        assert!(!VideoError::MissingCredential.is_user_input());
        assert!(!VideoError::Transport("boom".into()).is_user_input());
    }
}
