use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{VideoError, VideoResult};

/// Prompts longer than this are still dispatched, only logged.
pub const PROMPT_SOFT_LIMIT: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

impl FromStr for AspectRatio {
    type Err = VideoError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "16:9" => Ok(AspectRatio::Landscape),
            "9:16" => Ok(AspectRatio::Portrait),
            other => Err(VideoError::InvalidOption(format!(
                "aspect_ratio must be 16:9 or 9:16, got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether people may appear in the generated video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentPolicy {
    DontAllow,
    AllowAdult,
}

impl ContentPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentPolicy::DontAllow => "dont_allow",
            ContentPolicy::AllowAdult => "allow_adult",
        }
    }
}

impl FromStr for ContentPolicy {
    type Err = VideoError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dont_allow" | "disallow-people" | "disallow_people" => Ok(ContentPolicy::DontAllow),
            "allow_adult" | "allow-adult" => Ok(ContentPolicy::AllowAdult),
            other => Err(VideoError::InvalidOption(format!(
                "content_policy must be dont_allow or allow_adult, got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for ContentPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated user prompt together with its generation options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    text: String,
    pub aspect_ratio: Option<AspectRatio>,
    pub content_policy: Option<ContentPolicy>,
}

impl Prompt {
    /// Rejects text that is empty after trimming. The stored text keeps the
    /// user's original spelling.
    pub fn new(text: impl Into<String>) -> VideoResult<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(VideoError::EmptyPrompt);
        }
        let length = text.chars().count();
        if length > PROMPT_SOFT_LIMIT {
            warn!(length, limit = PROMPT_SOFT_LIMIT, "prompt exceeds soft length limit");
        }
        Ok(Self {
            text,
            aspect_ratio: None,
            content_policy: None,
        })
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: Option<AspectRatio>) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_content_policy(mut self, content_policy: Option<ContentPolicy>) -> Self {
        self.content_policy = content_policy;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Parses an optional option string, treating blank input as absent.
pub fn parse_option<T: FromStr<Err = VideoError>>(raw: Option<&str>) -> VideoResult<Option<T>> {
    match raw {
        Some(value) if !value.trim().is_empty() => value.parse().map(Some),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_prompt_is_rejected() {
        for raw in ["", "   ", "\n\t "] {
            assert_eq!(Prompt::new(raw), Err(VideoError::EmptyPrompt));
        }
    }

    #[test]
    fn long_prompt_is_still_accepted() {
        let text = "a".repeat(PROMPT_SOFT_LIMIT + 10);
        let prompt = Prompt::new(text.clone()).unwrap();
        assert_eq!(prompt.text(), text);
    }

    #[test]
    fn options_parse_from_both_spellings() {
        assert_eq!("9:16".parse::<AspectRatio>().unwrap(), AspectRatio::Portrait);
        assert_eq!(
            "disallow-people".parse::<ContentPolicy>().unwrap(),
            ContentPolicy::DontAllow
        );
        assert_eq!(
            "allow_adult".parse::<ContentPolicy>().unwrap(),
            ContentPolicy::AllowAdult
        );
        assert!("4:3".parse::<AspectRatio>().is_err());
    }

    #[test]
    fn blank_option_is_absent() {
        let parsed: Option<AspectRatio> = parse_option(Some("  ")).unwrap();
        assert!(parsed.is_none());
        let err = parse_option::<ContentPolicy>(Some("everyone")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidOption);
    }
}
