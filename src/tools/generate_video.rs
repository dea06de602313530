use rmcp::{
    ErrorData as McpError,
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars::JsonSchema,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    config::Settings,
    generation::UploadOutcome,
    orchestrator::PromptOrchestrator,
    prompt::{AspectRatio, ContentPolicy, parse_option},
    tools::{json_result, to_mcp_error},
};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateVideoRequest {
    #[schemars(description = "Text prompt describing the video")]
    pub prompt: String,
    #[schemars(description = "Aspect ratio: 16:9 or 9:16. Backend default when omitted")]
    pub aspect_ratio: Option<String>,
    #[schemars(description = "Whether people may appear: dont_allow or allow_adult")]
    pub content_policy: Option<String>,
    #[schemars(description = "Also upload the video to the configured bucket")]
    pub upload: Option<bool>,
}

#[derive(Serialize)]
struct GenerateVideoResponse {
    path: String,
    url: String,
    #[serde(rename = "mimeType")]
    mime_type: &'static str,
    size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    upload: Option<UploadOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    upload_error: Option<String>,
}

pub async fn generate_video(
    orchestrator: &PromptOrchestrator,
    settings: &Settings,
    Parameters(request): Parameters<GenerateVideoRequest>,
) -> Result<CallToolResult, McpError> {
    let aspect_ratio = parse_option::<AspectRatio>(request.aspect_ratio.as_deref()).map_err(to_mcp_error)?;
    let content_policy =
        parse_option::<ContentPolicy>(request.content_policy.as_deref()).map_err(to_mcp_error)?;

    let video = orchestrator
        .process(&request.prompt, aspect_ratio, content_policy)
        .await
        .map_err(to_mcp_error)?;

    let (upload, upload_error) = if request.upload.unwrap_or(false) {
        match orchestrator.upload_video(&video.path, None).await {
            Ok(outcome) => (Some(outcome), None),
            Err(err) => {
                warn!(path = %video.path.display(), error = %err, "generated video could not be uploaded");
                (None, Some(err.to_string()))
            }
        }
    } else {
        (None, None)
    };

    let file_name = video
        .path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    let response = GenerateVideoResponse {
        path: video.path.display().to_string(),
        url: settings.media_url(&file_name),
        mime_type: "video/mp4",
        size_bytes: video.size_bytes,
        generation_id: video.generation_id,
        upload,
        upload_error,
    };
    json_result(&response)
}
