use std::path::PathBuf;

use rmcp::{
    ErrorData as McpError,
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars::JsonSchema,
};
use serde::Deserialize;

use crate::{
    config::Settings,
    orchestrator::PromptOrchestrator,
    tools::{VideoToolResponse, json_result, to_mcp_error},
};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConcatenateVideosRequest {
    #[schemars(description = "Video paths inside the output directory (or relative to it), joined in the given order. At least two")]
    pub video_paths: Vec<String>,
}

pub async fn concatenate_videos(
    orchestrator: &PromptOrchestrator,
    settings: &Settings,
    Parameters(request): Parameters<ConcatenateVideosRequest>,
) -> Result<CallToolResult, McpError> {
    let paths: Vec<PathBuf> = request
        .video_paths
        .iter()
        .map(|path| path.trim())
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
        .collect();
    let output = orchestrator
        .concatenate(&paths)
        .await
        .map_err(to_mcp_error)?;

    let file_name = output
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    json_result(&VideoToolResponse {
        path: output.display().to_string(),
        url: settings.media_url(&file_name),
        mime_type: "video/mp4".to_string(),
        text: format!("Concatenated {} videos.", paths.len()),
    })
}
